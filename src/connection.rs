//! The client connection lifecycle: state machine, notifications, and the
//! event loop that owns them.
//!
//! 客户端连接生命周期：状态机、通知以及拥有它们的事件循环。

mod command;
pub mod event;
pub mod event_loop;
pub mod handle;
pub mod manager;
mod pending;
pub mod state;

pub use event::{EventListener, LifecycleEvent, SubscriptionId};
pub use event_loop::ConnectionEventLoop;
pub use handle::ConnectionHandle;
pub use manager::ConnectionManager;
pub use pending::PendingConnect;
pub use state::{ConnectionState, StateValidator};
