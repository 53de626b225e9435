//! 生命周期事件与观察者注册表
//! Lifecycle events and the observer registry
//!
//! 所有监听器都在所属事件循环上被调用，每个监听器看到的事件顺序与发出顺序一致。
//!
//! All listeners are invoked on the owning event loop, and every listener sees
//! events in the order they were emitted.

use super::state::ConnectionState;
use crate::error::Error;
use std::fmt;

/// 生命周期事件类型
/// Lifecycle event types
pub enum LifecycleEvent<'a, S> {
    /// Fired on every state transition.
    /// 每次状态转换时触发。
    StateChanged(ConnectionState),
    /// Fired once per transition into `Open`, right after `StateChanged(Open)`.
    /// The façade reference is only valid for the duration of the call; this is
    /// where push-event subscriptions on the façade should be installed.
    ///
    /// 每次进入 `Open` 时触发一次，紧跟在 `StateChanged(Open)` 之后。门面引用只在本次调用
    /// 期间有效；应在此处安装门面上的推送事件订阅。
    Connected(&'a S),
    /// A connect attempt failed. Fired after `StateChanged(Closed)`.
    /// 连接尝试失败。在 `StateChanged(Closed)` 之后触发。
    ConnectFailed(&'a Error),
}

impl<S> LifecycleEvent<'_, S> {
    /// The new state, for `StateChanged` events.
    pub fn state(&self) -> Option<ConnectionState> {
        match self {
            LifecycleEvent::StateChanged(state) => Some(*state),
            _ => None,
        }
    }
}

impl<S> fmt::Debug for LifecycleEvent<'_, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LifecycleEvent::StateChanged(state) => f.debug_tuple("StateChanged").field(state).finish(),
            LifecycleEvent::Connected(_) => f.write_str("Connected"),
            LifecycleEvent::ConnectFailed(error) => {
                f.debug_tuple("ConnectFailed").field(error).finish()
            }
        }
    }
}

/// 事件监听器类型定义
/// Event listener type definition
pub type EventListener<S> = Box<dyn FnMut(&LifecycleEvent<'_, S>) + Send>;

/// Identifies a subscription for later removal.
///
/// 标识一个订阅，以便之后移除。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// The set of subscribed listeners.
///
/// 已订阅监听器的集合。
pub struct Observers<S> {
    next_id: u64,
    listeners: Vec<(SubscriptionId, EventListener<S>)>,
}

impl<S> fmt::Debug for Observers<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observers")
            .field("listeners_count", &self.listeners.len())
            .finish()
    }
}

impl<S> Default for Observers<S> {
    fn default() -> Self {
        Self {
            next_id: 0,
            listeners: Vec::new(),
        }
    }
}

impl<S> Observers<S> {
    /// 注册事件监听器
    /// Register event listener
    pub fn subscribe<F>(&mut self, listener: F) -> SubscriptionId
    where
        F: FnMut(&LifecycleEvent<'_, S>) + Send + 'static,
    {
        self.subscribe_boxed(Box::new(listener))
    }

    /// 注册已装箱的事件监听器
    /// Register an already boxed event listener
    pub fn subscribe_boxed(&mut self, listener: EventListener<S>) -> SubscriptionId {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.listeners.push((id, listener));
        id
    }

    /// 移除事件监听器，返回是否存在
    /// Remove event listener, returns whether it existed
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(existing, _)| *existing != id);
        self.listeners.len() != before
    }

    /// 触发生命周期事件
    /// Trigger lifecycle event
    pub fn emit(&mut self, event: &LifecycleEvent<'_, S>) {
        for (_, listener) in &mut self.listeners {
            listener(event);
        }
    }

    /// 当前订阅的监听器数量
    /// Number of subscribed listeners
    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    /// 是否没有任何监听器
    /// Whether no listener is subscribed
    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }
}
