//! Commands sent from `ConnectionHandle`s to the owning event loop.

use super::{
    event::{EventListener, SubscriptionId},
    manager::ServiceTask,
    pending::PendingConnect,
    state::ConnectionState,
};
use crate::error::Result;
use tokio::sync::oneshot;

/// Commands sent to the connection event loop.
///
/// Each one is applied to the manager on the owning loop, and its result is
/// returned through `response_tx`.
///
/// 发送到连接事件循环的命令。每条命令都在所属循环上作用于管理器，结果经 `response_tx` 返回。
pub(crate) enum ManagerCommand<S> {
    /// 来自公共API的命令，用于发起连接。
    /// Command from the public API to start a connect attempt.
    Connect {
        address: String,
        port: u16,
        response_tx: oneshot::Sender<Result<PendingConnect>>,
    },
    /// 来自公共API的命令，用于请求断开。
    /// Command from the public API to request a disconnect.
    Disconnect {
        response_tx: oneshot::Sender<Result<()>>,
    },
    GetState {
        response_tx: oneshot::Sender<ConnectionState>,
    },
    Subscribe {
        listener: EventListener<S>,
        response_tx: oneshot::Sender<SubscriptionId>,
    },
    Unsubscribe {
        id: SubscriptionId,
        response_tx: oneshot::Sender<bool>,
    },
    /// Runs a closure against the façade. The closure carries its own reply channel.
    /// 针对门面运行闭包。闭包自带回复通道。
    WithService { task: ServiceTask<S> },
}
