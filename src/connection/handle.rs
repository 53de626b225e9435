//! The user-facing API of the connection manager.

use super::{
    command::ManagerCommand,
    event::{LifecycleEvent, SubscriptionId},
    event_loop::ConnectionEventLoop,
    manager::ConnectionManager,
    pending::PendingConnect,
    state::ConnectionState,
};
use crate::{
    config::{Config, EndpointConfig},
    error::{Error, Operation, Result},
    executor::DeferredExecutor,
    service::Service,
    transport::Transport,
};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::info;

/// A handle to a connection manager running on its event loop.
///
/// Handles are cheap to clone and may be used from any task. The event loop
/// stops once every handle has been dropped.
///
/// 运行在其事件循环上的连接管理器的句柄。句柄克隆开销很小，可在任意任务中使用。
/// 所有句柄都被丢弃后事件循环停止。
pub struct ConnectionHandle<S> {
    command_tx: mpsc::Sender<ManagerCommand<S>>,
    endpoint: EndpointConfig,
}

impl<S> Clone for ConnectionHandle<S> {
    fn clone(&self) -> Self {
        Self {
            command_tx: self.command_tx.clone(),
            endpoint: self.endpoint.clone(),
        }
    }
}

impl<S> std::fmt::Debug for ConnectionHandle<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionHandle")
            .field("endpoint", &self.endpoint)
            .field("closed", &self.command_tx.is_closed())
            .finish()
    }
}

impl<S: Send + 'static> ConnectionHandle<S> {
    /// Builds a manager over `transport` and returns a handle to it together
    /// with the event loop that owns it. The loop does nothing until run.
    ///
    /// 基于 `transport` 构建管理器，返回其句柄以及拥有它的事件循环。循环在运行前不做任何事。
    pub fn new<T>(transport: T, config: Config) -> (Self, ConnectionEventLoop<T, S>)
    where
        T: Transport,
        S: Service<T::Client>,
    {
        let (command_tx, command_rx) = mpsc::channel(config.channels.command_capacity);
        let executor = DeferredExecutor::new();
        let manager = ConnectionManager::new(Arc::new(transport), executor.deferrer());

        let handle = Self {
            command_tx,
            endpoint: config.endpoint.clone(),
        };
        let event_loop = ConnectionEventLoop {
            manager,
            executor,
            command_rx,
            config,
        };
        (handle, event_loop)
    }

    /// Builds a manager and spawns its event loop on the current tokio runtime.
    ///
    /// 构建管理器并在当前tokio运行时上启动其事件循环。
    pub fn spawn<T>(transport: T, config: Config) -> Self
    where
        T: Transport,
        S: Service<T::Client>,
    {
        let (handle, event_loop) = Self::new(transport, config);
        info!(endpoint = %handle.endpoint, "Connection event loop spawned");
        tokio::spawn(event_loop.run());
        handle
    }

    /// Starts a connect attempt and returns as soon as the guard has accepted it.
    ///
    /// Fails immediately with `Error::InvalidState` unless the connection is
    /// `Closed`. The returned future resolves when the transport finishes.
    ///
    /// 发起连接尝试，并在守卫接受后立即返回。除非连接处于 `Closed`，否则立即以
    /// `Error::InvalidState` 失败。返回的 future 在传输层完成时结束。
    pub async fn begin_connect(
        &self,
        address: impl Into<String>,
        port: u16,
    ) -> Result<PendingConnect> {
        let address = address.into();
        self.request(|response_tx| ManagerCommand::Connect {
            address,
            port,
            response_tx,
        })
        .await?
    }

    /// Connects to `address:port` and waits for the outcome.
    ///
    /// To bound the wait, race this against `tokio::time::timeout`. The attempt
    /// keeps running after a timeout, and further connects are rejected until
    /// it resolves.
    ///
    /// 连接到 `address:port` 并等待结果。如需限制等待时间，可与 `tokio::time::timeout`
    /// 竞争；超时后尝试仍会继续，在其完成之前新的连接请求都会被拒绝。
    pub async fn connect(&self, address: impl Into<String>, port: u16) -> Result<()> {
        self.begin_connect(address, port).await?.await
    }

    /// Connects to the endpoint from the configuration.
    pub async fn connect_configured(&self) -> Result<()> {
        let EndpointConfig { address, port } = self.endpoint.clone();
        self.connect(address, port).await
    }

    /// Requests that the open connection be closed.
    ///
    /// Returns once the request is issued. The transition to `Closed` is
    /// reported later through `StateChanged`.
    ///
    /// 请求关闭已打开的连接。请求发出后即返回；向 `Closed` 的转换稍后通过 `StateChanged` 报告。
    pub async fn disconnect(&self) -> Result<()> {
        self.request(|response_tx| ManagerCommand::Disconnect { response_tx })
            .await?
    }

    /// Returns the current state as seen by the event loop.
    ///
    /// 返回事件循环所见的当前状态。
    pub async fn state(&self) -> Result<ConnectionState> {
        self.request(|response_tx| ManagerCommand::GetState { response_tx })
            .await
    }

    /// Subscribes `listener` to lifecycle events. It runs on the event loop.
    ///
    /// 为 `listener` 订阅生命周期事件。监听器在事件循环上运行。
    pub async fn subscribe<F>(&self, listener: F) -> Result<SubscriptionId>
    where
        F: FnMut(&LifecycleEvent<'_, S>) + Send + 'static,
    {
        let listener = Box::new(listener);
        self.request(|response_tx| ManagerCommand::Subscribe {
            listener,
            response_tx,
        })
        .await
    }

    /// Removes a listener. Returns `false` if `id` was not subscribed.
    ///
    /// 移除监听器。如果 `id` 未订阅则返回 `false`。
    pub async fn unsubscribe(&self, id: SubscriptionId) -> Result<bool> {
        self.request(|response_tx| ManagerCommand::Unsubscribe { id, response_tx })
            .await
    }

    /// Runs `f` against the bound service façade on the event loop and returns
    /// its result, or `Error::InvalidState` if the connection is not `Open`.
    ///
    /// For asynchronous RPC calls, have `f` return the call's future and await
    /// it afterwards.
    ///
    /// 在事件循环上针对已绑定的服务门面运行 `f` 并返回其结果；连接不处于 `Open` 时返回
    /// `Error::InvalidState`。对于异步RPC调用，可让 `f` 返回调用的 future，之后再等待它。
    pub async fn with_service<F, R>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&S) -> R + Send + 'static,
        R: Send + 'static,
    {
        let (response_tx, response_rx) = oneshot::channel();
        let task = Box::new(move |service: std::result::Result<&S, ConnectionState>| {
            let result = match service {
                Ok(service) => Ok(f(service)),
                Err(state) => Err(Error::InvalidState {
                    operation: Operation::Service,
                    state,
                }),
            };
            let _ = response_tx.send(result);
        });
        self.command_tx
            .send(ManagerCommand::WithService { task })
            .await
            .map_err(|_| Error::ChannelClosed)?;
        response_rx.await.map_err(|_| Error::ChannelClosed)?
    }

    async fn request<R>(
        &self,
        build: impl FnOnce(oneshot::Sender<R>) -> ManagerCommand<S>,
    ) -> Result<R> {
        let (response_tx, response_rx) = oneshot::channel();
        self.command_tx
            .send(build(response_tx))
            .await
            .map_err(|_| Error::ChannelClosed)?;
        response_rx.await.map_err(|_| Error::ChannelClosed)
    }
}
