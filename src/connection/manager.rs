//! 连接生命周期管理器
//! Connection lifecycle manager
//!
//! 管理器拥有状态机、传输客户端和服务门面。它只能通过 `&mut self` 被修改，而唯一持有
//! `&mut` 的是所属事件循环；来自传输层的通知全部经由延迟执行器转回该循环。
//!
//! The manager owns the state machine, the transport client and the service
//! façade. It is only mutated through `&mut self`, and the only holder of that
//! borrow is the owning event loop; every transport notification is routed
//! back onto that loop through the deferred executor.

use super::{
    event::{EventListener, LifecycleEvent, Observers, SubscriptionId},
    pending::PendingConnect,
    state::{ConnectionState, StateValidator},
};
use crate::{
    error::{Error, Operation, Result},
    executor::Deferrer,
    service::Service,
    transport::{Transport, TransportClient, TransportEvent, TransportNotifier},
};
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::{debug, error, info, trace, warn};

/// A closure run against the façade on the owning loop. Receives the current
/// state instead when no façade is bound.
///
/// 在所属循环上针对门面运行的闭包。未绑定门面时改为接收当前状态。
pub(crate) type ServiceTask<S> =
    Box<dyn FnOnce(std::result::Result<&S, ConnectionState>) + Send>;

/// The aggregate root of the client connection.
///
/// 客户端连接的聚合根。
pub struct ConnectionManager<T: Transport, S> {
    state: ConnectionState,
    transport: Arc<T>,
    /// Present while `Open`.
    client: Option<Arc<T::Client>>,
    /// Present iff `Open`.
    service: Option<S>,
    observers: Observers<S>,
    /// Incremented for every connect attempt. Notifications and completions
    /// tagged with an older value belong to a dead session.
    ///
    /// 每次连接尝试时递增。带有旧值的通知和完成结果属于已失效的会话。
    generation: u64,
    endpoint: String,
    pending_connect: Option<oneshot::Sender<Result<()>>>,
    close_requested: bool,
    deferrer: Deferrer<Self>,
}

impl<T: Transport, S> std::fmt::Debug for ConnectionManager<T, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("state", &self.state)
            .field("generation", &self.generation)
            .field("endpoint", &self.endpoint)
            .field("has_client", &self.client.is_some())
            .field("has_service", &self.service.is_some())
            .field("observers", &self.observers)
            .finish()
    }
}

impl<T, S> ConnectionManager<T, S>
where
    T: Transport,
    S: Service<T::Client>,
{
    /// Creates a manager in the `Closed` state.
    ///
    /// `deferrer` must feed the executor drained by the loop that owns this manager.
    ///
    /// 创建一个处于 `Closed` 状态的管理器。`deferrer` 必须连接到拥有此管理器的循环所消费的执行器。
    pub fn new(transport: Arc<T>, deferrer: Deferrer<Self>) -> Self {
        Self {
            state: ConnectionState::Closed,
            transport,
            client: None,
            service: None,
            observers: Observers::default(),
            generation: 0,
            endpoint: String::new(),
            pending_connect: None,
            close_requested: false,
            deferrer,
        }
    }

    /// The current state, consistent with the last `StateChanged` emitted.
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Starts a connect attempt to `address:port`.
    ///
    /// Requires `Closed`. On acceptance the manager is `Connecting` and
    /// `StateChanged(Connecting)` has been emitted before this returns; the
    /// transport is driven on a separate task and its outcome is applied on
    /// the owning loop.
    ///
    /// Must be called from within a tokio runtime, since the transport
    /// connect is spawned onto it.
    ///
    /// 发起到 `address:port` 的连接尝试。要求处于 `Closed`。被接受时，返回前管理器已处于
    /// `Connecting` 并已发出 `StateChanged(Connecting)`；传输层在独立任务上运行，其结果在
    /// 所属循环上应用。必须在tokio运行时内调用，因为传输层连接会被派生到该运行时上。
    pub fn connect(&mut self, address: &str, port: u16) -> Result<PendingConnect> {
        if !StateValidator::can_connect(self.state) {
            return Err(self.rejected(Operation::Connect));
        }

        self.generation += 1;
        let generation = self.generation;
        self.endpoint = format!("{address}:{port}");
        self.close_requested = false;

        let (done_tx, done_rx) = oneshot::channel();
        self.pending_connect = Some(done_tx);

        info!(endpoint = %self.endpoint, generation, "Connecting");
        self.set_state(ConnectionState::Connecting);

        let notifier = TransportNotifier::new(self.deferrer.wrap(
            move |manager: &mut Self, event: TransportEvent| {
                manager.on_transport_event(generation, event);
            },
        ));
        let transport = self.transport.clone();
        let deferrer = self.deferrer.clone();
        let address = address.to_string();
        tokio::spawn(async move {
            let result = transport.connect(&address, port, notifier).await;
            deferrer.defer(move |manager: &mut Self| {
                manager.on_connect_complete(generation, result);
            });
        });

        Ok(PendingConnect::new(done_rx))
    }

    /// Requests that the open session be closed.
    ///
    /// Requires `Open`. The state stays `Open` until the transport confirms
    /// the close with a `Disconnected` notification.
    ///
    /// 请求关闭已打开的会话。要求处于 `Open`。在传输层以 `Disconnected` 通知确认关闭之前，
    /// 状态保持 `Open`。
    pub fn disconnect(&mut self) -> Result<()> {
        if !StateValidator::can_disconnect(self.state) {
            return Err(self.rejected(Operation::Disconnect));
        }

        info!(endpoint = %self.endpoint, generation = self.generation, "Close requested");
        self.close_requested = true;
        if let Some(client) = &self.client {
            client.close();
        }
        Ok(())
    }

    /// Runs `f` against the bound façade.
    ///
    /// 针对已绑定的门面运行 `f`。
    pub fn with_service<R>(&self, f: impl FnOnce(&S) -> R) -> Result<R> {
        match &self.service {
            Some(service) => Ok(f(service)),
            None => Err(self.rejected(Operation::Service)),
        }
    }

    pub(crate) fn run_service_task(&self, task: ServiceTask<S>) {
        task(self.service.as_ref().ok_or(self.state));
    }

    pub fn subscribe<F>(&mut self, listener: F) -> SubscriptionId
    where
        F: FnMut(&LifecycleEvent<'_, S>) + Send + 'static,
    {
        self.observers.subscribe(listener)
    }

    pub(crate) fn subscribe_boxed(&mut self, listener: EventListener<S>) -> SubscriptionId {
        self.observers.subscribe_boxed(listener)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.observers.unsubscribe(id)
    }

    /// Whether a transport client is currently owned.
    pub fn has_client(&self) -> bool {
        self.client.is_some()
    }

    /// Whether the façade is currently bound.
    pub fn has_service(&self) -> bool {
        self.service.is_some()
    }

    /// Releases everything when the owning loop stops.
    ///
    /// 所属循环停止时释放所有资源。
    pub(crate) fn shutdown(&mut self) {
        if let Some(client) = self.client.take() {
            client.close();
        }
        self.service = None;
        // Invalidates notifications still in flight for the current session.
        self.generation += 1;
        self.pending_connect = None;
        if self.state != ConnectionState::Closed {
            info!(from = %self.state, "Event loop stopping, closing connection");
            self.set_state(ConnectionState::Closed);
        }
    }

    fn on_connect_complete(&mut self, generation: u64, result: Result<T::Client>) {
        if generation != self.generation || self.state != ConnectionState::Connecting {
            debug!(
                generation,
                current = self.generation,
                "Discarding completion of an abandoned connect attempt"
            );
            if let Ok(client) = result {
                client.close();
            }
            return;
        }

        match result {
            Ok(client) => {
                let client = Arc::new(client);
                self.service = Some(S::bind(client.clone()));
                self.client = Some(client);
                info!(endpoint = %self.endpoint, generation, "Connection open");
                self.set_state(ConnectionState::Open);

                if let Some(service) = &self.service {
                    self.observers.emit(&LifecycleEvent::Connected(service));
                }
                if let Some(done) = self.pending_connect.take() {
                    let _ = done.send(Ok(()));
                }
            }
            Err(e) => self.fail_connect(e.to_string()),
        }
    }

    fn on_transport_event(&mut self, generation: u64, event: TransportEvent) {
        if generation != self.generation {
            trace!(
                generation,
                current = self.generation,
                ?event,
                "Ignoring notification from a previous session"
            );
            return;
        }

        match event {
            TransportEvent::Connected => {
                trace!(generation, "Transport reports session established");
            }
            TransportEvent::Disconnected { reason } => match self.state {
                ConnectionState::Open => {
                    self.service = None;
                    self.client = None;
                    if self.close_requested {
                        info!(endpoint = %self.endpoint, "Connection closed");
                    } else {
                        warn!(
                            endpoint = %self.endpoint,
                            reason = reason.as_deref().unwrap_or("unknown"),
                            "Connection lost"
                        );
                    }
                    self.close_requested = false;
                    self.set_state(ConnectionState::Closed);
                }
                ConnectionState::Connecting => {
                    // The attempt is dead; its completion must not open the connection.
                    self.generation += 1;
                    self.fail_connect(
                        reason.unwrap_or_else(|| "session closed during handshake".to_string()),
                    );
                }
                ConnectionState::Closed => {
                    trace!(generation, "Disconnect notification while already closed");
                }
            },
        }
    }

    fn fail_connect(&mut self, reason: String) {
        let error = Error::ConnectFailed {
            endpoint: self.endpoint.clone(),
            reason,
        };
        warn!(%error, "Connect attempt failed");

        self.service = None;
        self.client = None;
        self.set_state(ConnectionState::Closed);
        self.observers.emit(&LifecycleEvent::ConnectFailed(&error));
        if let Some(done) = self.pending_connect.take() {
            let _ = done.send(Err(error));
        }
    }

    fn set_state(&mut self, next: ConnectionState) {
        if !StateValidator::is_valid_transition(self.state, next) {
            error!(from = %self.state, to = %next, "Invalid state transition attempted");
            return;
        }
        debug!(from = %self.state, to = %next, "State transition executed");
        self.state = next;
        self.observers.emit(&LifecycleEvent::StateChanged(next));
    }

    fn rejected(&self, operation: Operation) -> Error {
        debug!(%operation, state = %self.state, "Operation rejected by state guard");
        Error::InvalidState {
            operation,
            state: self.state,
        }
    }
}
