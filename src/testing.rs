//! 测试辅助工具模块
//! Test utilities module

#![cfg(test)]

use crate::connection::{ConnectionManager, ConnectionState, LifecycleEvent};
use crate::error::{Error, Result};
use crate::executor::DeferredExecutor;
use crate::service::Service;
use crate::transport::{Transport, TransportClient, TransportNotifier};
use async_trait::async_trait;
use std::sync::{
    Arc, Mutex, Once,
    atomic::{AtomicUsize, Ordering},
};
use tokio::sync::{mpsc, oneshot};
use tokio::time::{Duration, timeout};

const STEP_TIMEOUT: Duration = Duration::from_secs(5);

/// Initializes tracing for tests, ensuring it's only done once.
pub fn init_tracing() {
    static TRACING_INIT: Once = Once::new();
    TRACING_INIT.call_once(|| {
        let filter = std::env::var("RUST_LOG")
            .unwrap_or_else(|_| "kestrel_rpc_client=debug".to_string());
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    });
}

/// A connect call captured by `MockTransport`, waiting for the test to decide
/// its outcome.
pub struct ConnectAttempt {
    pub address: String,
    pub port: u16,
    pub notifier: TransportNotifier,
    resolve: oneshot::Sender<Result<MockClient>>,
}

impl ConnectAttempt {
    /// Completes the connect successfully.
    pub fn accept(self) -> MockClientProbe {
        let closes = Arc::new(AtomicUsize::new(0));
        let client = MockClient {
            closes: closes.clone(),
            notifier: self.notifier.clone(),
        };
        self.notifier.connected();
        let _ = self.resolve.send(Ok(client));
        MockClientProbe {
            closes,
            notifier: self.notifier,
        }
    }

    /// Fails the connect with a refused-style error.
    pub fn reject(self, reason: &str) {
        let error = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, reason.to_string());
        let _ = self.resolve.send(Err(Error::Io(error)));
    }
}

/// A transport whose connect attempts are resolved by the test.
pub struct MockTransport {
    attempts_tx: mpsc::UnboundedSender<ConnectAttempt>,
    pub connects: Arc<AtomicUsize>,
}

impl MockTransport {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ConnectAttempt>) {
        let (attempts_tx, attempts_rx) = mpsc::unbounded_channel();
        let transport = Self {
            attempts_tx,
            connects: Arc::new(AtomicUsize::new(0)),
        };
        (transport, attempts_rx)
    }
}

#[async_trait]
impl Transport for MockTransport {
    type Client = MockClient;

    async fn connect(
        &self,
        address: &str,
        port: u16,
        notifier: TransportNotifier,
    ) -> Result<MockClient> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        let (resolve, outcome) = oneshot::channel();
        let attempt = ConnectAttempt {
            address: address.to_string(),
            port,
            notifier,
            resolve,
        };
        self.attempts_tx
            .send(attempt)
            .map_err(|_| Error::ChannelClosed)?;
        outcome.await.map_err(|_| Error::ChannelClosed)?
    }
}

/// A live mock session. Closing it confirms from a separate OS thread, the
/// way a real network stack would.
pub struct MockClient {
    closes: Arc<AtomicUsize>,
    notifier: TransportNotifier,
}

impl TransportClient for MockClient {
    fn close(&self) {
        self.closes.fetch_add(1, Ordering::SeqCst);
        let notifier = self.notifier.clone();
        std::thread::spawn(move || notifier.disconnected(None));
    }
}

/// The test's view of an accepted `MockClient`.
pub struct MockClientProbe {
    closes: Arc<AtomicUsize>,
    notifier: TransportNotifier,
}

impl MockClientProbe {
    pub fn close_count(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    /// Simulates the peer dropping the session, raised from a foreign thread.
    pub fn peer_abort(&self, reason: &str) {
        let notifier = self.notifier.clone();
        let reason = reason.to_string();
        let raised = std::thread::spawn(move || notifier.disconnected(Some(reason)));
        assert!(raised.join().is_ok());
    }

    pub fn notifier(&self) -> TransportNotifier {
        self.notifier.clone()
    }
}

/// A minimal façade bound to a `MockClient`.
pub struct EchoService {
    _client: Arc<MockClient>,
}

impl EchoService {
    pub fn echo(&self, message: &str) -> String {
        message.to_string()
    }
}

impl Service<MockClient> for EchoService {
    fn bind(client: Arc<MockClient>) -> Self {
        Self { _client: client }
    }
}

/// An owned copy of a `LifecycleEvent`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recorded {
    State(ConnectionState),
    Connected,
    ConnectFailed,
}

impl Recorded {
    pub fn from_event<S>(event: &LifecycleEvent<'_, S>) -> Self {
        match event {
            LifecycleEvent::StateChanged(state) => Recorded::State(*state),
            LifecycleEvent::Connected(_) => Recorded::Connected,
            LifecycleEvent::ConnectFailed(_) => Recorded::ConnectFailed,
        }
    }
}

pub type TestManager = ConnectionManager<MockTransport, EchoService>;

/// Drives a `ConnectionManager` by hand: the test body plays the owning loop.
pub struct ManagerHarness {
    pub manager: TestManager,
    pub executor: DeferredExecutor<TestManager>,
    pub attempts: mpsc::UnboundedReceiver<ConnectAttempt>,
    pub connects: Arc<AtomicUsize>,
    pub events: Arc<Mutex<Vec<Recorded>>>,
}

impl ManagerHarness {
    pub fn new() -> Self {
        init_tracing();
        let (transport, attempts) = MockTransport::new();
        let connects = transport.connects.clone();
        let executor = DeferredExecutor::new();
        let mut manager = ConnectionManager::new(Arc::new(transport), executor.deferrer());

        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        manager.subscribe(move |event| sink.lock().unwrap().push(Recorded::from_event(event)));

        Self {
            manager,
            executor,
            attempts,
            connects,
            events,
        }
    }

    /// Waits for the transport to receive the next connect call.
    pub async fn next_attempt(&mut self) -> ConnectAttempt {
        timeout(STEP_TIMEOUT, self.attempts.recv())
            .await
            .expect("timed out waiting for a connect attempt")
            .expect("transport dropped")
    }

    /// Waits for one deferred task and runs it on the manager.
    pub async fn step(&mut self) {
        let ran = timeout(STEP_TIMEOUT, self.executor.run_next(&mut self.manager))
            .await
            .expect("timed out waiting for a deferred task");
        assert!(ran);
    }

    /// Runs whatever is already queued.
    pub fn drain(&mut self) -> usize {
        self.executor.run_pending(&mut self.manager)
    }

    pub fn events(&self) -> Vec<Recorded> {
        self.events.lock().unwrap().clone()
    }

    /// Connects and accepts, leaving the manager `Open`.
    pub async fn open(&mut self) -> MockClientProbe {
        let _pending = self.manager.connect("127.0.0.1", 8080).unwrap();
        let probe = self.next_attempt().await.accept();
        // Transport Connected notification, then the connect completion.
        self.step().await;
        self.step().await;
        assert_eq!(self.manager.state(), ConnectionState::Open);
        probe
    }
}
