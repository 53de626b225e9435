//! tests/common/harness.rs
use bytes::Bytes;
use kestrel_rpc_client::{
    Config, ConnectionHandle, ConnectionState, Error, LifecycleEvent, Result, Service,
    transport::{TcpClient, TcpTransport},
};
use std::future::Future;
use std::sync::{Arc, Mutex, Once};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};

/// Initializes tracing for tests, ensuring it's only done once.
pub fn init_tracing() {
    static TRACING_INIT: Once = Once::new();
    TRACING_INIT.call_once(|| {
        let filter = std::env::var("RUST_LOG")
            .unwrap_or_else(|_| "kestrel_rpc_client=debug,lifecycle=info".to_string());
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .init();
    });
}

/// A line-based test server: `ping` is answered with a `pong` push, anything
/// else is echoed back. Returns the port it listens on.
pub async fn spawn_echo_server() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        while let Ok((socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                let (reader, mut writer) = socket.into_split();
                let mut lines = BufReader::new(reader).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    let reply = if line == "ping" { "pong".to_string() } else { line };
                    if writer.write_all(format!("{reply}\n").as_bytes()).await.is_err() {
                        break;
                    }
                }
            });
        }
    });
    port
}

/// A server that accepts one connection and drops it after `delay`.
pub async fn spawn_dropping_server(delay: Duration) -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        let (socket, _) = listener.accept().await.unwrap();
        tokio::time::sleep(delay).await;
        drop(socket);
    });
    port
}

/// A port with nothing listening on it.
pub async fn closed_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    port
}

/// A tiny line-protocol façade over `TcpClient`.
pub struct TestService {
    client: Arc<TcpClient>,
}

impl Service<TcpClient> for TestService {
    fn bind(client: Arc<TcpClient>) -> Self {
        Self { client }
    }
}

impl TestService {
    /// Sends `text` and resolves with the next line received.
    pub fn echo(&self, text: &str) -> impl Future<Output = Result<String>> + Send + use<> {
        let client = self.client.clone();
        let mut inbound = client.subscribe();
        let request = Bytes::from(format!("{text}\n"));
        async move {
            client.send(request).await?;
            read_line(&mut inbound).await
        }
    }

    /// Fire-and-forget; the reply arrives as a push.
    pub fn ping(&self) -> impl Future<Output = Result<()>> + Send + use<> {
        let client = self.client.clone();
        async move { client.send(Bytes::from_static(b"ping\n")).await }
    }

    /// Push notifications from the server.
    pub fn pushes(&self) -> broadcast::Receiver<Bytes> {
        self.client.subscribe()
    }
}

pub async fn read_line(inbound: &mut broadcast::Receiver<Bytes>) -> Result<String> {
    let mut line = Vec::new();
    loop {
        let chunk = inbound.recv().await.map_err(|_| Error::ChannelClosed)?;
        line.extend_from_slice(&chunk);
        if let Some(end) = line.iter().position(|b| *b == b'\n') {
            line.truncate(end);
            return Ok(String::from_utf8_lossy(&line).into_owned());
        }
    }
}

/// An owned copy of a lifecycle event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Seen {
    State(ConnectionState),
    Connected,
    ConnectFailed,
}

/// A client connection with every lifecycle event recorded.
pub struct ClientHarness {
    pub handle: ConnectionHandle<TestService>,
    pub events: Arc<Mutex<Vec<Seen>>>,
    /// Receives a push subscription each time the connection opens.
    pub push_rx: mpsc::UnboundedReceiver<broadcast::Receiver<Bytes>>,
}

impl ClientHarness {
    pub async fn new() -> Self {
        init_tracing();
        let config = Config {
            auto_connect: false,
            ..Config::default()
        };
        let handle = ConnectionHandle::<TestService>::spawn(TcpTransport::default(), config);

        let events = Arc::new(Mutex::new(Vec::new()));
        let (push_tx, push_rx) = mpsc::unbounded_channel();
        let sink = events.clone();
        handle
            .subscribe(move |event: &LifecycleEvent<'_, TestService>| {
                let seen = match event {
                    LifecycleEvent::StateChanged(state) => Seen::State(*state),
                    LifecycleEvent::Connected(service) => {
                        let _ = push_tx.send(service.pushes());
                        Seen::Connected
                    }
                    LifecycleEvent::ConnectFailed(_) => Seen::ConnectFailed,
                };
                sink.lock().unwrap().push(seen);
            })
            .await
            .unwrap();

        Self {
            handle,
            events,
            push_rx,
        }
    }

    pub fn events(&self) -> Vec<Seen> {
        self.events.lock().unwrap().clone()
    }

    pub async fn wait_for_state(&self, expected: ConnectionState) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while self.handle.state().await.unwrap() != expected {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap_or_else(|_| panic!("timed out waiting for {expected}"));
    }
}
