//! TCP-based transport implementation.
//!
//! Each session runs a reader task and a writer task. The reader publishes
//! inbound bytes to subscribers and raises `Disconnected` when the stream ends
//! for any reason; both tasks stop when the client is closed or dropped.
//!
//! 基于TCP的传输实现。
//!
//! 每个会话运行一个读任务和一个写任务。读任务把收到的字节发布给订阅者，并在流因任何原因
//! 结束时发出 `Disconnected`；客户端被关闭或丢弃时两个任务都会停止。

use super::{Transport, TransportClient, TransportNotifier};
use crate::error::{Error, Result};
use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use std::net::SocketAddr;
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{
        TcpStream,
        tcp::{OwnedReadHalf, OwnedWriteHalf},
    },
    sync::{broadcast, mpsc, watch},
};
use tracing::{debug, warn};

/// A transport that opens one TCP stream per session.
///
/// 每个会话打开一条TCP流的传输。
#[derive(Debug, Clone)]
pub struct TcpTransport {
    /// Initial capacity of the read buffer.
    /// 读缓冲区的初始容量。
    pub read_buffer_size: usize,
    /// Capacity of the outbound payload queue.
    /// 出站载荷队列的容量。
    pub outbound_capacity: usize,
    /// Capacity of the inbound broadcast channel. Lagging subscribers lose
    /// the oldest chunks.
    /// 入站广播通道的容量。落后的订阅者会丢失最旧的数据块。
    pub inbound_capacity: usize,
}

impl Default for TcpTransport {
    fn default() -> Self {
        Self {
            read_buffer_size: 8 * 1024,
            outbound_capacity: 256,
            inbound_capacity: 256,
        }
    }
}

/// A live TCP session.
///
/// Bytes are opaque here; the RPC codec sits on top of `send` and `subscribe`.
///
/// 一个存活的TCP会话。这里的字节是不透明的，RPC编解码位于 `send` 和 `subscribe` 之上。
#[derive(Debug)]
pub struct TcpClient {
    peer_addr: SocketAddr,
    outbound_tx: mpsc::Sender<Bytes>,
    inbound_tx: broadcast::Sender<Bytes>,
    shutdown_tx: watch::Sender<bool>,
}

impl TcpClient {
    /// The address of the remote peer.
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    /// Queues `payload` for writing.
    ///
    /// 将 `payload` 排入写队列。
    pub async fn send(&self, payload: Bytes) -> Result<()> {
        self.outbound_tx
            .send(payload)
            .await
            .map_err(|_| Error::ChannelClosed)
    }

    /// Subscribes to inbound bytes received from now on.
    ///
    /// 订阅从现在开始收到的入站字节。
    pub fn subscribe(&self) -> broadcast::Receiver<Bytes> {
        self.inbound_tx.subscribe()
    }
}

impl TransportClient for TcpClient {
    fn close(&self) {
        debug!(peer = %self.peer_addr, "Closing TCP session");
        self.shutdown_tx.send_replace(true);
    }
}

#[async_trait]
impl Transport for TcpTransport {
    type Client = TcpClient;

    async fn connect(
        &self,
        address: &str,
        port: u16,
        notifier: TransportNotifier,
    ) -> Result<TcpClient> {
        let stream = TcpStream::connect((address, port)).await?;
        stream.set_nodelay(true)?;
        let peer_addr = stream.peer_addr()?;
        debug!(peer = %peer_addr, "TCP stream established");

        let (reader, writer) = stream.into_split();
        let (outbound_tx, outbound_rx) = mpsc::channel(self.outbound_capacity);
        let (inbound_tx, _) = broadcast::channel(self.inbound_capacity);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        tokio::spawn(writer_task(writer, outbound_rx, shutdown_rx.clone()));
        notifier.connected();
        tokio::spawn(reader_task(
            reader,
            inbound_tx.clone(),
            shutdown_rx,
            notifier,
            self.read_buffer_size,
        ));

        Ok(TcpClient {
            peer_addr,
            outbound_tx,
            inbound_tx,
            shutdown_tx,
        })
    }
}

async fn reader_task(
    mut reader: OwnedReadHalf,
    inbound_tx: broadcast::Sender<Bytes>,
    mut shutdown_rx: watch::Receiver<bool>,
    notifier: TransportNotifier,
    buffer_size: usize,
) {
    let mut buf = BytesMut::with_capacity(buffer_size);
    let reason = loop {
        tokio::select! {
            biased;
            // Fires on close() and when the client is dropped.
            _ = shutdown_rx.changed() => break None,
            result = reader.read_buf(&mut buf) => match result {
                Ok(0) => break Some("connection closed by peer".to_string()),
                Ok(_) => {
                    // No subscribers is fine, the chunk is simply dropped.
                    let _ = inbound_tx.send(buf.split().freeze());
                    buf.reserve(buffer_size);
                }
                Err(e) => {
                    warn!(error = %e, "TCP read failed");
                    break Some(e.to_string());
                }
            },
        }
    };
    debug!(?reason, "TCP reader stopped");
    notifier.disconnected(reason);
}

async fn writer_task(
    mut writer: OwnedWriteHalf,
    mut outbound_rx: mpsc::Receiver<Bytes>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            Some(payload) = outbound_rx.recv() => {
                if let Err(e) = writer.write_all(&payload).await {
                    warn!(error = %e, "TCP write failed");
                    break;
                }
            }
            _ = shutdown_rx.changed() => break,
        }
    }
    let _ = writer.shutdown().await;
}
