//! Transport layer abstraction for the RPC session.
//!
//! The connection manager only needs three things from a transport: an
//! asynchronous connect, a close trigger, and raw connected/disconnected
//! notifications. Notifications may be raised from any task or thread.
//!
//! RPC会话的传输层抽象。
//!
//! 连接管理器只需要传输层提供三样东西：异步连接、关闭触发，以及原始的已连接/已断开通知。
//! 通知可能在任意任务或线程上产生。

pub mod tcp;

use crate::error::Result;
use async_trait::async_trait;
use std::{fmt, sync::Arc};

pub use tcp::{TcpClient, TcpTransport};

/// A raw notification raised by a transport client.
///
/// 传输客户端产生的原始通知。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// The session is established.
    /// 会话已建立。
    Connected,
    /// The session has ended, locally or by the peer.
    /// 会话已结束（本地或对端关闭）。
    Disconnected { reason: Option<String> },
}

/// A cloneable sink for raw transport notifications.
///
/// Calling `notify` never blocks and never runs manager code on the calling
/// thread; the manager installs a deferred handler behind it.
///
/// 原始传输通知的可克隆接收端。调用 `notify` 从不阻塞，也不会在调用线程上运行管理器代码。
#[derive(Clone)]
pub struct TransportNotifier {
    inner: Arc<dyn Fn(TransportEvent) + Send + Sync>,
}

impl fmt::Debug for TransportNotifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransportNotifier").finish_non_exhaustive()
    }
}

impl TransportNotifier {
    /// Creates a notifier from a handler.
    pub fn new<F>(handler: F) -> Self
    where
        F: Fn(TransportEvent) + Send + Sync + 'static,
    {
        Self {
            inner: Arc::new(handler),
        }
    }

    /// A notifier that discards everything.
    pub fn noop() -> Self {
        Self::new(|_| {})
    }

    pub fn notify(&self, event: TransportEvent) {
        (self.inner)(event);
    }

    pub fn connected(&self) {
        self.notify(TransportEvent::Connected);
    }

    pub fn disconnected(&self, reason: Option<String>) {
        self.notify(TransportEvent::Disconnected { reason });
    }
}

/// A live transport session.
///
/// 一个存活的传输会话。
pub trait TransportClient: Send + Sync + 'static {
    /// Requests that the session be closed.
    ///
    /// This only triggers the close. Completion is reported later through
    /// `TransportEvent::Disconnected` on the notifier given to `connect`.
    ///
    /// 请求关闭会话。这里只是触发关闭，完成情况稍后通过 `connect` 时传入的通知器以
    /// `TransportEvent::Disconnected` 报告。
    fn close(&self);
}

/// A factory for transport sessions.
///
/// 传输会话的工厂。
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// The session type produced by a successful connect.
    type Client: TransportClient;

    /// Establishes a new session to `address:port`.
    ///
    /// Every notification for the returned session must go through `notifier`.
    ///
    /// 建立到 `address:port` 的新会话。返回会话的所有通知都必须经过 `notifier`。
    async fn connect(
        &self,
        address: &str,
        port: u16,
        notifier: TransportNotifier,
    ) -> Result<Self::Client>;
}
