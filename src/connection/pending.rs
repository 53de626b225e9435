//! The completion of an accepted connect attempt.
//!
//! 已被接受的连接尝试的完成结果。

use crate::error::{Error, Result};
use std::{
    future::Future,
    pin::Pin,
    task::{Context, Poll},
};
use tokio::sync::oneshot;

/// Resolves once the transport has either established the session (`Ok`) or
/// failed (`Error::ConnectFailed`).
///
/// Dropping it does not cancel the attempt. It resolves to
/// `Error::ChannelClosed` if the owning event loop stops first.
///
/// 在传输层建立会话（`Ok`）或失败（`Error::ConnectFailed`）后完成。
/// 丢弃它不会取消连接尝试；如果所属事件循环先停止，则返回 `Error::ChannelClosed`。
#[derive(Debug)]
#[must_use = "a PendingConnect does nothing unless awaited"]
pub struct PendingConnect {
    rx: oneshot::Receiver<Result<()>>,
}

impl PendingConnect {
    pub(crate) fn new(rx: oneshot::Receiver<Result<()>>) -> Self {
        Self { rx }
    }
}

impl Future for PendingConnect {
    type Output = Result<()>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|received| received.unwrap_or_else(|_| Err(Error::ChannelClosed)))
    }
}
