//! 定义了库中所有可能的错误类型。
//! Defines all possible error types in the library.

use crate::connection::state::ConnectionState;
use std::fmt;
use thiserror::Error;

/// An operation guarded by the connection state machine.
///
/// 受连接状态机保护的操作。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// `connect`, requires `Closed`.
    Connect,
    /// `disconnect`, requires `Open`.
    Disconnect,
    /// Access to the bound service façade, requires `Open`.
    Service,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Operation::Connect => "connect",
            Operation::Disconnect => "disconnect",
            Operation::Service => "service access",
        };
        f.write_str(name)
    }
}

/// The primary error type for the RPC client library.
/// RPC客户端库的主要错误类型。
#[derive(Debug, Error)]
pub enum Error {
    /// The operation is not permitted in the current connection state.
    /// This is a caller logic error and is never retried.
    ///
    /// 当前连接状态下不允许该操作。这是调用方的逻辑错误，不会自动重试。
    #[error("cannot {operation} while the connection is {state}")]
    InvalidState {
        operation: Operation,
        state: ConnectionState,
    },

    /// The transport failed to establish a session.
    /// 传输层未能建立会话。
    #[error("failed to connect to {endpoint}: {reason}")]
    ConnectFailed { endpoint: String, reason: String },

    /// An underlying I/O error occurred.
    /// 发生了底层的I/O错误。
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The owning event loop has stopped and can no longer accept commands.
    /// 所属事件循环已停止，无法再接收命令。
    #[error("Internal channel is broken")]
    ChannelClosed,
}

/// A specialized `Result` type for this library.
/// 本库专用的 `Result` 类型。
pub type Result<T> = std::result::Result<T, Error>;

impl From<Error> for std::io::Error {
    fn from(err: Error) -> Self {
        use std::io::ErrorKind;
        match err {
            Error::Io(e) => e,
            Error::InvalidState { .. } => std::io::Error::other(err.to_string()),
            Error::ConnectFailed { .. } => {
                std::io::Error::new(ErrorKind::ConnectionRefused, err.to_string())
            }
            Error::ChannelClosed => ErrorKind::BrokenPipe.into(),
        }
    }
}
