#![deny(clippy::expect_used, clippy::unwrap_used)]

//! The root of the RPC client connection library.
//! RPC客户端连接库的根。

pub mod config;
pub mod connection;
pub mod error;
pub mod executor;
pub mod service;
pub mod transport;

#[cfg(test)]
mod testing;

pub use config::Config;
pub use connection::{ConnectionHandle, ConnectionState, LifecycleEvent};
pub use error::{Error, Result};
pub use service::Service;
