//! 定义了客户端连接的可配置参数。
//! Defines configurable parameters for the client connection.

/// A structure containing all configurable parameters for a client connection.
///
/// 包含客户端连接所有可配置参数的结构体。
#[derive(Debug, Clone)]
pub struct Config {
    /// The remote endpoint used by `connect_configured` and auto-connect.
    /// `connect_configured` 和自动连接所使用的远端端点。
    pub endpoint: EndpointConfig,

    /// Whether the event loop issues a connect to `endpoint` as soon as it starts.
    /// 事件循环启动时是否立即连接 `endpoint`。
    pub auto_connect: bool,

    /// Channel sizing for the owning event loop.
    /// 所属事件循环的通道容量。
    pub channels: ChannelConfig,
}

/// The remote address of the RPC server.
///
/// RPC服务器的远端地址。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointConfig {
    /// Host name or IP literal.
    /// 主机名或IP字面量。
    pub address: String,
    /// TCP port.
    /// TCP端口。
    pub port: u16,
}

/// Channel-related parameters.
///
/// 通道相关参数。
#[derive(Debug, Clone)]
pub struct ChannelConfig {
    /// Capacity of the command channel between handles and the event loop.
    /// Callers wait when it is full; transport notifications are never bounded.
    ///
    /// 句柄与事件循环之间命令通道的容量。通道满时调用方等待；传输通知不受此限制。
    pub command_capacity: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            endpoint: EndpointConfig::default(),
            auto_connect: true,
            channels: ChannelConfig::default(),
        }
    }
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            address: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            command_capacity: 128,
        }
    }
}

impl std::fmt::Display for EndpointConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.address, self.port)
    }
}
