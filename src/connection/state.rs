//! 连接状态与状态验证
//! Connection state and state validation

use std::fmt;

/// The lifecycle state of the client connection.
///
/// 客户端连接的生命周期状态。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ConnectionState {
    /// No transport session exists.
    /// 不存在传输会话。
    #[default]
    Closed,
    /// A connect attempt is in flight.
    /// 连接尝试进行中。
    Connecting,
    /// The session is established and the service façade is bound.
    /// 会话已建立，服务门面已绑定。
    Open,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionState::Closed => "Closed",
            ConnectionState::Connecting => "Connecting",
            ConnectionState::Open => "Open",
        };
        f.write_str(name)
    }
}

/// 状态验证器，负责所有状态相关的验证和检查逻辑
/// State validator responsible for all state-related validation and check logic
pub struct StateValidator;

impl StateValidator {
    /// 验证状态转换是否合法
    /// Validate if state transition is legal
    pub fn is_valid_transition(current: ConnectionState, next: ConnectionState) -> bool {
        use ConnectionState::*;

        matches!(
            (current, next),
            (Closed, Connecting) | (Connecting, Open) | (Connecting, Closed) | (Open, Closed)
        )
    }

    /// 检查是否可以发起连接
    /// Check if a connect may be issued
    pub fn can_connect(state: ConnectionState) -> bool {
        state == ConnectionState::Closed
    }

    /// 检查是否可以请求断开
    /// Check if a disconnect may be requested
    pub fn can_disconnect(state: ConnectionState) -> bool {
        state == ConnectionState::Open
    }

    /// 检查服务门面是否可用
    /// Check if the service façade is available
    pub fn has_service(state: ConnectionState) -> bool {
        state == ConnectionState::Open
    }
}
