//! The boundary to the typed RPC service façade.
//!
//! 与类型化RPC服务门面的边界。

use std::sync::Arc;

/// A typed RPC façade bound to a live transport client.
///
/// The connection manager builds exactly one instance per successful
/// connection and drops it the moment the connection leaves `Open`.
/// Implementations expose request/response calls and push-event
/// subscriptions over the client; the wire codec lives in the implementation.
///
/// 绑定到存活传输客户端的类型化RPC门面。
///
/// 连接管理器在每次成功连接时恰好构建一个实例，并在连接离开 `Open` 的瞬间将其丢弃。
/// 实现在客户端之上提供请求/响应调用和推送事件订阅；线路编解码位于实现之中。
pub trait Service<C>: Send + 'static {
    fn bind(client: Arc<C>) -> Self;
}
