//! The owning event loop of a connection.
//!
//! 连接的所属事件循环。

use super::{command::ManagerCommand, manager::ConnectionManager};
use crate::{config::Config, executor::DeferredExecutor, service::Service, transport::Transport};
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// The single logical thread that owns a `ConnectionManager`.
///
/// It serially applies handle commands and deferred transport notifications
/// to the manager, so observers always run here and state is never touched
/// concurrently. Returned by `ConnectionHandle::new`; run it with
/// `tokio::spawn`, a `LocalSet`, or `block_on` on a dedicated thread.
///
/// 拥有 `ConnectionManager` 的唯一逻辑线程。
///
/// 它串行地把句柄命令和延迟的传输通知应用到管理器上，因此观察者总在这里运行，状态也
/// 从不被并发访问。由 `ConnectionHandle::new` 返回；可用 `tokio::spawn`、`LocalSet`
/// 或在专用线程上 `block_on` 来运行。
pub struct ConnectionEventLoop<T: Transport, S> {
    pub(crate) manager: ConnectionManager<T, S>,
    pub(crate) executor: DeferredExecutor<ConnectionManager<T, S>>,
    pub(crate) command_rx: mpsc::Receiver<ManagerCommand<S>>,
    pub(crate) config: Config,
}

impl<T, S> ConnectionEventLoop<T, S>
where
    T: Transport,
    S: Service<T::Client>,
{
    /// Runs the loop until every `ConnectionHandle` has been dropped.
    ///
    /// On exit any live session is closed and tasks deferred afterwards are dropped.
    ///
    /// 运行循环，直到所有 `ConnectionHandle` 都被丢弃。退出时关闭任何存活会话，此后延迟的任务被丢弃。
    pub async fn run(mut self) {
        if self.config.auto_connect {
            let endpoint = &self.config.endpoint;
            match self.manager.connect(&endpoint.address, endpoint.port) {
                // The outcome is reported through the lifecycle events.
                Ok(pending) => drop(pending),
                Err(e) => warn!(error = %e, "Auto-connect rejected"),
            }
        }

        loop {
            tokio::select! {
                command = self.command_rx.recv() => match command {
                    Some(command) => self.handle_command(command),
                    None => break,
                },
                Some(task) = self.executor.next_task() => {
                    task(&mut self.manager);
                }
            }
        }

        debug!("All connection handles dropped, stopping event loop");
        self.executor.close();
        self.manager.shutdown();
    }

    fn handle_command(&mut self, command: ManagerCommand<S>) {
        match command {
            ManagerCommand::Connect {
                address,
                port,
                response_tx,
            } => {
                let _ = response_tx.send(self.manager.connect(&address, port));
            }
            ManagerCommand::Disconnect { response_tx } => {
                let _ = response_tx.send(self.manager.disconnect());
            }
            ManagerCommand::GetState { response_tx } => {
                let _ = response_tx.send(self.manager.state());
            }
            ManagerCommand::Subscribe {
                listener,
                response_tx,
            } => {
                let _ = response_tx.send(self.manager.subscribe_boxed(listener));
            }
            ManagerCommand::Unsubscribe { id, response_tx } => {
                let _ = response_tx.send(self.manager.unsubscribe(id));
            }
            ManagerCommand::WithService { task } => {
                self.manager.run_service_task(task);
            }
        }
    }
}
