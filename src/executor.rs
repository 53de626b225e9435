//! 单消费者延迟执行器
//! Single-consumer deferred executor
//!
//! 该模块把来自任意线程的回调转交给唯一的所属事件循环执行。
//! 被延迟的任务以提交顺序在所属上下文 `C` 上运行，且只有该循环持有 `&mut C`。
//!
//! This module hands callbacks raised on arbitrary threads over to the single
//! owning event loop. Deferred tasks run against the owned context `C` in
//! submission order, and only that loop ever holds `&mut C`.

use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::trace;

/// A unit of work that runs on the owning event loop.
///
/// 在所属事件循环上运行的工作单元。
pub type DeferredTask<C> = Box<dyn FnOnce(&mut C) + Send>;

/// The consumer side of the deferred queue, owned by the event loop.
///
/// 延迟队列的消费端，由事件循环持有。
pub struct DeferredExecutor<C> {
    tx: mpsc::UnboundedSender<DeferredTask<C>>,
    rx: mpsc::UnboundedReceiver<DeferredTask<C>>,
}

impl<C> std::fmt::Debug for DeferredExecutor<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeferredExecutor")
            .field("pending", &self.rx.len())
            .finish()
    }
}

impl<C: 'static> Default for DeferredExecutor<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: 'static> DeferredExecutor<C> {
    /// Creates an empty executor.
    ///
    /// 创建一个空的执行器。
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self { tx, rx }
    }

    /// Returns a producer handle that may be moved to any thread.
    ///
    /// 返回一个可以移动到任意线程的生产端句柄。
    pub fn deferrer(&self) -> Deferrer<C> {
        Deferrer {
            tx: self.tx.clone(),
        }
    }

    /// Waits for the next deferred task.
    ///
    /// The executor keeps its own producer alive, so this only yields `None`
    /// if the queue is closed explicitly.
    ///
    /// 等待下一个延迟任务。执行器自身保留一个生产端，因此只有在队列被显式关闭时才返回 `None`。
    pub async fn next_task(&mut self) -> Option<DeferredTask<C>> {
        self.rx.recv().await
    }

    /// Runs every task that is already queued, in order, and returns how many ran.
    ///
    /// 按顺序运行所有已排队的任务，并返回运行的数量。
    pub fn run_pending(&mut self, ctx: &mut C) -> usize {
        let mut ran = 0;
        while let Ok(task) = self.rx.try_recv() {
            task(ctx);
            ran += 1;
        }
        ran
    }

    /// Waits for one task and runs it. Returns `false` if the queue is closed.
    ///
    /// 等待并运行一个任务。如果队列已关闭则返回 `false`。
    pub async fn run_next(&mut self, ctx: &mut C) -> bool {
        match self.next_task().await {
            Some(task) => {
                task(ctx);
                true
            }
            None => false,
        }
    }

    /// Number of tasks waiting to run.
    pub fn pending(&self) -> usize {
        self.rx.len()
    }

    /// Stops accepting new tasks. Tasks already queued can still be drained.
    ///
    /// 停止接收新任务。已经排队的任务仍然可以被取出执行。
    pub fn close(&mut self) {
        self.rx.close();
    }
}

/// The producer side of the deferred queue.
///
/// Cloning is cheap. Submitting never blocks and never waits for the task to run.
///
/// 延迟队列的生产端。克隆开销很小；提交从不阻塞，也从不等待任务执行。
pub struct Deferrer<C> {
    tx: mpsc::UnboundedSender<DeferredTask<C>>,
}

impl<C> Clone for Deferrer<C> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

impl<C> std::fmt::Debug for Deferrer<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Deferrer")
            .field("closed", &self.tx.is_closed())
            .finish()
    }
}

impl<C: 'static> Deferrer<C> {
    /// Enqueues `task` to run on the owning loop.
    ///
    /// Returns `false` when the owning loop has stopped; the task is dropped
    /// without running in that case.
    ///
    /// 将 `task` 排入所属循环执行。所属循环已停止时返回 `false`，任务被丢弃且不会执行。
    pub fn defer<F>(&self, task: F) -> bool
    where
        F: FnOnce(&mut C) + Send + 'static,
    {
        if self.tx.send(Box::new(task)).is_err() {
            trace!("Owning loop stopped, dropping deferred task");
            return false;
        }
        true
    }

    /// Wraps `handler` so that calling the result from any thread moves the
    /// argument into a task that invokes `handler` on the owning loop.
    ///
    /// 包装 `handler`：从任意线程调用返回的闭包时，参数被按值捕获并放入一个
    /// 在所属循环上调用 `handler` 的任务中。
    pub fn wrap<A, H>(&self, handler: H) -> impl Fn(A) + Send + Sync + Clone + 'static
    where
        A: Send + 'static,
        H: Fn(&mut C, A) + Send + Sync + 'static,
    {
        let handler = Arc::new(handler);
        let deferrer = self.clone();
        move |arg: A| {
            let handler = handler.clone();
            deferrer.defer(move |ctx: &mut C| handler(ctx, arg));
        }
    }

    /// Whether the owning loop has stopped.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}
