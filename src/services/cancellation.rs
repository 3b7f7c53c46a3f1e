//! 协作式取消
//!
//! 每种运行（评审 / 生成）各持有一个独立的取消信号。
//! 取消只在循环边界被观察，不会中断已经发出的调用。

use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::watch;
use tracing::{info, warn};

/// 取消命名空间
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RunKind {
    /// 最佳实践评审
    Review,
    /// 多轮文档生成（IaC 模板、详细建议）
    Generation,
}

impl std::fmt::Display for RunKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunKind::Review => write!(f, "评审"),
            RunKind::Generation => write!(f, "生成"),
        }
    }
}

/// 进程级取消控制器
///
/// 构造一次后通过引用或 `Arc` 注入，不作为全局变量存在。
///
/// `signal_cancel` 只作用于当前这一次运行，下一次 `begin_run` 会清除它；
/// `interrupt`（用户中断整个进程）是粘性的，之后开始的运行一律已取消。
#[derive(Debug)]
pub struct CancellationController {
    review: watch::Sender<bool>,
    generation: watch::Sender<bool>,
    interrupted: AtomicBool,
}

impl CancellationController {
    pub fn new() -> Self {
        let (review, _) = watch::channel(false);
        let (generation, _) = watch::channel(false);
        Self {
            review,
            generation,
            interrupted: AtomicBool::new(false),
        }
    }

    fn sender(&self, kind: RunKind) -> &watch::Sender<bool> {
        match kind {
            RunKind::Review => &self.review,
            RunKind::Generation => &self.generation,
        }
    }

    /// 开始一次新运行：清除上一次遗留的取消请求（进程已被中断时除外）
    pub fn begin_run(&self, kind: RunKind) -> CancelToken {
        let sender = self.sender(kind);
        sender.send_replace(self.is_interrupted());
        CancelToken {
            kind,
            receiver: sender.subscribe(),
        }
    }

    /// 请求取消当前运行，并唤醒所有正在等待的一方
    pub fn signal_cancel(&self, kind: RunKind) {
        info!("🛑 收到{}取消请求", kind);
        self.sender(kind).send_replace(true);
    }

    pub fn is_cancelled(&self, kind: RunKind) -> bool {
        *self.sender(kind).borrow()
    }

    /// 用户中断：取消所有命名空间，并让之后的运行都以已取消状态开始
    pub fn interrupt(&self) {
        if !self.interrupted.swap(true, Ordering::SeqCst) {
            warn!("🛑 进程被中断，取消所有运行");
        }
        self.signal_cancel(RunKind::Review);
        self.signal_cancel(RunKind::Generation);
    }

    pub fn is_interrupted(&self) -> bool {
        self.interrupted.load(Ordering::SeqCst)
    }

    /// 阻塞等待该命名空间的取消信号
    pub async fn await_cancel(&self, kind: RunKind) {
        let mut receiver = self.sender(kind).subscribe();
        // 发送端与 self 同生命周期，wait_for 只会因取消而返回
        let _ = receiver.wait_for(|cancelled| *cancelled).await;
    }
}

impl Default for CancellationController {
    fn default() -> Self {
        Self::new()
    }
}

/// 单次运行持有的取消句柄
#[derive(Debug, Clone)]
pub struct CancelToken {
    kind: RunKind,
    receiver: watch::Receiver<bool>,
}

impl CancelToken {
    /// 不会被取消的句柄，供独立调用和测试使用
    pub fn never() -> Self {
        let (sender, receiver) = watch::channel(false);
        // 发送端被丢弃后 wait_for 返回错误，cancelled() 会一直挂起
        drop(sender);
        Self {
            kind: RunKind::Generation,
            receiver,
        }
    }

    pub fn kind(&self) -> RunKind {
        self.kind
    }

    /// 轮询：是否已请求取消
    pub fn is_cancelled(&self) -> bool {
        *self.receiver.borrow()
    }

    /// 等待取消信号；控制器被丢弃时永远不会完成
    pub async fn cancelled(&self) {
        let mut receiver = self.receiver.clone();
        if receiver.wait_for(|cancelled| *cancelled).await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_begin_run_clears_previous_cancel() {
        let controller = CancellationController::new();
        controller.signal_cancel(RunKind::Review);
        assert!(controller.is_cancelled(RunKind::Review));

        let token = controller.begin_run(RunKind::Review);
        assert!(!token.is_cancelled());
        assert!(!controller.is_cancelled(RunKind::Review));
    }

    #[test]
    fn test_namespaces_are_independent() {
        let controller = CancellationController::new();
        let review = controller.begin_run(RunKind::Review);
        let generation = controller.begin_run(RunKind::Generation);

        controller.signal_cancel(RunKind::Generation);
        assert!(generation.is_cancelled());
        assert!(!review.is_cancelled());
    }

    #[test]
    fn test_interrupt_survives_begin_run() {
        let controller = CancellationController::new();
        let review = controller.begin_run(RunKind::Review);

        controller.interrupt();
        assert!(review.is_cancelled());
        assert!(controller.is_interrupted());

        // 中断之后开始的运行不会清除取消状态
        let generation = controller.begin_run(RunKind::Generation);
        assert!(generation.is_cancelled());
        assert!(controller.begin_run(RunKind::Review).is_cancelled());
    }

    #[tokio::test]
    async fn test_cancelled_wakes_waiter() {
        let controller = std::sync::Arc::new(CancellationController::new());
        let token = controller.begin_run(RunKind::Generation);

        let signaller = controller.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            signaller.signal_cancel(RunKind::Generation);
        });

        tokio::time::timeout(Duration::from_secs(1), token.cancelled())
            .await
            .expect("token should observe cancel");
        assert!(token.is_cancelled());
    }

    #[tokio::test]
    async fn test_await_cancel_returns_after_signal() {
        let controller = std::sync::Arc::new(CancellationController::new());
        let _token = controller.begin_run(RunKind::Review);

        let waiter = {
            let controller = controller.clone();
            tokio::spawn(async move { controller.await_cancel(RunKind::Review).await })
        };
        tokio::task::yield_now().await;
        controller.signal_cancel(RunKind::Review);

        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("await_cancel should return")
            .unwrap();
    }

    #[tokio::test]
    async fn test_never_token_stays_pending() {
        let token = CancelToken::never();
        assert!(!token.is_cancelled());
        let result = tokio::time::timeout(Duration::from_millis(20), token.cancelled()).await;
        assert!(result.is_err());
    }
}
