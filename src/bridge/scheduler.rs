//! 尾沿防抖调度器
//!
//! 每次 `kick` 都会重新开始计时；窗口内没有新的 kick 时才触发一次回调。
//! 请求持续快于窗口到达时，发送会被一直推迟，没有最大延迟上限。

use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// 防抖调度器
///
/// 后台任务在所有 `DebounceScheduler` 被丢弃，或回调返回 `false` 时退出。
#[derive(Debug)]
pub struct DebounceScheduler {
    kick_tx: mpsc::UnboundedSender<()>,
    task: JoinHandle<()>,
    window: Duration,
}

impl DebounceScheduler {
    /// 在指定运行时上启动调度任务
    pub fn spawn<F>(runtime: &Handle, window: Duration, mut on_fire: F) -> Self
    where
        F: FnMut() -> bool + Send + 'static,
    {
        let (kick_tx, mut kick_rx) = mpsc::unbounded_channel::<()>();

        let task = runtime.spawn(async move {
            // 等待第一次 kick
            while kick_rx.recv().await.is_some() {
                let mut closed = false;
                loop {
                    tokio::select! {
                        kick = kick_rx.recv() => {
                            if kick.is_none() {
                                closed = true;
                                break;
                            }
                        }
                        _ = tokio::time::sleep(window) => break,
                    }
                }

                tracing::trace!(target: "bridge.scheduler", "Debounce window elapsed");
                if !on_fire() || closed {
                    break;
                }
            }
            tracing::debug!(target: "bridge.scheduler", "Debounce task stopped");
        });

        Self {
            kick_tx,
            task,
            window,
        }
    }

    /// 重新开始计时
    pub fn kick(&self) {
        if self.kick_tx.send(()).is_err() {
            tracing::warn!(target: "bridge.scheduler", "Debounce task is no longer running");
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }
}

impl Drop for DebounceScheduler {
    fn drop(&mut self) {
        self.task.abort();
    }
}
