//! 周期级取消信号
//!
//! 进程级构造一个 ShutdownSignal, 每个在途周期持有一个 CancelToken;
//! 信号在每个挂起点被检查, Apply 本身是原子的, 取消永远观察不到部分状态

use tokio::sync::watch;

pub struct ShutdownSignal {
    tx: watch::Sender<bool>,
}

impl ShutdownSignal {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx }
    }

    pub fn token(&self) -> CancelToken {
        CancelToken {
            rx: self.tx.subscribe(),
        }
    }

    /// 广播取消; 已经在途的周期会在下一个挂起点停下
    pub fn cancel(&self) {
        let _ = self.tx.send(true);
    }
}

impl Default for ShutdownSignal {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Clone)]
pub struct CancelToken {
    rx: watch::Receiver<bool>,
}

impl CancelToken {
    /// 永不取消的令牌 (测试/一次性调用)
    pub fn none() -> Self {
        let (tx, rx) = watch::channel(false);
        // sender 泄漏使通道保持打开
        std::mem::forget(tx);
        Self { rx }
    }

    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// 等待直到被取消; 信号源被丢弃时永远挂起
    pub async fn cancelled(&mut self) {
        loop {
            if *self.rx.borrow() {
                return;
            }
            if self.rx.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_cancel_wakes_waiters() {
        let signal = ShutdownSignal::new();
        let mut token = signal.token();
        assert!(!token.is_cancelled());

        signal.cancel();
        tokio::time::timeout(Duration::from_secs(1), token.cancelled())
            .await
            .expect("cancelled() should resolve");
        assert!(token.is_cancelled());
    }

    #[tokio::test]
    async fn test_none_token_never_cancels() {
        let mut token = CancelToken::none();
        let waited =
            tokio::time::timeout(Duration::from_millis(50), token.cancelled()).await;
        assert!(waited.is_err());
    }
}
