use std::collections::HashMap;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration};
use tracing::info;

/// 周期任务调度器
///
/// 每个任务在独立的 tokio 任务里按固定间隔执行,
/// shutdown 通过广播通知所有任务退出并等待收尾
pub struct TaskScheduler {
    periodic_tasks: HashMap<String, JoinHandle<()>>,
    shutdown_sender: broadcast::Sender<()>,
}

impl TaskScheduler {
    pub fn new() -> Self {
        let (shutdown_sender, _) = broadcast::channel(16);
        Self {
            periodic_tasks: HashMap::new(),
            shutdown_sender,
        }
    }

    pub fn add_periodic_task<F, Fut>(&mut self, name: String, every_n_millis: u64, task_fn: F)
    where
        F: Fn() -> Fut + Send + 'static,
        Fut: std::future::Future<Output = ()> + Send + 'static,
    {
        if every_n_millis < 100 {
            panic!("Minimum interval is 100 milliseconds");
        }

        let mut interval_timer = interval(Duration::from_millis(every_n_millis));
        let mut shutdown_receiver = self.shutdown_sender.subscribe();
        let task_name = name.clone();
        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = interval_timer.tick() => {
                        task_fn().await;
                    }
                    _ = shutdown_receiver.recv() => {
                        info!("周期任务 {} 退出", task_name);
                        break;
                    }
                }
            }
        });
        self.periodic_tasks.insert(name, handle);
    }

    pub async fn shutdown(self) {
        // 发送关闭信号
        let _ = self.shutdown_sender.send(());

        // 等待所有任务完成
        for handle in self.periodic_tasks.into_values() {
            let _ = handle.await;
        }
    }
}

impl Default for TaskScheduler {
    fn default() -> Self {
        Self::new()
    }
}
