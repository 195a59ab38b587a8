//! 代理周期扇出任务

use std::sync::Arc;

use tracing::{error, info};

use crate::app_config::shutdown::CancelToken;
use crate::error::AppError;
use crate::trading::agent_runner::AgentRunner;

/// 为所有激活代理跑一轮周期并汇总结果
pub async fn run_agent_cycle_job(runner: Arc<AgentRunner>, cancel: CancelToken) {
    if cancel.is_cancelled() {
        return;
    }

    match runner.run_all_active(cancel).await {
        Ok(results) => {
            let succeeded = results.iter().filter(|(_, r)| r.is_ok()).count();
            let cancelled = results
                .iter()
                .filter(|(_, r)| matches!(r, Err(AppError::Cancelled)))
                .count();
            for (agent_id, result) in &results {
                if let Err(e) = result {
                    if !matches!(e, AppError::Cancelled) {
                        error!("周期失败: 代理={} err={}", agent_id, e);
                    }
                }
            }
            info!(
                "代理周期汇总: 成功 {}/{}, 取消 {}",
                succeeded,
                results.len(),
                cancelled
            );
        }
        Err(e) => error!("代理周期任务失败: {}", e),
    }
}
