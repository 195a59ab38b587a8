//! 定时权益快照任务
//!
//! 独立于代理周期, 保证即使没有交易也有连续的权益曲线

use std::sync::Arc;

use tracing::error;

use crate::trading::repository::AgentRepository;
use crate::trading::services::equity::EquityService;

pub async fn run_snapshot_job(
    equity_service: Arc<EquityService>,
    agents: Arc<dyn AgentRepository>,
) {
    if let Err(e) = equity_service.capture_all_snapshots(agents.as_ref()).await {
        error!("批量快照任务失败: {}", e);
    }
}
