//! 风控校验结果

use serde::{Deserialize, Serialize};

use super::decision::AgentDecision;
use super::order::TradeOrder;

/// 被拒绝的订单及其原因
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RejectedOrder {
    pub order: TradeOrder,
    pub reason: String,
}

/// 一次决策校验的完整产出
///
/// 被拒绝/调整的订单对调用方始终可见, 绝不无声丢弃
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationOutcome {
    /// 仅包含存活(可能已调整)订单的决策, 保留原始创建时间
    pub validated: AgentDecision,
    pub rejected: Vec<RejectedOrder>,
    /// 软警告 (如超量截断)
    pub warnings: Vec<String>,
    /// 只要发生过拒绝/调整/截断即为 true
    pub has_warnings: bool,
}
