//! 执行周期的输入上下文与结果

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::candle::Candle;
use super::decision::{AgentDecision, ModelProvider};
use super::portfolio::PortfolioState;

/// 喂给外部决策源的上下文
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentContext {
    pub agent_id: Uuid,
    pub model_provider: ModelProvider,
    pub portfolio: PortfolioState,
    /// 最近K线, 最新在前
    pub recent_candles: Vec<Candle>,
    pub instructions: String,
}

/// 一个执行周期的结果
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentRunResult {
    pub agent_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    /// 周期结束后的组合状态
    pub portfolio: PortfolioState,
    /// 实际被执行的(已校验)决策
    pub decision: AgentDecision,
    /// 校验阶段的拒绝/警告 (对调用方始终可见)
    pub rejected_reasons: Vec<String>,
}
