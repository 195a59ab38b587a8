//! 决策日志
//!
//! 记录每个完成周期的决策及前后组合价值, 仅用于展示/审计。
//! 写入失败只记录错误, 绝不影响周期本身。

use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use tracing::error;
use uuid::Uuid;

use crate::trading::domain::AgentDecision;
use crate::trading::repository::{DecisionLogRecord, DecisionLogRepository};

pub struct DecisionLogService {
    repo: Arc<dyn DecisionLogRepository>,
}

impl DecisionLogService {
    pub fn new(repo: Arc<dyn DecisionLogRepository>) -> Self {
        Self { repo }
    }

    /// 记录一次周期的决策
    ///
    /// action 取首个存活订单的方向, 全 Hold 周期记为 HOLD;
    /// rationale/cited_rule_ids 来自原始决策 (信息性字段, 风控从不读取)
    pub async fn log_decision(
        &self,
        raw: &AgentDecision,
        validated: &AgentDecision,
        portfolio_value_before: Decimal,
        portfolio_value_after: Decimal,
    ) {
        let first = validated.orders.first();
        let record = DecisionLogRecord {
            id: Uuid::new_v4(),
            agent_id: validated.agent_id,
            created_at: Utc::now(),
            action: first
                .map(|o| o.side.as_str().to_string())
                .unwrap_or_else(|| "HOLD".to_string()),
            asset_symbol: first.map(|o| o.asset_symbol.clone()),
            quantity: first.map(|o| o.quantity),
            rationale: raw
                .rationale
                .clone()
                .unwrap_or_else(|| "No rationale provided".to_string()),
            cited_rule_ids: raw.cited_rule_ids.clone(),
            portfolio_value_before,
            portfolio_value_after,
        };

        if let Err(e) = self.repo.append(&record).await {
            error!("决策日志写入失败: 代理={} err={}", validated.agent_id, e);
        }
    }
}
