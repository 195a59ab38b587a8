use async_trait::async_trait;
use rbatis::{crud, RBatis};
use serde::{Deserialize, Serialize};

use crate::app_config::db;
use crate::error::AppError;
use crate::time_util;
use crate::trading::repository::{DecisionLogRecord, DecisionLogRepository};

/// table
#[derive(Serialize, Deserialize, Debug)]
#[serde(rename_all = "snake_case")]
pub struct DecisionLogEntity {
    pub id: String,
    pub agent_id: String,
    pub created_at: i64,
    pub action: String,
    pub asset_symbol: Option<String>,
    pub quantity: Option<String>,
    pub rationale: String,
    /// 逗号分隔的规则ID列表
    pub cited_rule_ids: String,
    pub portfolio_value_before: String,
    pub portfolio_value_after: String,
}

crud!(DecisionLogEntity {}, "decision_logs");

impl DecisionLogEntity {
    pub fn from_record(record: &DecisionLogRecord) -> Self {
        Self {
            id: record.id.to_string(),
            agent_id: record.agent_id.to_string(),
            created_at: time_util::datetime_to_ts(&record.created_at),
            action: record.action.clone(),
            asset_symbol: record.asset_symbol.clone(),
            quantity: record.quantity.map(|q| q.to_string()),
            rationale: record.rationale.clone(),
            cited_rule_ids: record.cited_rule_ids.join(","),
            portfolio_value_before: record.portfolio_value_before.to_string(),
            portfolio_value_after: record.portfolio_value_after.to_string(),
        }
    }
}

pub struct DecisionLogModel {
    db: &'static RBatis,
}

impl DecisionLogModel {
    pub fn new() -> Self {
        Self {
            db: db::get_db_client(),
        }
    }
}

impl Default for DecisionLogModel {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DecisionLogRepository for DecisionLogModel {
    async fn append(&self, record: &DecisionLogRecord) -> Result<(), AppError> {
        let entity = DecisionLogEntity::from_record(record);
        DecisionLogEntity::insert(self.db, &entity).await?;
        Ok(())
    }
}
