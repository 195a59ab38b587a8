use async_trait::async_trait;
use rbatis::{crud, impl_select, RBatis};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::app_config::db;
use crate::error::AppError;
use crate::time_util;
use crate::trading::domain::{Agent, ModelProvider};
use crate::trading::model::convert::{parse_ts, parse_uuid};
use crate::trading::repository::AgentRepository;

/// table
#[derive(Serialize, Deserialize, Debug)]
#[serde(rename_all = "snake_case")]
pub struct AgentEntity {
    pub id: String,
    pub name: String,
    pub instructions: String,
    pub model_provider: String,
    pub is_active: i32,
    pub created_at: i64,
}

crud!(AgentEntity {}, "agents");
impl_select!(AgentEntity{select_active() => "`where is_active = 1`"}, "agents");

impl AgentEntity {
    pub fn to_domain(&self) -> Result<Agent, AppError> {
        let provider = ModelProvider::from_tag(&self.model_provider).ok_or_else(|| {
            AppError::DbError(format!("未知的决策源类型: {}", self.model_provider))
        })?;
        Ok(Agent {
            id: parse_uuid(&self.id)?,
            name: self.name.clone(),
            instructions: self.instructions.clone(),
            model_provider: provider,
            is_active: self.is_active == 1,
            created_at: parse_ts(self.created_at)?,
        })
    }

    pub fn from_domain(agent: &Agent) -> Self {
        Self {
            id: agent.id.to_string(),
            name: agent.name.clone(),
            instructions: agent.instructions.clone(),
            model_provider: agent.model_provider.as_str().to_string(),
            is_active: if agent.is_active { 1 } else { 0 },
            created_at: time_util::datetime_to_ts(&agent.created_at),
        }
    }
}

pub struct AgentModel {
    db: &'static RBatis,
}

impl AgentModel {
    pub fn new() -> Self {
        Self {
            db: db::get_db_client(),
        }
    }
}

impl Default for AgentModel {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AgentRepository for AgentModel {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Agent>, AppError> {
        let rows = AgentEntity::select_by_column(self.db, "id", id.to_string()).await?;
        rows.first().map(|e| e.to_domain()).transpose()
    }

    async fn list_active(&self) -> Result<Vec<Agent>, AppError> {
        let rows = AgentEntity::select_active(self.db).await?;
        rows.iter().map(|e| e.to_domain()).collect()
    }
}
