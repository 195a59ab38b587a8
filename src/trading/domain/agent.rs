//! 交易代理实体

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::decision::ModelProvider;

/// 交易代理
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agent {
    pub id: Uuid,

    pub name: String,

    /// 交给决策源的系统指令 (交易规则/风险偏好)
    pub instructions: String,

    /// 该代理使用的外部决策源
    pub model_provider: ModelProvider,

    pub is_active: bool,

    pub created_at: DateTime<Utc>,
}
