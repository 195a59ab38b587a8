//! 代理决策

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::order::TradeOrder;

/// 外部决策源类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModelProvider {
    /// OpenAI 兼容的 chat completions 接口
    OpenAi,
    /// Llama 系列 (Groq / Together 等, 同样是 OpenAI 兼容协议)
    Llama,
    /// 本地脚本化决策源 (测试/演练)
    Scripted,
}

impl ModelProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelProvider::OpenAi => "OPENAI",
            ModelProvider::Llama => "LLAMA",
            ModelProvider::Scripted => "SCRIPTED",
        }
    }

    pub fn from_tag(s: &str) -> Option<ModelProvider> {
        match s.trim().to_uppercase().as_str() {
            "OPENAI" => Some(ModelProvider::OpenAi),
            "LLAMA" => Some(ModelProvider::Llama),
            "SCRIPTED" => Some(ModelProvider::Scripted),
            _ => None,
        }
    }
}

/// 代理在一个周期内提出的完整决策
///
/// cited_rule_ids 仅用于展示/审计, 风控校验绝不读取
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentDecision {
    pub agent_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub orders: Vec<TradeOrder>,
    pub rationale: Option<String>,
    pub cited_rule_ids: Vec<String>,
}

impl AgentDecision {
    pub fn new(agent_id: Uuid, orders: Vec<TradeOrder>) -> Self {
        Self {
            agent_id,
            created_at: Utc::now(),
            orders,
            rationale: None,
            cited_rule_ids: Vec::new(),
        }
    }

    /// 降级用的空仓决策, 带原因说明
    pub fn hold(agent_id: Uuid, reason: impl Into<String>) -> Self {
        Self {
            agent_id,
            created_at: Utc::now(),
            orders: Vec::new(),
            rationale: Some(reason.into()),
            cited_rule_ids: Vec::new(),
        }
    }

    pub fn is_hold(&self) -> bool {
        self.orders.is_empty()
    }
}
