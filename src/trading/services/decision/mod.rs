//! 外部决策源
//!
//! 决策源按 ModelProvider 注册到进程级注册表, 启动时解析一次。
//! 任何普通的 API/格式失败都必须在源内部转换为带原因的 Hold 决策,
//! 核心把收到的任何决策都视为"尽力而为"的结果。

pub mod http_source;
pub mod rate_limiter;
pub mod scripted_source;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::trading::domain::{AgentContext, AgentDecision, ModelProvider};

pub use http_source::{HttpDecisionSource, HttpSourceConfig};
pub use rate_limiter::RateLimiter;
pub use scripted_source::ScriptedDecisionSource;

/// 外部决策源接口
#[async_trait]
pub trait DecisionSource: Send + Sync {
    /// 生成决策
    ///
    /// 绝不因普通 API/格式错误返回 Err; 失败一律降级为带原因的 Hold
    async fn generate(&self, context: &AgentContext) -> AgentDecision;
}

/// 决策源注册表: provider 标签 → 实例, 启动时装配一次
#[derive(Default)]
pub struct DecisionSourceRegistry {
    sources: HashMap<ModelProvider, Arc<dyn DecisionSource>>,
}

impl DecisionSourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, provider: ModelProvider, source: Arc<dyn DecisionSource>) {
        self.sources.insert(provider, source);
    }

    pub fn resolve(&self, provider: ModelProvider) -> Option<Arc<dyn DecisionSource>> {
        self.sources.get(&provider).cloned()
    }
}
