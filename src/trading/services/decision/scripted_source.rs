//! 脚本化决策源 (测试/本地演练)
//!
//! 按入队顺序逐次弹出预设订单, 队列耗尽后持续返回 Hold

use std::collections::VecDeque;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::trading::domain::{AgentContext, AgentDecision, TradeOrder};
use crate::trading::services::decision::DecisionSource;

#[derive(Default)]
pub struct ScriptedDecisionSource {
    queue: Mutex<VecDeque<Vec<TradeOrder>>>,
}

impl ScriptedDecisionSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn enqueue(&self, orders: Vec<TradeOrder>) {
        self.queue.lock().await.push_back(orders);
    }
}

#[async_trait]
impl DecisionSource for ScriptedDecisionSource {
    async fn generate(&self, context: &AgentContext) -> AgentDecision {
        match self.queue.lock().await.pop_front() {
            Some(orders) => AgentDecision::new(context.agent_id, orders),
            None => AgentDecision::hold(context.agent_id, "Scripted queue empty - holding"),
        }
    }
}
