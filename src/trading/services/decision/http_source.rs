//! OpenAI 兼容的 HTTP 决策源
//!
//! 适用于任何提供 chat completions 协议的服务 (OpenAI / Groq / Together 等)。
//! 超时、限流、网络错误、响应格式错误全部降级为带原因的 Hold,
//! 绝不让单个代理的外部调用失败拖垮整个扇出。

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

use crate::app_config::env::env_or_default;
use crate::trading::domain::{AgentContext, AgentDecision, TradeOrder, TradeSide};
use crate::trading::services::decision::{DecisionSource, RateLimiter};

#[derive(Debug, Clone)]
pub struct HttpSourceConfig {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    pub temperature: f64,
    pub max_tokens: u32,
    /// 超过此时长直接降级为 Hold, 不阻塞其他代理
    pub request_timeout: Duration,
}

impl HttpSourceConfig {
    pub fn from_env(prefix: &str) -> Self {
        Self {
            base_url: env_or_default(
                &format!("{}_BASE_URL", prefix),
                "https://api.openai.com/v1",
            ),
            api_key: env_or_default(&format!("{}_API_KEY", prefix), ""),
            model: env_or_default(&format!("{}_MODEL", prefix), "gpt-4o-mini"),
            temperature: 0.2,
            max_tokens: 512,
            request_timeout: Duration::from_secs(30),
        }
    }
}

pub struct HttpDecisionSource {
    client: reqwest::Client,
    config: HttpSourceConfig,
    rate_limiter: Arc<RateLimiter>,
}

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f64,
    max_tokens: u32,
    response_format: ResponseFormat,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    format_type: String,
}

#[derive(Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

/// 模型返回的决策 JSON
#[derive(Deserialize)]
struct ModelDecision {
    #[serde(default)]
    reasoning: Option<String>,
    #[serde(default)]
    orders: Vec<ModelOrder>,
    #[serde(default)]
    cited_rule_ids: Vec<String>,
}

#[derive(Deserialize)]
struct ModelOrder {
    asset: String,
    side: String,
    quantity: serde_json::Value,
}

impl HttpDecisionSource {
    pub fn new(config: HttpSourceConfig, rate_limiter: Arc<RateLimiter>) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
            rate_limiter,
        }
    }

    fn build_system_prompt(instructions: &str) -> String {
        format!(
            "You are an AI trading agent managing a paper portfolio.\n\
             ## Your Instructions\n{}\n\
             ## Response Format\n\
             Respond with a JSON object: {{\"reasoning\": \"...\", \
             \"orders\": [{{\"asset\": \"BTC\", \"side\": \"BUY\", \"quantity\": 0.1}}]}}.\n\
             Use BUY, SELL or HOLD for side. Quantity must be positive. \
             Return an empty orders array to hold.",
            instructions
        )
    }

    fn build_user_prompt(context: &AgentContext) -> String {
        let mut prompt = format!(
            "Portfolio: cash={}, total_value={}\nPositions:\n",
            context.portfolio.cash, context.portfolio.total_value
        );
        for p in &context.portfolio.positions {
            prompt.push_str(&format!(
                "  {} qty={} avg={} current={}\n",
                p.asset_symbol, p.quantity, p.average_price, p.current_price
            ));
        }
        prompt.push_str("Recent closes (most recent first):\n");
        for candle in context.recent_candles.iter().take(24) {
            prompt.push_str(&format!(
                "  {} {} close={}\n",
                candle.asset_symbol,
                candle.ts.format("%Y-%m-%d %H:%M"),
                candle.close
            ));
        }
        prompt
    }

    /// 解析模型响应; 任何格式问题都降级为 Hold
    fn parse_decision(context: &AgentContext, content: &str) -> AgentDecision {
        let parsed: ModelDecision = match serde_json::from_str(content) {
            Ok(d) => d,
            Err(e) => {
                warn!("模型响应解析失败: 代理={} err={}", context.agent_id, e);
                return AgentDecision::hold(
                    context.agent_id,
                    "Invalid response format - defaulting to HOLD",
                );
            }
        };

        let mut orders = Vec::new();
        for raw in parsed.orders {
            let quantity = match &raw.quantity {
                serde_json::Value::Number(n) => Decimal::from_str(&n.to_string()).ok(),
                serde_json::Value::String(s) => Decimal::from_str(s).ok(),
                _ => None,
            };
            let side = TradeSide::from_str_loose(&raw.side);
            match quantity {
                Some(q) if side != TradeSide::Hold => {
                    orders.push(TradeOrder::new(raw.asset, side, q));
                }
                _ => {
                    // HOLD 或数量非法的条目直接忽略
                    debug!("忽略模型订单: asset={} side={}", raw.asset, raw.side);
                }
            }
        }

        AgentDecision {
            agent_id: context.agent_id,
            created_at: chrono::Utc::now(),
            orders,
            rationale: parsed.reasoning,
            cited_rule_ids: parsed.cited_rule_ids,
        }
    }
}

#[async_trait]
impl DecisionSource for HttpDecisionSource {
    async fn generate(&self, context: &AgentContext) -> AgentDecision {
        // 共享限流预算: 所有代理的外部调用统一排队
        self.rate_limiter.acquire().await;

        let request = ChatRequest {
            model: self.config.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: Self::build_system_prompt(&context.instructions),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: Self::build_user_prompt(context),
                },
            ],
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
            response_format: ResponseFormat {
                format_type: "json_object".to_string(),
            },
        };

        let url = format!("{}/chat/completions", self.config.base_url);
        let send = self
            .client
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send();

        let response = match tokio::time::timeout(self.config.request_timeout, send).await {
            Err(_) => {
                warn!("决策源请求超时: 代理={}", context.agent_id);
                return AgentDecision::hold(
                    context.agent_id,
                    "Request timeout - defaulting to HOLD",
                );
            }
            Ok(Err(e)) => {
                error!("决策源网络错误: 代理={} err={}", context.agent_id, e);
                return AgentDecision::hold(
                    context.agent_id,
                    "Network error - defaulting to HOLD",
                );
            }
            Ok(Ok(r)) => r,
        };

        if response.status() == StatusCode::TOO_MANY_REQUESTS {
            warn!("决策源限流: 代理={}", context.agent_id);
            return AgentDecision::hold(context.agent_id, "Rate limited - holding position");
        }
        if !response.status().is_success() {
            error!(
                "决策源API错误: 代理={} status={}",
                context.agent_id,
                response.status()
            );
            return AgentDecision::hold(
                context.agent_id,
                format!("API error {}", response.status()),
            );
        }

        let chat: ChatResponse = match response.json().await {
            Ok(c) => c,
            Err(e) => {
                warn!("决策源响应体解析失败: 代理={} err={}", context.agent_id, e);
                return AgentDecision::hold(context.agent_id, "Empty or malformed API response");
            }
        };

        let content = match chat.choices.first() {
            Some(choice) => choice.message.content.clone(),
            None => {
                warn!("决策源返回空choices: 代理={}", context.agent_id);
                return AgentDecision::hold(context.agent_id, "Empty API response");
            }
        };

        debug!("决策源响应: 代理={} content={}", context.agent_id, content);
        Self::parse_decision(context, &content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    use crate::trading::domain::{ModelProvider, PortfolioState};

    fn context() -> AgentContext {
        AgentContext {
            agent_id: Uuid::new_v4(),
            model_provider: ModelProvider::OpenAi,
            portfolio: PortfolioState {
                portfolio_id: Uuid::new_v4(),
                agent_id: Uuid::new_v4(),
                cash: dec!(100000),
                positions: vec![],
                as_of: Utc::now(),
                total_value: dec!(100000),
            },
            recent_candles: vec![],
            instructions: "trade carefully".to_string(),
        }
    }

    #[test]
    fn parses_well_formed_response() {
        let ctx = context();
        let content = r#"{"reasoning":"dip buy","orders":[{"asset":"BTC","side":"BUY","quantity":0.25}]}"#;
        let decision = HttpDecisionSource::parse_decision(&ctx, content);

        assert_eq!(decision.orders.len(), 1);
        assert_eq!(decision.orders[0].asset_symbol, "BTC");
        assert_eq!(decision.orders[0].side, TradeSide::Buy);
        assert_eq!(decision.orders[0].quantity, dec!(0.25));
        assert_eq!(decision.rationale.as_deref(), Some("dip buy"));
    }

    #[test]
    fn malformed_json_degrades_to_hold() {
        let ctx = context();
        let decision = HttpDecisionSource::parse_decision(&ctx, "not json at all");
        assert!(decision.is_hold());
        assert!(decision.rationale.unwrap().contains("Invalid response format"));
    }

    #[test]
    fn string_quantity_is_accepted() {
        let ctx = context();
        let content = r#"{"orders":[{"asset":"eth","side":"sell","quantity":"1.5"}]}"#;
        let decision = HttpDecisionSource::parse_decision(&ctx, content);
        assert_eq!(decision.orders[0].asset_symbol, "ETH");
        assert_eq!(decision.orders[0].quantity, dec!(1.5));
    }

    #[test]
    fn hold_entries_are_dropped() {
        let ctx = context();
        let content = r#"{"orders":[{"asset":"BTC","side":"HOLD","quantity":0}]}"#;
        let decision = HttpDecisionSource::parse_decision(&ctx, content);
        assert!(decision.is_hold());
    }
}
