//! 周期上下文构建
//!
//! 代理不存在/未激活是整个周期里仅有的致命错误,
//! 在产生任何副作用之前就中止并原样上抛

use std::sync::Arc;

use tracing::{debug, warn};
use uuid::Uuid;

use crate::app_config::risk::RiskConfig;
use crate::error::AppError;
use crate::trading::domain::{AgentContext, Candle};
use crate::trading::repository::{AgentRepository, MarketDataFeed};
use crate::trading::services::portfolio::PortfolioService;

pub struct ContextBuilder {
    agents: Arc<dyn AgentRepository>,
    portfolio_service: Arc<PortfolioService>,
    market: Arc<dyn MarketDataFeed>,
    config: RiskConfig,
}

impl ContextBuilder {
    pub fn new(
        agents: Arc<dyn AgentRepository>,
        portfolio_service: Arc<PortfolioService>,
        market: Arc<dyn MarketDataFeed>,
        config: RiskConfig,
    ) -> Self {
        Self {
            agents,
            portfolio_service,
            market,
            config,
        }
    }

    pub async fn build(
        &self,
        agent_id: Uuid,
        candle_count: usize,
    ) -> Result<AgentContext, AppError> {
        // 1. 加载并校验代理
        let agent = self
            .agents
            .find_by_id(agent_id)
            .await?
            .ok_or(AppError::AgentNotFound(agent_id))?;
        if !agent.is_active {
            return Err(AppError::AgentInactive(agent_id));
        }

        // 2. 组合估值视图
        let portfolio = self.portfolio_service.get_state(agent_id).await?;

        // 3. 白名单资产的最近K线; 单个资产失败只跳过, 不中断整批
        let mut symbols: Vec<String> = self.config.allowed_assets.iter().cloned().collect();
        symbols.sort();

        let mut candles: Vec<Candle> = Vec::new();
        for symbol in &symbols {
            match self.market.latest_candles(symbol, candle_count).await {
                Ok(mut list) => candles.append(&mut list),
                Err(e) => warn!("获取K线失败, 跳过: symbol={} err={}", symbol, e),
            }
        }
        // 最新在前
        candles.sort_by(|a, b| b.ts.cmp(&a.ts));

        debug!(
            "上下文就绪: 代理={} 总值={} 持仓数={} K线数={}",
            agent_id,
            portfolio.total_value,
            portfolio.positions.len(),
            candles.len()
        );

        Ok(AgentContext {
            agent_id,
            model_provider: agent.model_provider,
            portfolio,
            recent_candles: candles,
            instructions: agent.instructions,
        })
    }
}
