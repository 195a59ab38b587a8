//! 服务装配
//!
//! 进程启动时构建一次完整的服务图:
//! 仓储 (MySQL 或内存) → 领域服务 → 决策源注册表 → 周期编排器。
//! 限流器在这里构造一次并注入所有HTTP决策源, 共享一个节流预算。

use std::sync::Arc;
use std::time::Duration;

use crate::app_config::env::{env_is_true, env_usize_or};
use crate::app_config::risk::RiskConfig;
use crate::trading::agent_runner::AgentRunner;
use crate::trading::domain::ModelProvider;
use crate::trading::model::agent::AgentModel;
use crate::trading::model::decision_log::DecisionLogModel;
use crate::trading::model::equity_snapshot::EquitySnapshotModel;
use crate::trading::model::market::candles::CandlesModel;
use crate::trading::model::portfolio::PortfolioModel;
use crate::trading::model::trade::TradeModel;
use crate::trading::repository::memory::MemoryStore;
use crate::trading::repository::{
    AgentRepository, CandleStore, DecisionLogRepository, EquitySnapshotRepository,
    MarketDataFeed, PortfolioRepository, TradeRepository,
};
use crate::trading::services::context::ContextBuilder;
use crate::trading::services::decision::{
    DecisionSourceRegistry, HttpDecisionSource, HttpSourceConfig, RateLimiter,
    ScriptedDecisionSource,
};
use crate::trading::services::decision_log::DecisionLogService;
use crate::trading::services::equity::EquityService;
use crate::trading::services::market::{HttpMarketDataClient, MarketDataIngestService};
use crate::trading::services::portfolio::PortfolioService;
use crate::trading::services::risk::RiskValidator;

pub struct AppServices {
    pub config: RiskConfig,
    pub agents: Arc<dyn AgentRepository>,
    pub runner: Arc<AgentRunner>,
    pub equity_service: Arc<EquityService>,
    pub ingest_service: Arc<MarketDataIngestService>,
}

struct Repositories {
    agents: Arc<dyn AgentRepository>,
    portfolios: Arc<dyn PortfolioRepository>,
    trades: Arc<dyn TradeRepository>,
    snapshots: Arc<dyn EquitySnapshotRepository>,
    market: Arc<dyn MarketDataFeed>,
    candle_store: Arc<dyn CandleStore>,
    decision_logs: Arc<dyn DecisionLogRepository>,
}

/// 构建完整的服务图
///
/// USE_MEMORY_STORE=true 时使用内存仓储 (本地演练), 否则使用 MySQL
/// (调用方需先完成 init_db)
pub async fn build_services() -> anyhow::Result<AppServices> {
    let config = RiskConfig::from_env();

    let repos = if env_is_true("USE_MEMORY_STORE", false) {
        let store = Arc::new(MemoryStore::new());
        Repositories {
            agents: store.clone(),
            portfolios: store.clone(),
            trades: store.clone(),
            snapshots: store.clone(),
            market: store.clone(),
            candle_store: store.clone(),
            decision_logs: store,
        }
    } else {
        let candles = Arc::new(CandlesModel::new());
        Repositories {
            agents: Arc::new(AgentModel::new()),
            portfolios: Arc::new(PortfolioModel::new()),
            trades: Arc::new(TradeModel::new()),
            snapshots: Arc::new(EquitySnapshotModel::new()),
            market: candles.clone(),
            candle_store: candles,
            decision_logs: Arc::new(DecisionLogModel::new()),
        }
    };

    // 限流器: 进程内唯一, 所有HTTP决策源共享
    let min_interval =
        Duration::from_millis(env_usize_or("DECISION_MIN_INTERVAL_MS", 2000) as u64);
    let rate_limiter = Arc::new(RateLimiter::new(min_interval));

    let mut registry = DecisionSourceRegistry::new();
    registry.register(
        ModelProvider::OpenAi,
        Arc::new(HttpDecisionSource::new(
            HttpSourceConfig::from_env("OPENAI"),
            rate_limiter.clone(),
        )),
    );
    registry.register(
        ModelProvider::Llama,
        Arc::new(HttpDecisionSource::new(
            HttpSourceConfig::from_env("LLAMA"),
            rate_limiter,
        )),
    );
    registry.register(ModelProvider::Scripted, Arc::new(ScriptedDecisionSource::new()));
    let registry = Arc::new(registry);

    let portfolio_service = Arc::new(PortfolioService::new(
        repos.portfolios.clone(),
        repos.market.clone(),
        config.clone(),
    ));
    let equity_service = Arc::new(EquityService::new(
        portfolio_service.clone(),
        repos.snapshots.clone(),
        repos.trades.clone(),
        config.clone(),
    ));
    let context_builder = Arc::new(ContextBuilder::new(
        repos.agents.clone(),
        portfolio_service.clone(),
        repos.market.clone(),
        config.clone(),
    ));
    let validator = Arc::new(RiskValidator::new(config.clone()));
    let decision_log = Arc::new(DecisionLogService::new(repos.decision_logs.clone()));
    let ingest_service = Arc::new(MarketDataIngestService::new(
        Arc::new(HttpMarketDataClient::from_env()),
        repos.candle_store.clone(),
    ));

    let runner = Arc::new(AgentRunner::new(
        repos.agents.clone(),
        context_builder,
        registry,
        validator,
        portfolio_service,
        equity_service.clone(),
        decision_log,
        repos.market.clone(),
        config.clone(),
    ));

    Ok(AppServices {
        config,
        agents: repos.agents,
        runner,
        equity_service,
        ingest_service,
    })
}
