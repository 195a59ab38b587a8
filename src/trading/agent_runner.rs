//! 代理执行周期编排
//!
//! 固定阶段顺序: 构建上下文 → 生成决策 → 风控校验 → 应用(有条件) → 快照。
//! 失败策略:
//! - 构建上下文失败 (代理不存在/未激活) 致命, 原样上抛, 无任何副作用
//! - 生成决策失败由决策源降级为带原因的 Hold, 周期继续
//! - 校验绝不失败, 只缩减/过滤订单
//! - 应用/快照中的异常记录后上抛, 只影响本代理的本周期
//!
//! 同一代理的周期通过逐代理互斥锁串行化, 任意时刻至多一个在途 Apply;
//! 不同代理的周期可以并发扇出。

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::Utc;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::app_config::risk::RiskConfig;
use crate::app_config::shutdown::CancelToken;
use crate::error::AppError;
use crate::trading::domain::{AgentDecision, AgentRunResult};
use crate::trading::repository::{AgentRepository, MarketDataFeed};
use crate::trading::services::context::ContextBuilder;
use crate::trading::services::decision::DecisionSourceRegistry;
use crate::trading::services::decision_log::DecisionLogService;
use crate::trading::services::equity::EquityService;
use crate::trading::services::portfolio::PortfolioService;
use crate::trading::services::risk::RiskValidator;

/// 每次周期喂给决策源的K线数量
const CONTEXT_CANDLE_COUNT: usize = 24;

pub struct AgentRunner {
    agents: Arc<dyn AgentRepository>,
    context_builder: Arc<ContextBuilder>,
    registry: Arc<DecisionSourceRegistry>,
    validator: Arc<RiskValidator>,
    portfolio_service: Arc<PortfolioService>,
    equity_service: Arc<EquityService>,
    decision_log: Arc<DecisionLogService>,
    market: Arc<dyn MarketDataFeed>,
    config: RiskConfig,
    /// 逐代理串行化锁
    locks: Mutex<HashMap<Uuid, Arc<tokio::sync::Mutex<()>>>>,
}

impl AgentRunner {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        agents: Arc<dyn AgentRepository>,
        context_builder: Arc<ContextBuilder>,
        registry: Arc<DecisionSourceRegistry>,
        validator: Arc<RiskValidator>,
        portfolio_service: Arc<PortfolioService>,
        equity_service: Arc<EquityService>,
        decision_log: Arc<DecisionLogService>,
        market: Arc<dyn MarketDataFeed>,
        config: RiskConfig,
    ) -> Self {
        Self {
            agents,
            context_builder,
            registry,
            validator,
            portfolio_service,
            equity_service,
            decision_log,
            market,
            config,
            locks: Mutex::new(HashMap::new()),
        }
    }

    fn agent_lock(&self, agent_id: Uuid) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.locks.lock().unwrap();
        locks
            .entry(agent_id)
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }

    /// 执行一个完整周期
    pub async fn run_agent_once(
        &self,
        agent_id: Uuid,
        mut cancel: CancelToken,
    ) -> Result<AgentRunResult, AppError> {
        let lock = self.agent_lock(agent_id);
        let _guard = lock.lock().await;

        let started_at = Utc::now();
        info!("开始执行周期: 代理={}", agent_id);

        // 1. 构建上下文 (致命错误直接上抛)
        let context = self
            .context_builder
            .build(agent_id, CONTEXT_CANDLE_COUNT)
            .await?;

        if cancel.is_cancelled() {
            return Err(AppError::Cancelled);
        }

        // 2. 生成决策; 外部调用是挂起点, 取消在此生效
        let raw_decision = match self.registry.resolve(context.model_provider) {
            Some(source) => {
                tokio::select! {
                    decision = source.generate(&context) => decision,
                    _ = cancel.cancelled() => return Err(AppError::Cancelled),
                }
            }
            None => {
                warn!(
                    "决策源未注册, 降级为HOLD: 代理={} provider={}",
                    agent_id,
                    context.model_provider.as_str()
                );
                AgentDecision::hold(
                    agent_id,
                    format!(
                        "No decision source registered for {}",
                        context.model_provider.as_str()
                    ),
                )
            }
        };

        info!(
            "代理 {} 提出 {} 单",
            agent_id,
            raw_decision.orders.len()
        );

        // 3. 风控校验 (纯函数, 绝不让周期失败)
        let mut symbols: Vec<String> = self.config.allowed_assets.iter().cloned().collect();
        symbols.sort();
        let prices = self.market.latest_prices(&symbols).await;
        let outcome = self
            .validator
            .validate(&raw_decision, &context.portfolio, &prices);

        if cancel.is_cancelled() {
            // Apply 前取消: 没有任何持久化变更
            return Err(AppError::Cancelled);
        }

        // 4. 应用 (零订单的纯 Hold 周期跳过, 复用原组合状态)
        let value_before = context.portfolio.total_value;
        let portfolio = if outcome.validated.orders.is_empty() {
            info!("无有效订单, 维持现状 (HOLD): 代理={}", agent_id);
            context.portfolio.clone()
        } else {
            self.portfolio_service
                .apply_decision(agent_id, &outcome.validated, &prices)
                .await
                .map_err(|e| {
                    error!("应用决策失败: 代理={} err={}", agent_id, e);
                    e
                })?
        };

        // 决策日志 (写入失败不影响周期)
        self.decision_log
            .log_decision(
                &raw_decision,
                &outcome.validated,
                value_before,
                portfolio.total_value,
            )
            .await;

        // 5. 快照: 每个周期无条件捕获, 包括 Hold 周期
        self.equity_service
            .capture_snapshot(agent_id)
            .await
            .map_err(|e| {
                error!("捕获快照失败: 代理={} err={}", agent_id, e);
                e
            })?;

        let completed_at = Utc::now();
        info!(
            "周期完成: 代理={} 耗时 {}ms",
            agent_id,
            (completed_at - started_at).num_milliseconds()
        );

        Ok(AgentRunResult {
            agent_id,
            started_at,
            completed_at,
            portfolio,
            decision: outcome.validated,
            rejected_reasons: outcome
                .rejected
                .iter()
                .map(|r| format!("{} {} {}: {}", r.order.asset_symbol, r.order.side.as_str(), r.order.quantity, r.reason))
                .collect(),
        })
    }

    /// 为所有激活代理并发执行周期
    ///
    /// 单个代理的失败不影响其他代理; 返回每个代理的结果
    pub async fn run_all_active(
        self: Arc<Self>,
        cancel: CancelToken,
    ) -> Result<Vec<(Uuid, Result<AgentRunResult, AppError>)>, AppError> {
        let agents = self.agents.list_active().await?;
        let mut handles = Vec::with_capacity(agents.len());

        for agent in agents {
            let runner = Arc::clone(&self);
            let token = cancel.clone();
            handles.push(tokio::spawn(async move {
                (agent.id, runner.run_agent_once(agent.id, token).await)
            }));
        }

        let mut results = Vec::with_capacity(handles.len());
        for handle in handles {
            match handle.await {
                Ok(pair) => results.push(pair),
                Err(e) => error!("周期任务崩溃: {}", e),
            }
        }
        Ok(results)
    }
}
