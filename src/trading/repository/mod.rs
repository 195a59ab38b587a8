//! 仓储接口 - 定义数据访问的抽象
//!
//! MySQL 实现见 `trading::model`, 内存实现见 `memory` (本地/测试)

pub mod memory;

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use crate::error::AppError;
use crate::trading::domain::{Agent, Candle, EquitySnapshot, Portfolio, Trade};

/// 代理仓储接口
#[async_trait]
pub trait AgentRepository: Send + Sync {
    /// 根据ID查询代理
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Agent>, AppError>;

    /// 查询所有激活的代理
    async fn list_active(&self) -> Result<Vec<Agent>, AppError>;
}

/// 组合仓储接口
#[async_trait]
pub trait PortfolioRepository: Send + Sync {
    async fn find_by_agent(&self, agent_id: Uuid) -> Result<Option<Portfolio>, AppError>;

    async fn create(&self, portfolio: &Portfolio) -> Result<(), AppError>;

    /// 原子提交一次决策的全部效果: 现金、持仓、成交记录在同一事务内落库
    ///
    /// 要么全部写入要么全部不写, 不存在部分提交
    async fn commit_applied_decision(
        &self,
        portfolio: &Portfolio,
        trades: &[Trade],
    ) -> Result<(), AppError>;
}

/// 成交记录仓储接口 (只读; 写入随决策提交发生)
#[async_trait]
pub trait TradeRepository: Send + Sync {
    /// 按执行时间升序返回
    async fn list_by_portfolio(&self, portfolio_id: Uuid) -> Result<Vec<Trade>, AppError>;
}

/// 权益快照仓储接口
#[async_trait]
pub trait EquitySnapshotRepository: Send + Sync {
    async fn append(&self, snapshot: &EquitySnapshot) -> Result<(), AppError>;

    async fn latest(&self, portfolio_id: Uuid) -> Result<Option<EquitySnapshot>, AppError>;

    /// 按捕获时间升序返回, 可选时间范围过滤
    async fn list_by_portfolio(
        &self,
        portfolio_id: Uuid,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Result<Vec<EquitySnapshot>, AppError>;
}

/// 行情数据接口
#[async_trait]
pub trait MarketDataFeed: Send + Sync {
    /// 最新价格, 无价或为零时返回 MarketDataError
    async fn latest_price(&self, symbol: &str) -> Result<Decimal, AppError>;

    /// 最近K线, 最新在前
    async fn latest_candles(&self, symbol: &str, count: usize) -> Result<Vec<Candle>, AppError>;

    /// 批量取最新价格; 单个资产失败只跳过, 绝不中断整批
    async fn latest_prices(&self, symbols: &[String]) -> HashMap<String, Decimal> {
        let mut prices = HashMap::new();
        for symbol in symbols {
            match self.latest_price(symbol).await {
                Ok(price) => {
                    prices.insert(symbol.clone(), price);
                }
                Err(e) => {
                    warn!("获取最新价格失败, 跳过: symbol={} err={}", symbol, e);
                }
            }
        }
        prices
    }
}

/// K线写入接口 (行情同步任务使用)
#[async_trait]
pub trait CandleStore: Send + Sync {
    async fn add(&self, candles: &[Candle]) -> Result<(), AppError>;
}

/// 决策日志记录 (展示/审计用, 写入失败不影响周期)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionLogRecord {
    pub id: Uuid,
    pub agent_id: Uuid,
    pub created_at: DateTime<Utc>,
    /// BUY / SELL / HOLD
    pub action: String,
    pub asset_symbol: Option<String>,
    pub quantity: Option<Decimal>,
    pub rationale: String,
    pub cited_rule_ids: Vec<String>,
    pub portfolio_value_before: Decimal,
    pub portfolio_value_after: Decimal,
}

/// 决策日志仓储接口
#[async_trait]
pub trait DecisionLogRepository: Send + Sync {
    async fn append(&self, record: &DecisionLogRecord) -> Result<(), AppError>;
}
