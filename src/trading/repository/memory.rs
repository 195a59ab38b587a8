//! 内存仓储实现 (LOCAL 模式与测试)
//!
//! 与 MySQL 实现遵循完全相同的接口语义, 包括决策提交的原子性

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::error::AppError;
use crate::trading::domain::{Agent, Candle, EquitySnapshot, Portfolio, Trade};
use crate::trading::repository::{
    AgentRepository, CandleStore, DecisionLogRecord, DecisionLogRepository,
    EquitySnapshotRepository, MarketDataFeed, PortfolioRepository, TradeRepository,
};

#[derive(Default)]
struct Inner {
    agents: HashMap<Uuid, Agent>,
    /// agent_id -> portfolio
    portfolios: HashMap<Uuid, Portfolio>,
    trades: Vec<Trade>,
    /// portfolio_id -> 快照, 按捕获时间追加
    snapshots: HashMap<Uuid, Vec<EquitySnapshot>>,
    /// symbol -> K线, 最新在前
    candles: HashMap<String, Vec<Candle>>,
    decision_logs: Vec<DecisionLogRecord>,
}

/// 全内存存储, 所有仓储接口的单一实现
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_agent(&self, agent: Agent) {
        self.inner.write().unwrap().agents.insert(agent.id, agent);
    }

    /// 设置某资产的最新价格 (生成一根只有收盘价的K线)
    pub fn set_price(&self, symbol: &str, price: Decimal) {
        let candle = Candle {
            asset_symbol: symbol.to_uppercase(),
            ts: Utc::now(),
            open: price,
            high: price,
            low: price,
            close: price,
            volume: Decimal::ZERO,
        };
        self.push_candle(candle);
    }

    pub fn push_candle(&self, candle: Candle) {
        let mut inner = self.inner.write().unwrap();
        let list = inner
            .candles
            .entry(candle.asset_symbol.to_uppercase())
            .or_default();
        list.insert(0, candle);
    }

    pub fn decision_log_count(&self) -> usize {
        self.inner.read().unwrap().decision_logs.len()
    }
}

#[async_trait]
impl AgentRepository for MemoryStore {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Agent>, AppError> {
        Ok(self.inner.read().unwrap().agents.get(&id).cloned())
    }

    async fn list_active(&self) -> Result<Vec<Agent>, AppError> {
        Ok(self
            .inner
            .read()
            .unwrap()
            .agents
            .values()
            .filter(|a| a.is_active)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl PortfolioRepository for MemoryStore {
    async fn find_by_agent(&self, agent_id: Uuid) -> Result<Option<Portfolio>, AppError> {
        Ok(self.inner.read().unwrap().portfolios.get(&agent_id).cloned())
    }

    async fn create(&self, portfolio: &Portfolio) -> Result<(), AppError> {
        self.inner
            .write()
            .unwrap()
            .portfolios
            .insert(portfolio.agent_id, portfolio.clone());
        Ok(())
    }

    async fn commit_applied_decision(
        &self,
        portfolio: &Portfolio,
        trades: &[Trade],
    ) -> Result<(), AppError> {
        // 单个写锁内完成全部替换, 对读方等价于一个事务
        let mut inner = self.inner.write().unwrap();
        inner
            .portfolios
            .insert(portfolio.agent_id, portfolio.clone());
        inner.trades.extend_from_slice(trades);
        Ok(())
    }
}

#[async_trait]
impl TradeRepository for MemoryStore {
    async fn list_by_portfolio(&self, portfolio_id: Uuid) -> Result<Vec<Trade>, AppError> {
        let mut trades: Vec<Trade> = self
            .inner
            .read()
            .unwrap()
            .trades
            .iter()
            .filter(|t| t.portfolio_id == portfolio_id)
            .cloned()
            .collect();
        trades.sort_by_key(|t| t.executed_at);
        Ok(trades)
    }
}

#[async_trait]
impl EquitySnapshotRepository for MemoryStore {
    async fn append(&self, snapshot: &EquitySnapshot) -> Result<(), AppError> {
        self.inner
            .write()
            .unwrap()
            .snapshots
            .entry(snapshot.portfolio_id)
            .or_default()
            .push(snapshot.clone());
        Ok(())
    }

    async fn latest(&self, portfolio_id: Uuid) -> Result<Option<EquitySnapshot>, AppError> {
        Ok(self
            .inner
            .read()
            .unwrap()
            .snapshots
            .get(&portfolio_id)
            .and_then(|list| list.last().cloned()))
    }

    async fn list_by_portfolio(
        &self,
        portfolio_id: Uuid,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Result<Vec<EquitySnapshot>, AppError> {
        let inner = self.inner.read().unwrap();
        let mut list: Vec<EquitySnapshot> = inner
            .snapshots
            .get(&portfolio_id)
            .map(|l| l.to_vec())
            .unwrap_or_default();
        if let Some(from) = from {
            list.retain(|s| s.captured_at >= from);
        }
        if let Some(to) = to {
            list.retain(|s| s.captured_at <= to);
        }
        list.sort_by_key(|s| s.captured_at);
        Ok(list)
    }
}

#[async_trait]
impl MarketDataFeed for MemoryStore {
    async fn latest_price(&self, symbol: &str) -> Result<Decimal, AppError> {
        let symbol = symbol.to_uppercase();
        let inner = self.inner.read().unwrap();
        let price = inner
            .candles
            .get(&symbol)
            .and_then(|list| list.first())
            .map(|c| c.close);
        match price {
            Some(p) if p > Decimal::ZERO => Ok(p),
            _ => Err(AppError::MarketDataError(format!("无可用价格: {}", symbol))),
        }
    }

    async fn latest_candles(&self, symbol: &str, count: usize) -> Result<Vec<Candle>, AppError> {
        let symbol = symbol.to_uppercase();
        let inner = self.inner.read().unwrap();
        Ok(inner
            .candles
            .get(&symbol)
            .map(|list| list.iter().take(count).cloned().collect())
            .unwrap_or_default())
    }
}

#[async_trait]
impl CandleStore for MemoryStore {
    async fn add(&self, candles: &[Candle]) -> Result<(), AppError> {
        for candle in candles {
            self.push_candle(candle.clone());
        }
        Ok(())
    }
}

#[async_trait]
impl DecisionLogRepository for MemoryStore {
    async fn append(&self, record: &DecisionLogRecord) -> Result<(), AppError> {
        self.inner.write().unwrap().decision_logs.push(record.clone());
        Ok(())
    }
}
