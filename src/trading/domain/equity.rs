//! 权益快照与绩效指标

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 某一时点的组合权益快照, 写入后不可变
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EquitySnapshot {
    pub id: Uuid,
    pub portfolio_id: Uuid,
    pub captured_at: DateTime<Utc>,
    /// 总值 = 现金 + 持仓市值
    pub total_value: Decimal,
    pub cash_value: Decimal,
    /// Σ(数量 × 现价)
    pub positions_value: Decimal,
    /// Σ(数量 × (现价 - 均价))
    pub unrealized_pnl: Decimal,
    /// 相对上一个快照的涨跌幅 (%), 历史首个快照为 0
    pub percent_change: Decimal,
}

/// 由快照/成交历史推导的绩效指标
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    pub agent_id: Uuid,
    /// 首个快照的总值, 无历史时为配置的初始资金
    pub initial_value: Decimal,
    pub current_value: Decimal,
    pub total_return: Decimal,
    pub percent_return: Decimal,
    /// 全量快照序列上的最大回撤 (%)
    pub max_drawdown: Decimal,
    pub total_trades: usize,
    pub winning_trades: usize,
    pub losing_trades: usize,
    /// 胜率 = 盈利成交 / 总成交 × 100
    pub win_rate: Decimal,
    pub calculated_at: DateTime<Utc>,
}
