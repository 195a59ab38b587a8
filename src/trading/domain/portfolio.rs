//! 组合与持仓

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 持仓
///
/// 同一组合内 symbol 唯一; 完全清仓后持仓被移除,
/// 重新买入时均价历史不会复活
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub symbol: String,

    /// 持仓数量 (除非允许杠杆, 否则 ≥ 0)
    pub quantity: Decimal,

    /// 加权平均开仓价
    pub average_entry_price: Decimal,
}

/// 组合账本状态 (持久化侧)
///
/// 仅 PortfolioLedger 允许修改
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Portfolio {
    pub id: Uuid,
    pub agent_id: Uuid,
    pub cash: Decimal,
    pub base_currency: String,
    pub positions: Vec<Position>,
}

impl Portfolio {
    pub fn new(agent_id: Uuid, starting_cash: Decimal) -> Self {
        Self {
            id: Uuid::new_v4(),
            agent_id,
            cash: starting_cash,
            base_currency: "USD".to_string(),
            positions: Vec::new(),
        }
    }

    pub fn position(&self, symbol: &str) -> Option<&Position> {
        self.positions.iter().find(|p| p.symbol == symbol)
    }
}

/// 按当前市价估值后的组合快照视图
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortfolioState {
    pub portfolio_id: Uuid,
    pub agent_id: Uuid,
    pub cash: Decimal,
    pub positions: Vec<PositionSnapshot>,
    pub as_of: DateTime<Utc>,
    /// 总值 = 现金 + Σ(数量 × 现价)
    pub total_value: Decimal,
}

/// 带现价的持仓视图 (现价由外部行情提供, 不属于持仓本身)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionSnapshot {
    pub asset_symbol: String,
    pub quantity: Decimal,
    pub average_price: Decimal,
    pub current_price: Decimal,
}

impl PositionSnapshot {
    /// 持仓市值
    pub fn market_value(&self) -> Decimal {
        self.quantity * self.current_price
    }

    /// 未实现盈亏 = 数量 × (现价 - 均价)
    pub fn unrealized_pnl(&self) -> Decimal {
        self.quantity * (self.current_price - self.average_price)
    }
}
