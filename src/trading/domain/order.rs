//! 交易订单值对象

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// 交易方向
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TradeSide {
    Buy,
    Sell,
    Hold,
}

impl TradeSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            TradeSide::Buy => "BUY",
            TradeSide::Sell => "SELL",
            TradeSide::Hold => "HOLD",
        }
    }

    pub fn from_str_loose(s: &str) -> TradeSide {
        match s.trim().to_uppercase().as_str() {
            "BUY" => TradeSide::Buy,
            "SELL" => TradeSide::Sell,
            _ => TradeSide::Hold,
        }
    }
}

/// 交易订单
///
/// 构造后不可变; 调整/校验产生的是新订单值, 绝不修改原订单
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeOrder {
    /// 资产符号 (统一大写)
    pub asset_symbol: String,
    pub side: TradeSide,
    /// Buy/Sell 时必须为正
    pub quantity: Decimal,
    /// 限价, 为空时按最新市价成交
    pub limit_price: Option<Decimal>,
}

impl TradeOrder {
    pub fn new(asset_symbol: impl Into<String>, side: TradeSide, quantity: Decimal) -> Self {
        Self {
            asset_symbol: asset_symbol.into().to_uppercase(),
            side,
            quantity,
            limit_price: None,
        }
    }

    /// 生成数量被调整后的新订单
    pub fn with_quantity(&self, quantity: Decimal) -> Self {
        Self {
            asset_symbol: self.asset_symbol.clone(),
            side: self.side,
            quantity,
            limit_price: self.limit_price,
        }
    }

    /// 名义价值 = 数量 × 价格
    pub fn notional(&self, price: Decimal) -> Decimal {
        self.quantity * price
    }
}
