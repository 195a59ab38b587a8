//! 成交记录

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::order::TradeSide;

/// 已执行订单的审计记录, 只追加不修改
///
/// 每个真正写入账本的订单都会产生一条成交记录;
/// 被拒绝或被调整掉的数量不会
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trade {
    pub id: Uuid,
    pub portfolio_id: Uuid,
    pub asset_symbol: String,
    pub executed_at: DateTime<Utc>,
    pub quantity: Decimal,
    /// 成交价 (限价优先, 否则校验时使用的市价)
    pub price: Decimal,
    pub side: TradeSide,
}
