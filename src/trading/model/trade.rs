use async_trait::async_trait;
use rbatis::{crud, impl_select, RBatis};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::app_config::db;
use crate::error::AppError;
use crate::time_util;
use crate::trading::domain::{Trade, TradeSide};
use crate::trading::model::convert::{parse_decimal, parse_ts, parse_uuid};
use crate::trading::repository::TradeRepository;

/// table
#[derive(Serialize, Deserialize, Debug)]
#[serde(rename_all = "snake_case")]
pub struct TradeEntity {
    pub id: String,
    pub portfolio_id: String,
    pub asset_symbol: String,
    pub executed_at: i64,
    pub quantity: String,
    pub price: String,
    pub side: String,
}

crud!(TradeEntity {}, "trades");
impl_select!(TradeEntity{select_by_portfolio(portfolio_id:&str) =>
    "`where portfolio_id = #{portfolio_id} order by executed_at asc`"}, "trades");

impl TradeEntity {
    pub fn to_domain(&self) -> Result<Trade, AppError> {
        Ok(Trade {
            id: parse_uuid(&self.id)?,
            portfolio_id: parse_uuid(&self.portfolio_id)?,
            asset_symbol: self.asset_symbol.clone(),
            executed_at: parse_ts(self.executed_at)?,
            quantity: parse_decimal(&self.quantity)?,
            price: parse_decimal(&self.price)?,
            side: TradeSide::from_str_loose(&self.side),
        })
    }

    pub fn from_domain(trade: &Trade) -> Self {
        Self {
            id: trade.id.to_string(),
            portfolio_id: trade.portfolio_id.to_string(),
            asset_symbol: trade.asset_symbol.clone(),
            executed_at: time_util::datetime_to_ts(&trade.executed_at),
            quantity: trade.quantity.to_string(),
            price: trade.price.to_string(),
            side: trade.side.as_str().to_string(),
        }
    }
}

pub struct TradeModel {
    db: &'static RBatis,
}

impl TradeModel {
    pub fn new() -> Self {
        Self {
            db: db::get_db_client(),
        }
    }
}

impl Default for TradeModel {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TradeRepository for TradeModel {
    async fn list_by_portfolio(&self, portfolio_id: Uuid) -> Result<Vec<Trade>, AppError> {
        let rows = TradeEntity::select_by_portfolio(self.db, &portfolio_id.to_string()).await?;
        rows.iter().map(|e| e.to_domain()).collect()
    }
}
