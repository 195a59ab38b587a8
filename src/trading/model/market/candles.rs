use async_trait::async_trait;
use rbatis::{crud, impl_select, RBatis};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::app_config::db;
use crate::error::AppError;
use crate::time_util;
use crate::trading::domain::Candle;
use crate::trading::model::convert::{parse_decimal, parse_ts};
use crate::trading::repository::{CandleStore, MarketDataFeed};

/// table
#[derive(Serialize, Deserialize, Debug)]
#[serde(rename_all = "snake_case")]
pub struct CandleEntity {
    pub asset_symbol: String,
    pub ts: i64,
    pub open: String,
    pub high: String,
    pub low: String,
    pub close: String,
    pub volume: String,
}

crud!(CandleEntity {}, "market_candles");
impl_select!(CandleEntity{select_recent(asset_symbol:&str, count:i64) =>
    "`where asset_symbol = #{asset_symbol} order by ts desc limit #{count}`"}, "market_candles");

impl CandleEntity {
    pub fn to_domain(&self) -> Result<Candle, AppError> {
        Ok(Candle {
            asset_symbol: self.asset_symbol.clone(),
            ts: parse_ts(self.ts)?,
            open: parse_decimal(&self.open)?,
            high: parse_decimal(&self.high)?,
            low: parse_decimal(&self.low)?,
            close: parse_decimal(&self.close)?,
            volume: parse_decimal(&self.volume)?,
        })
    }

    pub fn from_domain(candle: &Candle) -> Self {
        Self {
            asset_symbol: candle.asset_symbol.clone(),
            ts: time_util::datetime_to_ts(&candle.ts),
            open: candle.open.to_string(),
            high: candle.high.to_string(),
            low: candle.low.to_string(),
            close: candle.close.to_string(),
            volume: candle.volume.to_string(),
        }
    }
}

/// K线表访问 + 数据库侧行情源
pub struct CandlesModel {
    db: &'static RBatis,
}

impl CandlesModel {
    pub fn new() -> Self {
        Self {
            db: db::get_db_client(),
        }
    }

}

#[async_trait]
impl CandleStore for CandlesModel {
    async fn add(&self, candles: &[Candle]) -> Result<(), AppError> {
        let rows: Vec<CandleEntity> = candles.iter().map(CandleEntity::from_domain).collect();
        if rows.is_empty() {
            return Ok(());
        }
        CandleEntity::insert_batch(self.db, &rows, rows.len() as u64).await?;
        Ok(())
    }
}

impl Default for CandlesModel {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MarketDataFeed for CandlesModel {
    async fn latest_price(&self, symbol: &str) -> Result<Decimal, AppError> {
        let symbol = symbol.to_uppercase();
        let rows = CandleEntity::select_recent(self.db, &symbol, 1).await?;
        match rows.first() {
            Some(row) => {
                let close = parse_decimal(&row.close)?;
                if close > Decimal::ZERO {
                    Ok(close)
                } else {
                    Err(AppError::MarketDataError(format!("无可用价格: {}", symbol)))
                }
            }
            None => Err(AppError::MarketDataError(format!("无可用价格: {}", symbol))),
        }
    }

    async fn latest_candles(&self, symbol: &str, count: usize) -> Result<Vec<Candle>, AppError> {
        let symbol = symbol.to_uppercase();
        let rows = CandleEntity::select_recent(self.db, &symbol, count as i64).await?;
        rows.iter().map(|e| e.to_domain()).collect()
    }
}
