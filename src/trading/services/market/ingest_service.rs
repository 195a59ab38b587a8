//! 行情数据同步
//!
//! 从外部HTTP数据源拉取K线写入存储。
//! 单个资产失败 (重试后) 只记录并跳过, 绝不中断整批同步。

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::Decimal;
use tokio_retry::strategy::FixedInterval;
use tokio_retry::Retry;
use tracing::{info, warn};

use crate::app_config::env::env_or_default;
use crate::error::AppError;
use crate::time_util;
use crate::trading::domain::Candle;
use crate::trading::repository::CandleStore;

/// 外部行情数据源接口
#[async_trait]
pub trait ExternalMarketDataClient: Send + Sync {
    /// 拉取某资产的最近K线, 最新在前
    async fn fetch_latest_candles(
        &self,
        symbol: &str,
        count: usize,
    ) -> Result<Vec<Candle>, AppError>;
}

/// CoinGecko 风格的 OHLC 接口客户端
pub struct HttpMarketDataClient {
    client: reqwest::Client,
    base_url: String,
    /// symbol → 数据源侧的资产ID (如 BTC → bitcoin)
    external_ids: HashMap<String, String>,
}

impl HttpMarketDataClient {
    pub fn new(base_url: impl Into<String>, external_ids: HashMap<String, String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            external_ids,
        }
    }

    pub fn from_env() -> Self {
        let base_url = env_or_default("MARKET_DATA_BASE_URL", "https://api.coingecko.com/api/v3");
        let mut external_ids = HashMap::new();
        external_ids.insert("BTC".to_string(), "bitcoin".to_string());
        external_ids.insert("ETH".to_string(), "ethereum".to_string());
        Self::new(base_url, external_ids)
    }

    fn parse_ohlc_row(symbol: &str, row: &[serde_json::Value]) -> Option<Candle> {
        let ts = row.first()?.as_i64()?;
        let mut values = Vec::with_capacity(4);
        for v in row.iter().skip(1).take(4) {
            values.push(Decimal::from_str(&v.to_string()).ok()?);
        }
        Some(Candle {
            asset_symbol: symbol.to_string(),
            ts: time_util::ts_to_datetime(ts)?,
            open: values[0],
            high: values[1],
            low: values[2],
            close: values[3],
            volume: Decimal::ZERO,
        })
    }
}

#[async_trait]
impl ExternalMarketDataClient for HttpMarketDataClient {
    async fn fetch_latest_candles(
        &self,
        symbol: &str,
        count: usize,
    ) -> Result<Vec<Candle>, AppError> {
        let symbol = symbol.to_uppercase();
        let external_id = self
            .external_ids
            .get(&symbol)
            .ok_or_else(|| AppError::MarketDataError(format!("未配置外部资产ID: {}", symbol)))?;

        let url = format!("{}/coins/{}/ohlc?vs_currency=usd&days=1", self.base_url, external_id);
        let response = self
            .client
            .get(&url)
            .timeout(Duration::from_secs(20))
            .send()
            .await
            .map_err(|e| AppError::MarketDataError(e.to_string()))?;

        if !response.status().is_success() {
            return Err(AppError::MarketDataError(format!(
                "行情接口返回 {}: {}",
                response.status(),
                symbol
            )));
        }

        let rows: Vec<Vec<serde_json::Value>> = response
            .json()
            .await
            .map_err(|e| AppError::MarketDataError(e.to_string()))?;

        let mut candles: Vec<Candle> = rows
            .iter()
            .filter_map(|row| Self::parse_ohlc_row(&symbol, row))
            .collect();
        // 最新在前
        candles.sort_by(|a, b| b.ts.cmp(&a.ts));
        candles.truncate(count);
        Ok(candles)
    }
}

/// 同步服务: 外部源 → K线存储
pub struct MarketDataIngestService {
    client: Arc<dyn ExternalMarketDataClient>,
    store: Arc<dyn CandleStore>,
}

impl MarketDataIngestService {
    pub fn new(client: Arc<dyn ExternalMarketDataClient>, store: Arc<dyn CandleStore>) -> Self {
        Self { client, store }
    }

    /// 同步一批资产, 返回成功写入的K线数
    pub async fn ingest_all(&self, symbols: &[String], count: usize) -> Result<usize, AppError> {
        let mut total = 0;
        for symbol in symbols {
            let strategy = FixedInterval::from_millis(500).take(2);
            let fetched = Retry::spawn(strategy, || {
                self.client.fetch_latest_candles(symbol, count)
            })
            .await;

            match fetched {
                Ok(candles) => {
                    self.store.add(&candles).await?;
                    total += candles.len();
                }
                Err(e) => {
                    warn!("同步行情失败, 跳过: symbol={} err={}", symbol, e);
                }
            }
        }
        info!("行情同步完成: {} 根K线", total);
        Ok(total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn parses_ohlc_row() {
        let row: Vec<serde_json::Value> = serde_json::from_str(
            "[1700000000000, 42000.5, 43000, 41000, 42500]",
        )
        .unwrap();
        let candle = HttpMarketDataClient::parse_ohlc_row("BTC", &row).unwrap();
        assert_eq!(candle.asset_symbol, "BTC");
        assert_eq!(candle.open, dec!(42000.5));
        assert_eq!(candle.close, dec!(42500));
    }

    #[test]
    fn malformed_row_is_skipped() {
        let row: Vec<serde_json::Value> = serde_json::from_str("[\"bad\"]").unwrap();
        assert!(HttpMarketDataClient::parse_ohlc_row("BTC", &row).is_none());
    }
}
