use async_trait::async_trait;
use rbatis::{crud, impl_select, RBatis};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::app_config::db;
use crate::error::AppError;
use crate::trading::domain::{Portfolio, Position, Trade};
use crate::trading::model::convert::{parse_decimal, parse_uuid};
use crate::trading::model::trade::TradeEntity;
use crate::trading::repository::PortfolioRepository;

/// table
#[derive(Serialize, Deserialize, Debug)]
#[serde(rename_all = "snake_case")]
pub struct PortfolioEntity {
    pub id: String,
    pub agent_id: String,
    pub cash: String,
    pub base_currency: String,
}

/// table
#[derive(Serialize, Deserialize, Debug)]
#[serde(rename_all = "snake_case")]
pub struct PositionEntity {
    pub id: String,
    pub portfolio_id: String,
    pub symbol: String,
    pub quantity: String,
    pub average_entry_price: String,
}

crud!(PortfolioEntity {}, "portfolios");
impl_select!(PortfolioEntity{select_by_agent(agent_id:&str) =>
    "`where agent_id = #{agent_id} limit 1`"}, "portfolios");

crud!(PositionEntity {}, "positions");
impl_select!(PositionEntity{select_by_portfolio(portfolio_id:&str) =>
    "`where portfolio_id = #{portfolio_id}`"}, "positions");

impl PortfolioEntity {
    pub fn from_domain(portfolio: &Portfolio) -> Self {
        Self {
            id: portfolio.id.to_string(),
            agent_id: portfolio.agent_id.to_string(),
            cash: portfolio.cash.to_string(),
            base_currency: portfolio.base_currency.clone(),
        }
    }
}

impl PositionEntity {
    pub fn from_domain(portfolio_id: Uuid, position: &Position) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            portfolio_id: portfolio_id.to_string(),
            symbol: position.symbol.clone(),
            quantity: position.quantity.to_string(),
            average_entry_price: position.average_entry_price.to_string(),
        }
    }

    pub fn to_domain(&self) -> Result<Position, AppError> {
        Ok(Position {
            symbol: self.symbol.clone(),
            quantity: parse_decimal(&self.quantity)?,
            average_entry_price: parse_decimal(&self.average_entry_price)?,
        })
    }
}

pub struct PortfolioModel {
    db: &'static RBatis,
}

impl PortfolioModel {
    pub fn new() -> Self {
        Self {
            db: db::get_db_client(),
        }
    }
}

impl Default for PortfolioModel {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PortfolioRepository for PortfolioModel {
    async fn find_by_agent(&self, agent_id: Uuid) -> Result<Option<Portfolio>, AppError> {
        let rows = PortfolioEntity::select_by_agent(self.db, &agent_id.to_string()).await?;
        let entity = match rows.first() {
            Some(e) => e,
            None => return Ok(None),
        };

        let position_rows = PositionEntity::select_by_portfolio(self.db, &entity.id).await?;
        let positions = position_rows
            .iter()
            .map(|p| p.to_domain())
            .collect::<Result<Vec<Position>, AppError>>()?;

        Ok(Some(Portfolio {
            id: parse_uuid(&entity.id)?,
            agent_id: parse_uuid(&entity.agent_id)?,
            cash: parse_decimal(&entity.cash)?,
            base_currency: entity.base_currency.clone(),
            positions,
        }))
    }

    async fn create(&self, portfolio: &Portfolio) -> Result<(), AppError> {
        let entity = PortfolioEntity::from_domain(portfolio);
        PortfolioEntity::insert(self.db, &entity).await?;
        Ok(())
    }

    async fn commit_applied_decision(
        &self,
        portfolio: &Portfolio,
        trades: &[Trade],
    ) -> Result<(), AppError> {
        let mut tx = self.db.acquire_begin().await?;

        let result: Result<(), rbatis::Error> = async {
            let entity = PortfolioEntity::from_domain(portfolio);
            PortfolioEntity::update_by_column(&tx, &entity, "id").await?;

            // 持仓整表替换: 删除旧行后写入当前持仓, 清仓的资产自然消失
            PositionEntity::delete_by_column(&tx, "portfolio_id", portfolio.id.to_string())
                .await?;
            let position_rows: Vec<PositionEntity> = portfolio
                .positions
                .iter()
                .map(|p| PositionEntity::from_domain(portfolio.id, p))
                .collect();
            if !position_rows.is_empty() {
                PositionEntity::insert_batch(&tx, &position_rows, position_rows.len() as u64)
                    .await?;
            }

            let trade_rows: Vec<TradeEntity> =
                trades.iter().map(TradeEntity::from_domain).collect();
            if !trade_rows.is_empty() {
                TradeEntity::insert_batch(&tx, &trade_rows, trade_rows.len() as u64).await?;
            }
            Ok(())
        }
        .await;

        match result {
            Ok(()) => {
                tx.commit().await?;
                Ok(())
            }
            Err(e) => {
                let _ = tx.rollback().await;
                Err(AppError::DbError(e.to_string()))
            }
        }
    }
}
