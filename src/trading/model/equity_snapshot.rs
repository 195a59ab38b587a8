use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rbatis::{crud, impl_select, RBatis};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::app_config::db;
use crate::error::AppError;
use crate::time_util;
use crate::trading::domain::EquitySnapshot;
use crate::trading::model::convert::{parse_decimal, parse_ts, parse_uuid};
use crate::trading::repository::EquitySnapshotRepository;

/// table
#[derive(Serialize, Deserialize, Debug)]
#[serde(rename_all = "snake_case")]
pub struct EquitySnapshotEntity {
    pub id: String,
    pub portfolio_id: String,
    pub captured_at: i64,
    pub total_value: String,
    pub cash_value: String,
    pub positions_value: String,
    pub unrealized_pnl: String,
    pub percent_change: String,
}

crud!(EquitySnapshotEntity {}, "equity_snapshots");
impl_select!(EquitySnapshotEntity{select_by_portfolio(portfolio_id:&str) =>
    "`where portfolio_id = #{portfolio_id} order by captured_at asc`"}, "equity_snapshots");
impl_select!(EquitySnapshotEntity{select_latest(portfolio_id:&str) =>
    "`where portfolio_id = #{portfolio_id} order by captured_at desc limit 1`"}, "equity_snapshots");

impl EquitySnapshotEntity {
    pub fn to_domain(&self) -> Result<EquitySnapshot, AppError> {
        Ok(EquitySnapshot {
            id: parse_uuid(&self.id)?,
            portfolio_id: parse_uuid(&self.portfolio_id)?,
            captured_at: parse_ts(self.captured_at)?,
            total_value: parse_decimal(&self.total_value)?,
            cash_value: parse_decimal(&self.cash_value)?,
            positions_value: parse_decimal(&self.positions_value)?,
            unrealized_pnl: parse_decimal(&self.unrealized_pnl)?,
            percent_change: parse_decimal(&self.percent_change)?,
        })
    }

    pub fn from_domain(snapshot: &EquitySnapshot) -> Self {
        Self {
            id: snapshot.id.to_string(),
            portfolio_id: snapshot.portfolio_id.to_string(),
            captured_at: time_util::datetime_to_ts(&snapshot.captured_at),
            total_value: snapshot.total_value.to_string(),
            cash_value: snapshot.cash_value.to_string(),
            positions_value: snapshot.positions_value.to_string(),
            unrealized_pnl: snapshot.unrealized_pnl.to_string(),
            percent_change: snapshot.percent_change.to_string(),
        }
    }
}

pub struct EquitySnapshotModel {
    db: &'static RBatis,
}

impl EquitySnapshotModel {
    pub fn new() -> Self {
        Self {
            db: db::get_db_client(),
        }
    }
}

impl Default for EquitySnapshotModel {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EquitySnapshotRepository for EquitySnapshotModel {
    async fn append(&self, snapshot: &EquitySnapshot) -> Result<(), AppError> {
        let entity = EquitySnapshotEntity::from_domain(snapshot);
        EquitySnapshotEntity::insert(self.db, &entity).await?;
        Ok(())
    }

    async fn latest(&self, portfolio_id: Uuid) -> Result<Option<EquitySnapshot>, AppError> {
        let rows =
            EquitySnapshotEntity::select_latest(self.db, &portfolio_id.to_string()).await?;
        rows.first().map(|e| e.to_domain()).transpose()
    }

    async fn list_by_portfolio(
        &self,
        portfolio_id: Uuid,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Result<Vec<EquitySnapshot>, AppError> {
        let rows =
            EquitySnapshotEntity::select_by_portfolio(self.db, &portfolio_id.to_string()).await?;
        let mut snapshots = rows
            .iter()
            .map(|e| e.to_domain())
            .collect::<Result<Vec<EquitySnapshot>, AppError>>()?;
        if let Some(from) = from {
            snapshots.retain(|s| s.captured_at >= from);
        }
        if let Some(to) = to {
            snapshots.retain(|s| s.captured_at <= to);
        }
        Ok(snapshots)
    }
}
