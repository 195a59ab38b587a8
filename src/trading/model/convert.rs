//! 实体与领域类型之间的转换辅助
//!
//! 金额/数量列在库里统一存为字符串, 读出时解析为 Decimal,
//! 避免浮点误差进入账本

use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::error::AppError;
use crate::time_util;

pub fn parse_uuid(raw: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(raw).map_err(|e| AppError::DbError(format!("非法UUID '{}': {}", raw, e)))
}

pub fn parse_decimal(raw: &str) -> Result<Decimal, AppError> {
    Decimal::from_str(raw).map_err(|e| AppError::DbError(format!("非法Decimal '{}': {}", raw, e)))
}

pub fn parse_ts(ts_millis: i64) -> Result<DateTime<Utc>, AppError> {
    time_util::ts_to_datetime(ts_millis)
        .ok_or_else(|| AppError::DbError(format!("非法时间戳: {}", ts_millis)))
}
