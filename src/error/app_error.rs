use rust_decimal::Decimal;
use thiserror::Error;
use uuid::Uuid;

/// 应用错误
#[derive(Error, Debug)]
pub enum AppError {
    /// 代理不存在 (致命: 周期在任何副作用前中止)
    #[error("代理不存在: {0}")]
    AgentNotFound(Uuid),

    /// 代理未激活 (致命: 周期在任何副作用前中止)
    #[error("代理未激活: {0}")]
    AgentInactive(Uuid),

    /// 买入时现金不足, 整个决策回滚
    #[error("现金不足: 需要 {required}, 可用 {available}")]
    InsufficientFunds {
        required: Decimal,
        available: Decimal,
    },

    /// 卖出时持仓不足, 整个决策回滚
    #[error("持仓不足: {symbol} 请求 {requested}, 持有 {held}")]
    InsufficientPosition {
        symbol: String,
        requested: Decimal,
        held: Decimal,
    },

    /// 执行周期被取消
    #[error("执行周期已取消")]
    Cancelled,

    /// 行情数据错误
    #[error("行情数据错误: {0}")]
    MarketDataError(String),

    /// 数据库错误
    #[error("数据库错误: {0}")]
    DbError(String),

    /// 配置错误
    #[error("配置错误: {0}")]
    ConfigError(String),
}

impl From<rbatis::Error> for AppError {
    fn from(err: rbatis::Error) -> Self {
        AppError::DbError(err.to_string())
    }
}
