use std::collections::HashSet;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::app_config::env::{env_decimal_or, env_is_true, env_list_or, env_usize_or};

/// 服务端风控配置
///
/// 无论外部决策源提出什么订单, 这些约束都会被强制执行
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskConfig {
    /// 单一资产占组合总值的最大比例 (0.50 = 50%)
    pub max_position_size_percent: Decimal,

    /// 必须保持流动的最低现金额
    pub min_cash_reserve: Decimal,

    /// 单笔交易的最大名义价值
    pub max_single_trade_value: Decimal,

    /// 订单被接受的最低名义价值 (防尘单)
    pub min_order_value: Decimal,

    /// 允许交易的资产白名单
    pub allowed_assets: HashSet<String>,

    /// 单个执行周期允许提交的最大订单数
    pub max_orders_per_cycle: usize,

    /// 是否允许做空/杠杆
    pub allow_leverage: bool,

    /// 最大滑点比例 (预留, 暂未执行)
    pub max_slippage_percent: Decimal,

    /// 组合初始资金
    pub starting_cash: Decimal,
}

impl RiskConfig {
    /// 从环境变量加载, 缺省值与服务端默认策略一致
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_position_size_percent: env_decimal_or(
                "RISK_MAX_POSITION_SIZE_PERCENT",
                defaults.max_position_size_percent,
            ),
            min_cash_reserve: env_decimal_or("RISK_MIN_CASH_RESERVE", defaults.min_cash_reserve),
            max_single_trade_value: env_decimal_or(
                "RISK_MAX_SINGLE_TRADE_VALUE",
                defaults.max_single_trade_value,
            ),
            min_order_value: env_decimal_or("RISK_MIN_ORDER_VALUE", defaults.min_order_value),
            allowed_assets: env_list_or("RISK_ALLOWED_ASSETS", &["BTC", "ETH"])
                .into_iter()
                .collect(),
            max_orders_per_cycle: env_usize_or("RISK_MAX_ORDERS_PER_CYCLE", 5),
            allow_leverage: env_is_true("RISK_ALLOW_LEVERAGE", false),
            max_slippage_percent: env_decimal_or(
                "RISK_MAX_SLIPPAGE_PERCENT",
                defaults.max_slippage_percent,
            ),
            starting_cash: env_decimal_or("RISK_STARTING_CASH", defaults.starting_cash),
        }
    }
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            max_position_size_percent: Decimal::new(50, 2), // 0.50
            min_cash_reserve: Decimal::from(100),
            max_single_trade_value: Decimal::from(5_000),
            min_order_value: Decimal::from(10),
            allowed_assets: ["BTC", "ETH"].iter().map(|s| s.to_string()).collect(),
            max_orders_per_cycle: 5,
            allow_leverage: false,
            max_slippage_percent: Decimal::new(2, 2), // 0.02
            starting_cash: Decimal::from(100_000),
        }
    }
}
