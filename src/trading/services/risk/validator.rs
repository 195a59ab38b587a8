//! 服务端风控校验
//!
//! 无论外部决策源提出什么, 这里独立地逐单执行约束:
//! 白名单 → 数量为正 → 价格可用 → 最低名义价值 → 方向逻辑,
//! 命中第一条拒绝规则即短路。
//!
//! 多单校验是贪心且顺序敏感的: 以真实组合为种子维护一份模拟状态,
//! 每个存活订单先更新模拟状态, 后续订单再基于新状态校验。
//! 整个过程是一个显式折叠 `(state, order) → (state', outcome)`,
//! 而不是隐式的共享可变字典。

use std::collections::HashMap;

use rust_decimal::Decimal;
use tracing::{info, warn};

use crate::app_config::risk::RiskConfig;
use crate::trading::domain::{
    AgentDecision, PortfolioState, RejectedOrder, TradeOrder, TradeSide, ValidationOutcome,
};

/// 风控校验器
///
/// 纯函数式: 除读取传入的最新价格外没有任何 I/O
pub struct RiskValidator {
    config: RiskConfig,
}

/// 校验过程中的模拟组合状态
#[derive(Debug, Clone)]
struct SimState {
    cash: Decimal,
    /// symbol -> 模拟持仓数量
    positions: HashMap<String, Decimal>,
}

impl SimState {
    fn seed(portfolio: &PortfolioState) -> Self {
        Self {
            cash: portfolio.cash,
            positions: portfolio
                .positions
                .iter()
                .map(|p| (p.asset_symbol.to_uppercase(), p.quantity))
                .collect(),
        }
    }

    fn qty(&self, symbol: &str) -> Decimal {
        self.positions.get(symbol).copied().unwrap_or(Decimal::ZERO)
    }

    fn apply_buy(&mut self, symbol: &str, quantity: Decimal, notional: Decimal) {
        self.cash -= notional;
        *self
            .positions
            .entry(symbol.to_string())
            .or_insert(Decimal::ZERO) += quantity;
    }

    fn apply_sell(&mut self, symbol: &str, quantity: Decimal, notional: Decimal) {
        self.cash += notional;
        *self
            .positions
            .entry(symbol.to_string())
            .or_insert(Decimal::ZERO) -= quantity;
    }
}

/// 单个订单的折叠产出
#[derive(Debug, Clone)]
enum OrderOutcome {
    /// 原样通过
    Valid(TradeOrder),
    /// 数量被缩减后通过
    Adjusted(TradeOrder),
    Rejected(String),
}

impl RiskValidator {
    pub fn new(config: RiskConfig) -> Self {
        Self { config }
    }

    /// 校验一次完整决策
    ///
    /// 存活订单保留原始创建时间; 被拒订单连同原因一并返回
    pub fn validate(
        &self,
        decision: &AgentDecision,
        portfolio: &PortfolioState,
        prices: &HashMap<String, Decimal>,
    ) -> ValidationOutcome {
        let mut warnings = Vec::new();

        // 1. 截断到单周期上限, 被截断的订单不逐个拒绝, 只发一条警告
        let considered = &decision.orders[..decision
            .orders
            .len()
            .min(self.config.max_orders_per_cycle)];
        if decision.orders.len() > considered.len() {
            warn!(
                "代理 {} 提交 {} 单, 截断到上限 {}",
                decision.agent_id,
                decision.orders.len(),
                self.config.max_orders_per_cycle
            );
            warnings.push(format!(
                "submitted {} orders, truncated to {}",
                decision.orders.len(),
                self.config.max_orders_per_cycle
            ));
        }

        // 2. 以真实组合为种子折叠模拟状态
        let mut state = SimState::seed(portfolio);
        let mut valid_orders: Vec<TradeOrder> = Vec::new();
        let mut rejected: Vec<RejectedOrder> = Vec::new();
        let mut adjusted_any = false;

        for order in considered {
            let (next_state, outcome) =
                self.check_order(state, order, portfolio.total_value, prices);
            state = next_state;

            match outcome {
                OrderOutcome::Valid(o) => valid_orders.push(o),
                OrderOutcome::Adjusted(o) => {
                    info!(
                        "订单被调整: 代理={} {} {} {} → {}",
                        decision.agent_id,
                        o.asset_symbol,
                        o.side.as_str(),
                        order.quantity,
                        o.quantity
                    );
                    adjusted_any = true;
                    valid_orders.push(o);
                }
                OrderOutcome::Rejected(reason) => {
                    warn!(
                        "订单被拒绝: 代理={} {} {} {} - {}",
                        decision.agent_id,
                        order.asset_symbol,
                        order.side.as_str(),
                        order.quantity,
                        reason
                    );
                    rejected.push(RejectedOrder {
                        order: order.clone(),
                        reason,
                    });
                }
            }
        }

        let has_warnings = !rejected.is_empty() || adjusted_any || !warnings.is_empty();

        let validated = AgentDecision {
            agent_id: decision.agent_id,
            created_at: decision.created_at,
            orders: valid_orders,
            rationale: decision.rationale.clone(),
            cited_rule_ids: decision.cited_rule_ids.clone(),
        };

        info!(
            "校验完成: 代理={} 通过 {} 单, 拒绝 {} 单",
            decision.agent_id,
            validated.orders.len(),
            rejected.len()
        );

        ValidationOutcome {
            validated,
            rejected,
            warnings,
            has_warnings,
        }
    }

    /// 折叠单步: `(state, order) → (state', outcome)`
    fn check_order(
        &self,
        mut state: SimState,
        order: &TradeOrder,
        total_portfolio_value: Decimal,
        prices: &HashMap<String, Decimal>,
    ) -> (SimState, OrderOutcome) {
        let symbol = order.asset_symbol.to_uppercase();

        // a. 资产白名单
        if !self.config.allowed_assets.contains(&symbol) {
            return (
                state,
                OrderOutcome::Rejected(format!("Asset '{}' not in allowed list", symbol)),
            );
        }

        // b. 数量为正
        if order.quantity <= Decimal::ZERO {
            return (
                state,
                OrderOutcome::Rejected("Quantity must be positive".to_string()),
            );
        }

        // c. 价格可用
        let price = match prices.get(&symbol) {
            Some(p) if *p > Decimal::ZERO => *p,
            _ => {
                return (
                    state,
                    OrderOutcome::Rejected(format!("No price available for '{}'", symbol)),
                )
            }
        };

        let notional = order.quantity * price;
        let held = state.qty(&symbol);

        // d. 最低名义价值 (清仓卖出豁免)
        let full_liquidation =
            order.side == TradeSide::Sell && held > Decimal::ZERO && order.quantity >= held;
        if notional < self.config.min_order_value && !full_liquidation {
            return (
                state,
                OrderOutcome::Rejected(format!(
                    "Order value {} below minimum {}",
                    notional.round_dp(2),
                    self.config.min_order_value.round_dp(2)
                )),
            );
        }

        // e. 方向逻辑
        match order.side {
            TradeSide::Buy => {
                let outcome =
                    self.check_buy(&state, order, &symbol, price, total_portfolio_value, held);
                if let OrderOutcome::Valid(ref o) | OrderOutcome::Adjusted(ref o) = outcome {
                    state.apply_buy(&symbol, o.quantity, o.quantity * price);
                }
                (state, outcome)
            }
            TradeSide::Sell => {
                let outcome = self.check_sell(order, &symbol, price, held);
                if let OrderOutcome::Valid(ref o) | OrderOutcome::Adjusted(ref o) = outcome {
                    state.apply_sell(&symbol, o.quantity, o.quantity * price);
                }
                (state, outcome)
            }
            // Hold 始终有效, 从不调整
            TradeSide::Hold => (state, OrderOutcome::Valid(order.clone())),
        }
    }

    /// 买入: 依次按 (i)单笔名义上限 (ii)可用现金 (iii)持仓占比上限 缩减数量
    fn check_buy(
        &self,
        state: &SimState,
        order: &TradeOrder,
        symbol: &str,
        price: Decimal,
        total_portfolio_value: Decimal,
        held: Decimal,
    ) -> OrderOutcome {
        let mut adjusted_qty = order.quantity;
        let mut notional = adjusted_qty * price;
        let mut was_adjusted = false;

        // (i) 单笔名义上限
        if notional > self.config.max_single_trade_value {
            adjusted_qty = self.config.max_single_trade_value / price;
            notional = adjusted_qty * price;
            was_adjusted = true;
        }

        // (ii) 可用现金 = 现金 - 保底现金
        let usable_cash = state.cash - self.config.min_cash_reserve;
        if notional > usable_cash {
            if usable_cash <= Decimal::ZERO {
                return OrderOutcome::Rejected("Insufficient cash after reserve".to_string());
            }
            adjusted_qty = usable_cash / price;
            notional = adjusted_qty * price;
            was_adjusted = true;
        }

        // (iii) 持仓占比上限, 按缩减后的模拟持仓计算
        let max_position_value = total_portfolio_value * self.config.max_position_size_percent;
        let new_position_value = (held + adjusted_qty) * price;
        if new_position_value > max_position_value {
            let allowed_qty = max_position_value / price - held;
            if allowed_qty <= Decimal::ZERO {
                return OrderOutcome::Rejected(format!("Position limit reached for {}", symbol));
            }
            adjusted_qty = allowed_qty;
            notional = adjusted_qty * price;
            was_adjusted = true;
        }

        // 调整后复查最低名义价值: 缩水成尘单的直接拒绝
        if notional < self.config.min_order_value {
            return OrderOutcome::Rejected(format!(
                "Adjusted order value {} below minimum",
                notional.round_dp(2)
            ));
        }

        if was_adjusted {
            OrderOutcome::Adjusted(order.with_quantity(adjusted_qty))
        } else {
            OrderOutcome::Valid(order.clone())
        }
    }

    /// 卖出: 必须有持仓; 禁杠杆时超卖缩减到持仓量 (唯一允许低于最低名义价值的情形)
    fn check_sell(
        &self,
        order: &TradeOrder,
        symbol: &str,
        price: Decimal,
        held: Decimal,
    ) -> OrderOutcome {
        if held <= Decimal::ZERO {
            return OrderOutcome::Rejected(format!("No {} position to sell", symbol));
        }

        let mut adjusted_qty = order.quantity;
        let mut was_adjusted = false;

        if !self.config.allow_leverage && order.quantity > held {
            adjusted_qty = held;
            was_adjusted = true;
        }

        let notional = adjusted_qty * price;
        // 清仓豁免: 卖出整个持仓时不检查最低名义价值
        if notional < self.config.min_order_value && adjusted_qty < held {
            return OrderOutcome::Rejected(format!(
                "Order value {} below minimum {}",
                notional.round_dp(2),
                self.config.min_order_value.round_dp(2)
            ));
        }

        if was_adjusted {
            OrderOutcome::Adjusted(order.with_quantity(adjusted_qty))
        } else {
            OrderOutcome::Valid(order.clone())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    use crate::trading::domain::PositionSnapshot;

    fn prices() -> HashMap<String, Decimal> {
        let mut m = HashMap::new();
        m.insert("BTC".to_string(), dec!(42000));
        m.insert("ETH".to_string(), dec!(2500));
        m
    }

    fn portfolio(cash: Decimal, positions: Vec<PositionSnapshot>) -> PortfolioState {
        let total_value = cash
            + positions
                .iter()
                .map(|p| p.quantity * p.current_price)
                .sum::<Decimal>();
        PortfolioState {
            portfolio_id: Uuid::new_v4(),
            agent_id: Uuid::new_v4(),
            cash,
            positions,
            as_of: Utc::now(),
            total_value,
        }
    }

    fn btc_position(quantity: Decimal) -> PositionSnapshot {
        PositionSnapshot {
            asset_symbol: "BTC".to_string(),
            quantity,
            average_price: dec!(40000),
            current_price: dec!(42000),
        }
    }

    fn decision(orders: Vec<TradeOrder>) -> AgentDecision {
        AgentDecision::new(Uuid::new_v4(), orders)
    }

    fn validator() -> RiskValidator {
        RiskValidator::new(RiskConfig::default())
    }

    #[test]
    fn rejects_unknown_asset_but_validates_rest() {
        let d = decision(vec![
            TradeOrder::new("DOGE", TradeSide::Buy, dec!(100)),
            TradeOrder::new("BTC", TradeSide::Buy, dec!(0.05)),
        ]);
        let outcome = validator().validate(&d, &portfolio(dec!(100000), vec![]), &prices());

        assert!(outcome.has_warnings);
        assert_eq!(outcome.rejected.len(), 1);
        assert!(outcome.rejected[0].reason.contains("not in allowed list"));
        // 同一决策中的第二单不受影响
        assert_eq!(outcome.validated.orders.len(), 1);
        assert_eq!(outcome.validated.orders[0].asset_symbol, "BTC");
    }

    #[test]
    fn rejects_non_positive_quantity() {
        let d = decision(vec![TradeOrder::new("BTC", TradeSide::Buy, dec!(0))]);
        let outcome = validator().validate(&d, &portfolio(dec!(100000), vec![]), &prices());
        assert_eq!(outcome.rejected[0].reason, "Quantity must be positive");
    }

    #[test]
    fn rejects_when_no_price() {
        let mut config = RiskConfig::default();
        config.allowed_assets.insert("SOL".to_string());
        let d = decision(vec![TradeOrder::new("SOL", TradeSide::Buy, dec!(1))]);
        let outcome =
            RiskValidator::new(config).validate(&d, &portfolio(dec!(100000), vec![]), &prices());
        assert!(outcome.rejected[0].reason.contains("No price available"));
    }

    #[test]
    fn rejects_dust_order() {
        let d = decision(vec![TradeOrder::new("BTC", TradeSide::Buy, dec!(0.0001))]);
        let outcome = validator().validate(&d, &portfolio(dec!(100000), vec![]), &prices());
        assert!(outcome.rejected[0].reason.contains("below minimum"));
    }

    #[test]
    fn buy_capped_by_max_single_trade_value() {
        // 2.5 BTC = 105,000 名义, 上限 5,000
        let d = decision(vec![TradeOrder::new("BTC", TradeSide::Buy, dec!(2.5))]);
        let outcome = validator().validate(&d, &portfolio(dec!(100000), vec![]), &prices());

        assert!(outcome.has_warnings);
        assert_eq!(outcome.validated.orders.len(), 1);
        let notional = outcome.validated.orders[0].quantity * dec!(42000);
        assert!(notional <= dec!(5000));
    }

    #[test]
    fn buy_rejected_when_cash_below_reserve() {
        // 现金 100 = 保底现金, 可用现金为 0
        let d = decision(vec![TradeOrder::new("BTC", TradeSide::Buy, dec!(2.5))]);
        let outcome = validator().validate(&d, &portfolio(dec!(100), vec![]), &prices());

        assert!(outcome.validated.orders.is_empty());
        assert_eq!(outcome.rejected[0].reason, "Insufficient cash after reserve");
    }

    #[test]
    fn buy_shrinks_to_cash_minus_reserve() {
        // 提高单笔上限让现金约束成为生效的那一档
        let config = RiskConfig {
            max_single_trade_value: dec!(1000000),
            max_position_size_percent: dec!(1),
            ..RiskConfig::default()
        };
        let d = decision(vec![TradeOrder::new("BTC", TradeSide::Buy, dec!(2.5))]);
        let outcome =
            RiskValidator::new(config).validate(&d, &portfolio(dec!(50000), vec![]), &prices());

        assert_eq!(outcome.validated.orders.len(), 1);
        let notional = outcome.validated.orders[0].quantity * dec!(42000);
        assert!(notional <= dec!(49900)); // 现金 50,000 - 保底 100
        assert!(outcome.has_warnings);
    }

    #[test]
    fn buy_never_exceeds_position_limit() {
        // 已持有接近上限的仓位, 新买单应被拒绝
        let p = portfolio(dec!(10000), vec![btc_position(dec!(2))]);
        // 总值 = 10,000 + 84,000 = 94,000; 上限 50% = 47,000 < 当前仓位 84,000
        let d = decision(vec![TradeOrder::new("BTC", TradeSide::Buy, dec!(0.01))]);
        let outcome = validator().validate(&d, &p, &prices());

        assert!(outcome.validated.orders.is_empty());
        assert!(outcome.rejected[0].reason.contains("Position limit reached"));
    }

    #[test]
    fn sell_without_position_rejected() {
        let d = decision(vec![TradeOrder::new("BTC", TradeSide::Sell, dec!(1))]);
        let outcome = validator().validate(&d, &portfolio(dec!(100000), vec![]), &prices());
        assert!(outcome.rejected[0].reason.contains("No BTC position to sell"));
    }

    #[test]
    fn oversell_shrinks_to_held_quantity() {
        // 持有 1 BTC, 卖 2 BTC, 禁杠杆 → 调整为卖 1 BTC
        let p = portfolio(dec!(1000), vec![btc_position(dec!(1))]);
        let d = decision(vec![TradeOrder::new("BTC", TradeSide::Sell, dec!(2))]);
        let outcome = validator().validate(&d, &p, &prices());

        assert_eq!(outcome.validated.orders.len(), 1);
        assert_eq!(outcome.validated.orders[0].quantity, dec!(1));
        assert!(outcome.has_warnings);
    }

    #[test]
    fn full_liquidation_exempt_from_minimum() {
        // 持仓市值 4.2 低于最低名义价值 10, 但清仓卖出仍然放行
        let p = portfolio(
            dec!(1000),
            vec![PositionSnapshot {
                asset_symbol: "BTC".to_string(),
                quantity: dec!(0.0001),
                average_price: dec!(40000),
                current_price: dec!(42000),
            }],
        );
        let d = decision(vec![TradeOrder::new("BTC", TradeSide::Sell, dec!(0.0001))]);
        let outcome = validator().validate(&d, &p, &prices());

        assert!(outcome.rejected.is_empty());
        assert_eq!(outcome.validated.orders.len(), 1);
    }

    #[test]
    fn truncates_to_max_orders_with_single_warning() {
        let config = RiskConfig {
            max_orders_per_cycle: 2,
            ..RiskConfig::default()
        };
        let d = decision(vec![
            TradeOrder::new("BTC", TradeSide::Buy, dec!(0.01)),
            TradeOrder::new("ETH", TradeSide::Buy, dec!(0.1)),
            TradeOrder::new("BTC", TradeSide::Buy, dec!(0.01)),
            TradeOrder::new("ETH", TradeSide::Buy, dec!(0.1)),
        ]);
        let outcome =
            RiskValidator::new(config).validate(&d, &portfolio(dec!(100000), vec![]), &prices());

        // 只考虑前两单, 其余静默截断, 仅一条警告
        assert_eq!(outcome.validated.orders.len(), 2);
        assert!(outcome.rejected.is_empty());
        assert_eq!(outcome.warnings.len(), 1);
        assert!(outcome.has_warnings);
    }

    #[test]
    fn sequential_orders_see_simulated_state() {
        // 两张买单, 第二张在第一张消耗现金后的模拟状态上校验
        let config = RiskConfig {
            max_single_trade_value: dec!(1000000),
            max_position_size_percent: dec!(1),
            ..RiskConfig::default()
        };
        let d = decision(vec![
            TradeOrder::new("BTC", TradeSide::Buy, dec!(1)),
            TradeOrder::new("BTC", TradeSide::Buy, dec!(1)),
        ]);
        let outcome =
            RiskValidator::new(config).validate(&d, &portfolio(dec!(50000), vec![]), &prices());

        // 第一单缩减到可用现金 49,900; 第二单没有可用现金, 被拒
        assert_eq!(outcome.validated.orders.len(), 1);
        assert_eq!(outcome.rejected.len(), 1);
        assert_eq!(
            outcome.rejected[0].reason,
            "Insufficient cash after reserve"
        );
    }

    #[test]
    fn sequential_sells_deplete_simulated_position() {
        let p = portfolio(dec!(1000), vec![btc_position(dec!(1))]);
        let d = decision(vec![
            TradeOrder::new("BTC", TradeSide::Sell, dec!(1)),
            TradeOrder::new("BTC", TradeSide::Sell, dec!(1)),
        ]);
        let outcome = validator().validate(&d, &p, &prices());

        assert_eq!(outcome.validated.orders.len(), 1);
        assert!(outcome.rejected[0].reason.contains("No BTC position to sell"));
    }

    #[test]
    fn hold_orders_pass_untouched() {
        let d = decision(vec![TradeOrder::new("BTC", TradeSide::Hold, dec!(1))]);
        let outcome = validator().validate(&d, &portfolio(dec!(100000), vec![]), &prices());

        assert!(!outcome.has_warnings);
        assert_eq!(outcome.validated.orders.len(), 1);
        assert_eq!(outcome.validated.orders[0].quantity, dec!(1));
    }

    #[test]
    fn preserves_original_created_at() {
        let d = decision(vec![TradeOrder::new("BTC", TradeSide::Buy, dec!(0.01))]);
        let outcome = validator().validate(&d, &portfolio(dec!(100000), vec![]), &prices());
        assert_eq!(outcome.validated.created_at, d.created_at);
    }
}
