//! 组合账本
//!
//! 唯一允许修改持久化的组合/持仓/成交状态的组件。
//! 一次决策的全部订单先在内存副本上逐单结算,
//! 任何一单失败整个决策都不落库; 成功则在单个事务内提交。

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use tracing::info;
use uuid::Uuid;

use crate::app_config::risk::RiskConfig;
use crate::error::AppError;
use crate::trading::domain::{
    AgentDecision, Portfolio, PortfolioState, Position, PositionSnapshot, Trade, TradeOrder,
    TradeSide,
};
use crate::trading::repository::{MarketDataFeed, PortfolioRepository};

pub struct PortfolioService {
    portfolios: Arc<dyn PortfolioRepository>,
    market: Arc<dyn MarketDataFeed>,
    config: RiskConfig,
}

impl PortfolioService {
    pub fn new(
        portfolios: Arc<dyn PortfolioRepository>,
        market: Arc<dyn MarketDataFeed>,
        config: RiskConfig,
    ) -> Self {
        Self {
            portfolios,
            market,
            config,
        }
    }

    /// 首次访问时懒创建组合, 初始资金来自配置
    pub async fn get_or_create(&self, agent_id: Uuid) -> Result<Portfolio, AppError> {
        if let Some(portfolio) = self.portfolios.find_by_agent(agent_id).await? {
            return Ok(portfolio);
        }
        let portfolio = Portfolio::new(agent_id, self.config.starting_cash);
        self.portfolios.create(&portfolio).await?;
        info!(
            "为代理 {} 创建组合, 初始资金 {}",
            agent_id, self.config.starting_cash
        );
        Ok(portfolio)
    }

    /// 按当前市价估值后的组合视图
    pub async fn get_state(&self, agent_id: Uuid) -> Result<PortfolioState, AppError> {
        let portfolio = self.get_or_create(agent_id).await?;
        let symbols: Vec<String> = portfolio.positions.iter().map(|p| p.symbol.clone()).collect();
        let prices = self.market.latest_prices(&symbols).await;
        Ok(Self::value_portfolio(&portfolio, &prices))
    }

    /// 应用一次已校验的决策
    ///
    /// 订单按列表顺序逐单结算; 任何一单失败即中止, 不产生部分写入。
    /// 成交价取订单限价, 否则取校验阶段使用的市价 (由调用方传入)。
    pub async fn apply_decision(
        &self,
        agent_id: Uuid,
        decision: &AgentDecision,
        prices: &HashMap<String, Decimal>,
    ) -> Result<PortfolioState, AppError> {
        let mut portfolio = self.get_or_create(agent_id).await?;
        let mut trades: Vec<Trade> = Vec::new();
        let now = Utc::now();

        for order in &decision.orders {
            match order.side {
                TradeSide::Buy => {
                    let price = Self::execution_price(order, prices)?;
                    let trade = Self::settle_buy(&mut portfolio, order, price, now)?;
                    trades.push(trade);
                }
                TradeSide::Sell => {
                    let price = Self::execution_price(order, prices)?;
                    let trade = Self::settle_sell(&mut portfolio, order, price, now)?;
                    trades.push(trade);
                }
                // Hold 不改变现金/持仓, 也不产生成交记录
                TradeSide::Hold => {}
            }
        }

        self.portfolios
            .commit_applied_decision(&portfolio, &trades)
            .await?;

        info!(
            "代理 {} 执行 {} 笔成交, 现金余额 {}",
            agent_id,
            trades.len(),
            portfolio.cash
        );

        Ok(Self::value_portfolio(&portfolio, prices))
    }

    /// 买入: 现金 ≥ 名义价值, 加权平均开仓价更新
    fn settle_buy(
        portfolio: &mut Portfolio,
        order: &TradeOrder,
        price: Decimal,
        now: chrono::DateTime<Utc>,
    ) -> Result<Trade, AppError> {
        let notional = order.quantity * price;
        if notional > portfolio.cash {
            return Err(AppError::InsufficientFunds {
                required: notional,
                available: portfolio.cash,
            });
        }

        portfolio.cash -= notional;

        match portfolio
            .positions
            .iter_mut()
            .find(|p| p.symbol == order.asset_symbol)
        {
            Some(position) => {
                // newAvg = (oldQty·oldAvg + qty·px) / (oldQty + qty)
                let total_cost =
                    position.average_entry_price * position.quantity + notional;
                let total_quantity = position.quantity + order.quantity;
                position.average_entry_price = total_cost / total_quantity;
                position.quantity = total_quantity;
            }
            None => {
                portfolio.positions.push(Position {
                    symbol: order.asset_symbol.clone(),
                    quantity: order.quantity,
                    average_entry_price: price,
                });
            }
        }

        Ok(Trade {
            id: Uuid::new_v4(),
            portfolio_id: portfolio.id,
            asset_symbol: order.asset_symbol.clone(),
            executed_at: now,
            quantity: order.quantity,
            price,
            side: TradeSide::Buy,
        })
    }

    /// 卖出: 持仓 ≥ 卖出量, 均价不变 (本层不做已实现盈亏)
    fn settle_sell(
        portfolio: &mut Portfolio,
        order: &TradeOrder,
        price: Decimal,
        now: chrono::DateTime<Utc>,
    ) -> Result<Trade, AppError> {
        let index = portfolio
            .positions
            .iter()
            .position(|p| p.symbol == order.asset_symbol);

        let held = index
            .map(|i| portfolio.positions[i].quantity)
            .unwrap_or(Decimal::ZERO);
        if held < order.quantity {
            return Err(AppError::InsufficientPosition {
                symbol: order.asset_symbol.clone(),
                requested: order.quantity,
                held,
            });
        }

        let notional = order.quantity * price;
        portfolio.cash += notional;

        if let Some(i) = index {
            portfolio.positions[i].quantity -= order.quantity;
            // 完全清仓后移除持仓行, 均价历史不复活
            if portfolio.positions[i].quantity <= Decimal::ZERO {
                portfolio.positions.remove(i);
            }
        }

        Ok(Trade {
            id: Uuid::new_v4(),
            portfolio_id: portfolio.id,
            asset_symbol: order.asset_symbol.clone(),
            executed_at: now,
            quantity: order.quantity,
            price,
            side: TradeSide::Sell,
        })
    }

    fn execution_price(
        order: &TradeOrder,
        prices: &HashMap<String, Decimal>,
    ) -> Result<Decimal, AppError> {
        if let Some(limit) = order.limit_price {
            if limit > Decimal::ZERO {
                return Ok(limit);
            }
        }
        prices
            .get(&order.asset_symbol)
            .copied()
            .filter(|p| *p > Decimal::ZERO)
            .ok_or_else(|| {
                AppError::MarketDataError(format!("无可用价格: {}", order.asset_symbol))
            })
    }

    /// 估值: 总值 = 现金 + Σ(数量 × 现价); 无现价时退回均价
    pub fn value_portfolio(
        portfolio: &Portfolio,
        prices: &HashMap<String, Decimal>,
    ) -> PortfolioState {
        let positions: Vec<PositionSnapshot> = portfolio
            .positions
            .iter()
            .map(|p| PositionSnapshot {
                asset_symbol: p.symbol.clone(),
                quantity: p.quantity,
                average_price: p.average_entry_price,
                current_price: prices
                    .get(&p.symbol)
                    .copied()
                    .unwrap_or(p.average_entry_price),
            })
            .collect();

        let total_value = portfolio.cash
            + positions
                .iter()
                .map(|p| p.market_value())
                .sum::<Decimal>();

        PortfolioState {
            portfolio_id: portfolio.id,
            agent_id: portfolio.agent_id,
            cash: portfolio.cash,
            positions,
            as_of: Utc::now(),
            total_value,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn empty_portfolio() -> Portfolio {
        Portfolio::new(Uuid::new_v4(), dec!(100000))
    }

    #[test]
    fn buy_average_price_between_old_and_new() {
        let mut portfolio = empty_portfolio();
        let now = Utc::now();

        let first = TradeOrder::new("BTC", TradeSide::Buy, dec!(1));
        PortfolioService::settle_buy(&mut portfolio, &first, dec!(40000), now).unwrap();
        let second = TradeOrder::new("BTC", TradeSide::Buy, dec!(1));
        PortfolioService::settle_buy(&mut portfolio, &second, dec!(44000), now).unwrap();

        let position = portfolio.position("BTC").unwrap();
        assert!(position.average_entry_price > dec!(40000));
        assert!(position.average_entry_price < dec!(44000));
        assert_eq!(position.average_entry_price, dec!(42000));
        assert_eq!(position.quantity, dec!(2));
    }

    #[test]
    fn first_buy_average_equals_price() {
        let mut portfolio = empty_portfolio();
        let order = TradeOrder::new("BTC", TradeSide::Buy, dec!(0.5));
        PortfolioService::settle_buy(&mut portfolio, &order, dec!(42000), Utc::now()).unwrap();

        assert_eq!(
            portfolio.position("BTC").unwrap().average_entry_price,
            dec!(42000)
        );
    }

    #[test]
    fn buy_then_equal_sell_round_trips_cash() {
        let mut portfolio = empty_portfolio();
        let now = Utc::now();
        let cash_before = portfolio.cash;

        let buy = TradeOrder::new("BTC", TradeSide::Buy, dec!(1));
        PortfolioService::settle_buy(&mut portfolio, &buy, dec!(42000), now).unwrap();
        let sell = TradeOrder::new("BTC", TradeSide::Sell, dec!(1));
        PortfolioService::settle_sell(&mut portfolio, &sell, dec!(42000), now).unwrap();

        assert_eq!(portfolio.cash, cash_before);
        assert!(portfolio.position("BTC").is_none());
    }

    #[test]
    fn buy_fails_on_insufficient_funds() {
        let mut portfolio = Portfolio::new(Uuid::new_v4(), dec!(100));
        let order = TradeOrder::new("BTC", TradeSide::Buy, dec!(1));
        let err =
            PortfolioService::settle_buy(&mut portfolio, &order, dec!(42000), Utc::now())
                .unwrap_err();
        assert!(matches!(err, AppError::InsufficientFunds { .. }));
        // 失败不改变现金
        assert_eq!(portfolio.cash, dec!(100));
    }

    #[test]
    fn sell_fails_on_insufficient_position() {
        let mut portfolio = empty_portfolio();
        let order = TradeOrder::new("BTC", TradeSide::Sell, dec!(1));
        let err =
            PortfolioService::settle_sell(&mut portfolio, &order, dec!(42000), Utc::now())
                .unwrap_err();
        assert!(matches!(err, AppError::InsufficientPosition { .. }));
    }

    #[test]
    fn sell_keeps_average_price() {
        let mut portfolio = empty_portfolio();
        let now = Utc::now();
        let buy = TradeOrder::new("BTC", TradeSide::Buy, dec!(2));
        PortfolioService::settle_buy(&mut portfolio, &buy, dec!(40000), now).unwrap();

        let sell = TradeOrder::new("BTC", TradeSide::Sell, dec!(1));
        PortfolioService::settle_sell(&mut portfolio, &sell, dec!(45000), now).unwrap();

        let position = portfolio.position("BTC").unwrap();
        assert_eq!(position.quantity, dec!(1));
        assert_eq!(position.average_entry_price, dec!(40000));
    }
}
