//! 权益核算
//!
//! 快照与绩效都是对输入的纯计算; 唯一的写操作是追加快照行

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tracing::{error, info};
use uuid::Uuid;

use crate::app_config::risk::RiskConfig;
use crate::error::AppError;
use crate::trading::domain::{EquitySnapshot, PerformanceMetrics, Trade, TradeSide};
use crate::trading::repository::{
    AgentRepository, EquitySnapshotRepository, TradeRepository,
};
use crate::trading::services::portfolio::PortfolioService;

pub struct EquityService {
    portfolio_service: Arc<PortfolioService>,
    snapshots: Arc<dyn EquitySnapshotRepository>,
    trades: Arc<dyn TradeRepository>,
    config: RiskConfig,
}

impl EquityService {
    pub fn new(
        portfolio_service: Arc<PortfolioService>,
        snapshots: Arc<dyn EquitySnapshotRepository>,
        trades: Arc<dyn TradeRepository>,
        config: RiskConfig,
    ) -> Self {
        Self {
            portfolio_service,
            snapshots,
            trades,
            config,
        }
    }

    /// 捕获当前时点的权益快照并落库
    ///
    /// 涨跌幅相对上一个快照计算, 历史首个快照为 0
    pub async fn capture_snapshot(&self, agent_id: Uuid) -> Result<EquitySnapshot, AppError> {
        let state = self.portfolio_service.get_state(agent_id).await?;

        let positions_value: Decimal = state.positions.iter().map(|p| p.market_value()).sum();
        let unrealized_pnl: Decimal = state.positions.iter().map(|p| p.unrealized_pnl()).sum();
        let total_value = state.cash + positions_value;

        let previous = self.snapshots.latest(state.portfolio_id).await?;
        let percent_change = match previous {
            Some(prev) if prev.total_value > Decimal::ZERO => {
                (total_value - prev.total_value) / prev.total_value * Decimal::from(100)
            }
            _ => Decimal::ZERO,
        };

        let snapshot = EquitySnapshot {
            id: Uuid::new_v4(),
            portfolio_id: state.portfolio_id,
            captured_at: Utc::now(),
            total_value,
            cash_value: state.cash,
            positions_value,
            unrealized_pnl,
            percent_change,
        };

        self.snapshots.append(&snapshot).await?;

        info!(
            "权益快照: 代理={} 总值={} 现金={} 持仓={}",
            agent_id, total_value, state.cash, positions_value
        );

        Ok(snapshot)
    }

    /// 为所有激活代理各捕获一次快照, 单个代理失败只记录不中断
    pub async fn capture_all_snapshots(
        &self,
        agents: &dyn AgentRepository,
    ) -> Result<usize, AppError> {
        let active = agents.list_active().await?;
        let mut count = 0;
        for agent in &active {
            match self.capture_snapshot(agent.id).await {
                Ok(_) => count += 1,
                Err(e) => error!("捕获快照失败: 代理={} err={}", agent.id, e),
            }
        }
        info!("批量快照完成: {}/{} 个激活代理", count, active.len());
        Ok(count)
    }

    /// 权益曲线, 按捕获时间升序
    pub async fn equity_curve(
        &self,
        agent_id: Uuid,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Result<Vec<EquitySnapshot>, AppError> {
        let portfolio = self.portfolio_service.get_or_create(agent_id).await?;
        self.snapshots
            .list_by_portfolio(portfolio.id, from, to)
            .await
    }

    /// 由快照/成交历史推导绩效指标
    pub async fn calculate_performance(
        &self,
        agent_id: Uuid,
    ) -> Result<PerformanceMetrics, AppError> {
        let portfolio = self.portfolio_service.get_or_create(agent_id).await?;
        let snapshots = self
            .snapshots
            .list_by_portfolio(portfolio.id, None, None)
            .await?;
        let trades = self.trades.list_by_portfolio(portfolio.id).await?;

        // 无快照历史: 初始值 = 当前值 = 配置的初始资金, 其余指标为零
        let initial_value = snapshots
            .first()
            .map(|s| s.total_value)
            .unwrap_or(self.config.starting_cash);
        let current_value = snapshots
            .last()
            .map(|s| s.total_value)
            .unwrap_or(self.config.starting_cash);

        let total_return = current_value - initial_value;
        let percent_return = if initial_value > Decimal::ZERO {
            total_return / initial_value * Decimal::from(100)
        } else {
            Decimal::ZERO
        };

        let max_drawdown = Self::max_drawdown(&snapshots);
        let (winning_trades, losing_trades) = Self::classify_trades(&trades);
        let total_trades = trades.len();
        let win_rate = if total_trades > 0 {
            Decimal::from(winning_trades as u64) / Decimal::from(total_trades as u64)
                * Decimal::from(100)
        } else {
            Decimal::ZERO
        };

        Ok(PerformanceMetrics {
            agent_id,
            initial_value,
            current_value,
            total_return,
            percent_return,
            max_drawdown,
            total_trades,
            winning_trades,
            losing_trades,
            win_rate,
            calculated_at: Utc::now(),
        })
    }

    /// 最大回撤 (%): 对快照序列维护运行峰值, 取 (峰值-当前)/峰值 的最大值
    fn max_drawdown(snapshots: &[EquitySnapshot]) -> Decimal {
        if snapshots.len() < 2 {
            return Decimal::ZERO;
        }

        let mut peak = snapshots[0].total_value;
        let mut max_drawdown = Decimal::ZERO;

        for snapshot in snapshots {
            if snapshot.total_value > peak {
                peak = snapshot.total_value;
            }
            if peak > Decimal::ZERO {
                let drawdown = (peak - snapshot.total_value) / peak;
                if drawdown > max_drawdown {
                    max_drawdown = drawdown;
                }
            }
        }

        max_drawdown * Decimal::from(100)
    }

    /// 按时间顺序重放成交, 复原卖出时点的加权均价:
    /// 高于均价的卖出计为盈利, 其余卖出计为亏损, 买入不参与分类
    fn classify_trades(trades: &[Trade]) -> (usize, usize) {
        let mut positions: HashMap<String, (Decimal, Decimal)> = HashMap::new(); // (qty, avg)
        let mut winning = 0;
        let mut losing = 0;

        for trade in trades {
            match trade.side {
                TradeSide::Buy => {
                    let entry = positions
                        .entry(trade.asset_symbol.clone())
                        .or_insert((Decimal::ZERO, Decimal::ZERO));
                    let new_qty = entry.0 + trade.quantity;
                    entry.1 = (entry.0 * entry.1 + trade.quantity * trade.price) / new_qty;
                    entry.0 = new_qty;
                }
                TradeSide::Sell => {
                    let mut liquidated = false;
                    if let Some(entry) = positions.get_mut(&trade.asset_symbol) {
                        if trade.price > entry.1 {
                            winning += 1;
                        } else {
                            losing += 1;
                        }
                        entry.0 -= trade.quantity;
                        liquidated = entry.0 <= Decimal::ZERO;
                    }
                    if liquidated {
                        positions.remove(&trade.asset_symbol);
                    }
                }
                TradeSide::Hold => {}
            }
        }

        (winning, losing)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn snapshot(total: Decimal) -> EquitySnapshot {
        EquitySnapshot {
            id: Uuid::new_v4(),
            portfolio_id: Uuid::new_v4(),
            captured_at: Utc::now(),
            total_value: total,
            cash_value: total,
            positions_value: Decimal::ZERO,
            unrealized_pnl: Decimal::ZERO,
            percent_change: Decimal::ZERO,
        }
    }

    fn trade(side: TradeSide, quantity: Decimal, price: Decimal) -> Trade {
        Trade {
            id: Uuid::new_v4(),
            portfolio_id: Uuid::new_v4(),
            asset_symbol: "BTC".to_string(),
            executed_at: Utc::now(),
            quantity,
            price,
            side,
        }
    }

    #[test]
    fn max_drawdown_from_peak_to_trough() {
        // 峰值 120k 到谷底 90k → 25%
        let snapshots: Vec<EquitySnapshot> = [
            dec!(100000),
            dec!(120000),
            dec!(90000),
            dec!(110000),
        ]
        .iter()
        .map(|v| snapshot(*v))
        .collect();

        assert_eq!(EquityService::max_drawdown(&snapshots), dec!(25));
    }

    #[test]
    fn max_drawdown_zero_for_monotonic_rise() {
        let snapshots: Vec<EquitySnapshot> =
            [dec!(100), dec!(110), dec!(120)].iter().map(|v| snapshot(*v)).collect();
        assert_eq!(EquityService::max_drawdown(&snapshots), Decimal::ZERO);
    }

    #[test]
    fn max_drawdown_zero_for_short_history() {
        assert_eq!(EquityService::max_drawdown(&[]), Decimal::ZERO);
        assert_eq!(
            EquityService::max_drawdown(&[snapshot(dec!(100))]),
            Decimal::ZERO
        );
    }

    #[test]
    fn classifies_sell_above_average_as_win() {
        let trades = vec![
            trade(TradeSide::Buy, dec!(1), dec!(40000)),
            trade(TradeSide::Buy, dec!(1), dec!(44000)), // 均价 42000
            trade(TradeSide::Sell, dec!(1), dec!(43000)), // 盈利
            trade(TradeSide::Sell, dec!(1), dec!(42000)), // 等于均价 → 亏损
        ];
        let (winning, losing) = EquityService::classify_trades(&trades);
        assert_eq!(winning, 1);
        assert_eq!(losing, 1);
    }

    #[test]
    fn buys_are_never_classified() {
        let trades = vec![
            trade(TradeSide::Buy, dec!(1), dec!(40000)),
            trade(TradeSide::Buy, dec!(1), dec!(41000)),
        ];
        let (winning, losing) = EquityService::classify_trades(&trades);
        assert_eq!(winning + losing, 0);
    }
}
