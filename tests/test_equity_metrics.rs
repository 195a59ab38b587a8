//! 权益核算集成测试: 快照、回撤、胜率

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use uuid::Uuid;

use trading_race::app_config::risk::RiskConfig;
use trading_race::trading::domain::{AgentDecision, EquitySnapshot, TradeOrder, TradeSide};
use trading_race::trading::repository::memory::MemoryStore;
use trading_race::trading::repository::EquitySnapshotRepository;
use trading_race::trading::services::equity::EquityService;
use trading_race::trading::services::portfolio::PortfolioService;

struct Fixture {
    store: Arc<MemoryStore>,
    portfolio_service: Arc<PortfolioService>,
    equity_service: EquityService,
    agent_id: Uuid,
}

fn fixture() -> Fixture {
    let store = Arc::new(MemoryStore::new());
    store.set_price("BTC", dec!(42000));
    let config = RiskConfig::default();
    let portfolio_service = Arc::new(PortfolioService::new(
        store.clone(),
        store.clone(),
        config.clone(),
    ));
    let equity_service = EquityService::new(
        portfolio_service.clone(),
        store.clone(),
        store.clone(),
        config,
    );
    Fixture {
        store,
        portfolio_service,
        equity_service,
        agent_id: Uuid::new_v4(),
    }
}

fn btc_prices(price: Decimal) -> HashMap<String, Decimal> {
    let mut m = HashMap::new();
    m.insert("BTC".to_string(), price);
    m
}

#[tokio::test]
async fn test_no_history_metrics_are_zeroed() {
    let f = fixture();
    let metrics = f
        .equity_service
        .calculate_performance(f.agent_id)
        .await
        .unwrap();

    // 无快照历史: 初始值 = 当前值 = 配置的初始资金
    assert_eq!(metrics.initial_value, dec!(100000));
    assert_eq!(metrics.current_value, dec!(100000));
    assert_eq!(metrics.total_return, Decimal::ZERO);
    assert_eq!(metrics.max_drawdown, Decimal::ZERO);
    assert_eq!(metrics.total_trades, 0);
    assert_eq!(metrics.win_rate, Decimal::ZERO);
}

#[tokio::test]
async fn test_first_snapshot_percent_change_is_zero() {
    let f = fixture();
    let snapshot = f.equity_service.capture_snapshot(f.agent_id).await.unwrap();
    assert_eq!(snapshot.percent_change, Decimal::ZERO);
    assert_eq!(snapshot.total_value, dec!(100000));
}

#[tokio::test]
async fn test_percent_change_vs_previous_snapshot() {
    let f = fixture();

    // 买入 1 BTC 后价格上涨 10%
    let buy = AgentDecision::new(
        f.agent_id,
        vec![TradeOrder::new("BTC", TradeSide::Buy, dec!(1))],
    );
    f.portfolio_service
        .apply_decision(f.agent_id, &buy, &btc_prices(dec!(42000)))
        .await
        .unwrap();

    f.equity_service.capture_snapshot(f.agent_id).await.unwrap();

    f.store.set_price("BTC", dec!(46200));
    let second = f.equity_service.capture_snapshot(f.agent_id).await.unwrap();

    // 总值 100,000 → 104,200: 相对上一个快照 +4.2%
    assert_eq!(second.total_value, dec!(104200));
    assert_eq!(second.percent_change, dec!(4.2));
    assert_eq!(second.unrealized_pnl, dec!(4200));
}

#[tokio::test]
async fn test_max_drawdown_over_snapshot_history() {
    let f = fixture();
    let portfolio = f
        .portfolio_service
        .get_or_create(f.agent_id)
        .await
        .unwrap();

    // 直接构造快照序列 [100k, 120k, 90k, 110k]
    let base = Utc::now();
    for (i, value) in [dec!(100000), dec!(120000), dec!(90000), dec!(110000)]
        .iter()
        .enumerate()
    {
        f.store
            .append(&EquitySnapshot {
                id: Uuid::new_v4(),
                portfolio_id: portfolio.id,
                captured_at: base + Duration::seconds(i as i64),
                total_value: *value,
                cash_value: *value,
                positions_value: Decimal::ZERO,
                unrealized_pnl: Decimal::ZERO,
                percent_change: Decimal::ZERO,
            })
            .await
            .unwrap();
    }

    let metrics = f
        .equity_service
        .calculate_performance(f.agent_id)
        .await
        .unwrap();

    // 峰值 120k → 谷底 90k: 回撤 25%
    assert_eq!(metrics.max_drawdown, dec!(25));
    assert_eq!(metrics.initial_value, dec!(100000));
    assert_eq!(metrics.current_value, dec!(110000));
    assert_eq!(metrics.percent_return, dec!(10));
}

#[tokio::test]
async fn test_win_rate_counts_sells_against_average_entry() {
    let f = fixture();

    // 买 1@40k, 买 1@44k (均价 42k), 卖 1@43k (盈), 卖 1@42k (亏)
    let steps: [(TradeSide, Decimal); 4] = [
        (TradeSide::Buy, dec!(40000)),
        (TradeSide::Buy, dec!(44000)),
        (TradeSide::Sell, dec!(43000)),
        (TradeSide::Sell, dec!(42000)),
    ];
    for (side, price) in steps {
        let decision = AgentDecision::new(
            f.agent_id,
            vec![TradeOrder::new("BTC", side, dec!(1))],
        );
        f.portfolio_service
            .apply_decision(f.agent_id, &decision, &btc_prices(price))
            .await
            .unwrap();
    }

    let metrics = f
        .equity_service
        .calculate_performance(f.agent_id)
        .await
        .unwrap();

    assert_eq!(metrics.total_trades, 4);
    assert_eq!(metrics.winning_trades, 1);
    assert_eq!(metrics.losing_trades, 1);
    // 胜率按全部成交计: 1/4
    assert_eq!(metrics.win_rate, dec!(25));
}

#[tokio::test]
async fn test_equity_curve_ordering_and_range() {
    let f = fixture();

    f.equity_service.capture_snapshot(f.agent_id).await.unwrap();
    f.equity_service.capture_snapshot(f.agent_id).await.unwrap();
    f.equity_service.capture_snapshot(f.agent_id).await.unwrap();

    let curve = f
        .equity_service
        .equity_curve(f.agent_id, None, None)
        .await
        .unwrap();
    assert_eq!(curve.len(), 3);
    assert!(curve.windows(2).all(|w| w[0].captured_at <= w[1].captured_at));

    // 时间范围过滤
    let from = curve[1].captured_at;
    let filtered = f
        .equity_service
        .equity_curve(f.agent_id, Some(from), None)
        .await
        .unwrap();
    assert_eq!(filtered.len(), 2);
}
