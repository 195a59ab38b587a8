pub mod agent;
pub mod candle;
pub mod context;
pub mod decision;
pub mod equity;
pub mod order;
pub mod portfolio;
pub mod trade;
pub mod validation;

pub use agent::Agent;
pub use candle::Candle;
pub use context::{AgentContext, AgentRunResult};
pub use decision::{AgentDecision, ModelProvider};
pub use equity::{EquitySnapshot, PerformanceMetrics};
pub use order::{TradeOrder, TradeSide};
pub use portfolio::{Portfolio, Position, PortfolioState, PositionSnapshot};
pub use trade::Trade;
pub use validation::{RejectedOrder, ValidationOutcome};
