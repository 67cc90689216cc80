pub mod annotate;
pub mod data_provider;
pub mod engine;
pub mod error;
pub mod indicators;
pub mod metrics;
pub mod risk;
pub mod signal_source;
pub mod sizing;
pub mod state;
pub mod trade;

pub use annotate::{annotate_momentum, MomentumParams, PriceCandle};
pub use data_provider::{load_candles_csv, write_rounds_csv, write_trades_csv, RoundCsvProvider};
pub use engine::{BacktestResults, ReplayEngine, SkipCounts, SkipReason};
pub use error::ReplayError;
pub use metrics::{BacktestMetrics, ModeMetrics};
pub use risk::{CooldownTrigger, RiskController, RiskState};
pub use signal_source::{ContrarianSignal, MeanReversionSignal, SignalSource};
pub use sizing::PositionSizer;
pub use state::{RecentOutcomes, SimulationState, StreakStats};
pub use trade::Trade;
