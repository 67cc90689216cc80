pub mod config;
pub mod config_loader;
pub mod error;
pub mod pool;
pub mod round;
pub mod signal;

pub use config::BacktestConfig;
pub use config_loader::ConfigLoader;
pub use error::ConfigError;
pub use pool::{payout_multiple, PoolPayouts};
pub use round::{Direction, MomentumSignal, RoundRecord, Winner};
pub use signal::{Signal, TradingMode};
