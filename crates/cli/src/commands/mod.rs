//! CLI commands for the replay engine.

pub mod annotate;
pub mod backtest;

pub use annotate::{run_annotate, AnnotateArgs};
pub use backtest::{run_backtest, BacktestArgs};
