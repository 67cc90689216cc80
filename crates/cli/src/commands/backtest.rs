//! Backtest CLI command.
//!
//! Loads historical rounds from CSV, layers configuration from file,
//! environment and flags, and replays the rounds through the engine.

use anyhow::{anyhow, Context, Result};
use clap::Args;
use rust_decimal::Decimal;

use prediction_replay_backtest::{
    write_trades_csv, BacktestResults, ModeMetrics, ReplayEngine, RoundCsvProvider,
};
use prediction_replay_core::{BacktestConfig, ConfigLoader, RoundRecord};

/// Arguments for the backtest command.
#[derive(Args, Debug, Clone)]
pub struct BacktestArgs {
    /// Rounds CSV file
    #[arg(long)]
    pub rounds: String,

    /// Config file (TOML, or JSON with a .json extension)
    #[arg(short, long)]
    pub config: Option<String>,

    /// Profile overlay merged from <stem>.<profile>.<ext>
    #[arg(long, requires = "config")]
    pub profile: Option<String>,

    /// Output format: text, json (default: text)
    #[arg(long, default_value = "text")]
    pub format: String,

    /// Write JSON results to file
    #[arg(long)]
    pub output: Option<String>,

    /// Write the trade ledger to a CSV file
    #[arg(long)]
    pub trades_csv: Option<String>,

    /// House fee as a fraction of the total pool
    #[arg(long)]
    pub house_fee: Option<Decimal>,

    /// Minimum implied payout multiple to take a bet
    #[arg(long)]
    pub min_payout: Option<f64>,

    /// Base fraction of bankroll staked per trade
    #[arg(long)]
    pub base_fraction: Option<f64>,

    /// |momentum gap| at which the momentum multiplier applies
    #[arg(long)]
    pub momentum_threshold: Option<f64>,

    /// Stake multiplier for strong momentum
    #[arg(long)]
    pub momentum_multiplier: Option<f64>,

    /// Stake multiplier after two straight losses
    #[arg(long)]
    pub recovery_multiplier: Option<f64>,

    /// Consecutive losses that trip the circuit breaker
    #[arg(long)]
    pub loss_threshold: Option<u32>,

    /// Cooldown length in seconds
    #[arg(long)]
    pub cooldown_secs: Option<i64>,

    /// Cap on the bankroll used for sizing
    #[arg(long)]
    pub bankroll_cap: Option<f64>,

    /// Starting bankroll
    #[arg(long)]
    pub starting_bankroll: Option<f64>,
}

impl BacktestArgs {
    /// Applies flag overrides on top of a loaded config.
    fn apply_overrides(&self, mut config: BacktestConfig) -> BacktestConfig {
        if let Some(fee) = self.house_fee {
            config.house_fee = fee;
        }
        if let Some(v) = self.min_payout {
            config.min_payout_threshold = v;
        }
        if let Some(v) = self.base_fraction {
            config.base_position_fraction = v;
        }
        if let Some(v) = self.momentum_threshold {
            config.momentum_gap_threshold = v;
        }
        if let Some(v) = self.momentum_multiplier {
            config.momentum_multiplier = v;
        }
        if let Some(v) = self.recovery_multiplier {
            config.recovery_multiplier = v;
        }
        if let Some(v) = self.loss_threshold {
            config.loss_threshold = v;
        }
        if let Some(v) = self.cooldown_secs {
            config.cooldown_duration_seconds = v;
        }
        if self.bankroll_cap.is_some() {
            config.bankroll_cap = self.bankroll_cap;
        }
        if let Some(v) = self.starting_bankroll {
            config.starting_bankroll = v;
        }
        config
    }

    fn load_config(&self) -> Result<BacktestConfig> {
        let loaded = match (&self.config, &self.profile) {
            (Some(path), Some(profile)) => ConfigLoader::load_with_profile(path, profile)?,
            (Some(path), None) => ConfigLoader::load(path)?,
            (None, _) => ConfigLoader::from_env()?,
        };
        Ok(self.apply_overrides(loaded))
    }
}

/// Output format for backtest reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    /// Parses an output format from string.
    pub fn parse(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "text" | "txt" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            _ => Err(anyhow!(
                "Unknown format: '{}'. Valid formats: text, json",
                s
            )),
        }
    }
}

fn format_period(rounds: &[RoundRecord]) -> String {
    let fmt = |round: Option<&RoundRecord>| {
        round
            .and_then(RoundRecord::lock_time)
            .map_or_else(|| "-".to_string(), |t| t.format("%Y-%m-%d %H:%M").to_string())
    };
    format!("{} to {}", fmt(rounds.first()), fmt(rounds.last()))
}

fn format_mode_row(label: &str, mode: &ModeMetrics) -> String {
    format!(
        "{:<10} {:>7} {:>6} {:>6} {:>8.1}% {:>+11.4} {:>+8.2}%\n",
        label,
        mode.trades,
        mode.wins,
        mode.losses,
        mode.win_rate * 100.0,
        mode.net_profit,
        mode.roi * 100.0
    )
}

/// Formats the backtest results as a text report.
fn format_text_report(results: &BacktestResults, period: &str) -> String {
    let metrics = &results.metrics;
    let config = &results.config;

    let mut output = String::new();

    // Header
    output.push('\n');
    output.push_str("===============================================================\n");
    output.push_str("                   ROUND REPLAY RESULTS                        \n");
    output.push_str("===============================================================\n");

    output.push_str(&format!("Period: {}\n", period));
    output.push_str(&format!(
        "Base Stake:     {:.2}% of bankroll\n",
        config.base_position_fraction * 100.0
    ));
    output.push_str(&format!("Min Payout:     {:.2}x\n", config.min_payout_threshold));
    output.push_str(&format!("House Fee:      {}\n", config.house_fee));
    output.push_str(&format!(
        "Circuit Breaker: {} losses -> {}s cooldown\n",
        config.loss_threshold, config.cooldown_duration_seconds
    ));
    output.push('\n');

    // Core metrics
    output.push_str("CORE METRICS\n");
    output.push_str("---------------------------------------------------------------\n");
    output.push_str(&format!("Total Trades:   {}\n", metrics.total_trades));
    output.push_str(&format!(
        "Wins:           {} ({:.1}%)\n",
        metrics.wins,
        metrics.win_rate * 100.0
    ));
    output.push_str(&format!("Losses:         {}\n", metrics.losses));
    output.push('\n');

    // Financial metrics
    output.push_str("FINANCIAL METRICS\n");
    output.push_str("---------------------------------------------------------------\n");
    output.push_str(&format!("Start Bankroll: {:.4}\n", metrics.starting_bankroll));
    output.push_str(&format!("Final Bankroll: {:.4}\n", metrics.final_bankroll));
    output.push_str(&format!("Peak Bankroll:  {:.4}\n", metrics.peak_bankroll));
    output.push_str(&format!("Total Staked:   {:.4}\n", metrics.total_staked));
    output.push_str(&format!("Net Profit:     {:+.4}\n", metrics.net_profit));
    output.push_str(&format!("ROI:            {:+.2}%\n", metrics.roi * 100.0));
    output.push('\n');

    // Risk metrics
    output.push_str("RISK METRICS\n");
    output.push_str("---------------------------------------------------------------\n");
    output.push_str(&format!("Max Drawdown:   {:.2}%\n", metrics.max_drawdown_pct));
    output.push_str(&format!(
        "Max Consec. Losses: {}\n",
        metrics.max_consecutive_losses
    ));
    output.push_str(&format!(
        "Max Consec. Wins:   {}\n",
        metrics.max_consecutive_wins
    ));
    let streaks = &results.final_state.streaks;
    let current = if streaks.current_losses > 0 {
        format!("L{}", streaks.current_losses)
    } else if streaks.current_wins > 0 {
        format!("W{}", streaks.current_wins)
    } else {
        "-".to_string()
    };
    output.push_str(&format!("Current Streak:     {current}\n"));
    if results.busted {
        output.push_str("BUSTED: bankroll exhausted, replay stopped early\n");
    }
    output.push('\n');

    // Per-mode breakdown
    output.push_str("BY MODE\n");
    output.push_str("---------------------------------------------------------------\n");
    output.push_str(&format!(
        "{:<10} {:>7} {:>6} {:>6} {:>9} {:>11} {:>9}\n",
        "Mode", "Trades", "Wins", "Losses", "Win Rate", "Net", "ROI"
    ));
    output.push_str(&format_mode_row("normal", &metrics.normal));
    output.push_str(&format_mode_row("cooldown", &metrics.cooldown));
    output.push('\n');

    // Processing stats
    output.push_str("PROCESSING STATS\n");
    output.push_str("---------------------------------------------------------------\n");
    output.push_str(&format!("Rounds Seen:       {}\n", results.rounds_seen));
    output.push_str(&format!("Skipped Unresolved: {}\n", results.skipped.unresolved));
    output.push_str(&format!("Skipped Empty Pool: {}\n", results.skipped.empty_pool));
    output.push_str(&format!("Skipped No Signal:  {}\n", results.skipped.no_signal));
    output.push_str(&format!(
        "Skipped No Payout:  {}\n",
        results.skipped.missing_payout
    ));
    output.push_str(&format!(
        "Fill Rate:         {:.1}%\n",
        results.fill_rate() * 100.0
    ));
    output.push_str("===============================================================\n");

    output
}

/// Runs the backtest command.
///
/// # Errors
/// Returns an error if loading config or rounds fails, the replay fails, or
/// writing output fails.
pub fn run_backtest(args: BacktestArgs) -> Result<()> {
    let format = OutputFormat::parse(&args.format)?;
    let config = args.load_config()?;

    tracing::info!("Loading rounds from {}", args.rounds);
    let provider = RoundCsvProvider::from_csv(&args.rounds)?;
    if provider.is_empty() {
        tracing::warn!("No rounds found in {}", args.rounds);
    }

    let engine = ReplayEngine::new(config)?;
    let results = engine
        .run(provider.rounds())
        .with_context(|| format!("Replay of {} failed", args.rounds))?;

    match format {
        OutputFormat::Text => {
            let report = format_text_report(&results, &format_period(provider.rounds()));
            println!("{}", report);
        }
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&results)?;
            println!("{}", json);
        }
    }

    if let Some(output_path) = &args.output {
        let json = serde_json::to_string_pretty(&results)?;
        std::fs::write(output_path, json)
            .with_context(|| format!("Failed to write {}", output_path))?;
        tracing::info!("Results written to {}", output_path);
    }

    if let Some(trades_path) = &args.trades_csv {
        write_trades_csv(trades_path, &results.trades)?;
        tracing::info!("{} trades written to {}", results.trades.len(), trades_path);
    }

    Ok(())
}
