//! CSV input and output for rounds, candles and trade ledgers.

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use csv::{ReaderBuilder, Writer};
use serde::Deserialize;
use std::fs::File;
use std::path::Path;
use tracing::debug;

use prediction_replay_core::{MomentumSignal, RoundRecord, Winner};

use crate::annotate::PriceCandle;
use crate::trade::Trade;

/// Column layout shared by the reader and `write_rounds_csv`.
const ROUND_COLUMNS: [&str; 9] = [
    "epoch",
    "lock_timestamp",
    "pool_bull_amount",
    "pool_bear_amount",
    "winner",
    "winner_payout_multiple",
    "momentum_signal",
    "momentum_gap",
    "close_price_path",
];

/// Raw CSV row. Pools stay strings until parsed as `u128`.
#[derive(Debug, Deserialize)]
struct RoundRow {
    epoch: u64,
    lock_timestamp: i64,
    pool_bull_amount: String,
    pool_bear_amount: String,
    #[serde(default)]
    winner: Option<String>,
    #[serde(default)]
    winner_payout_multiple: Option<f64>,
    #[serde(default)]
    momentum_signal: Option<String>,
    #[serde(default)]
    momentum_gap: Option<f64>,
    #[serde(default)]
    close_price_path: Option<String>,
}

impl RoundRow {
    fn into_record(self) -> Result<RoundRecord> {
        let bull = parse_wei(&self.pool_bull_amount).context("pool_bull_amount")?;
        let bear = parse_wei(&self.pool_bear_amount).context("pool_bear_amount")?;
        let winner: Winner = self.winner.as_deref().unwrap_or("").parse()?;
        let momentum: MomentumSignal = self.momentum_signal.as_deref().unwrap_or("").parse()?;
        let path = parse_close_path(self.close_price_path.as_deref().unwrap_or(""))?;

        let mut record = RoundRecord::new(self.epoch, self.lock_timestamp, bull, bear, winner)
            .with_momentum(momentum, self.momentum_gap.unwrap_or(0.0))
            .with_close_path(path);
        record.winner_payout_multiple = self.winner_payout_multiple;
        Ok(record)
    }
}

fn parse_wei(raw: &str) -> Result<u128> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(0);
    }
    trimmed
        .parse::<u128>()
        .with_context(|| format!("invalid wei amount '{trimmed}'"))
}

/// Closes are separated by `;` or whitespace, oldest first.
fn parse_close_path(raw: &str) -> Result<Vec<f64>> {
    raw.split(|c: char| c == ';' || c.is_whitespace())
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<f64>()
                .with_context(|| format!("invalid close price '{s}'"))
        })
        .collect()
}

/// Rounds loaded from a CSV file, kept in file order.
#[derive(Debug, Clone, Default)]
pub struct RoundCsvProvider {
    rounds: Vec<RoundRecord>,
}

impl RoundCsvProvider {
    /// Loads rounds from a CSV file with a header row.
    ///
    /// Required columns: `epoch`, `lock_timestamp`, `pool_bull_amount`,
    /// `pool_bear_amount`. The rest default to empty. Rounds are not sorted;
    /// ordering is checked by the engine.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The CSV file cannot be opened
    /// - A row is missing a required column
    /// - A pool amount is not a non-negative integer
    /// - A winner or momentum label is not recognized
    pub fn from_csv(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut reader = ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_path(path)
            .with_context(|| format!("Failed to open rounds file: {}", path.display()))?;

        let mut rounds = Vec::new();
        for (index, result) in reader.deserialize::<RoundRow>().enumerate() {
            // +2: header row and 1-based lines
            let line = index + 2;
            let row = result.with_context(|| format!("{}:{line}", path.display()))?;
            let record = row
                .into_record()
                .with_context(|| format!("{}:{line}", path.display()))?;
            rounds.push(record);
        }

        debug!(path = %path.display(), rounds = rounds.len(), "Loaded rounds");
        Ok(Self { rounds })
    }

    #[must_use]
    pub fn new(rounds: Vec<RoundRecord>) -> Self {
        Self { rounds }
    }

    #[must_use]
    pub fn rounds(&self) -> &[RoundRecord] {
        &self.rounds
    }

    #[must_use]
    pub fn into_rounds(self) -> Vec<RoundRecord> {
        self.rounds
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rounds.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rounds.is_empty()
    }
}

/// Writes rounds in the layout `RoundCsvProvider::from_csv` reads.
///
/// # Errors
/// Returns error if file cannot be created or writing fails
pub fn write_rounds_csv(path: impl AsRef<Path>, rounds: &[RoundRecord]) -> Result<()> {
    let path = path.as_ref();
    let file = File::create(path)
        .with_context(|| format!("Failed to create CSV file: {}", path.display()))?;
    let mut writer = Writer::from_writer(file);

    writer.write_record(ROUND_COLUMNS)?;
    for round in rounds {
        let path_field = round
            .close_price_path
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(";");
        writer.write_record(&[
            round.epoch.to_string(),
            round.lock_timestamp.to_string(),
            round.pool_bull_amount.to_string(),
            round.pool_bear_amount.to_string(),
            round.winner.to_string(),
            round
                .winner_payout_multiple
                .map(|m| m.to_string())
                .unwrap_or_default(),
            round.momentum_signal.to_string(),
            round.momentum_gap.to_string(),
            path_field,
        ])?;
    }

    writer.flush()?;
    Ok(())
}

/// Loads `timestamp,close` candles. Timestamps are unix seconds or RFC 3339.
///
/// # Errors
/// Returns error if the file cannot be read or a row does not parse
pub fn load_candles_csv(path: impl AsRef<Path>) -> Result<Vec<PriceCandle>> {
    let path = path.as_ref();
    let mut reader = ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .with_context(|| format!("Failed to open candles file: {}", path.display()))?;

    let headers = reader.headers()?.clone();
    let column = |name: &str| {
        headers
            .iter()
            .position(|h| h.eq_ignore_ascii_case(name))
            .ok_or_else(|| anyhow!("{}: missing '{name}' column", path.display()))
    };
    let ts_col = column("timestamp")?;
    let close_col = column("close")?;

    let mut candles = Vec::new();
    for result in reader.records() {
        let record = result?;
        let timestamp = parse_timestamp(&record[ts_col])?;
        let close: f64 = record[close_col]
            .parse()
            .with_context(|| format!("invalid close '{}'", &record[close_col]))?;
        candles.push(PriceCandle { timestamp, close });
    }

    debug!(path = %path.display(), candles = candles.len(), "Loaded candles");
    Ok(candles)
}

fn parse_timestamp(raw: &str) -> Result<i64> {
    if let Ok(secs) = raw.parse::<i64>() {
        return Ok(secs);
    }
    let parsed: DateTime<Utc> = raw
        .parse()
        .with_context(|| format!("invalid timestamp '{raw}'"))?;
    Ok(parsed.timestamp())
}

/// Column layout of `write_trades_csv`.
const TRADE_COLUMNS: [&str; 12] = [
    "epoch",
    "lock_timestamp",
    "signal",
    "mode",
    "implied_payout",
    "stake_fraction",
    "stake_amount",
    "won",
    "realized_payout_multiple",
    "profit",
    "bankroll_after",
    "signal_metadata",
];

/// Writes the trade ledger, one row per trade, in replay order.
///
/// Signal metadata is flattened to `key=value` pairs joined by `;`.
///
/// # Errors
/// Returns error if file cannot be created or writing fails
pub fn write_trades_csv(path: impl AsRef<Path>, trades: &[Trade]) -> Result<()> {
    let path = path.as_ref();
    let file = File::create(path)
        .with_context(|| format!("Failed to create CSV file: {}", path.display()))?;
    let mut writer = Writer::from_writer(file);

    writer.write_record(TRADE_COLUMNS)?;
    for trade in trades {
        let metadata = trade
            .signal_metadata
            .iter()
            .map(|(key, value)| format!("{key}={value}"))
            .collect::<Vec<_>>()
            .join(";");
        writer.write_record(&[
            trade.epoch.to_string(),
            trade.lock_timestamp.to_string(),
            trade.signal.to_string(),
            trade.mode.to_string(),
            trade
                .implied_payout
                .map(|p| p.to_string())
                .unwrap_or_default(),
            trade.stake_fraction.to_string(),
            trade.stake_amount.to_string(),
            trade.won.to_string(),
            trade.realized_payout_multiple.to_string(),
            trade.profit.to_string(),
            trade.bankroll_after.to_string(),
            metadata,
        ])?;
    }

    writer.flush()?;
    Ok(())
}
