//! Momentum annotation CLI command.

use anyhow::Result;
use clap::Args;

use prediction_replay_backtest::{
    annotate_momentum, load_candles_csv, write_rounds_csv, MomentumParams, RoundCsvProvider,
};

/// Arguments for the annotate-momentum command.
#[derive(Args, Debug, Clone)]
pub struct AnnotateArgs {
    /// Rounds CSV file to annotate
    #[arg(long)]
    pub rounds: String,

    /// Price candles CSV file (timestamp,close)
    #[arg(long)]
    pub candles: String,

    /// Output rounds CSV file
    #[arg(short, long)]
    pub output: String,

    /// Fast EMA window
    #[arg(long, default_value = "12")]
    pub fast: usize,

    /// Slow EMA window
    #[arg(long, default_value = "26")]
    pub slow: usize,

    /// |gap| in percent below which momentum is NEUTRAL
    #[arg(long, default_value = "0.05")]
    pub neutral_gap: f64,

    /// Trailing closes stored per round
    #[arg(long, default_value = "12")]
    pub path_len: usize,
}

impl AnnotateArgs {
    fn params(&self) -> MomentumParams {
        MomentumParams {
            fast: self.fast,
            slow: self.slow,
            neutral_gap_pct: self.neutral_gap,
            path_len: self.path_len,
        }
    }
}

/// Runs the annotate-momentum command.
///
/// # Errors
/// Returns an error if reading inputs, annotating, or writing output fails.
pub fn run_annotate(args: AnnotateArgs) -> Result<()> {
    let mut rounds = RoundCsvProvider::from_csv(&args.rounds)?.into_rounds();
    let candles = load_candles_csv(&args.candles)?;
    tracing::info!(
        "Annotating {} rounds from {} candles (EMA {}/{})",
        rounds.len(),
        candles.len(),
        args.fast,
        args.slow
    );

    let directional = annotate_momentum(&mut rounds, &candles, &args.params())?;
    write_rounds_csv(&args.output, &rounds)?;

    tracing::info!(
        "{} of {} rounds have a directional signal; written to {}",
        directional,
        rounds.len(),
        args.output
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use prediction_replay_core::{MomentumSignal, RoundRecord, Winner};

    #[test]
    fn annotates_rounds_file() {
        let dir = tempfile::tempdir().unwrap();
        let rounds_path = dir.path().join("rounds.csv");
        let candles_path = dir.path().join("candles.csv");
        let output_path = dir.path().join("annotated.csv");

        write_rounds_csv(
            &rounds_path,
            &[RoundRecord::new(1, 600, 10, 10, Winner::Up)],
        )
        .unwrap();
        let mut candles = String::from("timestamp,close\n");
        for i in 0..=10 {
            candles.push_str(&format!("{},{}\n", i * 60, 100 + i));
        }
        std::fs::write(&candles_path, candles).unwrap();

        run_annotate(AnnotateArgs {
            rounds: rounds_path.to_string_lossy().into_owned(),
            candles: candles_path.to_string_lossy().into_owned(),
            output: output_path.to_string_lossy().into_owned(),
            fast: 3,
            slow: 6,
            neutral_gap: 0.05,
            path_len: 4,
        })
        .unwrap();

        let annotated = RoundCsvProvider::from_csv(&output_path).unwrap().into_rounds();
        assert_eq!(annotated[0].momentum_signal, MomentumSignal::Bull);
        assert_eq!(annotated[0].close_price_path, vec![107.0, 108.0, 109.0, 110.0]);
    }
}
