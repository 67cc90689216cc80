use clap::{Parser, Subcommand};

mod commands;

use commands::{AnnotateArgs, BacktestArgs};

#[derive(Parser)]
#[command(name = "prediction-replay")]
#[command(about = "Replay betting strategies over historical prediction market rounds", long_about = None)]
struct Cli {
    /// Optional log file path (logs to file instead of stderr)
    #[arg(long, global = true)]
    log_file: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay rounds through the contrarian strategy with circuit breaker
    Backtest(BacktestArgs),
    /// Attach EMA momentum and trailing closes to a rounds file
    AnnotateMomentum(AnnotateArgs),
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = || {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"))
    };
    match &cli.log_file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)?;
            tracing_subscriber::fmt()
                .with_env_filter(filter())
                .with_ansi(false)
                .with_writer(std::sync::Mutex::new(file))
                .init();
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter())
                .with_writer(std::io::stderr)
                .init();
        }
    }

    match cli.command {
        Commands::Backtest(args) => commands::run_backtest(args)?,
        Commands::AnnotateMomentum(args) => commands::run_annotate(args)?,
    }

    Ok(())
}
