//! # Run one policy
//! regime-walkforward run --data data/features_SPY.csv --policy hybrid
//!
//! # Compare static, regime-specific and hybrid policies plus buy-and-hold
//! regime-walkforward compare --config config/spy.toml --data data/features_SPY.csv
//!
//! # Metrics for a written signals table
//! regime-walkforward metrics --signals results/signals_SPY.csv

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use regime_walkforward::metrics::MetricsCalculator;
use regime_walkforward::policy::PolicyKind;
use regime_walkforward::walkforward::compare_policies;
use regime_walkforward::{
    DataLoader, ModelKind, ResultWriter, WalkForwardConfig, WalkForwardEngine,
};

#[derive(Parser)]
#[command(name = "regime-walkforward")]
#[command(about = "Walk-forward backtests of regime-aware trading classifiers")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Options shared by `run` and `compare`.
#[derive(Args)]
struct RunArgs {
    /// Path to a TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Path to the engineered feature CSV
    #[arg(short, long)]
    data: PathBuf,

    /// Output directory for results
    #[arg(short, long, default_value = "results")]
    output: PathBuf,

    /// Asset identifier (column prefix)
    #[arg(long)]
    ticker: Option<String>,

    /// Training window length in rows
    #[arg(long)]
    window: Option<usize>,

    /// Maximum steps between refits
    #[arg(long)]
    retrain_interval: Option<usize>,

    /// Classifier family
    #[arg(long, value_enum)]
    model: Option<ModelKind>,

    /// Transaction cost per unit of position change
    #[arg(long)]
    cost: Option<f64>,

    /// Random seed
    #[arg(long)]
    seed: Option<u64>,
}

impl RunArgs {
    fn build_config(&self) -> Result<WalkForwardConfig> {
        let mut config = match &self.config {
            Some(path) => WalkForwardConfig::from_toml_file(path)
                .with_context(|| format!("Failed to load config {}", path.display()))?,
            None => WalkForwardConfig::default(),
        };
        if let Some(ticker) = &self.ticker {
            config.ticker = ticker.clone();
        }
        if let Some(window) = self.window {
            config.window_size = window;
        }
        if let Some(interval) = self.retrain_interval {
            config.retrain_interval = interval;
        }
        if let Some(model) = self.model {
            config.model = model;
        }
        if let Some(cost) = self.cost {
            config.costs.base_rate = cost;
        }
        if let Some(seed) = self.seed {
            config.seed = seed;
        }
        config.validate()?;
        Ok(config)
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Run a walk-forward backtest with one retrain policy
    Run {
        #[command(flatten)]
        args: RunArgs,

        /// Retrain policy
        #[arg(long, value_enum)]
        policy: Option<PolicyKind>,
    },

    /// Run all retrain policies side by side
    Compare {
        #[command(flatten)]
        args: RunArgs,
    },

    /// Compute performance metrics from a signals CSV
    Metrics {
        /// Path to a signals CSV written by `run`
        #[arg(short, long)]
        signals: PathBuf,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("regime_walkforward=info".parse()?),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run { args, policy } => {
            let mut config = args.build_config()?;
            if let Some(policy) = policy {
                config.policy = policy;
            }

            let table = config
                .load_table(&args.data)
                .with_context(|| format!("Failed to load {}", args.data.display()))?;
            let engine = WalkForwardEngine::new(config.clone())?;
            let result = engine.run(&table)?;

            let writer = ResultWriter::new(&args.output)?;
            writer.write(&result, &config.ticker)?;

            let metrics = MetricsCalculator::calculate(&result.signals);
            writer.write_json(&format!("metrics_{}.json", config.ticker), &metrics)?;
            println!("{}", metrics.summary());
            info!(
                "Final equity {:.6} after {} trades",
                result.final_equity, result.stats.total_trades
            );
        }
        Commands::Compare { args } => {
            let config = args.build_config()?;
            let table = config
                .load_table(&args.data)
                .with_context(|| format!("Failed to load {}", args.data.display()))?;

            let comparison = compare_policies(&config, &table, &PolicyKind::ALL, None)?;

            let writer = ResultWriter::new(&args.output)?;
            for (kind, result) in &comparison.runs {
                writer.write(result, &format!("{}_{}", config.ticker, kind))?;
            }
            writer.write_json(
                &format!("comparison_{}.json", config.ticker),
                &comparison.report,
            )?;

            for (label, metrics) in &comparison.report.metrics {
                println!("[{}]\n{}\n", label, metrics.summary());
            }
            for pair in &comparison.report.disagreements {
                println!(
                    "{} vs {}: {} of {} days differ ({:.1}%)",
                    pair.left,
                    pair.right,
                    pair.counts.disagreements,
                    pair.counts.common_days,
                    pair.counts.rate * 100.0
                );
            }
        }
        Commands::Metrics { signals } => {
            let records = DataLoader::load_signals(&signals)
                .with_context(|| format!("Failed to load {}", signals.display()))?;
            let metrics = MetricsCalculator::calculate(&records);
            println!("{}", serde_json::to_string_pretty(&metrics)?);
        }
    }

    Ok(())
}
