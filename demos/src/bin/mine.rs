//! Triplet Mining Example
//!
//! Runs one or every mining strategy on a synthetic clustered batch and prints
//! the loss, the diagnostics it reports and the norm of its gradient with
//! respect to the embeddings.
//!
//! ## Usage
//!
//! ```bash
//! # Semi-hard mining with a smaller margin
//! cargo run --bin mine -- --strategy batch_hard_semi --margin 0.3
//!
//! # Every strategy, reports as JSON lines
//! cargo run --bin mine -- --all --json
//!
//! # More logging
//! cargo run --bin mine -- -vv
//! ```

use std::path::PathBuf;

use anyhow::{ensure, Context, Result};
use burn::{backend::Autodiff, prelude::*, tensor::ElementConversion};
use clap::Parser;
use rand::{rngs::StdRng, SeedableRng};
use tracing_subscriber::{fmt, EnvFilter};
use triplet_loss_burn::{MiningStrategy, TripletLossConfig};
use triplet_loss_demos::{
    clustered_batch, create_device, get_backend_name, MiningReport, SelectedBackend,
    SelectedDevice, SyntheticBatchConfig,
};

type MiningBackend = Autodiff<SelectedBackend>;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Loss configuration file (JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Mining strategy, e.g. batch_hard or batch-all
    #[arg(short, long, default_value = "batch_hard")]
    strategy: String,

    /// Run every strategy
    #[arg(long)]
    all: bool,

    /// Override the margin
    #[arg(long)]
    margin: Option<f64>,

    /// Number of embeddings in the batch
    #[arg(long, default_value_t = SyntheticBatchConfig::default().batch_size)]
    batch_size: usize,

    /// Number of classes in the batch
    #[arg(long, default_value_t = SyntheticBatchConfig::default().num_classes)]
    num_classes: usize,

    /// Embedding dimension
    #[arg(long, default_value_t = SyntheticBatchConfig::default().dim)]
    dim: usize,

    /// Noise around the class centers
    #[arg(long, default_value_t = SyntheticBatchConfig::default().spread)]
    spread: f32,

    /// Random seed
    #[arg(long, default_value_t = SyntheticBatchConfig::default().seed)]
    seed: u64,

    /// Print one JSON report per strategy
    #[arg(long)]
    json: bool,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    ensure!(args.batch_size > 0, "Batch size must be positive");
    ensure!(args.dim > 0, "Embedding dimension must be positive");
    ensure!(args.num_classes > 0, "Number of classes must be positive");

    let base = match &args.config {
        Some(path) => {
            tracing::info!(config = %path.display(), "loading loss configuration");
            TripletLossConfig::load(path)
                .with_context(|| format!("Failed to load loss configuration: {}", path.display()))?
        }
        None => TripletLossConfig::new(args.strategy.parse()?),
    };
    let base = match args.margin {
        Some(margin) => base.with_margin(margin),
        None => base,
    };

    let strategies = if args.all {
        MiningStrategy::ALL.to_vec()
    } else if args.config.is_some() {
        vec![base.strategy.clone()]
    } else {
        vec![args.strategy.parse()?]
    };

    let batch = SyntheticBatchConfig {
        batch_size: args.batch_size,
        num_classes: args.num_classes,
        dim: args.dim,
        spread: args.spread,
        seed: args.seed,
    };
    let device = create_device();
    tracing::info!(
        backend = get_backend_name(),
        batch_size = batch.batch_size,
        num_classes = batch.num_classes,
        dim = batch.dim,
        "mining synthetic batch"
    );

    for strategy in strategies {
        let config = TripletLossConfig {
            strategy,
            ..base.clone()
        };
        let report = run_strategy(&config, &batch, &device)?;

        if args.json {
            println!("{}", serde_json::to_string(&report)?);
        } else {
            print_report(&report);
        }
    }

    Ok(())
}

fn init_logging(verbose: u8) {
    let filter = match verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Evaluate one strategy on a freshly drawn batch and backpropagate its loss.
fn run_strategy(
    config: &TripletLossConfig,
    batch: &SyntheticBatchConfig,
    device: &SelectedDevice,
) -> Result<MiningReport> {
    let loss = config
        .init()
        .with_context(|| format!("Invalid configuration for {}", config.strategy.name()))?;

    // Same batch for every strategy; the weights of batch-adapted follow it in the stream.
    let mut rng = StdRng::seed_from_u64(batch.seed);
    let (labels, embeddings) = clustered_batch::<MiningBackend, _>(batch, &mut rng, device);
    let embeddings = embeddings.require_grad();

    let output = loss.forward_with_rng(labels, embeddings.clone(), &mut rng);
    let fraction_positive = output
        .fraction_positive
        .map(|fraction| fraction.into_scalar().elem::<f32>());
    let centroid_penalty = output
        .centroid_penalty
        .map(|penalty| penalty.into_scalar().elem::<f32>());

    let grads = output.loss.clone().backward();
    let gradient_norm = embeddings
        .grad(&grads)
        .map(|grad| grad.powf_scalar(2.0).sum().sqrt().into_scalar().elem::<f32>())
        .unwrap_or_default();

    let report = MiningReport {
        strategy: config.strategy.name().to_string(),
        loss: output.loss.into_scalar().elem::<f32>(),
        gradient_norm,
        fraction_positive,
        centroid_penalty,
    };
    tracing::debug!(?report, "strategy evaluated");

    Ok(report)
}

fn print_report(report: &MiningReport) {
    print!(
        "{:<24} loss {:>10.6}  grad norm {:>10.6}",
        report.strategy, report.loss, report.gradient_norm
    );
    if let Some(fraction) = report.fraction_positive {
        print!("  active {:>6.2}%", fraction * 100.0);
    }
    if let Some(penalty) = report.centroid_penalty {
        print!("  l_match {penalty:>10.6}");
    }
    println!();
}
