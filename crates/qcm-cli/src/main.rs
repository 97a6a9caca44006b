use anyhow::Context;
use clap::{Parser, Subcommand};
use qcm_algo::{
    ControlLoop, ControlLoopConfig, GridEvaluator, NetworkEvaluator, RewardScaledUpdate,
    RotationLadderPolicy,
};
use qcm_core::BusId;
use qcm_scenarios::{attach_wind_farm, stress_case, write_profile_csv, ProfileManifest, WindProfileSpec};
use rand::{rngs::StdRng, Rng, SeedableRng};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::FmtSubscriber;

/// Congestion management via quantum-behaved particle swarm optimization.
#[derive(Parser)]
#[command(name = "qcm", version, about)]
struct Cli {
    /// Increase log verbosity (-v: debug, -vv: trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the adaptive control loop on the bundled six-bus stress case
    Optimize {
        /// Maximum number of epochs
        #[arg(long, default_value_t = 50)]
        epochs: usize,
        /// Swarm size per epoch
        #[arg(long, default_value_t = 20)]
        particles: usize,
        /// QPSO steps per epoch
        #[arg(long, default_value_t = 1)]
        iterations: usize,
        /// Learning rate of the heuristic weight update
        #[arg(long, default_value_t = 0.01)]
        learning_rate: f64,
        /// RNG seed for reproducible runs
        #[arg(long)]
        seed: Option<u64>,
        /// Stop after this many epochs without reward improvement
        #[arg(long)]
        patience: Option<usize>,
        /// Minimum reward improvement that resets the plateau counter
        #[arg(long, default_value_t = 1e-6)]
        tolerance: f64,
        /// Wall-clock budget in seconds
        #[arg(long)]
        time_budget: Option<u64>,
        /// Wind-farm nameplate attached at bus 2 (MW)
        #[arg(long, default_value_t = 50.0)]
        wind_mw: f64,
        /// Write the full epoch trace as JSON
        #[arg(long)]
        report: Option<PathBuf>,
    },
    /// Generate a stochastic Weibull wind profile
    WindProfile {
        /// Number of hourly samples
        #[arg(long, default_value_t = 24)]
        hours: usize,
        /// Nameplate base power in MW
        #[arg(long, default_value_t = 100.0)]
        base_mw: f64,
        /// Weibull shape parameter
        #[arg(long, default_value_t = 2.0)]
        shape: f64,
        /// RNG seed for reproducible profiles
        #[arg(long)]
        seed: Option<u64>,
        /// Output CSV path
        #[arg(long, default_value = "renewable_penetration_profile.csv")]
        out: PathBuf,
        /// Also write a JSON provenance manifest
        #[arg(long)]
        manifest: Option<PathBuf>,
    },
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => tracing::Level::INFO,
        1 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
}

fn run_optimize(
    epochs: usize,
    particles: usize,
    iterations: usize,
    learning_rate: f64,
    seed: Option<u64>,
    patience: Option<usize>,
    tolerance: f64,
    time_budget: Option<u64>,
    wind_mw: f64,
    report_path: Option<PathBuf>,
) -> anyhow::Result<()> {
    let mut network = stress_case();
    if wind_mw > 0.0 {
        attach_wind_farm(&mut network, BusId::new(2), wind_mw, 10.0)
            .context("attaching wind farm")?;
    }
    info!("case loaded: {}", network.stats());

    let feature_width = 6;
    let qubits = feature_width * 2;
    let mut evaluator =
        NetworkEvaluator::new(network, feature_width).context("building grid evaluator")?;
    let baseline_reward = evaluator.reward().map_err(anyhow::Error::from)?;
    info!(reward = baseline_reward, "baseline grid evaluated");

    let mut config = ControlLoopConfig::new(epochs, particles, evaluator.action_len())
        .with_iteration_budget(iterations);
    config.plateau_tolerance = tolerance;
    config.plateau_patience = patience;
    config.time_budget_secs = time_budget;
    config.seed = seed;

    let mut weight_rng = match seed {
        Some(s) => StdRng::seed_from_u64(s),
        None => StdRng::from_entropy(),
    };
    let initial_weights: Vec<f64> = (0..qubits).map(|_| weight_rng.gen::<f64>()).collect();

    let mut control = ControlLoop::new(
        evaluator,
        RotationLadderPolicy::new(qubits).map_err(anyhow::Error::from)?,
        Box::new(RewardScaledUpdate::new(learning_rate)),
        initial_weights,
        config,
    )
    .map_err(anyhow::Error::from)?;

    let report = control.run().map_err(anyhow::Error::from)?;

    for record in &report.records {
        println!(
            "Epoch {:>3} | Beta: {:.4} | Reward: {:.4}",
            record.epoch, record.beta, record.reward
        );
    }
    if let Some(last) = report.records.last() {
        println!(
            "Stopped after {} epochs ({:?}); reward {:.4} (baseline {:.4})",
            report.records.len(),
            report.stop_reason,
            last.reward,
            baseline_reward
        );
    }

    if let Some(path) = report_path {
        let json = serde_json::to_string_pretty(&report)?;
        std::fs::write(&path, json)
            .with_context(|| format!("writing report to {}", path.display()))?;
        info!("report written to {}", path.display());
    }
    Ok(())
}

fn run_wind_profile(
    hours: usize,
    base_mw: f64,
    shape: f64,
    seed: Option<u64>,
    out: PathBuf,
    manifest: Option<PathBuf>,
) -> anyhow::Result<()> {
    let mut spec = WindProfileSpec::daily(base_mw).with_hours(hours).with_shape(shape);
    spec.seed = seed;

    let samples = spec.generate().map_err(anyhow::Error::from)?;
    write_profile_csv(&samples, &out).map_err(anyhow::Error::from)?;
    println!("{} hourly samples written to {}", samples.len(), out.display());

    if let Some(path) = manifest {
        ProfileManifest::new(spec)
            .write_json(&path)
            .map_err(anyhow::Error::from)?;
        println!("manifest written to {}", path.display());
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Optimize {
            epochs,
            particles,
            iterations,
            learning_rate,
            seed,
            patience,
            tolerance,
            time_budget,
            wind_mw,
            report,
        } => run_optimize(
            epochs,
            particles,
            iterations,
            learning_rate,
            seed,
            patience,
            tolerance,
            time_budget,
            wind_mw,
            report,
        ),
        Commands::WindProfile {
            hours,
            base_mw,
            shape,
            seed,
            out,
            manifest,
        } => run_wind_profile(hours, base_mw, shape, seed, out, manifest),
    }
}
