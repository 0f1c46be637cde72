//! Command-line entry point for the FIFO throughput benchmark.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use log::info;
use results::ResultsRecorder;
use sim_device::SimDevice;
use sweep::{SweepConfig, SweepController};

/// Measure FIFO transfer throughput across a matrix of bitstream and
/// pattern configurations.
#[derive(Parser, Debug)]
#[command(author, version, about = "FPGA FIFO throughput benchmark", long_about = None)]
struct Args {
    /// Path to the sweep configuration file.
    #[arg(long, default_value = "fifobench.toml")]
    config: PathBuf,

    /// Device backend to run against.
    #[arg(long, value_enum, default_value_t = Backend::Sim)]
    device: Backend,
}

/// Available device backends. The hardware contract is a trait seam; a
/// vendor-library backend plugs in here without touching the sweep.
#[derive(ValueEnum, Clone, Copy, Debug)]
enum Backend {
    /// Software model of the FIFO test board.
    Sim,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let cfg = SweepConfig::load(&args.config)
        .with_context(|| format!("failed to load sweep configuration from {:?}", args.config))?;

    let mut dev = match args.device {
        Backend::Sim => SimDevice::new(),
    };
    device::check_open(&dev).context("device is not available")?;

    let mut recorder = ResultsRecorder::new(cfg.results_path.clone(), cfg.result_sep.clone());
    if let Some(headers) = cfg.headers.clone() {
        recorder = recorder.with_headers(headers);
    }
    recorder
        .write_header()
        .context("failed to start the results file")?;

    SweepController::new(&mut dev, &cfg, &recorder)
        .run()
        .context("sweep aborted")?;

    info!("sweep complete, results in {}", recorder.path().display());
    Ok(())
}
