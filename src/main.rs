//! Replays an event script against the round-robin kernel and prints its
//! trace on stdout.
//!
//! ```bash
//! rr-kernel-sim data/scenario_c_preemption.txt
//! rr-kernel-sim --quantum 20 -vv script.txt
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::error;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use rr_kernel_simulator::driver::{Driver, DriverError, RunOutcome};
use rr_kernel_simulator::io::load_script;
use rr_kernel_simulator::kernel::KernelConfig;

/// Exit status for configuration, script and kernel errors.
const ERROR_EXIT_CODE: u8 = 2;

#[derive(Parser)]
#[command(name = "rr-kernel-sim")]
#[command(version)]
#[command(about = "Round-robin kernel simulator", long_about = None)]
struct Cli {
    /// Event script to replay
    script: PathBuf,

    /// Kernel configuration file (JSON)
    #[arg(short, long, env = "RR_KERNEL_CONFIG")]
    config: Option<PathBuf>,

    /// Process table capacity
    #[arg(long)]
    max_processes: Option<usize>,

    /// Time slice before preemption
    #[arg(long)]
    quantum: Option<u64>,

    /// Starting value of every semaphore
    #[arg(long)]
    initial_semaphore_value: Option<u32>,

    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };

    // stdout carries the trace, so diagnostics go to stderr.
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level)))
        .init();

    match run(cli) {
        Ok(outcome) => ExitCode::from(outcome.exit_code()),
        Err(err) => {
            error!("{}", err);
            ExitCode::from(ERROR_EXIT_CODE)
        }
    }
}

fn run(cli: Cli) -> Result<RunOutcome, DriverError> {
    let mut config = match &cli.config {
        Some(path) => KernelConfig::load(path)?,
        None => KernelConfig::default(),
    };
    if let Some(max_processes) = cli.max_processes {
        config.max_processes = max_processes;
    }
    if let Some(quantum) = cli.quantum {
        config.quantum = quantum;
    }
    if let Some(value) = cli.initial_semaphore_value {
        config.initial_semaphore_value = value;
    }

    let script = load_script(&cli.script)?;
    let mut driver = Driver::new(&config)?;

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    driver.run(&script, &mut out)
}
