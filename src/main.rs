// CLI entry for the denoiser.
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use log::error;

use ising_denoise::sampler::Params;

#[derive(Parser, Debug)]
#[command(
    name = "denoiser",
    version,
    about = "Distributed Ising-model denoiser for binary text images"
)]
struct Cli {
    /// Input image (whitespace-separated -1/+1 values, one row per line)
    input: PathBuf,
    /// Output image path
    output: PathBuf,
    /// Coupling strength between adjacent pixels
    beta: f64,
    /// Assumed flip probability of the noise channel, strictly in (0, 1)
    pi: f64,

    /// Total proposal budget, split evenly across workers
    #[arg(long, default_value_t = 5_000_000)]
    iterations: u64,
    /// RNG seed; each worker derives its own stream from it
    #[arg(long)]
    seed: Option<u64>,
    /// Number of worker threads (thread transport only)
    #[cfg(not(feature = "mpi-support"))]
    #[arg(long, default_value_t = 4)]
    workers: usize,
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            // Argument errors exit 1; --help/--version exit 0.
            let _ = e.print();
            return if e.use_stderr() {
                ExitCode::from(1)
            } else {
                ExitCode::SUCCESS
            };
        }
    };
    let params = match Params::from_beta_pi(cli.beta, cli.pi) {
        Ok(p) => p,
        Err(e) => {
            error!("{e}");
            return ExitCode::from(1);
        }
    };
    match run(cli, params) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e:#}");
            ExitCode::from(2)
        }
    }
}

/// Thread deployment: coordinator on this thread, workers on their own.
#[cfg(not(feature = "mpi-support"))]
fn run(cli: Cli, params: Params) -> Result<()> {
    use ising_denoise::comm::ThreadComm;
    use ising_denoise::coordinator::run_coordinator;
    use ising_denoise::worker::run_worker;

    let seed = cli.seed.unwrap_or_else(rand::random);
    let mut comms = ThreadComm::fabric(cli.workers + 1);
    let coordinator_comm = comms.remove(0);

    let mut handles = Vec::with_capacity(cli.workers);
    for comm in comms {
        let params = params;
        handles.push(std::thread::spawn(move || {
            run_worker(&comm, &params, cli.iterations, seed)
        }));
    }

    // A coordinator failure (bad input, indivisible layout) leaves the
    // workers blocked in their startup handshake; report it without
    // joining them.
    run_coordinator(&coordinator_comm, &cli.input, &cli.output).context("coordinator failed")?;
    for (i, h) in handles.into_iter().enumerate() {
        h.join()
            .map_err(|_| anyhow::anyhow!("worker {} panicked", i + 1))?
            .with_context(|| format!("worker {} failed", i + 1))?;
    }
    Ok(())
}

/// MPI deployment: rank 0 coordinates, every other rank samples.
#[cfg(feature = "mpi-support")]
fn run(cli: Cli, params: Params) -> Result<()> {
    use ising_denoise::comm::{Communicator, MpiComm};
    use ising_denoise::coordinator::run_coordinator;
    use ising_denoise::grid::layout::COORDINATOR;
    use ising_denoise::worker::run_worker;

    let comm = MpiComm::default();
    let seed = cli.seed.unwrap_or_else(rand::random);
    if comm.rank() == COORDINATOR {
        run_coordinator(&comm, &cli.input, &cli.output).context("coordinator failed")?;
    } else {
        run_worker(&comm, &params, cli.iterations, seed).context("worker failed")?;
    }
    Ok(())
}
