//! Forge Command-Line Interface
//!
//! Solves molecular ground-state problems with entanglement forging on the
//! local simulator.
//!
//! ```text
//! forge solve --problem h2.yaml --config solver.yaml --format json
//! forge reduce --problem lih.yaml
//! forge exact --problem h2.yaml
//! ```

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use console::style;
use tracing_subscriber::EnvFilter;

mod commands;

use commands::{exact, reduce, solve};

/// Forge - entanglement-forged ground-state energies
#[derive(Parser)]
#[command(name = "forge")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the forged solver on a problem file
    Solve {
        /// Problem file (YAML or JSON)
        #[arg(short, long)]
        problem: PathBuf,

        /// Solver settings file (YAML or JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Maximum optimizer iterations
        #[arg(long)]
        maxiter: Option<usize>,

        /// Optimizer (SPSA, COBYLA, NELDER-MEAD)
        #[arg(long)]
        optimizer: Option<String>,

        /// Shots per Pauli term (exact expectation values if omitted)
        #[arg(short, long)]
        shots: Option<u32>,

        /// Seed for sampling and SPSA
        #[arg(long)]
        seed: Option<u64>,

        /// Write the result to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Output format
        #[arg(short, long, default_value = "text", value_parser = ["text", "json"])]
        format: String,
    },

    /// Show the active-space reduction of a problem
    Reduce {
        /// Problem file (YAML or JSON)
        #[arg(short, long)]
        problem: PathBuf,
    },

    /// Compute the exact (full CI) reference energy
    Exact {
        /// Problem file (YAML or JSON)
        #[arg(short, long)]
        problem: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let result = match cli.command {
        Commands::Solve {
            problem,
            config,
            maxiter,
            optimizer,
            shots,
            seed,
            output,
            format,
        } => {
            let overrides = solve::Overrides {
                maxiter,
                optimizer,
                shots,
                seed,
            };
            solve::execute(
                &problem,
                config.as_deref(),
                overrides,
                output.as_deref(),
                &format,
            )
            .await
        }

        Commands::Reduce { problem } => reduce::execute(&problem),

        Commands::Exact { problem } => exact::execute(&problem),
    };

    if let Err(e) = result {
        eprintln!("{} {:#}", style("Error:").red().bold(), e);
        std::process::exit(1);
    }

    Ok(())
}
