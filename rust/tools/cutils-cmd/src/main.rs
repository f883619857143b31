use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;
mod utils;

#[derive(Parser)]
#[command(name = "cutils-cmd")]
#[command(about = "Command-line driver for running parallel task groups")]
#[command(version)]
struct Cli {
    /// Increase log verbosity (-v for debug, -vv for trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a batch of synthetic jobs and report each job's outcome
    Run {
        /// Number of jobs in the batch
        #[arg(short, long, default_value_t = 8)]
        jobs: usize,

        /// How long each job sleeps, in milliseconds
        #[arg(long, default_value_t = 100)]
        sleep_ms: u64,

        /// Random extra sleep added to each job, up to this many milliseconds
        #[arg(long, default_value_t = 0)]
        jitter_ms: u64,

        /// Make every K-th job fail (0 disables failures)
        #[arg(long, default_value_t = 0)]
        fail_every: usize,

        /// Give up waiting after this many milliseconds (0 waits for all jobs)
        #[arg(short, long, default_value_t = 0)]
        timeout_ms: u64,

        /// Run on a fixed pool of this many threads instead of a cached pool
        #[arg(long)]
        threads: Option<usize>,

        /// JSON file with the pool configuration
        #[arg(short, long, conflicts_with = "threads")]
        config: Option<String>,
    },

    /// Print the effective pool configuration
    Config {
        /// JSON file with the pool configuration (defaults if omitted)
        #[arg(short, long)]
        file: Option<String>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    utils::init_logging(cli.verbose);

    match cli.command {
        Commands::Run {
            jobs,
            sleep_ms,
            jitter_ms,
            fail_every,
            timeout_ms,
            threads,
            config,
        } => commands::run::run(commands::run::RunArgs {
            jobs,
            sleep_ms,
            jitter_ms,
            fail_every,
            timeout_ms,
            threads,
            config,
        }),
        Commands::Config { file } => commands::config::run(file),
    }
}
