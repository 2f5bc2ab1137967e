mod inspect;
mod logging;
mod simulate;

use std::path::PathBuf;

use clap::Parser;
use inspect::exec_inspect;
use logging::{default_env_filter, setup_logger};
use simulate::{SimulateArgs, exec_simulate};
use vispart_error::VispartResult;

/// Inspect partitioned visibility stores and run simulated partition passes.
#[derive(clap::Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Raise the log level: once for debug, twice for trace. `RUST_LOG` takes precedence.
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Debug, clap::Subcommand)]
enum Commands {
    /// Print the header of a shard data file or a metadata file.
    Inspect {
        file: PathBuf,
        /// Metadata records to list.
        #[arg(long, default_value_t = 8)]
        records: usize,
    },
    /// Partition a generated dataset, write a model through every shard and commit it.
    Simulate(SimulateArgs),
}

fn main() -> VispartResult<()> {
    let cli = Cli::parse();
    setup_logger(default_env_filter(cli.verbose))?;
    match cli.command {
        Commands::Inspect { file, records } => exec_inspect(&file, records),
        Commands::Simulate(args) => exec_simulate(args),
    }
}
