use clap::{Parser, Subcommand};
use log::info;
use signal_backtester::commands::{
    batch::{self, BatchArgs},
    simulate::{self, SimulateArgs},
    snapshot_bars, stats,
};
use std::path::PathBuf;

const DEFAULT_OUTPUT_ROOT: &str = "results";

#[derive(Parser)]
#[command(name = "signal-backtester")]
#[command(about = "Minute-bar trade simulation and statistics for signal strategies")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Simulate one strategy on one symbol and write its order book
    Simulate {
        /// Strategy identifier used in output paths
        #[arg(long)]
        strategy: String,
        /// Symbol name (looked up in the symbol table)
        #[arg(long)]
        symbol: String,
        /// Signal-annotated bars (CSV or .bin snapshot)
        #[arg(long = "bars", value_name = "PATH")]
        bars_file: PathBuf,
        /// Strategy settings (JSON object or KEY=VALUE lines)
        #[arg(long = "settings", value_name = "PATH")]
        settings_file: PathBuf,
        /// Symbol profile JSON snapshot
        #[arg(long = "profile", value_name = "PATH")]
        profile_file: Option<PathBuf>,
        /// Broker symbol reference table (CSV)
        #[arg(long = "symbols-table", value_name = "PATH")]
        symbols_table: Option<PathBuf>,
        /// Root directory for artifacts
        #[arg(short, long = "output", value_name = "PATH")]
        output: Option<PathBuf>,
    },
    /// Simulate one strategy across every symbol in a bar directory
    Batch {
        /// Strategy identifier used in output paths
        #[arg(long)]
        strategy: String,
        /// Directory with one `<SYMBOL>.csv` or `<SYMBOL>.bin` per symbol
        #[arg(long = "bars-dir", value_name = "DIR")]
        bars_dir: PathBuf,
        /// Strategy settings (JSON object or KEY=VALUE lines)
        #[arg(long = "settings", value_name = "PATH")]
        settings_file: PathBuf,
        /// Broker symbol reference table (CSV)
        #[arg(long = "symbols-table", value_name = "PATH")]
        symbols_table: PathBuf,
        /// Comma separated subset of symbols to run
        #[arg(long, value_delimiter = ',')]
        symbols: Vec<String>,
        /// Root directory for artifacts
        #[arg(short, long = "output", value_name = "PATH")]
        output: Option<PathBuf>,
    },
    /// Recompute statistics from a stored run archive
    Stats {
        /// Run archive written by simulate or batch (book_*.bin)
        #[arg(value_name = "PATH")]
        archive: PathBuf,
        /// Only count trades entered in this year
        #[arg(long)]
        year: Option<i32>,
        /// Write the statistics JSON here instead of stdout
        #[arg(short, long = "output", value_name = "PATH")]
        output: Option<PathBuf>,
    },
    /// Convert a bar CSV into a binary snapshot
    SnapshotBars {
        /// Source CSV
        #[arg(long = "input", value_name = "PATH")]
        input: PathBuf,
        /// Symbol stored in the snapshot
        #[arg(long)]
        symbol: String,
        /// Destination file for the snapshot
        #[arg(short, long = "output", value_name = "PATH")]
        output: PathBuf,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let Cli { command } = cli;

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    info!("Starting signal-backtester. Simulated results are not indicative of live trading.");

    match command {
        Commands::Simulate {
            strategy,
            symbol,
            bars_file,
            settings_file,
            profile_file,
            symbols_table,
            output,
        } => {
            let output_root = resolve_output_root(output);
            simulate::run(SimulateArgs {
                strategy_id: &strategy,
                symbol: &symbol,
                bars_file: &bars_file,
                settings_file: &settings_file,
                profile_file: profile_file.as_deref(),
                symbols_table: symbols_table.as_deref(),
                output_root: &output_root,
            })?;
        }
        Commands::Batch {
            strategy,
            bars_dir,
            settings_file,
            symbols_table,
            symbols,
            output,
        } => {
            let output_root = resolve_output_root(output);
            batch::run(BatchArgs {
                strategy_id: &strategy,
                bars_dir: &bars_dir,
                settings_file: &settings_file,
                symbols_table: &symbols_table,
                symbols: &symbols,
                output_root: &output_root,
            })?;
        }
        Commands::Stats {
            archive,
            year,
            output,
        } => {
            stats::run(&archive, year, output.as_deref())?;
        }
        Commands::SnapshotBars {
            input,
            symbol,
            output,
        } => {
            snapshot_bars::run(&input, &symbol, &output)?;
        }
    }

    Ok(())
}

fn resolve_output_root(cli_value: Option<PathBuf>) -> PathBuf {
    if let Some(path) = cli_value {
        return path;
    }

    PathBuf::from(DEFAULT_OUTPUT_ROOT)
}
