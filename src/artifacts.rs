//! Files written for each simulated strategy/symbol pair.

use crate::models::{generate_book_file_stem, SimulationRun, StrategyStatistics, Trade};
use crate::symbols::save_profile_json;
use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use log::info;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

const RUN_ARCHIVE_VERSION: u32 = 1;

#[derive(Serialize, Deserialize)]
struct RunArchive {
    version: u32,
    run: SimulationRun,
}

/// Locations of every artifact of one run.
#[derive(Debug, Clone, PartialEq)]
pub struct ArtifactPaths {
    pub directory: PathBuf,
    pub book_csv: PathBuf,
    pub book_bin: PathBuf,
    pub details_json: PathBuf,
    pub statistics_json: PathBuf,
}

impl ArtifactPaths {
    pub fn new(output_root: &Path, strategy_id: &str, symbol: &str) -> Self {
        let directory = output_root.join(strategy_id).join(symbol);
        let stem = generate_book_file_stem(symbol, strategy_id);
        Self {
            book_csv: directory.join(format!("book_{}.csv", stem)),
            book_bin: directory.join(format!("book_{}.bin", stem)),
            details_json: directory.join(format!("details_{}.json", stem)),
            statistics_json: directory.join(format!("statistics_{}.json", stem)),
            directory,
        }
    }
}

#[derive(Serialize)]
struct BookRow<'a> {
    order: u64,
    #[serde(rename = "type")]
    direction: &'a str,
    volume: f64,
    symbol: &'a str,
    entry_time: DateTime<Utc>,
    entry_price: f64,
    stop_loss: f64,
    take_profit: f64,
    exit_time: Option<DateTime<Utc>>,
    exit_price: Option<f64>,
    exit_reason: Option<&'a str>,
    commission: f64,
    swap: Option<f64>,
    profit: Option<f64>,
    pips: Option<f64>,
    n_open_trades: usize,
    status: &'a str,
    balance: Option<f64>,
    return_percent: Option<f64>,
}

impl<'a> BookRow<'a> {
    fn from_trade(trade: &'a Trade, balance: Option<f64>, return_percent: Option<f64>) -> Self {
        Self {
            order: trade.id,
            direction: trade.direction.as_str(),
            volume: trade.lot_size,
            symbol: &trade.symbol,
            entry_time: trade.entry_time,
            entry_price: trade.entry_price,
            stop_loss: trade.stop_loss,
            take_profit: trade.take_profit,
            exit_time: trade.exit_time,
            exit_price: trade.exit_price,
            exit_reason: trade.exit_reason.map(|reason| reason.as_str()),
            commission: trade.commission,
            swap: trade.swap,
            profit: trade.profit,
            pips: trade.pips,
            n_open_trades: trade.open_positions_at_entry,
            status: trade.status.as_str(),
            balance,
            return_percent,
        }
    }
}

/// Writes the book CSV, the binary run archive, the symbol profile and the
/// statistics under `<output_root>/<strategy>/<symbol>/`.
pub fn write_run_artifacts(
    output_root: &Path,
    run: &SimulationRun,
    statistics: &StrategyStatistics,
) -> Result<ArtifactPaths> {
    let paths = ArtifactPaths::new(output_root, &run.strategy_id, &run.profile.symbol);
    fs::create_dir_all(&paths.directory).with_context(|| {
        format!(
            "Failed to create artifact directory {}",
            paths.directory.display()
        )
    })?;

    write_book_csv(&paths.book_csv, run)?;
    save_run_archive(&paths.book_bin, run)?;
    save_profile_json(&run.profile, &paths.details_json)?;
    let statistics_json = serde_json::to_string_pretty(statistics)?;
    fs::write(&paths.statistics_json, statistics_json).with_context(|| {
        format!(
            "Failed to write statistics {}",
            paths.statistics_json.display()
        )
    })?;

    info!(
        "Wrote {} artifacts for {} to {}",
        run.strategy_id,
        run.profile.symbol,
        paths.directory.display()
    );
    Ok(paths)
}

/// Resolved trades first (with balance columns), then still-open trades.
pub fn write_book_csv(path: &Path, run: &SimulationRun) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create order book {}", path.display()))?;
    for row in &run.order_book.entries {
        writer.serialize(BookRow::from_trade(
            &row.trade,
            Some(row.balance),
            Some(row.return_percent),
        ))?;
    }
    for trade in &run.order_book.open_trades {
        writer.serialize(BookRow::from_trade(trade, None, None))?;
    }
    writer
        .flush()
        .with_context(|| format!("Failed to flush order book {}", path.display()))?;
    Ok(())
}

pub fn save_run_archive(path: &Path, run: &SimulationRun) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("Unable to create run archive at {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    let archive = RunArchive {
        version: RUN_ARCHIVE_VERSION,
        run: run.clone(),
    };
    bincode::serialize_into(&mut writer, &archive).context("Failed to serialize run archive")?;
    writer.flush().context("Failed to flush run archive")?;
    Ok(())
}

pub fn load_run_archive(path: &Path) -> Result<SimulationRun> {
    let file = File::open(path)
        .with_context(|| format!("Failed to open run archive at {}", path.display()))?;
    let archive: RunArchive = bincode::deserialize_from(BufReader::new(file))
        .context("Run archive decode failed")?;
    if archive.version != RUN_ARCHIVE_VERSION {
        return Err(anyhow!(
            "Run archive version mismatch (found {}, expected {})",
            archive.version,
            RUN_ARCHIVE_VERSION
        ));
    }
    Ok(archive.run)
}
