use crate::backtester::{BarSource, SymbolBacktester, SymbolJob};
use crate::config::load_settings_file;
use crate::engine::Engine;
use crate::run_status::RunStatus;
use crate::symbols::{normalize_symbol, SymbolTable};
use anyhow::{anyhow, Context, Result};
use log::{info, warn};
use std::fs;
use std::path::{Path, PathBuf};

pub struct BatchArgs<'a> {
    pub strategy_id: &'a str,
    pub bars_dir: &'a Path,
    pub settings_file: &'a Path,
    pub symbols_table: &'a Path,
    pub symbols: &'a [String],
    pub output_root: &'a Path,
}

/// Bar files are named `<SYMBOL>.csv` or `<SYMBOL>.bin`; a snapshot is
/// preferred over the CSV of the same symbol.
pub fn discover_bar_files(bars_dir: &Path) -> Result<Vec<(String, PathBuf)>> {
    let mut found: Vec<(String, PathBuf)> = Vec::new();
    let entries = fs::read_dir(bars_dir)
        .with_context(|| format!("Failed to list bar directory {}", bars_dir.display()))?;
    for entry in entries {
        let path = entry?.path();
        let extension = path.extension().and_then(|ext| ext.to_str());
        if !matches!(extension, Some("csv") | Some("bin")) {
            continue;
        }
        let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) else {
            continue;
        };
        let symbol = normalize_symbol(stem);
        match found.iter_mut().find(|(existing, _)| *existing == symbol) {
            Some(slot) => {
                if extension == Some("bin") {
                    slot.1 = path;
                }
            }
            None => found.push((symbol, path)),
        }
    }
    found.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(found)
}

pub fn run(args: BatchArgs<'_>) -> Result<()> {
    let BatchArgs {
        strategy_id,
        bars_dir,
        settings_file,
        symbols_table,
        symbols,
        output_root,
    } = args;

    let settings = load_settings_file(settings_file)?;
    let engine = Engine::from_settings_map(strategy_id, &settings)
        .with_context(|| format!("Invalid settings in {}", settings_file.display()))?;
    let table = SymbolTable::load_csv(symbols_table)?;

    let wanted: Vec<String> = symbols.iter().map(|s| normalize_symbol(s)).collect();
    let mut jobs = Vec::new();
    for (symbol, path) in discover_bar_files(bars_dir)? {
        if !wanted.is_empty() && !wanted.contains(&symbol) {
            continue;
        }
        match table.get(&symbol) {
            Some(profile) => jobs.push(SymbolJob {
                profile: profile.clone(),
                source: BarSource::Path(path),
            }),
            None => warn!(
                "Skipping {}: no entry in symbol table {}",
                symbol,
                symbols_table.display()
            ),
        }
    }
    if jobs.is_empty() {
        return Err(anyhow!(
            "No bar files with known symbols found in {}",
            bars_dir.display()
        ));
    }

    let status = RunStatus::new();
    let backtester = SymbolBacktester::new(engine, status.clone())
        .with_output_root(output_root.to_path_buf());
    let outcomes = backtester.run(jobs)?;

    for outcome in &outcomes {
        match &outcome.result {
            Ok(report) => info!(
                "{:<10} trades {:>5}  net {:>12.2}  win {:>5.1}%  max dd {:>6.2}%",
                outcome.symbol,
                report.statistics.total_trades,
                report.statistics.net_profit,
                report.statistics.win_rate * 100.0,
                report.statistics.max_drawdown_ratio * 100.0
            ),
            Err(error) => warn!("{:<10} failed: {}", outcome.symbol, error),
        }
    }

    let summary = status.summary();
    if summary.all_failed() {
        return Err(anyhow!("All {} symbols failed", summary.total_symbols));
    }
    Ok(())
}
