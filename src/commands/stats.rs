use crate::artifacts::load_run_archive;
use crate::performance::PerformanceCalculator;
use anyhow::{Context, Result};
use log::{info, warn};
use std::fs;
use std::path::Path;

/// Recomputes statistics from a stored run archive, for every trade or only
/// those entered in `year`. Prints JSON to stdout unless an output path is
/// given.
pub fn run(archive: &Path, year: Option<i32>, output: Option<&Path>) -> Result<()> {
    let run = load_run_archive(archive)?;
    info!(
        "Recomputing statistics for {} on {} ({} closed trades, entry years {:?})",
        run.strategy_id,
        run.profile.symbol,
        run.order_book.len(),
        PerformanceCalculator::entry_years(&run.order_book)
    );

    let statistics = match year {
        Some(year) => {
            let statistics =
                PerformanceCalculator::calculate_statistics_for_year(&run.order_book, year);
            if statistics.total_trades == 0 && statistics.open_trades == 0 {
                warn!("No trades entered in {}", year);
            }
            statistics
        }
        None => PerformanceCalculator::calculate_statistics(&run.order_book),
    };
    let json = serde_json::to_string_pretty(&statistics)?;
    match output {
        Some(path) => {
            fs::write(path, json)
                .with_context(|| format!("Failed to write statistics {}", path.display()))?;
            info!("Statistics written to {}", path.display());
        }
        None => println!("{}", json),
    }
    Ok(())
}
