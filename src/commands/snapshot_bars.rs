use crate::data_context::BarSeries;
use anyhow::{anyhow, Result};
use log::info;
use std::path::Path;

pub fn run(input: &Path, symbol: &str, output_path: &Path) -> Result<()> {
    info!(
        "Generating bar snapshot for {} from {} at {}",
        symbol,
        input.display(),
        output_path.display()
    );

    let series = BarSeries::load_csv(input, symbol)?;
    if series.is_empty() {
        return Err(anyhow!("No bars found in {}", input.display()));
    }
    series.save_to_file(output_path)?;

    if let Some((first, last)) = series.time_range() {
        info!(
            "Bar snapshot written to {} ({} bars, {} signals, {} - {})",
            output_path.display(),
            series.len(),
            series.signal_count(),
            first,
            last
        );
    }
    Ok(())
}
