use crate::artifacts::write_run_artifacts;
use crate::commands::resolve_profile;
use crate::config::load_settings_file;
use crate::data_context::BarSeries;
use crate::engine::Engine;
use crate::performance::PerformanceCalculator;
use anyhow::{Context, Result};
use log::info;
use std::path::Path;

pub struct SimulateArgs<'a> {
    pub strategy_id: &'a str,
    pub symbol: &'a str,
    pub bars_file: &'a Path,
    pub settings_file: &'a Path,
    pub profile_file: Option<&'a Path>,
    pub symbols_table: Option<&'a Path>,
    pub output_root: &'a Path,
}

pub fn run(args: SimulateArgs<'_>) -> Result<()> {
    let SimulateArgs {
        strategy_id,
        symbol,
        bars_file,
        settings_file,
        profile_file,
        symbols_table,
        output_root,
    } = args;
    info!(
        "Received simulate command for strategy={} symbol={}",
        strategy_id, symbol
    );

    let settings = load_settings_file(settings_file)?;
    let engine = Engine::from_settings_map(strategy_id, &settings)
        .with_context(|| format!("Invalid settings in {}", settings_file.display()))?;
    let profile = resolve_profile(symbol, profile_file, symbols_table)?;
    let series = BarSeries::load(bars_file, &profile.symbol)?;

    let run = engine.simulate(&profile, series.bars())?;
    let statistics = PerformanceCalculator::calculate_statistics(&run.order_book);
    let paths = write_run_artifacts(output_root, &run, &statistics)?;

    info!(
        "{} on {}: {} trades ({} open), net profit {:.2} ({:.2}%), win rate {:.1}%, max drawdown {:.2}%",
        strategy_id,
        profile.symbol,
        statistics.total_trades,
        statistics.open_trades,
        statistics.net_profit,
        statistics.net_profit_percent,
        statistics.win_rate * 100.0,
        statistics.max_drawdown_ratio * 100.0
    );
    info!("Order book written to {}", paths.book_csv.display());
    Ok(())
}
