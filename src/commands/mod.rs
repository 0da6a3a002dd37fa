pub mod batch;
pub mod simulate;
pub mod snapshot_bars;
pub mod stats;

use crate::models::SymbolProfile;
use crate::symbols::{load_profile_json, SymbolTable};
use anyhow::{anyhow, Result};
use log::info;
use std::path::Path;

/// Resolves a symbol profile from a JSON snapshot or a broker reference table.
/// The snapshot wins when both are given.
pub fn resolve_profile(
    symbol: &str,
    profile_file: Option<&Path>,
    symbols_table: Option<&Path>,
) -> Result<SymbolProfile> {
    if let Some(path) = profile_file {
        let profile = load_profile_json(path)?;
        info!("Using symbol profile for {} from {}", profile.symbol, path.display());
        return Ok(profile);
    }
    if let Some(path) = symbols_table {
        let table = SymbolTable::load_csv(path)?;
        return table.require(symbol).cloned();
    }
    Err(anyhow!(
        "No symbol profile source for {}. Pass --profile or --symbols-table.",
        symbol
    ))
}
