//! Symbol reference data: pip size, spread and swap rates per symbol.

use crate::models::SymbolProfile;
use anyhow::{anyhow, Context, Result};
use log::info;
use serde::Deserialize;
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::BufReader;
use std::path::Path;

/// One row of a broker symbol export. Values are in broker points.
#[derive(Debug, Deserialize)]
struct SymbolRecord {
    name: String,
    point: f64,
    spread: f64,
    swap_long: f64,
    swap_short: f64,
}

/// Profiles keyed by upper-cased symbol name.
#[derive(Debug, Clone, Default)]
pub struct SymbolTable {
    profiles: HashMap<String, SymbolProfile>,
}

impl SymbolTable {
    pub fn load_csv<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .with_context(|| format!("Failed to open symbol table at {}", path.display()))?;
        let mut reader = csv::Reader::from_reader(BufReader::new(file));

        let mut profiles = HashMap::new();
        for (index, record) in reader.deserialize::<SymbolRecord>().enumerate() {
            let record = record
                .with_context(|| format!("Failed to parse symbol table row {}", index + 2))?;
            let profile = SymbolProfile::from_broker_units(
                record.name.trim(),
                record.point,
                record.spread,
                record.swap_long,
                record.swap_short,
            );
            profiles.insert(normalize_symbol(&profile.symbol), profile);
        }

        info!("Loaded {} symbol profiles from {}", profiles.len(), path.display());
        Ok(Self { profiles })
    }

    pub fn from_profiles(profiles: impl IntoIterator<Item = SymbolProfile>) -> Self {
        Self {
            profiles: profiles
                .into_iter()
                .map(|profile| (normalize_symbol(&profile.symbol), profile))
                .collect(),
        }
    }

    pub fn get(&self, symbol: &str) -> Option<&SymbolProfile> {
        self.profiles.get(&normalize_symbol(symbol))
    }

    pub fn require(&self, symbol: &str) -> Result<&SymbolProfile> {
        self.get(symbol)
            .ok_or_else(|| anyhow!("Symbol {} not found in reference table", symbol))
    }

    pub fn symbols(&self) -> Vec<String> {
        let mut symbols: Vec<String> = self
            .profiles
            .values()
            .map(|profile| profile.symbol.clone())
            .collect();
        symbols.sort();
        symbols
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}

pub fn normalize_symbol(symbol: &str) -> String {
    symbol.trim().to_ascii_uppercase()
}

/// Reads a profile written by [`save_profile_json`].
pub fn load_profile_json<P: AsRef<Path>>(path: P) -> Result<SymbolProfile> {
    let path = path.as_ref();
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read symbol profile {}", path.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("Invalid symbol profile JSON in {}", path.display()))
}

pub fn save_profile_json<P: AsRef<Path>>(profile: &SymbolProfile, path: P) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }
    }
    let json = serde_json::to_string_pretty(profile)?;
    fs::write(path, json)
        .with_context(|| format!("Failed to write symbol profile {}", path.display()))
}
