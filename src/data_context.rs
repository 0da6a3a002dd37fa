use crate::models::MarketBar;
use anyhow::{anyhow, Context, Result};
use chrono::prelude::*;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

const BAR_SNAPSHOT_VERSION: u32 = 1;
/// Stored for signal cells that are not a whole number in `i8` range, so the
/// engine rejects that candidate instead of the whole file failing to load.
const UNREADABLE_SIGNAL: i8 = i8::MIN;

#[derive(Serialize, Deserialize)]
struct BarSnapshot {
    version: u32,
    generated_at: DateTime<Utc>,
    symbol: String,
    bars: Vec<MarketBar>,
}

/// CSV row as written by the signal generator. Flags may be `true`/`false`
/// or `1`/`0`; the signal may carry a trailing `.0`. Blank prices load as NaN.
#[derive(Debug, Deserialize)]
struct BarRecord {
    time: String,
    #[serde(default)]
    open: Option<f64>,
    #[serde(default)]
    high: Option<f64>,
    #[serde(default)]
    low: Option<f64>,
    #[serde(default)]
    close: Option<f64>,
    #[serde(default)]
    signal: Option<f64>,
    #[serde(default, alias = "SL_long")]
    stop_loss_long_pips: Option<f64>,
    #[serde(default, alias = "TP_long")]
    take_profit_long_pips: Option<f64>,
    #[serde(default, alias = "SL_short")]
    stop_loss_short_pips: Option<f64>,
    #[serde(default, alias = "TP_short")]
    take_profit_short_pips: Option<f64>,
    #[serde(default, alias = "cond_close_long")]
    close_condition_long: Option<String>,
    #[serde(default, alias = "cond_close_short")]
    close_condition_short: Option<String>,
    #[serde(default)]
    entry_price_long: Option<f64>,
    #[serde(default)]
    entry_price_short: Option<f64>,
}

impl BarRecord {
    fn into_bar(self, row: usize) -> Result<MarketBar> {
        let time = parse_bar_time(&self.time)
            .with_context(|| format!("Row {} has an unreadable time '{}'", row, self.time))?;
        let signal = match self.signal {
            Some(value) if value.is_finite() && value.fract() == 0.0 && value.abs() <= 127.0 => {
                value as i8
            }
            Some(value) if value.is_nan() => 0,
            None => 0,
            Some(value) => {
                warn!("Row {} has an invalid signal {}", row, value);
                UNREADABLE_SIGNAL
            }
        };
        let price = |value: Option<f64>| value.unwrap_or(f64::NAN);
        Ok(MarketBar {
            time,
            open: price(self.open),
            high: price(self.high),
            low: price(self.low),
            close: price(self.close),
            signal,
            stop_loss_long_pips: self.stop_loss_long_pips,
            take_profit_long_pips: self.take_profit_long_pips,
            stop_loss_short_pips: self.stop_loss_short_pips,
            take_profit_short_pips: self.take_profit_short_pips,
            close_condition_long: parse_flag(self.close_condition_long.as_deref()),
            close_condition_short: parse_flag(self.close_condition_short.as_deref()),
            entry_price_long: self.entry_price_long,
            entry_price_short: self.entry_price_short,
        })
    }
}

/// Accepts RFC 3339 and the naive `%Y-%m-%d %H:%M:%S` form (read as UTC).
pub fn parse_bar_time(raw: &str) -> Result<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Ok(parsed.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Ok(Utc.from_utc_datetime(&naive));
        }
    }
    Err(anyhow!("Unsupported timestamp format: {}", raw))
}

fn parse_flag(raw: Option<&str>) -> bool {
    match raw.map(|value| value.trim().to_ascii_lowercase()) {
        Some(value) => matches!(value.as_str(), "1" | "1.0" | "true" | "yes"),
        None => false,
    }
}

/// Signal-annotated minute bars of one symbol.
#[derive(Debug, Clone)]
pub struct BarSeries {
    symbol: String,
    bars: Vec<MarketBar>,
}

impl BarSeries {
    pub fn new(symbol: &str, bars: Vec<MarketBar>) -> Self {
        Self {
            symbol: symbol.to_string(),
            bars,
        }
    }

    /// Loads a bincode snapshot when the extension is `.bin`, CSV otherwise.
    pub fn load<P: AsRef<Path>>(path: P, symbol: &str) -> Result<Self> {
        let path = path.as_ref();
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("bin") => Self::load_from_file(path),
            _ => Self::load_csv(path, symbol),
        }
    }

    pub fn load_csv<P: AsRef<Path>>(path: P, symbol: &str) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .with_context(|| format!("Failed to open bar CSV at {}", path.display()))?;
        let mut reader = csv::Reader::from_reader(BufReader::new(file));

        let mut bars = Vec::new();
        let mut unpriced = 0usize;
        for (index, record) in reader.deserialize::<BarRecord>().enumerate() {
            let row = index + 2;
            let record =
                record.with_context(|| format!("Failed to parse {} row {}", path.display(), row))?;
            let bar = record.into_bar(row)?;
            if !(bar.open.is_finite() && bar.high.is_finite() && bar.low.is_finite()) {
                unpriced += 1;
            }
            bars.push(bar);
        }
        if unpriced > 0 {
            warn!(
                "{} bar(s) in {} have missing prices",
                unpriced,
                path.display()
            );
        }

        info!("Loaded {} bars for {} from {}", bars.len(), symbol, path.display());
        Ok(Self::new(symbol, bars))
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .with_context(|| format!("Failed to open bar snapshot at {}", path.display()))?;
        let reader = BufReader::new(file);
        let snapshot: BarSnapshot =
            bincode::deserialize_from(reader).context("Bar snapshot decode failed")?;

        if snapshot.version != BAR_SNAPSHOT_VERSION {
            return Err(anyhow!(
                "Bar snapshot version mismatch (found {}, expected {})",
                snapshot.version,
                BAR_SNAPSHOT_VERSION
            ));
        }

        info!(
            "Loaded {} bars for {} from snapshot generated at {}",
            snapshot.bars.len(),
            snapshot.symbol,
            snapshot.generated_at
        );
        Ok(Self::new(&snapshot.symbol, snapshot.bars))
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create snapshot directory {}", parent.display())
                })?;
            }
        }

        let file = File::create(path)
            .with_context(|| format!("Unable to create bar snapshot at {}", path.display()))?;
        let mut writer = BufWriter::new(file);
        let snapshot = BarSnapshot {
            version: BAR_SNAPSHOT_VERSION,
            generated_at: Utc::now(),
            symbol: self.symbol.clone(),
            bars: self.bars.clone(),
        };
        bincode::serialize_into(&mut writer, &snapshot)
            .context("Failed to serialize bar snapshot")?;
        writer
            .flush()
            .context("Failed to flush bar snapshot to disk")?;
        Ok(())
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn bars(&self) -> &[MarketBar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn signal_count(&self) -> usize {
        self.bars.iter().filter(|bar| bar.signal != 0).count()
    }

    pub fn time_range(&self) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        Some((self.bars.first()?.time, self.bars.last()?.time))
    }

    /// Keeps bars with `start <= time <= end`.
    pub fn restrict_to_date_range(
        self,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Self {
        let bars = self
            .bars
            .into_iter()
            .filter(|bar| start.map_or(true, |start| bar.time >= start))
            .filter(|bar| end.map_or(true, |end| bar.time <= end))
            .collect();
        Self {
            symbol: self.symbol,
            bars,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CSV: &str = "\
time,open,high,low,close,signal,SL_long,TP_long,SL_short,TP_short,cond_close_long,cond_close_short
2024-01-02 08:00:00,1.1,1.1002,1.0998,1.1001,1.0,20,40,,,False,False
2024-01-02 08:01:00,1.1001,1.1003,1.0999,1.1002,0.0,,,,,True,0
2024-01-02T08:02:00Z,1.1002,1.1004,1.1,1.1003,-1,,,15,30,0,1
";

    #[test]
    fn parses_csv_with_research_column_names() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("EURUSD.csv");
        std::fs::write(&path, CSV).unwrap();

        let series = BarSeries::load_csv(&path, "EURUSD").unwrap();
        assert_eq!(series.len(), 3);
        assert_eq!(series.signal_count(), 2);
        let bars = series.bars();
        assert_eq!(bars[0].signal, 1);
        assert_eq!(bars[0].stop_loss_long_pips, Some(20.0));
        assert_eq!(bars[0].stop_loss_short_pips, None);
        assert!(bars[1].close_condition_long);
        assert!(!bars[1].close_condition_short);
        assert_eq!(bars[2].signal, -1);
        assert!(bars[2].close_condition_short);
        assert_eq!(
            bars[2].time,
            Utc.with_ymd_and_hms(2024, 1, 2, 8, 2, 0).unwrap()
        );
    }

    #[test]
    fn snapshot_roundtrip_preserves_bars() {
        let dir = tempfile::tempdir().unwrap();
        let csv_path = dir.path().join("bars.csv");
        std::fs::write(&csv_path, CSV).unwrap();
        let series = BarSeries::load_csv(&csv_path, "EURUSD").unwrap();

        let snapshot_path = dir.path().join("nested").join("EURUSD.bin");
        series.save_to_file(&snapshot_path).unwrap();
        let loaded = BarSeries::load(&snapshot_path, "ignored").unwrap();
        assert_eq!(loaded.symbol(), "EURUSD");
        assert_eq!(loaded.len(), series.len());
        assert_eq!(loaded.bars()[2].take_profit_short_pips, Some(30.0));
    }

    #[test]
    fn keeps_unpriced_rows_and_unreadable_signals() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("GBPUSD.csv");
        std::fs::write(
            &path,
            "time,open,high,low,close,signal,SL_long,TP_long\n\
             2024-01-02 08:00:00,,1.2002,1.1998,1.2,1,20,40\n\
             2024-01-02 08:01:00,1.2,1.2002,1.1998,1.2,0.5,20,40\n",
        )
        .unwrap();

        let series = BarSeries::load_csv(&path, "GBPUSD").unwrap();
        assert_eq!(series.len(), 2);
        assert!(series.bars()[0].open.is_nan());
        assert_eq!(series.bars()[0].signal, 1);
        assert_eq!(series.bars()[1].signal, UNREADABLE_SIGNAL);
    }

    #[test]
    fn rejects_unknown_time_format() {
        assert!(parse_bar_time("02/01/2024 08:00").is_err());
        assert!(parse_bar_time("2024-01-02 08:00").is_ok());
    }

    #[test]
    fn restricts_to_date_range() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bars.csv");
        std::fs::write(&path, CSV).unwrap();
        let series = BarSeries::load_csv(&path, "EURUSD")
            .unwrap()
            .restrict_to_date_range(Some(Utc.with_ymd_and_hms(2024, 1, 2, 8, 1, 0).unwrap()), None);
        assert_eq!(series.len(), 2);
        assert_eq!(series.signal_count(), 1);
    }
}
