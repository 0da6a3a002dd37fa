use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

/// Where one symbol of a batch currently is.
#[derive(Debug, Clone, PartialEq)]
pub enum SymbolStage {
    Queued,
    LoadingBars,
    Simulating,
    WritingArtifacts,
    Finished { trades: usize, net_profit: f64 },
    Failed(String),
}

/// Per-symbol progress of a batch run, shared with the worker threads.
#[derive(Clone, Default)]
pub struct RunStatus {
    symbols: Arc<Mutex<BTreeMap<String, SymbolStage>>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BatchSummary {
    pub total_symbols: usize,
    pub finished_symbols: usize,
    pub failed_symbols: Vec<String>,
    /// Symbol with the highest net profit among finished ones.
    pub best: Option<(String, f64)>,
}

impl BatchSummary {
    pub fn all_failed(&self) -> bool {
        self.total_symbols > 0 && self.failed_symbols.len() == self.total_symbols
    }
}

impl RunStatus {
    pub fn new() -> Self {
        Self::default()
    }

    // A worker that panicked mid-update leaves a usable map behind.
    fn lock(&self) -> MutexGuard<'_, BTreeMap<String, SymbolStage>> {
        self.symbols
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Starts a new batch with every symbol queued.
    pub fn queue<'a>(&self, symbols: impl IntoIterator<Item = &'a str>) {
        let mut map = self.lock();
        map.clear();
        for symbol in symbols {
            map.insert(symbol.to_string(), SymbolStage::Queued);
        }
    }

    pub fn set_stage(&self, symbol: &str, stage: SymbolStage) {
        self.lock().insert(symbol.to_string(), stage);
    }

    pub fn stage(&self, symbol: &str) -> Option<SymbolStage> {
        self.lock().get(symbol).cloned()
    }

    pub fn summary(&self) -> BatchSummary {
        let map = self.lock();
        let mut summary = BatchSummary {
            total_symbols: map.len(),
            finished_symbols: 0,
            failed_symbols: Vec::new(),
            best: None,
        };
        for (symbol, stage) in map.iter() {
            match stage {
                SymbolStage::Finished { net_profit, .. } => {
                    summary.finished_symbols += 1;
                    if summary.best.as_ref().map_or(true, |(_, best)| net_profit > best) {
                        summary.best = Some((symbol.clone(), *net_profit));
                    }
                }
                SymbolStage::Failed(_) => summary.failed_symbols.push(symbol.clone()),
                _ => {}
            }
        }
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summarizes_stages_across_clones() {
        let status = RunStatus::new();
        status.queue(["EURUSD", "GBPUSD", "USDJPY"]);
        assert_eq!(status.stage("EURUSD"), Some(SymbolStage::Queued));

        let worker = status.clone();
        worker.set_stage("EURUSD", SymbolStage::Finished { trades: 4, net_profit: 12.5 });
        worker.set_stage("GBPUSD", SymbolStage::Failed("bad profile".to_string()));
        worker.set_stage("USDJPY", SymbolStage::Simulating);

        let summary = status.summary();
        assert_eq!(summary.total_symbols, 3);
        assert_eq!(summary.finished_symbols, 1);
        assert_eq!(summary.failed_symbols, vec!["GBPUSD".to_string()]);
        assert_eq!(summary.best, Some(("EURUSD".to_string(), 12.5)));
        assert!(!summary.all_failed());

        status.queue(["AUDUSD"]);
        status.set_stage("AUDUSD", SymbolStage::Failed("no bars".to_string()));
        assert!(status.summary().all_failed());
        assert_eq!(status.stage("EURUSD"), None);
    }
}
