use crate::artifacts::{write_run_artifacts, ArtifactPaths};
use crate::data_context::BarSeries;
use crate::engine::Engine;
use crate::models::{SimulationRun, StrategyStatistics, SymbolProfile};
use crate::performance::PerformanceCalculator;
use crate::run_status::{RunStatus, SymbolStage};
use anyhow::{anyhow, Result};
use crossbeam_channel::{bounded, Receiver, Sender};
use indicatif::{ProgressBar, ProgressStyle};
use log::{info, warn};
use std::path::PathBuf;
use std::result::Result as StdResult;
use std::sync::Arc;
use std::thread;
use std::time::Instant;

/// Where a worker gets the bars for its symbol.
pub enum BarSource {
    Path(PathBuf),
    Series(BarSeries),
}

pub struct SymbolJob {
    pub profile: SymbolProfile,
    pub source: BarSource,
}

pub struct SymbolReport {
    pub run: SimulationRun,
    pub statistics: StrategyStatistics,
    pub artifacts: Option<ArtifactPaths>,
}

pub struct SymbolOutcome {
    pub symbol: String,
    pub result: StdResult<SymbolReport, String>,
}

struct SymbolTask {
    index: usize,
    job: SymbolJob,
}

struct SymbolResultMsg {
    index: usize,
    symbol: String,
    duration_secs: f64,
    result: StdResult<SymbolReport, String>,
}

/// Runs one engine over many symbols on a pool of worker threads. Each
/// symbol gets its own simulation run and equity state.
pub struct SymbolBacktester {
    engine: Arc<Engine>,
    status: RunStatus,
    output_root: Option<PathBuf>,
    show_progress: bool,
}

impl SymbolBacktester {
    pub fn new(engine: Engine, status: RunStatus) -> Self {
        Self {
            engine: Arc::new(engine),
            status,
            output_root: None,
            show_progress: true,
        }
    }

    /// Write artifacts for every successful symbol under this root.
    pub fn with_output_root(mut self, output_root: PathBuf) -> Self {
        self.output_root = Some(output_root);
        self
    }

    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    /// Returns one outcome per job, in submission order.
    pub fn run(&self, jobs: Vec<SymbolJob>) -> Result<Vec<SymbolOutcome>> {
        let total = jobs.len();
        self.status.queue(jobs.iter().map(|job| job.profile.symbol.as_str()));
        if total == 0 {
            warn!("No symbols to backtest.");
            return Ok(Vec::new());
        }

        let num_workers = std::cmp::min(total, std::cmp::max(1, num_cpus::get()));
        info!(
            "Backtesting {} on {} symbols using {} worker threads",
            self.engine.strategy_id, total, num_workers
        );

        let (task_tx, task_rx): (Sender<SymbolTask>, Receiver<SymbolTask>) = bounded(total);
        let (result_tx, result_rx): (Sender<SymbolResultMsg>, Receiver<SymbolResultMsg>) =
            bounded(total);

        let mut handles = Vec::with_capacity(num_workers);
        for _worker_id in 0..num_workers {
            let rx = task_rx.clone();
            let result_tx = result_tx.clone();
            let engine = Arc::clone(&self.engine);
            let status = self.status.clone();
            let output_root = self.output_root.clone();

            let handle = thread::spawn(move || {
                while let Ok(task) = rx.recv() {
                    let start_time = Instant::now();
                    let symbol = task.job.profile.symbol.clone();
                    let result = run_symbol(&engine, &status, output_root.as_ref(), task.job)
                        .map_err(|err| format!("{:#}", err));
                    let duration_secs = start_time.elapsed().as_secs_f64();

                    match &result {
                        Ok(report) => info!(
                            "Worker finished {} in {:.1}s. Trades: {}, Net profit: {:.2}, Max DD: {:.2}%",
                            symbol,
                            duration_secs,
                            report.statistics.total_trades,
                            report.statistics.net_profit,
                            report.statistics.max_drawdown_ratio * 100.0
                        ),
                        Err(error) => warn!(
                            "Worker finished {} in {:.1}s with error: {}",
                            symbol, duration_secs, error
                        ),
                    }

                    let message = SymbolResultMsg {
                        index: task.index,
                        symbol,
                        duration_secs,
                        result,
                    };
                    if result_tx.send(message).is_err() {
                        break;
                    }
                }
            });
            handles.push(handle);
        }
        drop(result_tx);

        for (index, job) in jobs.into_iter().enumerate() {
            task_tx
                .send(SymbolTask { index, job })
                .map_err(|_| anyhow!("Worker pool stopped before all symbols were queued"))?;
        }
        drop(task_tx);

        let progress = if self.show_progress {
            ProgressBar::new(total as u64)
        } else {
            ProgressBar::hidden()
        };
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
        {
            progress.set_style(style.progress_chars("#>-"));
        }

        let mut slots: Vec<Option<SymbolOutcome>> = (0..total).map(|_| None).collect();
        let mut completed = 0usize;
        let mut total_secs = 0.0;
        while completed < total {
            match result_rx.recv() {
                Ok(message) => {
                    completed += 1;
                    total_secs += message.duration_secs;
                    progress.set_position(completed as u64);
                    let stage = match &message.result {
                        Ok(report) => SymbolStage::Finished {
                            trades: report.statistics.total_trades,
                            net_profit: report.statistics.net_profit,
                        },
                        Err(error) => SymbolStage::Failed(error.clone()),
                    };
                    self.status.set_stage(&message.symbol, stage);
                    progress.set_message(message.symbol.clone());
                    slots[message.index] = Some(SymbolOutcome {
                        symbol: message.symbol,
                        result: message.result,
                    });
                }
                Err(_) => {
                    warn!("Result channel closed unexpectedly. Some results may be lost.");
                    break;
                }
            }
        }

        let summary = self.status.summary();
        if summary.failed_symbols.is_empty() {
            progress.finish_with_message("Backtesting completed");
        } else {
            progress.finish_with_message("Backtesting completed with errors");
            warn!(
                "Backtesting completed with {} failed symbol(s): {}",
                summary.failed_symbols.len(),
                summary.failed_symbols.join(", ")
            );
        }
        if let Some((symbol, net_profit)) = &summary.best {
            info!("Best symbol: {} with net profit {:.2}", symbol, net_profit);
        }
        info!(
            "Processed {} symbols in {:.1}s of worker time",
            completed, total_secs
        );

        for handle in handles {
            if handle.join().is_err() {
                warn!("A backtest worker thread panicked");
            }
        }

        slots
            .into_iter()
            .enumerate()
            .map(|(index, slot)| {
                slot.ok_or_else(|| anyhow!("No result received for symbol #{}", index + 1))
            })
            .collect()
    }
}

fn run_symbol(
    engine: &Engine,
    status: &RunStatus,
    output_root: Option<&PathBuf>,
    job: SymbolJob,
) -> Result<SymbolReport> {
    let SymbolJob { profile, source } = job;
    let symbol = profile.symbol.as_str();
    let series = match source {
        BarSource::Series(series) => series,
        BarSource::Path(path) => {
            status.set_stage(symbol, SymbolStage::LoadingBars);
            BarSeries::load(&path, symbol)?
        }
    };

    status.set_stage(symbol, SymbolStage::Simulating);
    let run = engine.simulate(&profile, series.bars())?;
    let statistics = PerformanceCalculator::calculate_statistics(&run.order_book);
    let artifacts = match output_root {
        Some(root) => {
            status.set_stage(symbol, SymbolStage::WritingArtifacts);
            Some(write_run_artifacts(root, &run, &statistics)?)
        }
        None => None,
    };

    Ok(SymbolReport {
        run,
        statistics,
        artifacts,
    })
}
