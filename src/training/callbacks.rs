//! Standard observers
//!
//! The three observers every training run attaches, in order: console
//! progress, per-split evaluation (train first, then test) and epoch
//! checkpointing. Ordering matters: metrics are printed for the epoch before
//! its checkpoint hits the disk.

use std::collections::VecDeque;
use std::io::Write;
use std::time::Instant;

use burn::tensor::backend::AutodiffBackend;

use crate::dataset::XrayBatch;
use crate::error::Result;
use crate::training::checkpoint::{Checkpoint, CheckpointStore};
use crate::training::engine::EngineState;
use crate::training::evaluator::evaluate;
use crate::training::observer::{Observer, RunView};

/// Iterations of history kept for throughput and ETA estimates
pub const HISTORY_CAPACITY: usize = 100;

/// Bounded FIFO history of iteration timestamps and losses
///
/// Owned exclusively by the progress observer; the engine itself keeps no
/// rolling window.
#[derive(Debug)]
pub struct RollingHistory {
    timestamps: VecDeque<Instant>,
    losses: VecDeque<f64>,
    capacity: usize,
}

impl RollingHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            timestamps: VecDeque::with_capacity(capacity),
            losses: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Drop all history (start of a run)
    pub fn clear(&mut self) {
        self.timestamps.clear();
        self.losses.clear();
    }

    /// Record one iteration, evicting the oldest entry when full
    pub fn push(&mut self, at: Instant, loss: f64) {
        if self.timestamps.len() == self.capacity {
            self.timestamps.pop_front();
            self.losses.pop_front();
        }
        self.timestamps.push_back(at);
        self.losses.push_back(loss);
    }

    pub fn len(&self) -> usize {
        self.losses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.losses.is_empty()
    }

    /// Mean loss over the window
    pub fn mean_loss(&self) -> f64 {
        if self.losses.is_empty() {
            return 0.0;
        }
        self.losses.iter().sum::<f64>() / self.losses.len() as f64
    }

    /// Mean seconds per iteration over the window (gradient of timestamps)
    pub fn seconds_per_iteration(&self) -> Option<f64> {
        if self.timestamps.len() < 2 {
            return None;
        }
        let first = *self.timestamps.front()?;
        let last = *self.timestamps.back()?;
        let span = last.duration_since(first).as_secs_f64();
        Some(span / (self.timestamps.len() - 1) as f64)
    }

    #[cfg(test)]
    fn losses(&self) -> &VecDeque<f64> {
        &self.losses
    }
}

/// Same-line console progress with throughput and ETA
///
/// The rolling history is always maintained; the progress line itself is
/// only printed in verbose mode.
pub struct ProgressObserver {
    history: RollingHistory,
    verbose: bool,
}

impl ProgressObserver {
    pub fn new(verbose: bool) -> Self {
        Self {
            history: RollingHistory::new(HISTORY_CAPACITY),
            verbose,
        }
    }
}

impl Default for ProgressObserver {
    fn default() -> Self {
        Self::new(true)
    }
}

fn format_hms(seconds: f64) -> String {
    let total = seconds.max(0.0).round() as u64;
    format!("{:02}:{:02}:{:02}", total / 3600, (total % 3600) / 60, total % 60)
}

impl<B: AutodiffBackend> Observer<B> for ProgressObserver {
    fn on_run_started(&mut self, _state: &EngineState, _view: &RunView<'_, B>) -> Result<()> {
        self.history.clear();
        Ok(())
    }

    fn on_iteration_completed(
        &mut self,
        state: &EngineState,
        _view: &RunView<'_, B>,
    ) -> Result<()> {
        self.history.push(Instant::now(), state.last_loss);
        if !self.verbose {
            return Ok(());
        }

        let timing = match self.history.seconds_per_iteration() {
            Some(spi) => {
                // ETA covers the remainder of the current epoch
                let remaining = state.epoch_length.saturating_sub(state.iteration);
                format!("{:.2} s/it; ETA {}", spi, format_hms(spi * remaining as f64))
            }
            None => "-- s/it".to_string(),
        };

        print!(
            "\rEPOCH: {:03} | BATCH: {:03} of {:03} | LOSS: {:.3} ({:.3} mean) | ({})",
            state.epoch,
            state.iteration,
            state.epoch_length,
            state.last_loss,
            self.history.mean_loss(),
            timing
        );
        let _ = std::io::stdout().flush();
        Ok(())
    }

    fn on_epoch_completed(&mut self, _state: &EngineState, _view: &RunView<'_, B>) -> Result<()> {
        if self.verbose {
            // Terminate the \r progress line before the epoch summary prints
            println!();
        }
        Ok(())
    }
}

/// Evaluates one split at every epoch boundary and prints its metrics
pub struct EvalObserver<B: AutodiffBackend> {
    label: String,
    batches: Vec<XrayBatch<B::InnerBackend>>,
}

impl<B: AutodiffBackend> EvalObserver<B> {
    pub fn new(label: impl Into<String>, batches: Vec<XrayBatch<B::InnerBackend>>) -> Self {
        Self {
            label: label.into(),
            batches,
        }
    }
}

impl<B: AutodiffBackend> Observer<B> for EvalObserver<B> {
    fn on_epoch_completed(&mut self, _state: &EngineState, view: &RunView<'_, B>) -> Result<()> {
        let metrics = evaluate(view.model, &self.batches)?;
        println!(
            "{:<10} Accuracy: {:.3} | Loss: {:.3} | Precision: {:.3}",
            self.label, metrics.accuracy, metrics.loss, metrics.precision
        );
        Ok(())
    }
}

/// Writes the epoch checkpoint and the rolling latest file
pub struct CheckpointObserver {
    store: CheckpointStore,
}

impl CheckpointObserver {
    pub fn new(store: CheckpointStore) -> Self {
        Self { store }
    }
}

impl<B: AutodiffBackend> Observer<B> for CheckpointObserver {
    fn on_epoch_completed(&mut self, state: &EngineState, view: &RunView<'_, B>) -> Result<()> {
        let checkpoint = Checkpoint {
            epoch: state.epoch,
            model: view.model_bytes()?,
            optimizer: view.optimizer_bytes()?,
        };
        self.store.save_epoch(&checkpoint)?;
        Ok(())
    }
}
