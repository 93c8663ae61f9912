//! Training Engine
//!
//! Drives the supervised training loop over pre-built batches, tracking its
//! progress through an explicit phase machine and emitting events to the
//! attached observers. The engine owns the model and the optimizer; observers
//! only ever see them through a [`RunView`].
//!
//! Phase transitions:
//! `NotStarted -> Running <-> EpochBoundary -> Completed`, with any error
//! moving to the terminal `Failed` phase. A run is single-shot; a finished
//! engine cannot be re-run.

use burn::{
    module::Module,
    nn::loss::CrossEntropyLossConfig,
    optim::{GradientsParams, Optimizer},
    record::{BinBytesRecorder, FullPrecisionSettings, Recorder},
    tensor::{backend::AutodiffBackend, ElementConversion},
};
use tracing::{debug, info, warn};

use crate::dataset::XrayBatch;
use crate::error::{PacemakerError, Result};
use crate::model::PacemakerClassifier;
use crate::training::observer::{ObserverList, RunView, StateSnapshot};

/// Where the engine is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnginePhase {
    NotStarted,
    Running,
    EpochBoundary,
    Completed,
    Failed,
}

/// Counters exposed to observers on every event
#[derive(Debug, Clone, Default)]
pub struct EngineState {
    /// Current epoch, 1-based once the run starts
    pub epoch: usize,
    /// Iteration within the current epoch, resets each epoch
    pub iteration: usize,
    /// Batches per epoch
    pub epoch_length: usize,
    /// Total epochs this run will perform
    pub max_epochs: usize,
    /// Loss of the most recent training batch
    pub last_loss: f64,
}

/// Serializes the engine's model and optimizer to in-memory records
struct EngineSnapshot<'a, B, O>
where
    B: AutodiffBackend,
    O: Optimizer<PacemakerClassifier<B>, B>,
{
    model: &'a PacemakerClassifier<B>,
    optimizer: &'a O,
}

impl<B, O> StateSnapshot for EngineSnapshot<'_, B, O>
where
    B: AutodiffBackend,
    O: Optimizer<PacemakerClassifier<B>, B>,
{
    fn model_bytes(&self) -> Result<Vec<u8>> {
        let recorder = BinBytesRecorder::<FullPrecisionSettings>::default();
        Ok(recorder.record(self.model.clone().into_record(), ())?)
    }

    fn optimizer_bytes(&self) -> Result<Vec<u8>> {
        let recorder = BinBytesRecorder::<FullPrecisionSettings>::default();
        Ok(recorder.record(self.optimizer.to_record(), ())?)
    }
}

/// Supervised training engine
pub struct Engine<B, O>
where
    B: AutodiffBackend,
    O: Optimizer<PacemakerClassifier<B>, B>,
{
    model: PacemakerClassifier<B>,
    optimizer: O,
    learning_rate: f64,
    device: B::Device,
    state: EngineState,
    phase: EnginePhase,
}

impl<B, O> Engine<B, O>
where
    B: AutodiffBackend,
    O: Optimizer<PacemakerClassifier<B>, B>,
{
    /// Create an engine ready to run
    pub fn new(
        model: PacemakerClassifier<B>,
        optimizer: O,
        learning_rate: f64,
        device: B::Device,
    ) -> Self {
        Self {
            model,
            optimizer,
            learning_rate,
            device,
            state: EngineState::default(),
            phase: EnginePhase::NotStarted,
        }
    }

    /// Restore model and optimizer state from serialized records
    pub fn restore(mut self, model_bytes: Vec<u8>, optimizer_bytes: Vec<u8>) -> Result<Self> {
        let recorder = BinBytesRecorder::<FullPrecisionSettings>::default();

        let model_record = recorder.load(model_bytes, &self.device)?;
        self.model = self.model.load_record(model_record);

        let optimizer_record = recorder.load(optimizer_bytes, &self.device)?;
        self.optimizer = self.optimizer.load_record(optimizer_record);

        Ok(self)
    }

    /// Current phase
    pub fn phase(&self) -> EnginePhase {
        self.phase
    }

    /// Current state counters
    pub fn state(&self) -> &EngineState {
        &self.state
    }

    /// The model being trained
    pub fn model(&self) -> &PacemakerClassifier<B> {
        &self.model
    }

    /// Serialize the current model and optimizer state to bytes
    pub fn snapshot(&self) -> Result<(Vec<u8>, Vec<u8>)> {
        let snapshot = EngineSnapshot {
            model: &self.model,
            optimizer: &self.optimizer,
        };
        Ok((snapshot.model_bytes()?, snapshot.optimizer_bytes()?))
    }

    /// Run the full training loop
    ///
    /// Emits `RunStarted`, one `IterationCompleted` per batch, one
    /// `EpochCompleted` per epoch (observers fire in attach order) and
    /// `RunCompleted` at the end. Any error, from the loop or from an
    /// observer, moves the engine to `Failed`, triggers a best-effort
    /// `RunFailed` emission and propagates unchanged. No retries.
    pub fn run(
        &mut self,
        batches: &[XrayBatch<B>],
        max_epochs: usize,
        observers: &mut ObserverList<B>,
    ) -> Result<&EngineState> {
        if self.phase != EnginePhase::NotStarted {
            return Err(PacemakerError::InvalidState(format!(
                "engine already ran (phase {:?})",
                self.phase
            )));
        }
        if batches.is_empty() {
            return Err(PacemakerError::InvalidState(
                "cannot train on an empty batch list".to_string(),
            ));
        }
        if max_epochs == 0 {
            return Err(PacemakerError::InvalidState(
                "max_epochs must be positive".to_string(),
            ));
        }

        self.state.epoch_length = batches.len();
        self.state.max_epochs = max_epochs;

        match self.run_inner(batches, max_epochs, observers) {
            Ok(()) => Ok(&self.state),
            Err(err) => {
                self.phase = EnginePhase::Failed;
                let snapshot = EngineSnapshot {
                    model: &self.model,
                    optimizer: &self.optimizer,
                };
                let view = RunView::new(&self.model, &self.device, &snapshot);
                observers.emit_failure(&self.state, &view, &err);
                Err(err)
            }
        }
    }

    fn run_inner(
        &mut self,
        batches: &[XrayBatch<B>],
        max_epochs: usize,
        observers: &mut ObserverList<B>,
    ) -> Result<()> {
        self.phase = EnginePhase::Running;
        info!(
            "Starting run: {} epochs x {} batches",
            max_epochs,
            batches.len()
        );

        {
            let snapshot = EngineSnapshot {
                model: &self.model,
                optimizer: &self.optimizer,
            };
            let view = RunView::new(&self.model, &self.device, &snapshot);
            observers.emit_run_started(&self.state, &view)?;
        }

        for epoch in 1..=max_epochs {
            self.state.epoch = epoch;
            self.state.iteration = 0;

            for batch in batches.iter() {
                self.train_step(batch)?;

                let snapshot = EngineSnapshot {
                    model: &self.model,
                    optimizer: &self.optimizer,
                };
                let view = RunView::new(&self.model, &self.device, &snapshot);
                observers.emit_iteration_completed(&self.state, &view)?;
            }

            self.phase = EnginePhase::EpochBoundary;
            debug!("Epoch {} boundary", epoch);
            {
                let snapshot = EngineSnapshot {
                    model: &self.model,
                    optimizer: &self.optimizer,
                };
                let view = RunView::new(&self.model, &self.device, &snapshot);
                observers.emit_epoch_completed(&self.state, &view)?;
            }
            self.phase = EnginePhase::Running;
        }

        self.phase = EnginePhase::Completed;
        let snapshot = EngineSnapshot {
            model: &self.model,
            optimizer: &self.optimizer,
        };
        let view = RunView::new(&self.model, &self.device, &snapshot);
        if let Err(err) = observers.emit_run_completed(&self.state, &view) {
            // Completion handlers failing still fails the run
            warn!("Run-completed handler failed: {}", err);
            return Err(err);
        }

        info!("Run completed after {} epochs", max_epochs);
        Ok(())
    }

    /// One forward/backward/step over a single batch
    fn train_step(&mut self, batch: &XrayBatch<B>) -> Result<()> {
        self.model.validate_input(batch.images.dims())?;

        let output = self.model.forward(batch.images.clone());

        let loss = CrossEntropyLossConfig::new()
            .init(&output.device())
            .forward(output, batch.targets.clone());

        let loss_value: f64 = loss.clone().into_scalar().elem();

        let grads = loss.backward();
        let grads = GradientsParams::from_grads(grads, &self.model);
        self.model = self
            .optimizer
            .step(self.learning_rate, self.model.clone(), grads);

        self.state.iteration += 1;
        self.state.last_loss = loss_value;

        Ok(())
    }
}
