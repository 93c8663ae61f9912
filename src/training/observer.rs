//! Observer layer
//!
//! Observers are attached to the engine before a run and receive events with
//! an explicit context: the engine's state counters and a [`RunView`] over
//! the model. There is no other channel between the engine and its handlers;
//! anything an observer needs must come through these two arguments.

use burn::tensor::backend::AutodiffBackend;
use tracing::warn;

use crate::error::{PacemakerError, Result};
use crate::model::PacemakerClassifier;
use crate::training::engine::EngineState;

/// Events emitted by the engine during a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    RunStarted,
    IterationCompleted,
    EpochCompleted,
    RunCompleted,
    RunFailed,
}

/// On-demand serialization of the engine's model and optimizer state
pub trait StateSnapshot {
    fn model_bytes(&self) -> Result<Vec<u8>>;
    fn optimizer_bytes(&self) -> Result<Vec<u8>>;
}

/// Read access to the running engine, handed to observers with every event
pub struct RunView<'a, B: AutodiffBackend> {
    /// The model as of this event
    pub model: &'a PacemakerClassifier<B>,
    /// The device the run executes on
    pub device: &'a B::Device,
    snapshot: &'a dyn StateSnapshot,
}

impl<'a, B: AutodiffBackend> RunView<'a, B> {
    /// Create a view; the engine does this for every emission
    pub fn new(
        model: &'a PacemakerClassifier<B>,
        device: &'a B::Device,
        snapshot: &'a dyn StateSnapshot,
    ) -> Self {
        Self {
            model,
            device,
            snapshot,
        }
    }

    /// Serialize the current model weights
    pub fn model_bytes(&self) -> Result<Vec<u8>> {
        self.snapshot.model_bytes()
    }

    /// Serialize the current optimizer state
    pub fn optimizer_bytes(&self) -> Result<Vec<u8>> {
        self.snapshot.optimizer_bytes()
    }
}

/// Engine event handler
///
/// Every method defaults to a no-op; implement only the events you care
/// about. Returning an error fails the run.
#[allow(unused_variables)]
pub trait Observer<B: AutodiffBackend> {
    fn on_run_started(&mut self, state: &EngineState, view: &RunView<'_, B>) -> Result<()> {
        Ok(())
    }

    fn on_iteration_completed(&mut self, state: &EngineState, view: &RunView<'_, B>) -> Result<()> {
        Ok(())
    }

    fn on_epoch_completed(&mut self, state: &EngineState, view: &RunView<'_, B>) -> Result<()> {
        Ok(())
    }

    fn on_run_completed(&mut self, state: &EngineState, view: &RunView<'_, B>) -> Result<()> {
        Ok(())
    }

    fn on_run_failed(
        &mut self,
        state: &EngineState,
        view: &RunView<'_, B>,
        error: &PacemakerError,
    ) -> Result<()> {
        Ok(())
    }
}

/// Ordered collection of observers; events fire in attach order
pub struct ObserverList<B: AutodiffBackend> {
    observers: Vec<Box<dyn Observer<B>>>,
}

impl<B: AutodiffBackend> ObserverList<B> {
    pub fn new() -> Self {
        Self {
            observers: Vec::new(),
        }
    }

    /// Attach an observer; it fires after everything attached before it
    pub fn attach(&mut self, observer: impl Observer<B> + 'static) {
        self.observers.push(Box::new(observer));
    }

    pub fn len(&self) -> usize {
        self.observers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }

    pub(crate) fn emit_run_started(
        &mut self,
        state: &EngineState,
        view: &RunView<'_, B>,
    ) -> Result<()> {
        for observer in self.observers.iter_mut() {
            observer.on_run_started(state, view)?;
        }
        Ok(())
    }

    pub(crate) fn emit_iteration_completed(
        &mut self,
        state: &EngineState,
        view: &RunView<'_, B>,
    ) -> Result<()> {
        for observer in self.observers.iter_mut() {
            observer.on_iteration_completed(state, view)?;
        }
        Ok(())
    }

    pub(crate) fn emit_epoch_completed(
        &mut self,
        state: &EngineState,
        view: &RunView<'_, B>,
    ) -> Result<()> {
        for observer in self.observers.iter_mut() {
            observer.on_epoch_completed(state, view)?;
        }
        Ok(())
    }

    pub(crate) fn emit_run_completed(
        &mut self,
        state: &EngineState,
        view: &RunView<'_, B>,
    ) -> Result<()> {
        for observer in self.observers.iter_mut() {
            observer.on_run_completed(state, view)?;
        }
        Ok(())
    }

    /// Best-effort failure notification; handler errors are logged, the
    /// original error keeps propagating
    pub(crate) fn emit_failure(
        &mut self,
        state: &EngineState,
        view: &RunView<'_, B>,
        error: &PacemakerError,
    ) {
        for observer in self.observers.iter_mut() {
            if let Err(handler_err) = observer.on_run_failed(state, view, error) {
                warn!("Run-failed handler errored: {}", handler_err);
            }
        }
    }
}

impl<B: AutodiffBackend> Default for ObserverList<B> {
    fn default() -> Self {
        Self::new()
    }
}
