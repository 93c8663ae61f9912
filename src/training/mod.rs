//! Training engine, observers and checkpointing

pub mod callbacks;
pub mod checkpoint;
pub mod engine;
pub mod evaluator;
pub mod observer;

pub use callbacks::{CheckpointObserver, EvalObserver, ProgressObserver, RollingHistory};
pub use checkpoint::{Checkpoint, CheckpointStore};
pub use engine::{Engine, EnginePhase, EngineState};
pub use evaluator::evaluate;
pub use observer::{Event, Observer, ObserverList, RunView};
