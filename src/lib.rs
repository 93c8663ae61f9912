//! # pacemaker-id
//!
//! A Rust training pipeline for identifying pacemaker models from chest
//! X-ray images, built on the Burn framework. The trained weights are
//! packaged into a deployment bundle for the companion mobile app.
//!
//! ## Modules
//!
//! - `config`: TOML run configuration, CLI overrides and device resolution
//! - `dataset`: Kaggle acquisition, ImageFolder loading and batching
//! - `model`: the three supported CNN architectures and the model provider
//! - `training`: the training engine, observers, evaluation and checkpoints
//! - `export`: deployment bundle packaging
//! - `utils`: logging and metrics
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use pacemaker_id::backend::TrainingBackend;
//! use pacemaker_id::config::RunConfig;
//! use pacemaker_id::model::{build_model, Architecture};
//!
//! let mut config = RunConfig::load("configs/base.toml")?;
//! let device_kind = config.resolve_device()?;
//! // ... build the model, batches and engine, then run
//! ```

pub mod backend;
pub mod config;
pub mod dataset;
pub mod error;
pub mod export;
pub mod model;
pub mod training;
pub mod utils;

// Re-export commonly used items for convenience
pub use config::{ConfigOverrides, DeviceKind, RunConfig};
pub use dataset::{XrayBatch, XrayBatcher, XrayDataset, XrayItem};
pub use error::{PacemakerError, Result};
pub use export::{ExportBundle, ExportRequest};
pub use model::{build_model, Architecture, PacemakerClassifier};
pub use training::{
    Checkpoint, CheckpointObserver, CheckpointStore, Engine, EnginePhase, EngineState,
    EvalObserver, ObserverList, ProgressObserver,
};
pub use utils::metrics::Metrics;

/// Version of the library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
