//! Dataset acquisition, loading and batching

pub mod batcher;
pub mod download;
pub mod loader;

pub use batcher::{XrayBatch, XrayBatcher, XrayItem};
pub use loader::{ImageSample, XrayDataset};
