//! Checkpoint store
//!
//! Persists training state between epochs. Each checkpoint is a JSON
//! envelope carrying the epoch number plus the serialized model and
//! optimizer records. Files are written to a temporary name in the same
//! directory and renamed into place, so a crash mid-write never leaves a
//! torn file at a final name.
//!
//! Naming:
//! - `checkpoint_epoch_<NNN>.pt` - one per epoch, zero-padded
//! - `checkpoint_latest.pt`      - overwritten every epoch
//! - `<model_name>_final.pt`     - weights only, written at run completion

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{PacemakerError, Result};

/// A full training checkpoint
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Checkpoint {
    /// Epoch this checkpoint was taken after (1-based)
    pub epoch: usize,
    /// Serialized model record
    pub model: Vec<u8>,
    /// Serialized optimizer record
    pub optimizer: Vec<u8>,
}

/// Directory-backed checkpoint store
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    dir: PathBuf,
}

impl CheckpointStore {
    /// Open a store, creating the directory if needed
    pub fn new<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    /// Directory this store writes into
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the per-epoch checkpoint file
    pub fn epoch_path(&self, epoch: usize) -> PathBuf {
        self.dir.join(format!("checkpoint_epoch_{:03}.pt", epoch))
    }

    /// Path of the rolling latest checkpoint
    pub fn latest_path(&self) -> PathBuf {
        self.dir.join("checkpoint_latest.pt")
    }

    /// Path of the final weights file for a model name
    pub fn final_path(&self, model_name: &str) -> PathBuf {
        self.dir.join(format!("{}_final.pt", model_name))
    }

    /// Save an epoch checkpoint and refresh `checkpoint_latest.pt`
    pub fn save_epoch(&self, checkpoint: &Checkpoint) -> Result<PathBuf> {
        let bytes = serde_json::to_vec(checkpoint)?;

        let epoch_path = self.epoch_path(checkpoint.epoch);
        self.write_atomic(&epoch_path, &bytes)?;
        self.write_atomic(&self.latest_path(), &bytes)?;

        info!("Saved checkpoint for epoch {}", checkpoint.epoch);
        Ok(epoch_path)
    }

    /// Load a checkpoint from an arbitrary path
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Checkpoint> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(PacemakerError::CheckpointNotFound(path.to_path_buf()));
        }

        let bytes = std::fs::read(path)?;
        serde_json::from_slice(&bytes).map_err(|e| PacemakerError::CheckpointCorrupt {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Load `checkpoint_latest.pt`
    pub fn load_latest(&self) -> Result<Checkpoint> {
        Self::load(self.latest_path())
    }

    /// Save the final weights-only file
    pub fn save_final(&self, model_name: &str, model_bytes: &[u8]) -> Result<PathBuf> {
        let path = self.final_path(model_name);
        self.write_atomic(&path, model_bytes)?;
        info!("Saved final weights to {}", path.display());
        Ok(path)
    }

    /// Write via a temp file in the same directory, then rename into place
    fn write_atomic(&self, path: &Path, bytes: &[u8]) -> Result<()> {
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| PacemakerError::Serialization(format!("bad path {:?}", path)))?;
        let tmp_path = self.dir.join(format!(".{}.tmp", file_name));

        std::fs::write(&tmp_path, bytes)?;
        std::fs::rename(&tmp_path, path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn checkpoint(epoch: usize) -> Checkpoint {
        Checkpoint {
            epoch,
            model: vec![1, 2, 3, epoch as u8],
            optimizer: vec![9, 8, 7],
        }
    }

    #[test]
    fn test_round_trip_bit_for_bit() {
        let dir = tempfile::tempdir().unwrap();
        let store = CheckpointStore::new(dir.path()).unwrap();

        let original = checkpoint(3);
        let path = store.save_epoch(&original).unwrap();
        let loaded = CheckpointStore::load(&path).unwrap();

        assert_eq!(loaded, original);
        assert_eq!(loaded.model, vec![1, 2, 3, 3]);
    }

    #[test]
    fn test_epoch_files_zero_padded() {
        let dir = tempfile::tempdir().unwrap();
        let store = CheckpointStore::new(dir.path()).unwrap();

        let path = store.save_epoch(&checkpoint(7)).unwrap();
        assert_eq!(
            path.file_name().unwrap().to_str().unwrap(),
            "checkpoint_epoch_007.pt"
        );

        let wide = store.epoch_path(123);
        assert_eq!(
            wide.file_name().unwrap().to_str().unwrap(),
            "checkpoint_epoch_123.pt"
        );
    }

    #[test]
    fn test_latest_tracks_last_saved_epoch() {
        let dir = tempfile::tempdir().unwrap();
        let store = CheckpointStore::new(dir.path()).unwrap();

        store.save_epoch(&checkpoint(1)).unwrap();
        store.save_epoch(&checkpoint(2)).unwrap();

        let latest = store.load_latest().unwrap();
        assert_eq!(latest.epoch, 2);

        let epoch_two = CheckpointStore::load(store.epoch_path(2)).unwrap();
        assert_eq!(latest, epoch_two);
    }

    #[test]
    fn test_missing_checkpoint() {
        let dir = tempfile::tempdir().unwrap();
        let result = CheckpointStore::load(dir.path().join("nope.pt"));
        assert!(matches!(result, Err(PacemakerError::CheckpointNotFound(_))));
    }

    #[test]
    fn test_corrupt_checkpoint() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("garbage.pt");
        std::fs::write(&path, b"definitely not json").unwrap();

        let result = CheckpointStore::load(&path);
        assert!(matches!(
            result,
            Err(PacemakerError::CheckpointCorrupt { .. })
        ));
    }

    #[test]
    fn test_no_temp_files_left_behind() {
        let dir = tempfile::tempdir().unwrap();
        let store = CheckpointStore::new(dir.path()).unwrap();
        store.save_epoch(&checkpoint(1)).unwrap();
        store.save_final("resnet50", &[4, 5, 6]).unwrap();

        let leftovers: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn test_final_weights_are_raw_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let store = CheckpointStore::new(dir.path()).unwrap();

        let path = store.save_final("mobilenet_v3_small", &[1, 2, 3]).unwrap();
        assert_eq!(
            path.file_name().unwrap().to_str().unwrap(),
            "mobilenet_v3_small_final.pt"
        );
        assert_eq!(std::fs::read(path).unwrap(), vec![1, 2, 3]);
    }
}
