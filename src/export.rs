//! Deployment bundle export
//!
//! Packages trained weights with model metadata and optional class labels
//! into a single JSON bundle the mobile app's conversion tooling consumes.
//! The weight source is either a final weights file or a training checkpoint
//! (from which the model record is extracted); exactly one must be given.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{PacemakerError, Result};
use crate::model::Architecture;
use crate::training::checkpoint::CheckpointStore;

/// Bundle format version, bumped on breaking layout changes
pub const FORMAT_VERSION: u32 = 1;

const BUNDLE_AUTHOR: &str = "PacerID ML Pipeline";
const BUNDLE_LICENSE: &str = "MIT";

/// Descriptive metadata embedded in every bundle
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BundleMetadata {
    pub author: String,
    pub description: String,
    pub license: String,
    /// RFC 3339 creation timestamp
    pub created_at: String,
}

/// The exported bundle
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportBundle {
    pub format_version: u32,
    pub architecture: Architecture,
    pub num_classes: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub class_labels: Option<Vec<String>>,
    pub metadata: BundleMetadata,
    /// Serialized model record
    pub weights: Vec<u8>,
}

/// What to export and where
#[derive(Debug, Clone)]
pub struct ExportRequest {
    /// Final weights file (mutually exclusive with `checkpoint`)
    pub weights: Option<PathBuf>,
    /// Training checkpoint file (mutually exclusive with `weights`)
    pub checkpoint: Option<PathBuf>,
    pub architecture: Architecture,
    pub num_classes: usize,
    /// Optional JSON file holding an array of class names
    pub labels: Option<PathBuf>,
    pub output: PathBuf,
}

/// Build and write the bundle
pub fn run_export(request: &ExportRequest) -> Result<PathBuf> {
    let weights = load_weights(request)?;

    let class_labels = match &request.labels {
        Some(path) => Some(load_labels(path, request.num_classes)?),
        None => None,
    };

    let bundle = ExportBundle {
        format_version: FORMAT_VERSION,
        architecture: request.architecture,
        num_classes: request.num_classes,
        class_labels,
        metadata: BundleMetadata {
            author: BUNDLE_AUTHOR.to_string(),
            description: format!(
                "Pacemaker identification classifier ({}, {} classes)",
                request.architecture, request.num_classes
            ),
            license: BUNDLE_LICENSE.to_string(),
            created_at: chrono::Utc::now().to_rfc3339(),
        },
        weights,
    };

    write_bundle(&bundle, &request.output)?;
    info!("Exported bundle to {}", request.output.display());
    Ok(request.output.clone())
}

fn load_weights(request: &ExportRequest) -> Result<Vec<u8>> {
    match (&request.weights, &request.checkpoint) {
        (Some(weights_path), None) => {
            if !weights_path.is_file() {
                return Err(PacemakerError::Export(format!(
                    "weights file '{}' does not exist",
                    weights_path.display()
                )));
            }
            Ok(std::fs::read(weights_path)?)
        }
        (None, Some(checkpoint_path)) => {
            let checkpoint = CheckpointStore::load(checkpoint_path)?;
            info!(
                "Extracted model record from checkpoint (epoch {})",
                checkpoint.epoch
            );
            Ok(checkpoint.model)
        }
        (Some(_), Some(_)) => Err(PacemakerError::Export(
            "pass either --weights or --checkpoint, not both".to_string(),
        )),
        (None, None) => Err(PacemakerError::Export(
            "one of --weights or --checkpoint is required".to_string(),
        )),
    }
}

fn load_labels(path: &Path, num_classes: usize) -> Result<Vec<String>> {
    let contents = std::fs::read_to_string(path)?;
    let labels: Vec<String> = serde_json::from_str(&contents)?;

    if labels.len() != num_classes {
        return Err(PacemakerError::Export(format!(
            "label file '{}' has {} entries but the model has {} classes",
            path.display(),
            labels.len(),
            num_classes
        )));
    }
    Ok(labels)
}

/// Write to a temp file next to the target, then rename into place
fn write_bundle(bundle: &ExportBundle, output: &Path) -> Result<()> {
    if let Some(parent) = output.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let bytes = serde_json::to_vec_pretty(bundle)?;

    let file_name = output
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| PacemakerError::Export(format!("bad output path {:?}", output)))?;
    let tmp_path = output.with_file_name(format!(".{}.tmp", file_name));

    std::fs::write(&tmp_path, bytes)?;
    std::fs::rename(&tmp_path, output)?;
    Ok(())
}
