//! Run Configuration
//!
//! Loads the TOML run configuration, applies CLI overrides and resolves the
//! training device. Device resolution happens exactly once at startup; the
//! rest of the pipeline trusts the resolved value and never re-probes
//! hardware.

use std::fmt;
use std::path::{Path, PathBuf};

use colored::Colorize;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::backend;
use crate::error::{PacemakerError, Result};
use crate::model::{Architecture, MIN_IMAGE_SIZE};

/// Dataset locations and loading parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataConfig {
    /// Kaggle dataset slug (owner/dataset) for the download-data command
    #[serde(default)]
    pub kaggle_dataset: String,

    /// Directory the raw Kaggle download lands in
    #[serde(default = "default_raw_dir")]
    pub raw_dir: PathBuf,

    /// Training split directory (ImageFolder layout)
    #[serde(default = "default_train_dir")]
    pub train_dir: PathBuf,

    /// Test split directory (ImageFolder layout)
    #[serde(default = "default_test_dir")]
    pub test_dir: PathBuf,

    /// Samples per training batch
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Square image edge length after resizing
    #[serde(default = "default_image_size", alias = "img_size")]
    pub image_size: usize,

    /// Accepted for config compatibility; the loader is single-threaded
    #[serde(default = "default_num_workers")]
    pub num_workers: usize,
}

/// Model selection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// One of densenet121, resnet50, mobilenet_v3_small
    pub architecture: Architecture,

    /// Load backbone weights from `backbone_weights` when available
    #[serde(default)]
    pub pretrained: bool,

    /// Optional backbone record file used when `pretrained` is set
    #[serde(default)]
    pub backbone_weights: Option<PathBuf>,
}

/// Training hyperparameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingConfig {
    #[serde(default = "default_epochs")]
    pub epochs: usize,

    #[serde(default = "default_learning_rate")]
    pub learning_rate: f64,

    /// Requested device: "cpu", "gpu" or "cuda"
    #[serde(default = "default_device")]
    pub device: String,

    /// Seed for epoch shuffling and weight init
    #[serde(default = "default_seed")]
    pub seed: u64,

    /// Per-iteration progress output with throughput and ETA
    #[serde(default)]
    pub verbose: bool,
}

/// Output locations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_checkpoint_dir", alias = "dir")]
    pub checkpoint_dir: PathBuf,

    #[serde(default = "default_export_dir")]
    pub export_dir: PathBuf,

    /// Stem of the final weights file; defaults to the architecture name
    #[serde(default)]
    pub model_name: Option<String>,
}

fn default_raw_dir() -> PathBuf {
    PathBuf::from("data/raw")
}
fn default_train_dir() -> PathBuf {
    PathBuf::from("data/train")
}
fn default_test_dir() -> PathBuf {
    PathBuf::from("data/test")
}
fn default_batch_size() -> usize {
    32
}
fn default_image_size() -> usize {
    224
}
fn default_num_workers() -> usize {
    4
}
fn default_epochs() -> usize {
    10
}
fn default_learning_rate() -> f64 {
    1e-3
}
fn default_device() -> String {
    "cpu".to_string()
}
fn default_seed() -> u64 {
    42
}
fn default_checkpoint_dir() -> PathBuf {
    PathBuf::from("output/checkpoints")
}
fn default_export_dir() -> PathBuf {
    PathBuf::from("output/export")
}

/// Complete run configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    pub data: DataConfig,
    pub model: ModelConfig,
    pub training: TrainingConfig,
    pub output: OutputConfig,
}

/// Optional CLI overrides; only present values replace file values
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub epochs: Option<usize>,
    pub batch_size: Option<usize>,
    pub learning_rate: Option<f64>,
    pub device: Option<String>,
}

/// The device the run will actually use, decided once at startup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceKind {
    Cpu,
    Gpu,
}

impl fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceKind::Cpu => write!(f, "cpu"),
            DeviceKind::Gpu => write!(f, "gpu"),
        }
    }
}

impl RunConfig {
    /// Load a configuration from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            PacemakerError::Config(format!("cannot read '{}': {}", path.display(), e))
        })?;

        let config: RunConfig = toml::from_str(&contents).map_err(|e| {
            PacemakerError::Config(format!("invalid config '{}': {}", path.display(), e))
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply CLI overrides on top of the file values
    pub fn apply_overrides(&mut self, overrides: &ConfigOverrides) {
        if let Some(epochs) = overrides.epochs {
            self.training.epochs = epochs;
        }
        if let Some(batch_size) = overrides.batch_size {
            self.data.batch_size = batch_size;
        }
        if let Some(learning_rate) = overrides.learning_rate {
            self.training.learning_rate = learning_rate;
        }
        if let Some(ref device) = overrides.device {
            self.training.device = device.clone();
        }
    }

    /// Validate all values the rest of the pipeline depends on
    pub fn validate(&self) -> Result<()> {
        if self.training.epochs == 0 {
            return Err(PacemakerError::Config("epochs must be positive".into()));
        }
        if self.data.batch_size == 0 {
            return Err(PacemakerError::Config("batch_size must be positive".into()));
        }
        if self.data.image_size < MIN_IMAGE_SIZE {
            return Err(PacemakerError::Config(format!(
                "image_size must be at least {}, got {}",
                MIN_IMAGE_SIZE, self.data.image_size
            )));
        }
        if !(self.training.learning_rate.is_finite() && self.training.learning_rate > 0.0) {
            return Err(PacemakerError::Config(format!(
                "learning_rate must be positive, got {}",
                self.training.learning_rate
            )));
        }
        Ok(())
    }

    /// Resolve the requested device against the compiled backend
    ///
    /// Called once at startup. A GPU request without a GPU backend compiled in
    /// downgrades to CPU with a warning; an unknown device string is a hard
    /// error. The resolved value is written back so later consumers see the
    /// effective device.
    pub fn resolve_device(&mut self) -> Result<DeviceKind> {
        let kind = match self.training.device.as_str() {
            "cpu" => DeviceKind::Cpu,
            "gpu" | "cuda" => {
                if backend::gpu_available() {
                    DeviceKind::Gpu
                } else {
                    warn!(
                        "Device '{}' requested but no GPU backend is compiled in, falling back to CPU",
                        self.training.device
                    );
                    DeviceKind::Cpu
                }
            }
            other => {
                return Err(PacemakerError::Config(format!(
                    "unknown device '{}' (expected cpu, gpu or cuda)",
                    other
                )));
            }
        };

        self.training.device = kind.to_string();
        Ok(kind)
    }

    /// Print the effective configuration before training starts
    pub fn print_banner(&self) {
        println!("\n{}", "=== Run Configuration ===".cyan().bold());
        println!("  Architecture:   {}", self.model.architecture.as_str());
        println!("  Pretrained:     {}", self.model.pretrained);
        println!("  Epochs:         {}", self.training.epochs);
        println!("  Batch size:     {}", self.data.batch_size);
        println!("  Learning rate:  {}", self.training.learning_rate);
        println!("  Image size:     {}", self.data.image_size);
        println!("  Device:         {}", self.training.device);
        println!("  Seed:           {}", self.training.seed);
        println!("  Train dir:      {}", self.data.train_dir.display());
        println!("  Test dir:       {}", self.data.test_dir.display());
        println!("  Checkpoints:    {}", self.output.checkpoint_dir.display());
        println!("  Backend:        {}\n", backend::backend_name());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn minimal_toml() -> &'static str {
        r#"
            [data]
            train_dir = "data/train"
            test_dir = "data/test"

            [model]
            architecture = "resnet50"

            [training]
            epochs = 5

            [output]
        "#
    }

    #[test]
    fn test_load_with_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{}", minimal_toml()).unwrap();

        let config = RunConfig::load(file.path()).unwrap();
        assert_eq!(config.model.architecture, Architecture::Resnet50);
        assert_eq!(config.training.epochs, 5);
        assert_eq!(config.data.batch_size, 32);
        assert_eq!(config.data.image_size, 224);
        assert_eq!(config.training.device, "cpu");
        assert!(!config.model.pretrained);
    }

    #[test]
    fn test_img_size_alias_accepted() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        let toml = minimal_toml().replace(
            "test_dir = \"data/test\"",
            "test_dir = \"data/test\"\nimg_size = 128",
        );
        write!(file, "{}", toml).unwrap();

        let config = RunConfig::load(file.path()).unwrap();
        assert_eq!(config.data.image_size, 128);
    }

    #[test]
    fn test_load_missing_file() {
        let result = RunConfig::load("does/not/exist.toml");
        assert!(matches!(result, Err(PacemakerError::Config(_))));
    }

    #[test]
    fn test_load_bad_architecture() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        let toml = minimal_toml().replace("resnet50", "vgg16");
        write!(file, "{}", toml).unwrap();

        assert!(matches!(
            RunConfig::load(file.path()),
            Err(PacemakerError::Config(_))
        ));
    }

    #[test]
    fn test_overrides_take_precedence() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{}", minimal_toml()).unwrap();
        let mut config = RunConfig::load(file.path()).unwrap();

        let overrides = ConfigOverrides {
            epochs: Some(20),
            batch_size: Some(8),
            learning_rate: None,
            device: Some("gpu".to_string()),
        };
        config.apply_overrides(&overrides);

        assert_eq!(config.training.epochs, 20);
        assert_eq!(config.data.batch_size, 8);
        assert_eq!(config.training.learning_rate, 1e-3);
        assert_eq!(config.training.device, "gpu");
    }

    #[test]
    fn test_validate_rejects_zero_epochs() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        let toml = minimal_toml().replace("epochs = 5", "epochs = 0");
        write!(file, "{}", toml).unwrap();

        assert!(RunConfig::load(file.path()).is_err());
    }

    #[test]
    fn test_validate_rejects_undersized_image_size() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        let toml = minimal_toml().replace(
            "test_dir = \"data/test\"",
            "test_dir = \"data/test\"\nimage_size = 8",
        );
        write!(file, "{}", toml).unwrap();

        assert!(matches!(
            RunConfig::load(file.path()),
            Err(PacemakerError::Config(_))
        ));
    }

    #[test]
    fn test_unknown_device_is_an_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{}", minimal_toml()).unwrap();
        let mut config = RunConfig::load(file.path()).unwrap();
        config.training.device = "tpu".to_string();

        assert!(matches!(
            config.resolve_device(),
            Err(PacemakerError::Config(_))
        ));
    }

    #[cfg(not(any(feature = "wgpu", feature = "cuda")))]
    #[test]
    fn test_gpu_request_falls_back_to_cpu() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{}", minimal_toml()).unwrap();
        let mut config = RunConfig::load(file.path()).unwrap();
        config.training.device = "gpu".to_string();

        let kind = config.resolve_device().unwrap();
        assert_eq!(kind, DeviceKind::Cpu);
        assert_eq!(config.training.device, "cpu");
    }

    #[test]
    fn test_cpu_resolves_to_cpu() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{}", minimal_toml()).unwrap();
        let mut config = RunConfig::load(file.path()).unwrap();

        assert_eq!(config.resolve_device().unwrap(), DeviceKind::Cpu);
    }
}
