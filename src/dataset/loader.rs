//! Pacemaker X-ray Dataset Loader
//!
//! Loads an ImageFolder-style directory tree from disk: each immediate
//! subdirectory of the root is one pacemaker model class and holds that
//! class's X-ray images.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::error::{PacemakerError, Result};

/// Extensions accepted as image files
const IMAGE_EXTENSIONS: [&str; 4] = ["jpg", "jpeg", "png", "bmp"];

/// A single image sample with its label and metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageSample {
    /// Path to the image file
    pub path: PathBuf,
    /// Class label index
    pub label: usize,
    /// Class name (the pacemaker model, e.g. "Medtronic_Azure")
    pub class_name: String,
}

/// Pacemaker X-ray dataset with lazy image loading
///
/// The directory should be structured as:
/// ```text
/// root_dir/
/// ├── Biotronik_Edora/
/// │   ├── image1.jpg
/// │   └── image2.jpg
/// ├── Medtronic_Azure/
/// │   └── ...
/// └── ...
/// ```
#[derive(Debug)]
pub struct XrayDataset {
    /// Root directory of the split
    pub root_dir: PathBuf,
    /// All samples in the split
    pub samples: Vec<ImageSample>,
    /// Mapping from class name to label index
    pub class_to_idx: HashMap<String, usize>,
    /// Class names sorted lexicographically; index equals label
    pub class_names: Vec<String>,
}

impl XrayDataset {
    /// Create a new dataset from a split directory
    ///
    /// Classes are the sorted subdirectory names, so label indices are stable
    /// across runs as long as the directory contents do not change.
    pub fn new<P: AsRef<Path>>(root_dir: P) -> Result<Self> {
        let root_dir = root_dir.as_ref().to_path_buf();
        info!("Loading X-ray dataset from: {:?}", root_dir);

        if !root_dir.exists() {
            return Err(PacemakerError::DirectoryMissing {
                path: root_dir,
                hint: "Run the download-data command first".to_string(),
            });
        }

        let mut class_names: Vec<String> = Vec::new();
        for entry in std::fs::read_dir(&root_dir)? {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                if let Some(name) = entry.file_name().to_str() {
                    class_names.push(name.to_string());
                }
            }
        }
        class_names.sort();

        if class_names.is_empty() {
            return Err(PacemakerError::Dataset(format!(
                "no class directories found in {:?}",
                root_dir
            )));
        }

        let class_to_idx: HashMap<String, usize> = class_names
            .iter()
            .enumerate()
            .map(|(idx, name)| (name.clone(), idx))
            .collect();

        let mut samples = Vec::new();
        for class_name in &class_names {
            let class_dir = root_dir.join(class_name);
            let label = class_to_idx[class_name];
            let before = samples.len();

            for entry in WalkDir::new(&class_dir)
                .min_depth(1)
                .into_iter()
                .filter_map(|e| e.ok())
            {
                let path = entry.path().to_path_buf();
                if is_image_file(&path) {
                    samples.push(ImageSample {
                        path,
                        label,
                        class_name: class_name.clone(),
                    });
                }
            }

            debug!(
                "Class '{}' (label {}): {} samples",
                class_name,
                label,
                samples.len() - before
            );
        }

        if samples.is_empty() {
            return Err(PacemakerError::Dataset(format!(
                "no images found in {:?}",
                root_dir
            )));
        }

        info!(
            "Loaded {} samples across {} classes",
            samples.len(),
            class_names.len()
        );

        Ok(Self {
            root_dir,
            samples,
            class_to_idx,
            class_names,
        })
    }

    /// Number of classes in the split
    pub fn num_classes(&self) -> usize {
        self.class_names.len()
    }

    /// Number of samples in the split
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Whether the split is empty
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Sample indices shuffled with a seeded RNG
    pub fn shuffled_indices(&self, seed: u64) -> Vec<usize> {
        let mut indices: Vec<usize> = (0..self.samples.len()).collect();
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        indices.shuffle(&mut rng);
        indices
    }

    /// Per-class sample counts, indexed by label
    pub fn class_distribution(&self) -> Vec<usize> {
        let mut counts = vec![0usize; self.num_classes()];
        for sample in &self.samples {
            counts[sample.label] += 1;
        }
        counts
    }

    /// Print dataset statistics to the console
    pub fn print_stats(&self, split_name: &str) {
        println!("  {} split: {} samples, {} classes", split_name, self.len(), self.num_classes());
        let counts = self.class_distribution();
        for (name, count) in self.class_names.iter().zip(counts.iter()) {
            println!("    {:<40} {}", name, count);
        }
    }
}

fn is_image_file(path: &Path) -> bool {
    path.extension()
        .map(|ext| {
            let ext = ext.to_string_lossy().to_lowercase();
            IMAGE_EXTENSIONS.contains(&ext.as_str())
        })
        .unwrap_or(false)
}
