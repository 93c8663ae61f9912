//! Pacemaker Identification CLI
//!
//! Entry point for the pacemaker X-ray classification pipeline: dataset
//! download, training and deployment-bundle export.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::Colorize;
use tracing::warn;

use pacemaker_id::backend::{self, TrainingBackend};
use pacemaker_id::config::{ConfigOverrides, RunConfig};
use pacemaker_id::dataset::{download, XrayBatch, XrayBatcher, XrayDataset, XrayItem};
use pacemaker_id::export::{run_export, ExportRequest};
use pacemaker_id::model::{build_model, Architecture, PacemakerClassifier};
use pacemaker_id::training::{
    CheckpointObserver, CheckpointStore, Engine, EvalObserver, ObserverList, ProgressObserver,
};
use pacemaker_id::utils::logging::{init_logging, LogConfig};

use burn::data::dataloader::batcher::Batcher;
use burn::optim::AdamConfig;
use burn::tensor::backend::Backend;

/// Pacemaker identification from chest X-rays
///
/// Trains a CNN classifier on the Kaggle pacemaker X-ray dataset with the
/// Burn framework and exports the weights for the mobile app.
#[derive(Parser, Debug)]
#[command(name = "pacemaker-id")]
#[command(version = pacemaker_id::VERSION)]
#[command(about = "Pacemaker X-ray classification pipeline", long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, default_value = "false")]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Download the dataset from Kaggle and set up the directory layout
    DownloadData {
        /// Path to the run configuration
        #[arg(short, long, default_value = "configs/base.toml")]
        config: PathBuf,
    },

    /// Train the classifier
    Train {
        /// Path to the run configuration
        #[arg(short, long, default_value = "configs/base.toml")]
        config: PathBuf,

        /// Override the configured number of epochs
        #[arg(short, long)]
        epochs: Option<usize>,

        /// Override the configured batch size
        #[arg(short, long)]
        batch_size: Option<usize>,

        /// Override the configured learning rate
        #[arg(short, long)]
        learning_rate: Option<f64>,

        /// Override the configured device (cpu, gpu, cuda)
        #[arg(short, long)]
        device: Option<String>,
    },

    /// Package trained weights into a deployment bundle
    Export {
        /// Final weights file (mutually exclusive with --checkpoint)
        #[arg(short, long)]
        weights: Option<PathBuf>,

        /// Training checkpoint file (mutually exclusive with --weights)
        #[arg(long)]
        checkpoint: Option<PathBuf>,

        /// Run configuration supplying the architecture default
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Architecture name (overrides the config)
        #[arg(short, long)]
        architecture: Option<String>,

        /// Number of classes the model was trained with
        #[arg(short, long, default_value = "45")]
        num_classes: usize,

        /// Optional JSON file with class labels
        #[arg(long)]
        labels: Option<PathBuf>,

        /// Output bundle path
        #[arg(short, long, default_value = "output/export/bundle.json")]
        output: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_config = if cli.verbose {
        LogConfig::verbose()
    } else {
        LogConfig::default()
    };
    let _ = init_logging(&log_config);

    print_banner();

    match cli.command {
        Commands::DownloadData { config } => {
            cmd_download(&config)?;
        }

        Commands::Train {
            config,
            epochs,
            batch_size,
            learning_rate,
            device,
        } => {
            let overrides = ConfigOverrides {
                epochs,
                batch_size,
                learning_rate,
                device,
            };
            cmd_train(&config, overrides, cli.verbose)?;
        }

        Commands::Export {
            weights,
            checkpoint,
            config,
            architecture,
            num_classes,
            labels,
            output,
        } => {
            cmd_export(
                weights,
                checkpoint,
                config,
                architecture,
                num_classes,
                labels,
                output,
            )?;
        }
    }

    Ok(())
}

fn print_banner() {
    println!(
        "{}",
        r#"
 ============================================================
   PacerID - Pacemaker Identification from Chest X-rays
   Training pipeline built with Burn + Rust
 ============================================================
  "#
        .green()
    );
}

fn cmd_download(config_path: &PathBuf) -> Result<()> {
    let config = RunConfig::load(config_path)?;
    download::run_download(&config.data)?;
    Ok(())
}

fn cmd_train(config_path: &PathBuf, overrides: ConfigOverrides, verbose: bool) -> Result<()> {
    let mut config = RunConfig::load(config_path)?;
    config.apply_overrides(&overrides);
    config.validate()?;
    config.resolve_device()?;
    config.print_banner();
    let verbose = verbose || config.training.verbose;

    // Dataset splits; both must exist before training starts
    let train_set = XrayDataset::new(&config.data.train_dir)?;
    let test_set = XrayDataset::new(&config.data.test_dir)?;
    let num_classes = train_set.num_classes();
    if test_set.num_classes() != num_classes {
        warn!(
            "Train split has {} classes but test split has {}",
            num_classes,
            test_set.num_classes()
        );
    }

    let device = backend::default_device();
    let model = build_model::<TrainingBackend>(
        config.model.architecture,
        num_classes,
        config.model.pretrained,
        config.model.backbone_weights.as_deref(),
        &device,
    )?;

    let image_size = config.data.image_size;
    let batch_size = config.data.batch_size;
    let batcher = XrayBatcher::new(image_size);

    println!("{}", "Loading training images...".cyan());
    let train_items = load_items(&train_set, image_size, &train_set.shuffled_indices(config.training.seed))?;
    println!("{}", "Loading test images...".cyan());
    let test_items = load_items(&test_set, image_size, &(0..test_set.len()).collect::<Vec<_>>())?;

    // Training batches on the autodiff backend, evaluation batches on the
    // inner backend
    let train_batches: Vec<XrayBatch<TrainingBackend>> = train_items
        .chunks(batch_size)
        .map(|chunk| batcher.batch(chunk.to_vec(), &device))
        .collect();
    let inner_device: <backend::DefaultBackend as Backend>::Device = backend::default_device();
    let train_eval_batches: Vec<XrayBatch<backend::DefaultBackend>> = train_items
        .chunks(batch_size)
        .map(|chunk| batcher.batch(chunk.to_vec(), &inner_device))
        .collect();
    let test_eval_batches: Vec<XrayBatch<backend::DefaultBackend>> = test_items
        .chunks(batch_size)
        .map(|chunk| batcher.batch(chunk.to_vec(), &inner_device))
        .collect();

    let store = CheckpointStore::new(&config.output.checkpoint_dir)?;

    // Attach order fixes the per-epoch sequence: progress line, train
    // metrics, test metrics, checkpoint
    let mut observers = ObserverList::new();
    observers.attach(ProgressObserver::new(verbose));
    observers.attach(EvalObserver::new("TRAINING", train_eval_batches));
    observers.attach(EvalObserver::new("TESTING", test_eval_batches));
    observers.attach(CheckpointObserver::new(store.clone()));

    let optimizer = AdamConfig::new().init::<TrainingBackend, PacemakerClassifier<TrainingBackend>>();
    let mut engine = Engine::new(model, optimizer, config.training.learning_rate, device);

    engine.run(&train_batches, config.training.epochs, &mut observers)?;

    let (model_bytes, _) = engine.snapshot()?;
    let model_name = config
        .output
        .model_name
        .clone()
        .unwrap_or_else(|| config.model.architecture.as_str().to_string());
    let final_path = store.save_final(&model_name, &model_bytes)?;

    println!(
        "\n{} Final weights written to {}",
        "Training complete.".green().bold(),
        final_path.display()
    );
    Ok(())
}

fn load_items(dataset: &XrayDataset, image_size: usize, order: &[usize]) -> Result<Vec<XrayItem>> {
    order
        .iter()
        .map(|&idx| {
            let sample = &dataset.samples[idx];
            Ok(XrayItem::from_path(&sample.path, sample.label, image_size)?)
        })
        .collect()
}

fn cmd_export(
    weights: Option<PathBuf>,
    checkpoint: Option<PathBuf>,
    config: Option<PathBuf>,
    architecture: Option<String>,
    num_classes: usize,
    labels: Option<PathBuf>,
    output: PathBuf,
) -> Result<()> {
    let architecture = match (architecture, config) {
        (Some(name), _) => name.parse::<Architecture>()?,
        (None, Some(config_path)) => RunConfig::load(&config_path)?.model.architecture,
        (None, None) => {
            anyhow::bail!("pass --architecture or --config so the bundle can name its model")
        }
    };

    let request = ExportRequest {
        weights,
        checkpoint,
        architecture,
        num_classes,
        labels,
        output,
    };

    let path = run_export(&request)?;
    println!("{} Bundle written to {}", "Export complete.".green().bold(), path.display());
    Ok(())
}
