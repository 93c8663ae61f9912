//! Dataset acquisition
//!
//! Downloads the pacemaker X-ray dataset from Kaggle via the `kaggle` CLI and
//! lays out the on-disk structure the training pipeline expects:
//!
//! ```text
//! raw_dir/Train/<class>/...   (from the Kaggle archive)
//! raw_dir/Test/<class>/...
//! train_dir -> raw_dir/Train  (symlink)
//! test_dir  -> raw_dir/Test   (symlink)
//! ```
//!
//! Credentials are checked before anything touches the network; a failed
//! check is fatal with remediation instructions in the error message.

use std::path::Path;
use std::process::Command;

use colored::Colorize;
use tracing::info;

use crate::config::DataConfig;
use crate::dataset::loader::XrayDataset;
use crate::error::{PacemakerError, Result};

const CREDENTIAL_HINT: &str = "Set up Kaggle API credentials: place your API token at ~/.kaggle/kaggle.json \
     (from https://www.kaggle.com/account, then chmod 600), or export both \
     KAGGLE_USERNAME and KAGGLE_KEY";

/// Verify Kaggle credentials are available
///
/// Accepts either `~/.kaggle/kaggle.json` or the KAGGLE_USERNAME/KAGGLE_KEY
/// environment variable pair.
pub fn check_credentials() -> Result<()> {
    if std::env::var("KAGGLE_USERNAME").is_ok() && std::env::var("KAGGLE_KEY").is_ok() {
        return Ok(());
    }

    if let Some(home) = std::env::var_os("HOME") {
        let token = Path::new(&home).join(".kaggle").join("kaggle.json");
        if token.is_file() {
            return Ok(());
        }
    }

    Err(PacemakerError::Credential(CREDENTIAL_HINT.to_string()))
}

/// Download and unpack the dataset archive into `raw_dir`
pub fn download_archive(kaggle_dataset: &str, raw_dir: &Path) -> Result<()> {
    if kaggle_dataset.is_empty() {
        return Err(PacemakerError::Config(
            "data.kaggle_dataset must be set to download".to_string(),
        ));
    }

    std::fs::create_dir_all(raw_dir)?;

    info!("Downloading Kaggle dataset '{}'", kaggle_dataset);
    println!("  Downloading {} (this may take a few minutes)", kaggle_dataset);

    let output = Command::new("kaggle")
        .args(["datasets", "download", "-d", kaggle_dataset, "--unzip", "-p"])
        .arg(raw_dir)
        .output()
        .map_err(|e| {
            PacemakerError::Download(format!(
                "failed to run the kaggle CLI ({}); is it installed and on PATH?",
                e
            ))
        })?;

    if !output.status.success() {
        return Err(PacemakerError::Download(format!(
            "kaggle CLI exited with {}: {}",
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }

    Ok(())
}

/// Create the train/test view directories as symlinks into the raw layout
///
/// Stale symlinks are replaced; a real directory at a view path is never
/// deleted.
pub fn setup_split_views(raw_dir: &Path, train_dir: &Path, test_dir: &Path) -> Result<()> {
    let raw_train = raw_dir.join("Train");
    let raw_test = raw_dir.join("Test");

    for split in [&raw_train, &raw_test] {
        if !split.is_dir() {
            return Err(PacemakerError::DirectoryMissing {
                path: split.clone(),
                hint: "The Kaggle archive should contain Train/ and Test/ directories; \
                       check the download completed"
                    .to_string(),
            });
        }
    }

    link_view(&raw_train, train_dir)?;
    link_view(&raw_test, test_dir)?;

    Ok(())
}

fn link_view(target: &Path, link: &Path) -> Result<()> {
    if link.symlink_metadata().is_ok() {
        if link.symlink_metadata()?.file_type().is_symlink() {
            std::fs::remove_file(link)?;
        } else {
            return Err(PacemakerError::Dataset(format!(
                "'{}' exists and is not a symlink; refusing to replace it",
                link.display()
            )));
        }
    }

    if let Some(parent) = link.parent() {
        std::fs::create_dir_all(parent)?;
    }

    #[cfg(unix)]
    std::os::unix::fs::symlink(target, link)?;
    #[cfg(windows)]
    std::os::windows::fs::symlink_dir(target, link)?;

    info!("{} -> {}", link.display(), target.display());
    Ok(())
}

/// Full download flow: credentials, archive, directory views, summary
pub fn run_download(data: &DataConfig) -> Result<()> {
    println!("{}", "=== Dataset Download & Setup ===".cyan().bold());

    check_credentials()?;
    download_archive(&data.kaggle_dataset, &data.raw_dir)?;
    setup_split_views(&data.raw_dir, &data.train_dir, &data.test_dir)?;

    let train = XrayDataset::new(&data.train_dir)?;
    let test = XrayDataset::new(&data.test_dir)?;
    train.print_stats("Train");
    test.print_stats("Test");

    println!("{}", "Dataset ready".green().bold());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_setup_views_requires_raw_splits() {
        let dir = tempfile::tempdir().unwrap();
        let raw = dir.path().join("raw");
        fs::create_dir_all(raw.join("Train")).unwrap();
        // No Test directory

        let result = setup_split_views(&raw, &dir.path().join("train"), &dir.path().join("test"));
        assert!(matches!(
            result,
            Err(PacemakerError::DirectoryMissing { .. })
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_setup_views_creates_symlinks() {
        let dir = tempfile::tempdir().unwrap();
        let raw = dir.path().join("raw");
        fs::create_dir_all(raw.join("Train")).unwrap();
        fs::create_dir_all(raw.join("Test")).unwrap();

        let train = dir.path().join("train");
        let test = dir.path().join("test");
        setup_split_views(&raw, &train, &test).unwrap();

        assert!(train.symlink_metadata().unwrap().file_type().is_symlink());
        assert_eq!(fs::read_link(&train).unwrap(), raw.join("Train"));

        // Re-running replaces the stale link without error
        setup_split_views(&raw, &train, &test).unwrap();
    }

    #[cfg(unix)]
    #[test]
    fn test_setup_views_refuses_real_directory() {
        let dir = tempfile::tempdir().unwrap();
        let raw = dir.path().join("raw");
        fs::create_dir_all(raw.join("Train")).unwrap();
        fs::create_dir_all(raw.join("Test")).unwrap();

        let train = dir.path().join("train");
        fs::create_dir_all(&train).unwrap();

        let result = setup_split_views(&raw, &train, &dir.path().join("test"));
        assert!(matches!(result, Err(PacemakerError::Dataset(_))));
    }

    #[test]
    fn test_download_requires_slug() {
        let dir = tempfile::tempdir().unwrap();
        let result = download_archive("", dir.path());
        assert!(matches!(result, Err(PacemakerError::Config(_))));
    }
}
