//! Burn batching for X-ray images
//!
//! Converts decoded images into normalized CHW tensors and assembles
//! training batches. Normalization uses the ImageNet statistics the
//! architectures were designed around.

use std::path::Path;

use burn::data::dataloader::batcher::Batcher;
use burn::prelude::*;
use image::imageops::FilterType;
use image::ImageReader;
use serde::{Deserialize, Serialize};

use crate::error::{PacemakerError, Result};

/// ImageNet channel means
const NORM_MEAN: [f32; 3] = [0.485, 0.456, 0.406];
/// ImageNet channel standard deviations
const NORM_STD: [f32; 3] = [0.229, 0.224, 0.225];

/// A single X-ray image ready for batching
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct XrayItem {
    /// Image data as flattened CHW float array [3 * H * W], scaled to [0, 1]
    pub image: Vec<f32>,
    /// Class label
    pub label: usize,
}

impl XrayItem {
    /// Load and preprocess an image from disk
    pub fn from_path(path: &Path, label: usize, image_size: usize) -> Result<Self> {
        let img = ImageReader::open(path)
            .map_err(|e| PacemakerError::Image {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?
            .decode()
            .map_err(|e| PacemakerError::Image {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?
            .resize_exact(image_size as u32, image_size as u32, FilterType::Triangle)
            .to_rgb8();

        let (width, height) = (image_size, image_size);
        let mut image = vec![0.0f32; 3 * height * width];

        // Convert HWC u8 to CHW f32 in [0, 1]
        for y in 0..height {
            for x in 0..width {
                let pixel = img.get_pixel(x as u32, y as u32);
                for c in 0..3 {
                    image[c * height * width + y * width + x] = pixel[c] as f32 / 255.0;
                }
            }
        }

        Ok(Self { image, label })
    }

    /// Create from pre-computed data (tests and synthetic batches)
    pub fn from_data(image: Vec<f32>, label: usize) -> Self {
        Self { image, label }
    }
}

/// A batch of X-ray images
#[derive(Clone, Debug)]
pub struct XrayBatch<B: Backend> {
    /// Images with shape [batch_size, 3, height, width]
    pub images: Tensor<B, 4>,
    /// Labels with shape [batch_size]
    pub targets: Tensor<B, 1, Int>,
}

/// Batcher producing normalized image batches
#[derive(Clone, Debug)]
pub struct XrayBatcher {
    image_size: usize,
}

impl XrayBatcher {
    /// Create a batcher for the given square image size
    pub fn new(image_size: usize) -> Self {
        Self { image_size }
    }
}

impl<B: Backend> Batcher<B, XrayItem, XrayBatch<B>> for XrayBatcher {
    fn batch(&self, items: Vec<XrayItem>, device: &B::Device) -> XrayBatch<B> {
        let batch_size = items.len();
        let channels = 3;
        let height = self.image_size;
        let width = self.image_size;

        let images_data: Vec<f32> = items.iter().flat_map(|item| item.image.clone()).collect();
        let images = Tensor::<B, 4>::from_floats(
            TensorData::new(images_data, [batch_size, channels, height, width]),
            device,
        );

        // (x - mean) / std, broadcast over [1, 3, 1, 1]
        let mean = Tensor::<B, 4>::from_floats(
            TensorData::new(NORM_MEAN.to_vec(), [1, 3, 1, 1]),
            device,
        );
        let std = Tensor::<B, 4>::from_floats(
            TensorData::new(NORM_STD.to_vec(), [1, 3, 1, 1]),
            device,
        );
        let images = (images - mean) / std;

        let targets_data: Vec<i64> = items.iter().map(|item| item.label as i64).collect();
        let targets =
            Tensor::<B, 1, Int>::from_data(TensorData::new(targets_data, [batch_size]), device);

        XrayBatch { images, targets }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type TestBackend = burn::backend::NdArray;

    fn gray_item(value: f32, label: usize, size: usize) -> XrayItem {
        XrayItem::from_data(vec![value; 3 * size * size], label)
    }

    #[test]
    fn test_batch_shapes() {
        let device = Default::default();
        let batcher = XrayBatcher::new(8);
        let items = vec![gray_item(0.5, 0, 8), gray_item(0.2, 1, 8)];

        let batch: XrayBatch<TestBackend> = batcher.batch(items, &device);

        assert_eq!(batch.images.dims(), [2, 3, 8, 8]);
        assert_eq!(batch.targets.dims(), [2]);
    }

    #[test]
    fn test_normalization_applied() {
        let device = Default::default();
        let batcher = XrayBatcher::new(2);
        let items = vec![gray_item(NORM_MEAN[0], 0, 2)];

        let batch: XrayBatch<TestBackend> = batcher.batch(items, &device);

        // Channel 0 holds exactly the channel mean, so it normalizes to 0
        let first: f32 = batch
            .images
            .clone()
            .slice([0..1, 0..1, 0..1, 0..1])
            .into_scalar();
        assert!(first.abs() < 1e-5);
    }

    #[test]
    fn test_targets_preserved() {
        let device = Default::default();
        let batcher = XrayBatcher::new(4);
        let items = vec![gray_item(0.1, 3, 4), gray_item(0.2, 1, 4)];

        let batch: XrayBatch<TestBackend> = batcher.batch(items, &device);
        let targets: Vec<i64> = batch.targets.into_data().to_vec().unwrap();

        assert_eq!(targets, vec![3, 1]);
    }
}
