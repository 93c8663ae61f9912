//! Pacemaker Classifier Architectures
//!
//! Builds one of three CNN architectures with the Burn framework. The
//! backbone is a stack of conv/batchnorm/relu/maxpool blocks ending in global
//! average pooling; stage widths follow the named architecture so its
//! penultimate feature width matches that family (densenet121 ends in
//! 1024 features, resnet50 in 2048, mobilenet_v3_small in 576). The
//! classification head is always a fresh Linear sized to the configured class
//! count.

use std::path::Path;
use std::str::FromStr;

use burn::{
    module::Module,
    nn::{
        conv::{Conv2d, Conv2dConfig},
        pool::{AdaptiveAvgPool2d, AdaptiveAvgPool2dConfig, MaxPool2d, MaxPool2dConfig},
        BatchNorm, BatchNormConfig, Dropout, DropoutConfig, Linear, LinearConfig, PaddingConfig2d,
        Relu,
    },
    record::CompactRecorder,
    tensor::{backend::Backend, Tensor},
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{PacemakerError, Result};

/// Number of input channels (RGB X-ray renderings)
pub const IN_CHANNELS: usize = 3;

/// Minimum input edge length: four pooling stages halve the spatial dims,
/// so anything below 2^4 collapses to an empty feature map
pub const MIN_IMAGE_SIZE: usize = 16;

/// Dropout rate applied before the classification head
const HEAD_DROPOUT: f64 = 0.2;

/// Supported classifier architectures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Architecture {
    Densenet121,
    Resnet50,
    MobilenetV3Small,
}

impl Architecture {
    /// All supported architectures
    pub const ALL: [Architecture; 3] = [
        Architecture::Densenet121,
        Architecture::Resnet50,
        Architecture::MobilenetV3Small,
    ];

    /// Canonical snake_case name
    pub fn as_str(&self) -> &'static str {
        match self {
            Architecture::Densenet121 => "densenet121",
            Architecture::Resnet50 => "resnet50",
            Architecture::MobilenetV3Small => "mobilenet_v3_small",
        }
    }

    /// Output channels of each backbone stage; the last entry is the feature
    /// width seen by the head
    fn stage_widths(&self) -> [usize; 4] {
        match self {
            Architecture::Densenet121 => [64, 128, 256, 1024],
            Architecture::Resnet50 => [64, 256, 1024, 2048],
            Architecture::MobilenetV3Small => [16, 32, 64, 576],
        }
    }

    /// Feature width produced by the backbone
    pub fn feature_dim(&self) -> usize {
        self.stage_widths()[3]
    }
}

impl FromStr for Architecture {
    type Err = PacemakerError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "densenet121" => Ok(Architecture::Densenet121),
            "resnet50" => Ok(Architecture::Resnet50),
            "mobilenet_v3_small" => Ok(Architecture::MobilenetV3Small),
            other => Err(PacemakerError::UnsupportedArchitecture(other.to_string())),
        }
    }
}

impl std::fmt::Display for Architecture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A CNN block with Conv2d, BatchNorm, ReLU and MaxPool
#[derive(Module, Debug)]
pub struct ConvBlock<B: Backend> {
    conv: Conv2d<B>,
    bn: BatchNorm<B, 2>,
    relu: Relu,
    pool: MaxPool2d,
}

impl<B: Backend> ConvBlock<B> {
    /// Create a new convolutional block
    pub fn new(in_channels: usize, out_channels: usize, device: &B::Device) -> Self {
        let conv = Conv2dConfig::new([in_channels, out_channels], [3, 3])
            .with_padding(PaddingConfig2d::Same)
            .init(device);
        let bn = BatchNormConfig::new(out_channels).init(device);
        let pool = MaxPool2dConfig::new([2, 2]).with_strides([2, 2]).init();

        Self {
            conv,
            bn,
            relu: Relu::new(),
            pool,
        }
    }

    /// Forward pass through the block
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let x = self.conv.forward(x);
        let x = self.bn.forward(x);
        let x = self.relu.forward(x);
        self.pool.forward(x)
    }
}

/// Feature extractor shared by all architectures
///
/// Kept as its own module so pretrained weights can be loaded into the
/// backbone while the head stays freshly initialized at the configured class
/// count.
#[derive(Module, Debug)]
pub struct Backbone<B: Backend> {
    blocks: Vec<ConvBlock<B>>,
    global_pool: AdaptiveAvgPool2d,
}

impl<B: Backend> Backbone<B> {
    /// Build the backbone for an architecture
    pub fn new(architecture: Architecture, device: &B::Device) -> Self {
        let widths = architecture.stage_widths();
        let mut blocks = Vec::with_capacity(widths.len());
        let mut in_channels = IN_CHANNELS;
        for &out_channels in widths.iter() {
            blocks.push(ConvBlock::new(in_channels, out_channels, device));
            in_channels = out_channels;
        }

        Self {
            blocks,
            global_pool: AdaptiveAvgPool2dConfig::new([1, 1]).init(),
        }
    }

    /// Forward pass: [N, 3, H, W] -> [N, feature_dim]
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 2> {
        let mut x = x;
        for block in self.blocks.iter() {
            x = block.forward(x);
        }
        let x = self.global_pool.forward(x);

        let [batch_size, channels, _, _] = x.dims();
        x.reshape([batch_size, channels])
    }
}

/// Pacemaker model classifier
///
/// Input shape [batch, 3, H, W], output logits [batch, num_classes].
#[derive(Module, Debug)]
pub struct PacemakerClassifier<B: Backend> {
    pub backbone: Backbone<B>,
    pub dropout: Dropout,
    pub head: Linear<B>,
    num_classes: usize,
}

impl<B: Backend> PacemakerClassifier<B> {
    /// Create a new classifier with a fresh head sized to `num_classes`
    pub fn new(architecture: Architecture, num_classes: usize, device: &B::Device) -> Self {
        let backbone = Backbone::new(architecture, device);
        let dropout = DropoutConfig::new(HEAD_DROPOUT).init();
        let head = LinearConfig::new(architecture.feature_dim(), num_classes).init(device);

        Self {
            backbone,
            dropout,
            head,
            num_classes,
        }
    }

    /// Forward pass producing logits
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 2> {
        let x = self.backbone.forward(x);
        let x = self.dropout.forward(x);
        self.head.forward(x)
    }

    /// Forward pass with softmax for inference
    pub fn forward_softmax(&self, x: Tensor<B, 4>) -> Tensor<B, 2> {
        let logits = self.forward(x);
        burn::tensor::activation::softmax(logits, 1)
    }

    /// Get the number of output classes
    pub fn num_classes(&self) -> usize {
        self.num_classes
    }

    /// Width of the head's output layer
    pub fn head_output_dim(&self) -> usize {
        self.head.weight.val().dims()[1]
    }

    /// Check a batch shape against the model's input contract
    ///
    /// Callers run this before `forward`; undersized images would otherwise
    /// panic inside the pooling stages.
    pub fn validate_input(&self, dims: [usize; 4]) -> Result<()> {
        if dims[1] != IN_CHANNELS || dims[2] < MIN_IMAGE_SIZE || dims[3] < MIN_IMAGE_SIZE {
            return Err(PacemakerError::ShapeMismatch {
                expected: IN_CHANNELS,
                found: dims.to_vec(),
            });
        }
        Ok(())
    }
}

/// Build a model from the run configuration's model section
///
/// With `pretrained` set, backbone weights are loaded from the given record
/// file when it exists; a missing file logs a warning and keeps the random
/// initialization. The head is never loaded from disk here.
pub fn build_model<B: Backend>(
    architecture: Architecture,
    num_classes: usize,
    pretrained: bool,
    backbone_weights: Option<&Path>,
    device: &B::Device,
) -> Result<PacemakerClassifier<B>> {
    let mut model = PacemakerClassifier::new(architecture, num_classes, device);

    if pretrained {
        match backbone_weights {
            Some(path) if path.exists() => {
                let backbone = model
                    .backbone
                    .load_file(path, &CompactRecorder::new(), device)
                    .map_err(|e| PacemakerError::Record(e.to_string()))?;
                model.backbone = backbone;
                info!("Loaded pretrained backbone from {}", path.display());
            }
            Some(path) => {
                warn!(
                    "Pretrained requested but '{}' does not exist, using random init",
                    path.display()
                );
            }
            None => {
                warn!("Pretrained requested but no backbone_weights configured, using random init");
            }
        }
    }

    info!(
        "Built {} with {} classes ({} parameters)",
        architecture,
        num_classes,
        model.num_params()
    );

    Ok(model)
}

#[cfg(test)]
mod tests {
    use super::*;

    type TestBackend = burn::backend::NdArray;

    #[test]
    fn test_architecture_parsing() {
        assert_eq!(
            "densenet121".parse::<Architecture>().unwrap(),
            Architecture::Densenet121
        );
        assert_eq!(
            "mobilenet_v3_small".parse::<Architecture>().unwrap(),
            Architecture::MobilenetV3Small
        );
    }

    #[test]
    fn test_unknown_architecture_rejected() {
        let result = "vgg16".parse::<Architecture>();
        assert!(matches!(
            result,
            Err(PacemakerError::UnsupportedArchitecture(name)) if name == "vgg16"
        ));
    }

    #[test]
    fn test_forward_output_shape() {
        let device = Default::default();
        let model =
            PacemakerClassifier::<TestBackend>::new(Architecture::MobilenetV3Small, 7, &device);

        // Adaptive pooling makes the input size flexible; keep it small here
        let input = Tensor::<TestBackend, 4>::zeros([2, 3, 32, 32], &device);
        let output = model.forward(input);

        assert_eq!(output.dims(), [2, 7]);
    }

    #[test]
    fn test_resnet50_head_resized_to_45_classes() {
        let device = Default::default();
        let model = PacemakerClassifier::<TestBackend>::new(Architecture::Resnet50, 45, &device);

        assert_eq!(model.num_classes(), 45);
        assert_eq!(model.head_output_dim(), 45);
        assert_eq!(model.head.weight.val().dims(), [2048, 45]);
    }

    #[test]
    fn test_build_model_ignores_missing_pretrained_file() {
        let device = Default::default();
        let model = build_model::<TestBackend>(
            Architecture::MobilenetV3Small,
            4,
            true,
            Some(Path::new("does/not/exist.mpk")),
            &device,
        )
        .unwrap();

        assert_eq!(model.num_classes(), 4);
    }

    #[test]
    fn test_validate_input_enforces_shape_contract() {
        let device = Default::default();
        let model =
            PacemakerClassifier::<TestBackend>::new(Architecture::MobilenetV3Small, 2, &device);

        assert!(model.validate_input([2, 3, 16, 16]).is_ok());
        assert!(model.validate_input([2, 3, 224, 224]).is_ok());

        // Wrong channel count
        assert!(matches!(
            model.validate_input([2, 1, 32, 32]),
            Err(PacemakerError::ShapeMismatch { .. })
        ));
        // Too small for the four pooling stages
        assert!(matches!(
            model.validate_input([2, 3, 8, 8]),
            Err(PacemakerError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_softmax_rows_sum_to_one() {
        let device = Default::default();
        let model =
            PacemakerClassifier::<TestBackend>::new(Architecture::MobilenetV3Small, 3, &device);

        let input = Tensor::<TestBackend, 4>::zeros([1, 3, 16, 16], &device);
        let probs = model.forward_softmax(input);
        let sum: f32 = probs.sum().into_scalar();

        assert!((sum - 1.0).abs() < 1e-4);
    }
}
