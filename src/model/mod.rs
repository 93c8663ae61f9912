//! Model architectures and the model provider

pub mod classifier;

pub use classifier::{
    build_model, Architecture, Backbone, ConvBlock, PacemakerClassifier, MIN_IMAGE_SIZE,
};
