//! Held-out evaluation
//!
//! Runs the model in validation mode over pre-built batches on the inner
//! (non-autodiff) backend and computes accuracy, mean loss and macro
//! precision.

use burn::{
    module::AutodiffModule,
    nn::loss::CrossEntropyLossConfig,
    tensor::{backend::AutodiffBackend, ElementConversion},
};

use crate::dataset::XrayBatch;
use crate::error::{PacemakerError, Result};
use crate::model::PacemakerClassifier;
use crate::utils::metrics::Metrics;

/// Evaluate the model over a split
pub fn evaluate<B: AutodiffBackend>(
    model: &PacemakerClassifier<B>,
    batches: &[XrayBatch<B::InnerBackend>],
) -> Result<Metrics> {
    let model = model.valid();
    let num_classes = model.num_classes();

    let mut predictions: Vec<usize> = Vec::new();
    let mut targets: Vec<usize> = Vec::new();
    let mut total_loss = 0.0f64;

    for batch in batches.iter() {
        model.validate_input(batch.images.dims())?;
        let output = model.forward(batch.images.clone());

        let loss = CrossEntropyLossConfig::new()
            .init(&output.device())
            .forward(output.clone(), batch.targets.clone());
        let loss_value: f64 = loss.into_scalar().elem();
        total_loss += loss_value;

        let predicted = output.argmax(1).squeeze::<1>(1);
        let predicted: Vec<i64> = predicted
            .into_data()
            .to_vec()
            .map_err(|e| PacemakerError::Serialization(format!("{:?}", e)))?;
        let expected: Vec<i64> = batch
            .targets
            .clone()
            .into_data()
            .to_vec()
            .map_err(|e| PacemakerError::Serialization(format!("{:?}", e)))?;

        predictions.extend(predicted.iter().map(|&p| p as usize));
        targets.extend(expected.iter().map(|&t| t as usize));
    }

    let mean_loss = if batches.is_empty() {
        0.0
    } else {
        total_loss / batches.len() as f64
    };

    Ok(Metrics::from_predictions(
        &predictions,
        &targets,
        num_classes,
        mean_loss,
    ))
}
