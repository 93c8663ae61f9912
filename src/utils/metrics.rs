//! Evaluation metrics
//!
//! Computes accuracy, mean loss and macro-averaged precision from prediction
//! and target vectors collected during an evaluation pass.

/// Metrics for a single evaluation pass over a split
#[derive(Debug, Clone, PartialEq)]
pub struct Metrics {
    /// Fraction of correctly classified samples (0.0 - 1.0)
    pub accuracy: f64,
    /// Mean cross-entropy loss over the split
    pub loss: f64,
    /// Macro-averaged precision over all classes
    pub precision: f64,
    /// Number of samples evaluated
    pub num_samples: usize,
}

impl Metrics {
    /// Compute metrics from predicted and true class indices
    ///
    /// Precision is macro-averaged over `num_classes`; a class that was never
    /// predicted contributes zero to the average.
    pub fn from_predictions(
        predictions: &[usize],
        targets: &[usize],
        num_classes: usize,
        mean_loss: f64,
    ) -> Self {
        let num_samples = predictions.len().min(targets.len());
        if num_samples == 0 || num_classes == 0 {
            return Self {
                accuracy: 0.0,
                loss: mean_loss,
                precision: 0.0,
                num_samples: 0,
            };
        }

        let confusion = confusion_matrix(predictions, targets, num_classes);

        let correct: usize = (0..num_classes).map(|c| confusion[c][c]).sum();
        let accuracy = correct as f64 / num_samples as f64;

        let mut precision_sum = 0.0;
        for class in 0..num_classes {
            let tp = confusion[class][class];
            let predicted: usize = (0..num_classes).map(|t| confusion[class][t]).sum();
            if predicted > 0 {
                precision_sum += tp as f64 / predicted as f64;
            }
        }
        let precision = precision_sum / num_classes as f64;

        Self {
            accuracy,
            loss: mean_loss,
            precision,
            num_samples,
        }
    }
}

/// Confusion matrix indexed as `[predicted][actual]`
fn confusion_matrix(predictions: &[usize], targets: &[usize], num_classes: usize) -> Vec<Vec<usize>> {
    let mut matrix = vec![vec![0usize; num_classes]; num_classes];
    for (&pred, &target) in predictions.iter().zip(targets.iter()) {
        if pred < num_classes && target < num_classes {
            matrix[pred][target] += 1;
        }
    }
    matrix
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_perfect_predictions() {
        let predictions = vec![0, 1, 2, 0, 1];
        let targets = vec![0, 1, 2, 0, 1];
        let metrics = Metrics::from_predictions(&predictions, &targets, 3, 0.1);

        assert!((metrics.accuracy - 1.0).abs() < 1e-9);
        assert!((metrics.precision - 1.0).abs() < 1e-9);
        assert_eq!(metrics.num_samples, 5);
    }

    #[test]
    fn test_known_confusion() {
        // Class 0: predicted 3 times, 2 correct. Class 1: predicted once, correct.
        let predictions = vec![0, 0, 0, 1];
        let targets = vec![0, 0, 1, 1];
        let metrics = Metrics::from_predictions(&predictions, &targets, 2, 0.5);

        assert!((metrics.accuracy - 0.75).abs() < 1e-9);
        // Macro precision: (2/3 + 1/1) / 2
        let expected = (2.0 / 3.0 + 1.0) / 2.0;
        assert!((metrics.precision - expected).abs() < 1e-9);
        assert!((metrics.loss - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_empty_input() {
        let metrics = Metrics::from_predictions(&[], &[], 4, 0.0);
        assert_eq!(metrics.num_samples, 0);
        assert_eq!(metrics.accuracy, 0.0);
    }

    #[test]
    fn test_never_predicted_class_counts_zero() {
        //3 classes, class 2 never predicted
        let predictions = vec![0, 0, 1, 1];
        let targets = vec![0, 2, 1, 2];
        let metrics = Metrics::from_predictions(&predictions, &targets, 3, 0.0);

        let expected = (0.5 + 0.5 + 0.0) / 3.0;
        assert!((metrics.precision - expected).abs() < 1e-9);
    }
}
