pub mod inference;
pub mod model_manager;

use crate::error::AppError;
use crate::models::classify_types::Prediction;
use ndarray::Array4;

/// Anything that can turn a preprocessed batch-of-one tensor into ranked predictions.
pub trait ImageClassifier {
    /// Predictions for the single image in `input`, most probable first.
    fn classify(&self, input: Array4<f32>) -> Result<Vec<Prediction>, AppError>;
}
