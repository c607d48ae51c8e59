use crate::preprocessing::PreprocessedTensor;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ModelError {
    #[error("session mutex poisoned: {0}")]
    SessionPoisoned(String),
    #[error("failed to build input tensor: {0}")]
    InputTensor(String),
    #[error("inference failed: {0}")]
    Inference(String),
    #[error("failed to extract output tensor: {0}")]
    OutputTensor(String),
    #[error("expected {expected} class scores, got {actual}")]
    UnexpectedOutput { expected: usize, actual: usize },
    #[error("model produced non-finite scores: {0:?}")]
    NonFiniteScores(Vec<f32>),
}

/// Runs the classifier's forward pass.
///
/// Implementations are shared read-only across requests and must be
/// deterministic for a given input.
pub trait ModelService: Send + Sync + Clone + 'static {
    fn predict(&self, input: &PreprocessedTensor) -> Result<Vec<f32>, ModelError>;
}
