use crate::{
    labels::{argmax, Diagnosis, CLASS_COUNT},
    model_service::{ModelError, ModelService},
    preprocessing::{load_image, transform_image, Normalization, PreprocessError},
};
use image::DynamicImage;
use std::{path::Path, sync::Arc};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum InferenceError {
    #[error(transparent)]
    Preprocess(#[from] PreprocessError),
    #[error(transparent)]
    Model(#[from] ModelError),
    #[error("inference task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl InferenceError {
    /// True when the upload itself could not be read as an image.
    pub fn is_unreadable_input(&self) -> bool {
        matches!(self, InferenceError::Preprocess(_))
    }
}

/// Decode, preprocess, forward pass and label lookup for a single image.
#[derive(Debug, Clone)]
pub struct InferencePipeline<M: ModelService> {
    model_service: Arc<M>,
    normalization: Normalization,
}

impl<M: ModelService> InferencePipeline<M> {
    pub fn new(model_service: M, normalization: Normalization) -> Self {
        Self {
            model_service: Arc::new(model_service),
            normalization,
        }
    }

    pub fn classify_file(&self, path: &Path) -> Result<Diagnosis, InferenceError> {
        let image = load_image(path)?;
        self.classify_image(&image)
    }

    pub fn classify_image(&self, image: &DynamicImage) -> Result<Diagnosis, InferenceError> {
        let input = transform_image(image, self.normalization);
        let scores = self.model_service.predict(&input)?;
        Ok(diagnose(&scores)?)
    }
}

fn diagnose(scores: &[f32]) -> Result<Diagnosis, ModelError> {
    if scores.len() != CLASS_COUNT {
        return Err(ModelError::UnexpectedOutput {
            expected: CLASS_COUNT,
            actual: scores.len(),
        });
    }
    if scores.iter().any(|score| !score.is_finite()) {
        return Err(ModelError::NonFiniteScores(scores.to_vec()));
    }

    argmax(scores)
        .and_then(Diagnosis::from_index)
        .ok_or(ModelError::UnexpectedOutput {
            expected: CLASS_COUNT,
            actual: scores.len(),
        })
}
