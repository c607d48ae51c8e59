use crate::{
    inference::InferencePipeline,
    model_service::{ModelError, ModelService},
    preprocessing::{Normalization, PreprocessedTensor},
    scratch::ScratchDir,
    server::{build_router, SharedState},
    telemetry::Metrics,
};
use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use image::{ImageBuffer, Rgb};
use std::{
    io::Cursor,
    path::PathBuf,
    sync::{Arc, Mutex},
};
use tower::ServiceExt;

pub const TEST_UPLOAD_LIMIT: usize = 1024 * 1024;
const BOUNDARY: &str = "xray-prediction-test-boundary";

/// Returns fixed scores and remembers the shape of the last input.
#[derive(Clone)]
pub struct MockModelService {
    scores: Vec<f32>,
    last_shape: Arc<Mutex<Option<Vec<usize>>>>,
}

impl MockModelService {
    pub fn new(scores: Vec<f32>) -> Self {
        Self {
            scores,
            last_shape: Arc::new(Mutex::new(None)),
        }
    }

    pub fn last_shape(&self) -> Option<Vec<usize>> {
        self.last_shape.lock().unwrap().clone()
    }
}

impl ModelService for MockModelService {
    fn predict(&self, input: &PreprocessedTensor) -> Result<Vec<f32>, ModelError> {
        *self.last_shape.lock().unwrap() = Some(input.shape().to_vec());
        Ok(self.scores.clone())
    }
}

/// Scores derived from the input so that different images get different labels.
#[derive(Clone)]
pub struct BrightnessModelService;

impl ModelService for BrightnessModelService {
    fn predict(&self, input: &PreprocessedTensor) -> Result<Vec<f32>, ModelError> {
        let mean = input.mean().unwrap_or_default();
        Ok(vec![mean, 1.0 - mean, (mean - 0.5).abs()])
    }
}

#[derive(Clone)]
pub struct FailingModelService;

impl ModelService for FailingModelService {
    fn predict(&self, _input: &PreprocessedTensor) -> Result<Vec<f32>, ModelError> {
        Err(ModelError::Inference("device lost: secret internal detail".to_string()))
    }
}

pub fn encode_png(width: u32, height: u32, color: [u8; 3]) -> Vec<u8> {
    let img = ImageBuffer::<Rgb<u8>, Vec<u8>>::from_pixel(width, height, Rgb(color));
    let mut cursor = Cursor::new(Vec::new());
    img.write_to(&mut cursor, image::ImageFormat::Png).unwrap();
    cursor.into_inner()
}

/// Fresh, empty directory under the system temp dir.
pub fn temp_dir() -> PathBuf {
    let dir = std::env::temp_dir().join(format!("xray-prediction-{}", uuid::Uuid::new_v4()));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

/// Router over `model` with a fresh scratch directory, which is returned too.
pub fn test_router<M: ModelService>(model: M) -> (Router, PathBuf) {
    let scratch_root = temp_dir();
    let state = SharedState {
        pipeline: InferencePipeline::new(model, Normalization::Caffe),
        scratch: ScratchDir::new(&scratch_root).unwrap(),
        metrics: Arc::new(Metrics::new().unwrap()),
    };
    (build_router(state, TEST_UPLOAD_LIMIT), scratch_root)
}

pub struct Part<'a> {
    pub name: &'a str,
    pub filename: Option<&'a str>,
    pub data: &'a [u8],
}

pub fn file_part<'a>(filename: &'a str, data: &'a [u8]) -> Part<'a> {
    Part {
        name: "file",
        filename: Some(filename),
        data,
    }
}

pub fn multipart_request(parts: &[Part<'_>]) -> Request<Body> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        let mut disposition = format!("Content-Disposition: form-data; name=\"{}\"", part.name);
        if let Some(filename) = part.filename {
            disposition.push_str(&format!("; filename=\"{}\"", filename));
        }
        body.extend_from_slice(disposition.as_bytes());
        body.extend_from_slice(b"\r\n");
        if part.filename.is_some() {
            body.extend_from_slice(b"Content-Type: application/octet-stream\r\n");
        }
        body.extend_from_slice(b"\r\n");
        body.extend_from_slice(part.data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());

    Request::builder()
        .method("POST")
        .uri("/predict")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(body))
        .unwrap()
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

pub async fn send(router: Router, request: Request<Body>) -> (StatusCode, String) {
    let response = router.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, String::from_utf8(bytes.to_vec()).unwrap())
}

pub fn file_count(dir: &std::path::Path) -> usize {
    std::fs::read_dir(dir).unwrap().count()
}
