mod health;
mod index;
mod metrics;
mod predict;

use crate::{model_service::ModelService, server::SharedState};
use axum::{routing::get, Router};

pub fn api_routes<M: ModelService>() -> Router<SharedState<M>> {
    Router::new()
        .route("/", get(index::index))
        .route("/predict", get(index::index).post(predict::predict::<M>))
        .route("/health", get(health::healthcheck))
        .route("/metrics", get(metrics::metrics_handler::<M>))
}
