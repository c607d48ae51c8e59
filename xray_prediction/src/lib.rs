mod inference;
mod labels;
mod model_service;
mod ort_service;
mod preprocessing;
mod routes;
mod scratch;
mod server;
mod telemetry;
mod upload;

#[cfg(test)]
mod test_utils;

pub mod app;
pub mod config;

pub use app::start_app;
