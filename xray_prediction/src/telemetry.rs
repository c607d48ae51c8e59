use opentelemetry::{
    global,
    metrics::{Counter, Histogram, MeterProvider},
    KeyValue,
};
use opentelemetry_sdk::metrics::SdkMeterProvider;
use prometheus::Registry;
use std::collections::HashSet;

pub struct Metrics {
    predictions: Counter<u64>,
    rejected_uploads: Counter<u64>,
    failed_predictions: Counter<u64>,
    inference_duration: Histogram<u64>,
    // dropping the last provider handle shuts the exporter down
    _provider: SdkMeterProvider,
    pub registry: Registry,
}

impl Metrics {
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();
        let exporter = opentelemetry_prometheus::exporter()
            .with_registry(registry.clone())
            .build()?;

        let provider = SdkMeterProvider::builder().with_reader(exporter).build();

        let meter = provider.meter("xray_prediction");
        global::set_meter_provider(provider.clone());

        let predictions = meter
            .u64_counter("predictions_total")
            .with_description("Classified uploads by predicted label")
            .build();

        let rejected_uploads = meter
            .u64_counter("rejected_uploads_total")
            .with_description("Uploads rejected before inference")
            .build();

        let failed_predictions = meter
            .u64_counter("failed_predictions_total")
            .with_description("Uploads that failed during decoding or inference")
            .build();

        let inference_duration = meter
            .u64_histogram("inference_duration_ms")
            .with_boundaries(latency_boundaries((10, 100, 500, 2000)))
            .with_description("Duration of decode, preprocessing and forward pass in milliseconds")
            .build();

        Ok(Metrics {
            predictions,
            rejected_uploads,
            failed_predictions,
            inference_duration,
            _provider: provider,
            registry,
        })
    }

    pub fn record_prediction(&self, label: &str) {
        let attributes = [KeyValue::new("label", label.to_string())];
        self.predictions.add(1, &attributes);
    }

    pub fn record_rejection(&self, reason: &str) {
        let attributes = [KeyValue::new("reason", reason.to_string())];
        self.rejected_uploads.add(1, &attributes);
    }

    pub fn record_failure(&self, stage: &str) {
        let attributes = [KeyValue::new("stage", stage.to_string())];
        self.failed_predictions.add(1, &attributes);
    }

    pub fn record_inference_duration(&self, duration_ms: u64) {
        self.inference_duration.record(duration_ms, &[]);
    }
}

/// Bucket edges: fine steps for fast CPU runs, coarser ones for the tail.
fn latency_boundaries(parts: (u64, u64, u64, u64)) -> Vec<f64> {
    let fine_step: usize = 10;
    let middle_step: usize = 50;
    let tail_step: usize = 250;
    let fine = (parts.0..=parts.1).step_by(fine_step);
    let middle = (parts.1..=parts.2).step_by(middle_step);
    let tail = (parts.2..=parts.3).step_by(tail_step);

    let mut seen = HashSet::new();
    fine.chain(middle)
        .chain(tail)
        .filter(|&x| seen.insert(x))
        .map(|x| x as f64)
        .collect()
}
