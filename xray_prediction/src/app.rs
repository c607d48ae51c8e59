use crate::{
    config::Config,
    inference::InferencePipeline,
    ort_service::OrtModelService,
    scratch::ScratchDir,
    server::{HttpServer, SharedState},
    telemetry::Metrics,
};
use std::{error::Error, sync::Arc};

pub async fn start_app(config: Config) -> Result<(), Box<dyn Error>> {
    let model_service = match OrtModelService::new(&config.model) {
        Ok(service) => service,
        Err(e) => {
            tracing::error!("Failed to load classifier: {:?}", e);
            return Err(e);
        }
    };
    let normalization = config.model.normalization;
    tracing::info!(
        "Classifier ready, input normalization {:?} with value range {:?}",
        normalization,
        normalization.bounds()
    );

    let scratch = ScratchDir::new(&config.upload.scratch_dir)?;
    tracing::info!("Scratch uploads go to {:?}", scratch.root());

    let state = SharedState {
        pipeline: InferencePipeline::new(model_service, normalization),
        scratch,
        metrics: Arc::new(Metrics::new()?),
    };

    let server = HttpServer::new(state, &config).await?;
    server.run().await?;

    Ok(())
}
