mod batch;
mod classifier;
mod config;
mod constants;
mod error;
mod logging;
mod orchestrator;
mod routes;
mod sampler;
mod upload;
mod validation;
mod video;

use anyhow::Context;
use std::sync::Arc;

use classifier::CandleClassifier;
use config::Config;
use orchestrator::PredictionOrchestrator;
use validation::RequestValidator;
use video::FfmpegBackend;

struct AppState {
    orchestrator: Arc<PredictionOrchestrator>,
    validator: RequestValidator,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init();
    let config = Config::from_env();

    // Model files are mmapped and a Hub fetch may block on the network
    let binary = config.binary_model.clone();
    let multi = config.multi_model.clone();
    let classifier =
        tokio::task::spawn_blocking(move || CandleClassifier::load(&binary, multi.as_ref()))
            .await?
            .context("Failed to load classifier")?;

    let backend = FfmpegBackend::new(&config.ffmpeg_path, &config.ffprobe_path);
    let orchestrator = PredictionOrchestrator::new(
        Arc::new(classifier),
        Arc::new(backend),
        &config.upload_folder,
        config.frame_stride,
    );
    orchestrator
        .ensure_upload_dir()
        .with_context(|| format!("Failed to create {:?}", orchestrator.upload_dir()))?;

    let state = Arc::new(AppState {
        orchestrator: Arc::new(orchestrator),
        validator: RequestValidator {
            require_mode: config.require_prediction_type,
        },
    });
    let app = routes::build_app(state, config.max_upload_size);

    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    log::info!("Listening on http://{}", addr);
    axum::serve(listener, app).await.context("Server failed")?;
    Ok(())
}
