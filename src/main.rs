use std::path::Path;
use std::sync::Arc;

use pulseguard::anomaly::AnomalyModel;
use pulseguard::config::Config;
use pulseguard::pipeline::ScoringPipeline;

#[tokio::main]
async fn main() -> eyre::Result<()> {
    color_eyre::install()?;

    // Load configuration
    let (mut config, config_path) = Config::from_arg(std::env::args().nth(1))?;
    let from_file = Path::new(&config_path).exists();
    config.apply_env()?;

    pulseguard::logging::init(config.server.log_format);
    tracing::info!("PulseGuard API starting");
    if from_file {
        tracing::info!("Configuration loaded from {}", config_path);
    } else {
        tracing::warn!(path = %config_path, "Config file not found, using defaults");
    }

    // The model is loaded exactly once; the server does not start without it.
    let model = AnomalyModel::load(&config.model.path).map_err(|e| {
        eyre::eyre!(
            "Failed to load model (run pulseguard-train first): {}",
            e
        )
    })?;
    let info = model.info();
    tracing::info!(
        features = ?info.features,
        trees = info.n_estimators,
        training_rows = info.training_rows,
        trained_at = %info.trained_at,
        "Model ready"
    );

    let pipeline = ScoringPipeline::new(Arc::new(model), &config.serving);

    pulseguard::api::serve(
        pipeline,
        &config.server.host,
        config.server.port,
        config.server.max_upload_bytes,
        shutdown_signal(),
    )
    .await?;

    tracing::info!("PulseGuard API stopped gracefully");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received, draining requests...");
}
