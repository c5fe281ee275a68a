use std::path::{Path, PathBuf};

use pulseguard::config::Config;
use pulseguard::pipeline::run_training;

/// Usage: pulseguard-train [config.toml] [history.csv]
fn main() -> eyre::Result<()> {
    color_eyre::install()?;

    let mut args = std::env::args().skip(1);
    let (mut config, config_path) = Config::from_arg(args.next())?;
    let from_file = Path::new(&config_path).exists();
    if let Some(input) = args.next() {
        config.training.input_path = PathBuf::from(input);
    }

    pulseguard::logging::init(config.server.log_format);
    if from_file {
        tracing::info!("Configuration loaded from {}", config_path);
    } else {
        tracing::warn!(path = %config_path, "Config file not found, using defaults");
    }

    tracing::info!(
        input = %config.training.input_path.display(),
        feature_set = ?config.training.feature_set,
        contamination = config.training.contamination,
        seed = config.training.seed,
        "Training started"
    );

    let summary = run_training(&config.training, &config.model.path)
        .map_err(|e| eyre::eyre!("Training failed: {}", e))?;

    tracing::info!(
        rows_read = summary.drops.rows_read,
        rows_used = summary.rows_used,
        rows_dropped = summary.drops.dropped(),
        anomalies = summary.anomalies_flagged,
        model = %config.model.path.display(),
        output_dir = %config.training.output_dir.display(),
        "Model and reports written"
    );
    Ok(())
}
