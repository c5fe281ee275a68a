use serde::Deserialize;
use std::path::PathBuf;

use crate::features::FeatureKind;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub serving: ServingConfig,
    #[serde(default)]
    pub training: TrainingConfig,
}

// ============================================================
// Server Config
// ============================================================

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
    #[serde(default)]
    pub log_format: LogFormat,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            max_upload_bytes: default_max_upload_bytes(),
            log_format: LogFormat::default(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    5000
}

fn default_max_upload_bytes() -> usize {
    10 * 1024 * 1024
}

// ============================================================
// Model Config
// ============================================================

#[derive(Debug, Deserialize, Clone)]
pub struct ModelConfig {
    #[serde(default = "default_model_path")]
    pub path: PathBuf,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            path: default_model_path(),
        }
    }
}

fn default_model_path() -> PathBuf {
    PathBuf::from("pulseguard_model.json")
}

// ============================================================
// Column names
// ============================================================

/// Names of the input columns the feature pipeline reads.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct ColumnConfig {
    pub date: String,
    pub amount: String,
    pub category: String,
}

impl ColumnConfig {
    pub fn serving_default() -> Self {
        Self {
            date: "Transaction Date".to_string(),
            amount: "Total Spent".to_string(),
            category: "Category".to_string(),
        }
    }

    pub fn training_default() -> Self {
        Self {
            date: "Date".to_string(),
            amount: "amount".to_string(),
            category: "category".to_string(),
        }
    }

    fn validate(&self, section: &str) -> eyre::Result<()> {
        for (key, value) in [
            ("date", &self.date),
            ("amount", &self.amount),
            ("category", &self.category),
        ] {
            if value.trim().is_empty() {
                return Err(eyre::eyre!("[{}.columns] {} must not be empty", section, key));
            }
        }
        Ok(())
    }
}

// ============================================================
// Serving Config
// ============================================================

#[derive(Debug, Deserialize, Clone)]
pub struct ServingConfig {
    #[serde(default = "ColumnConfig::serving_default")]
    pub columns: ColumnConfig,
    #[serde(default = "default_max_anomalies")]
    pub max_anomalies: usize,
}

impl Default for ServingConfig {
    fn default() -> Self {
        Self {
            columns: ColumnConfig::serving_default(),
            max_anomalies: default_max_anomalies(),
        }
    }
}

fn default_max_anomalies() -> usize {
    20
}

// ============================================================
// Training Config
// ============================================================

#[derive(Debug, Deserialize, Clone)]
pub struct TrainingConfig {
    #[serde(default = "default_input_path")]
    pub input_path: PathBuf,
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    #[serde(default = "ColumnConfig::training_default")]
    pub columns: ColumnConfig,
    #[serde(default = "default_feature_set")]
    pub feature_set: FeatureKind,
    #[serde(default = "default_contamination")]
    pub contamination: f64,
    #[serde(default = "default_seed")]
    pub seed: u64,
    #[serde(default = "default_n_estimators")]
    pub n_estimators: usize,
    #[serde(default = "default_max_samples")]
    pub max_samples: usize,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            input_path: default_input_path(),
            output_dir: default_output_dir(),
            columns: ColumnConfig::training_default(),
            feature_set: default_feature_set(),
            contamination: default_contamination(),
            seed: default_seed(),
            n_estimators: default_n_estimators(),
            max_samples: default_max_samples(),
        }
    }
}

fn default_input_path() -> PathBuf {
    PathBuf::from("spending_patterns_detailed.csv")
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("pulseguard_outputs")
}

fn default_feature_set() -> FeatureKind {
    FeatureKind::Spending
}

fn default_contamination() -> f64 {
    0.05
}

fn default_seed() -> u64 {
    42
}

fn default_n_estimators() -> usize {
    100
}

fn default_max_samples() -> usize {
    256
}

pub const DEFAULT_PATH: &str = "pulseguard.toml";

impl Config {
    pub fn load(path: &str) -> eyre::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| eyre::eyre!("Failed to read config file '{}': {}", path, e))?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| eyre::eyre!("Failed to parse config file '{}': {}", path, e))?;
        config.validate()?;
        Ok(config)
    }

    /// Load `path` if it exists, otherwise fall back to built-in defaults.
    /// Runs before logging is up, so callers report which one happened.
    pub fn load_or_default(path: &str) -> eyre::Result<Self> {
        if std::path::Path::new(path).exists() {
            Self::load(path)
        } else {
            let config = Config::default();
            config.validate()?;
            Ok(config)
        }
    }

    /// An explicitly given path must load; without one, `pulseguard.toml`
    /// is optional. Returns the path that was consulted.
    pub fn from_arg(arg: Option<String>) -> eyre::Result<(Self, String)> {
        match arg {
            Some(path) => Ok((Self::load(&path)?, path)),
            None => Ok((Self::load_or_default(DEFAULT_PATH)?, DEFAULT_PATH.to_string())),
        }
    }

    /// `PORT` overrides the configured port, for hosts that assign one.
    pub fn apply_env(&mut self) -> eyre::Result<()> {
        if let Ok(port) = std::env::var("PORT") {
            self.server.port = port
                .parse()
                .map_err(|e| eyre::eyre!("Invalid PORT '{}': {}", port, e))?;
            if self.server.port == 0 {
                return Err(eyre::eyre!("PORT must be non-zero"));
            }
        }
        Ok(())
    }

    fn validate(&self) -> eyre::Result<()> {
        let t = &self.training;
        if !(t.contamination > 0.0 && t.contamination <= 0.5) {
            return Err(eyre::eyre!(
                "training.contamination must be in (0, 0.5], got {}",
                t.contamination
            ));
        }
        if t.n_estimators == 0 {
            return Err(eyre::eyre!("training.n_estimators must be at least 1"));
        }
        if t.max_samples < 2 {
            return Err(eyre::eyre!("training.max_samples must be at least 2"));
        }
        if self.server.port == 0 {
            return Err(eyre::eyre!("server.port must be non-zero"));
        }
        if self.server.max_upload_bytes == 0 {
            return Err(eyre::eyre!("server.max_upload_bytes must be positive"));
        }
        self.serving.columns.validate("serving")?;
        self.training.columns.validate("training")?;
        Ok(())
    }
}
