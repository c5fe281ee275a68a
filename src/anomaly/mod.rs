pub mod artifact;
pub mod forest;
pub mod model;
pub mod types;

pub use forest::IsolationForest;
pub use model::{AnomalyModel, FitParams, FORMAT_VERSION};
pub use types::{ModelInfo, ScoreOutput};
