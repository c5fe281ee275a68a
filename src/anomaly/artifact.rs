use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

use super::model::{AnomalyModel, FORMAT_VERSION};

fn artifact_error(path: &Path, reason: impl Into<String>) -> Error {
    Error::Artifact {
        path: path.to_path_buf(),
        reason: reason.into(),
    }
}

impl AnomalyModel {
    /// Persist the model as JSON. Written to a sibling temp file and renamed
    /// into place so readers never observe a half-written artifact.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let tmp = temp_path(path);
        let file = std::fs::File::create(&tmp)
            .map_err(|e| artifact_error(path, format!("cannot create: {}", e)))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer(&mut writer, self)
            .map_err(|e| artifact_error(path, format!("cannot serialize: {}", e)))?;
        writer.flush()?;
        drop(writer);
        std::fs::rename(&tmp, path)?;

        tracing::info!(path = %path.display(), trees = self.forest.n_estimators(), "Model artifact saved");
        Ok(())
    }

    /// Load and validate a model artifact.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = std::fs::File::open(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => artifact_error(path, "file not found"),
            _ => artifact_error(path, format!("cannot open: {}", e)),
        })?;

        let model: AnomalyModel = serde_json::from_reader(BufReader::new(file))
            .map_err(|e| artifact_error(path, format!("corrupt artifact: {}", e)))?;
        model.validate().map_err(|reason| artifact_error(path, reason))?;

        tracing::info!(
            path = %path.display(),
            features = ?model.schema.names(),
            trees = model.forest.n_estimators(),
            training_rows = model.training_rows,
            "Model artifact loaded"
        );
        Ok(model)
    }

    fn validate(&self) -> std::result::Result<(), String> {
        if self.format_version != FORMAT_VERSION {
            return Err(format!(
                "unsupported format version {} (expected {})",
                self.format_version, FORMAT_VERSION
            ));
        }
        if self.schema != self.features.schema() {
            return Err(format!(
                "schema {:?} does not match feature set {:?}",
                self.schema.names(),
                self.features.kind()
            ));
        }
        if self.forest.n_features() != self.schema.len() {
            return Err(format!(
                "forest expects {} features, schema has {}",
                self.forest.n_features(),
                self.schema.len()
            ));
        }
        if !self.offset.is_finite() {
            return Err("non-finite decision offset".to_string());
        }
        self.forest.validate()
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}
