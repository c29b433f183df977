//! Model file management for backends that ship neural network weights.

use std::path::{Path, PathBuf};
use std::process::Command;

use super::backend::OcrError;

/// Model file specification for downloading.
pub struct ModelSpec {
    /// URL to download from.
    pub url: &'static str,
    /// Filename to save as.
    pub filename: &'static str,
    /// Human-readable size for log messages.
    pub size_hint: &'static str,
}

/// Where a backend keeps its models.
pub struct ModelDirConfig {
    /// Subdirectory name under the user data dir (e.g., "ocrs").
    pub subdir: &'static str,
    /// Model files that must all be present.
    pub required_files: &'static [&'static str],
}

impl ModelDirConfig {
    /// Default model directory, used as the download target.
    pub fn default_dir(&self) -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")))
            .join("spendscan")
            .join(self.subdir)
    }

    /// Directories searched for existing models, in order.
    pub fn candidate_dirs(&self) -> Vec<PathBuf> {
        [
            Some(self.default_dir()),
            dirs::home_dir().map(|d| d.join(format!(".{}", self.subdir)).join("models")),
            Some(PathBuf::from(format!("/usr/share/{}/models", self.subdir))),
        ]
        .into_iter()
        .flatten()
        .collect()
    }

    /// Check if a directory contains all required model files.
    pub fn has_required_files(&self, dir: &Path) -> bool {
        self.required_files
            .iter()
            .all(|file| dir.join(file).exists())
    }

    /// First directory (configured path, then candidates) holding every model.
    pub fn locate(&self, configured: Option<&Path>) -> Option<PathBuf> {
        if let Some(path) = configured {
            if self.has_required_files(path) {
                return Some(path.to_path_buf());
            }
        }
        self.candidate_dirs()
            .into_iter()
            .find(|dir| self.has_required_files(dir))
    }
}

/// Download a file with curl.
fn download_file(url: &str, dest: &Path) -> Result<(), OcrError> {
    let status = Command::new("curl")
        .args(["-fsSL", "-o"])
        .arg(dest)
        .arg(url)
        .status();

    match status {
        Ok(status) if status.success() => Ok(()),
        Ok(_) => {
            let _ = std::fs::remove_file(dest);
            Err(OcrError::ModelNotFound(format!("failed to download {}", url)))
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(OcrError::BackendNotAvailable(
            "curl not found; install it or place models manually".to_string(),
        )),
        Err(e) => Err(OcrError::Io(e)),
    }
}

/// Download a model file if it is not already present.
pub fn ensure_model_file(spec: &ModelSpec, model_dir: &Path) -> Result<(), OcrError> {
    let dest = model_dir.join(spec.filename);
    if !dest.exists() {
        tracing::info!("Downloading {} (~{})", spec.filename, spec.size_hint);
        download_file(spec.url, &dest)?;
    }
    Ok(())
}
