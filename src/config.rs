//! Configuration management for spendscan using the prefer crate.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::ocr::{OcrBackendType, OcrConfig, PreprocessOptions, PSM_SINGLE_BLOCK};
use crate::services::{CategorizeError, RuleCategorizer, RuleConfig};

/// Environment variable overriding `ocr.language`.
pub const ENV_OCR_LANG: &str = "SPENDSCAN_OCR_LANG";
/// Environment variable overriding `ocr.backend`.
pub const ENV_OCR_BACKEND: &str = "SPENDSCAN_OCR_BACKEND";

/// OCR engine section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrSettings {
    /// Backend name: "tesseract" or "ocrs".
    pub backend: String,
    /// Tesseract language code(s), e.g. "eng" or "eng+fra".
    pub language: String,
    pub page_segmentation_mode: u8,
    pub dpi: u32,
    /// Push a blank image through the engine at startup.
    pub warm_up: bool,
    /// Model directory for backends that need one. Relative paths are
    /// resolved against the config file.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_path: Option<String>,
}

impl Default for OcrSettings {
    fn default() -> Self {
        Self {
            backend: OcrBackendType::Tesseract.as_str().to_string(),
            language: "eng".to_string(),
            page_segmentation_mode: PSM_SINGLE_BLOCK,
            dpi: 300,
            warm_up: true,
            model_path: None,
        }
    }
}

/// Image preprocessing section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PreprocessSettings {
    pub enabled: bool,
    pub max_edge: u32,
    pub threshold: u8,
    pub sharpen_sigma: f32,
    pub sharpen_threshold: i32,
}

impl Default for PreprocessSettings {
    fn default() -> Self {
        let options = PreprocessOptions::default();
        Self {
            enabled: true,
            max_edge: options.max_edge,
            threshold: options.threshold,
            sharpen_sigma: options.sharpen_sigma,
            sharpen_threshold: options.sharpen_threshold,
        }
    }
}

impl PreprocessSettings {
    pub fn options(&self) -> PreprocessOptions {
        PreprocessOptions {
            max_edge: self.max_edge,
            threshold: self.threshold,
            sharpen_sigma: self.sharpen_sigma,
            sharpen_threshold: self.sharpen_threshold,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineSettings {
    /// End-to-end budget for processing one receipt, in seconds.
    pub timeout_secs: u64,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self { timeout_secs: 180 }
    }
}

impl PipelineSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Categorization section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CategorizationSettings {
    /// Include the built-in merchant keyword rules.
    pub builtin_rules: bool,
    /// Extra rules, evaluated after the built-in ones.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub rules: Vec<RuleConfig>,
    /// Additive smoothing for the classifier.
    pub smoothing: f64,
}

impl Default for CategorizationSettings {
    fn default() -> Self {
        Self {
            builtin_rules: true,
            rules: Vec::new(),
            smoothing: 1.0,
        }
    }
}

impl CategorizationSettings {
    pub fn rule_categorizer(&self) -> Result<RuleCategorizer, CategorizeError> {
        RuleCategorizer::from_config(self.builtin_rules, &self.rules)
    }
}

/// Top-level configuration file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub ocr: OcrSettings,
    #[serde(default)]
    pub preprocess: PreprocessSettings,
    #[serde(default)]
    pub pipeline: PipelineSettings,
    #[serde(default)]
    pub categorization: CategorizationSettings,
    /// File this configuration was read from, if any.
    #[serde(skip)]
    pub source_path: Option<PathBuf>,
}

impl Config {
    /// Load configuration using prefer crate for discovery.
    /// Falls back to defaults (with env overrides) when nothing usable is found.
    pub async fn load() -> Self {
        match prefer::load("spendscan").await {
            Ok(pref_config) => match pref_config.source_path() {
                Some(path) => match Self::load_from_path(path).await {
                    Ok(config) => config,
                    Err(e) => {
                        tracing::warn!("Ignoring config {}: {}", path.display(), e);
                        Self::default_with_env()
                    }
                },
                None => Self::default_with_env(),
            },
            Err(_) => Self::default_with_env(),
        }
    }

    /// Defaults with environment variable overrides applied.
    pub fn default_with_env() -> Self {
        Self::default().with_env_overrides()
    }

    /// Load configuration from a specific file path.
    /// JSON, TOML and YAML are supported, chosen by file extension.
    pub async fn load_from_path(path: &Path) -> Result<Self, String> {
        let contents = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| format!("Failed to read config file: {}", e))?;

        let mut config = Self::parse(&contents, path)?;
        config.source_path = Some(path.to_path_buf());
        Ok(config.with_env_overrides())
    }

    fn parse(contents: &str, path: &Path) -> Result<Self, String> {
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("json");
        match ext {
            "toml" => {
                toml::from_str(contents).map_err(|e| format!("Failed to parse TOML config: {}", e))
            }
            "yaml" | "yml" => serde_yaml::from_str(contents)
                .map_err(|e| format!("Failed to parse YAML config: {}", e)),
            _ => serde_json::from_str(contents)
                .map_err(|e| format!("Failed to parse JSON config: {}", e)),
        }
    }

    /// Apply `SPENDSCAN_OCR_LANG` and `SPENDSCAN_OCR_BACKEND`.
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(lang) = env_value(ENV_OCR_LANG) {
            self.ocr.language = lang;
        }
        if let Some(backend) = env_value(ENV_OCR_BACKEND) {
            self.ocr.backend = backend;
        }
        self
    }

    /// Directory relative paths are resolved against: the config file's
    /// directory, or the current directory.
    pub fn base_dir(&self) -> PathBuf {
        self.source_path
            .as_ref()
            .and_then(|p| p.parent().map(Path::to_path_buf))
            .unwrap_or_else(|| PathBuf::from("."))
    }

    /// Resolve a path that may be relative to the config file.
    /// - Absolute paths are returned as-is
    /// - Paths starting with ~ are expanded
    /// - Relative paths are joined onto `base_dir`
    pub fn resolve_path(&self, path_str: &str) -> PathBuf {
        let expanded = shellexpand::tilde(path_str);
        let path = Path::new(expanded.as_ref());

        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir().join(path)
        }
    }

    /// Engine configuration. Unknown backend names are an error rather than
    /// a silent fallback.
    pub fn ocr_config(&self) -> Result<OcrConfig, String> {
        let backend = OcrBackendType::from_str(&self.ocr.backend)
            .ok_or_else(|| format!("Unknown OCR backend: {}", self.ocr.backend))?;

        Ok(OcrConfig {
            backend,
            language: self.ocr.language.clone(),
            page_segmentation_mode: self.ocr.page_segmentation_mode,
            dpi: self.ocr.dpi,
            model_path: self.ocr.model_path.as_deref().map(|p| self.resolve_path(p)),
        })
    }
}

fn env_value(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
