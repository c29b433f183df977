//! OCR backend abstraction so the recognition engine can be swapped.
//!
//! Supports:
//! - Tesseract: traditional OCR via command-line (CPU, default)
//! - Ocrs: pure Rust OCR engine (CPU, feature `ocr-ocrs`)

use std::path::PathBuf;
use thiserror::Error;

/// Errors from OCR backends.
#[derive(Debug, Error)]
pub enum OcrError {
    #[error("Backend not available: {0}")]
    BackendNotAvailable(String),

    #[error("OCR failed: {0}")]
    OcrFailed(String),

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image error: {0}")]
    ImageError(String),
}

/// Result of OCR processing.
#[derive(Debug, Clone)]
pub struct OcrResult {
    /// Extracted text content, as produced by the engine.
    pub text: String,
    /// Confidence score (0.0 - 1.0), if available.
    pub confidence: Option<f32>,
    /// Which backend produced this result.
    pub backend: OcrBackendType,
    /// Processing time in milliseconds.
    pub processing_time_ms: u64,
}

/// Available OCR backend types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OcrBackendType {
    /// Tesseract OCR via command-line.
    Tesseract,
    /// Pure Rust OCR engine (ocrs crate).
    Ocrs,
}

impl OcrBackendType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OcrBackendType::Tesseract => "tesseract",
            OcrBackendType::Ocrs => "ocrs",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "tesseract" => Some(OcrBackendType::Tesseract),
            "ocrs" => Some(OcrBackendType::Ocrs),
            _ => None,
        }
    }
}

impl std::fmt::Display for OcrBackendType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Trait for OCR backends.
///
/// Backends are driven from a single recognition worker: `initialize` runs
/// once before the first `ocr_bytes` call, and calls never overlap.
pub trait OcrBackend: Send + Sync {
    /// Get the backend type.
    fn backend_type(&self) -> OcrBackendType;

    /// Check if this backend is available (dependencies installed, models present).
    fn is_available(&self) -> bool;

    /// Get a description of what's needed to make this backend available.
    fn availability_hint(&self) -> String;

    /// One-time engine setup (binary and language checks, model loading).
    fn initialize(&mut self) -> Result<(), OcrError> {
        Ok(())
    }

    /// Run OCR on an encoded image held in memory.
    fn ocr_bytes(&self, image: &[u8]) -> Result<OcrResult, OcrError>;
}

/// Page segmentation mode for "a single uniform block of text".
pub const PSM_SINGLE_BLOCK: u8 = 6;

/// Configuration fixed when the recognition engine starts.
#[derive(Debug, Clone)]
pub struct OcrConfig {
    /// Which engine to run.
    pub backend: OcrBackendType,
    /// Language for OCR (e.g., "eng", "eng+fra").
    pub language: String,
    /// Assumed page layout, in Tesseract's page segmentation numbering.
    pub page_segmentation_mode: u8,
    /// Resolution hint for the input images.
    pub dpi: u32,
    /// Path to model files (for backends that need them).
    pub model_path: Option<PathBuf>,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            backend: OcrBackendType::Tesseract,
            language: "eng".to_string(),
            page_segmentation_mode: PSM_SINGLE_BLOCK,
            dpi: 300,
            model_path: None,
        }
    }
}

/// Build the backend named in `config`. Does not initialize it.
pub fn create_backend(config: &OcrConfig) -> Result<Box<dyn OcrBackend>, OcrError> {
    match config.backend {
        OcrBackendType::Tesseract => Ok(Box::new(super::TesseractBackend::with_config(
            config.clone(),
        ))),
        #[cfg(feature = "ocr-ocrs")]
        OcrBackendType::Ocrs => Ok(Box::new(super::OcrsBackend::with_config(config.clone()))),
        #[cfg(not(feature = "ocr-ocrs"))]
        OcrBackendType::Ocrs => Err(OcrError::BackendNotAvailable(
            "ocrs support not compiled in (rebuild with --features ocr-ocrs)".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_type_round_trip_names() {
        assert_eq!(OcrBackendType::from_str("Tesseract"), Some(OcrBackendType::Tesseract));
        assert_eq!(OcrBackendType::from_str("ocrs"), Some(OcrBackendType::Ocrs));
        assert_eq!(OcrBackendType::from_str("paddle"), None);
    }

    #[test]
    fn test_default_config_targets_receipts() {
        let config = OcrConfig::default();
        assert_eq!(config.language, "eng");
        assert_eq!(config.page_segmentation_mode, PSM_SINGLE_BLOCK);
        assert_eq!(config.dpi, 300);
    }
}
