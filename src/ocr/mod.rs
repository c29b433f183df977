//! Image preprocessing and text recognition for receipt photos.
//!
//! ## OCR Backends
//!
//! - **Tesseract**: traditional OCR via its command-line tool (default)
//! - **OCRS**: pure Rust OCR, no external binaries (feature: ocr-ocrs)
//!
//! Backends sit behind [`OcrBackend`] and are driven by a single
//! [`RecognitionEngine`] worker per process.

mod backend;
mod engine;
mod preprocess;
mod tesseract;

#[cfg(feature = "ocr-ocrs")]
mod model_utils;
#[cfg(feature = "ocr-ocrs")]
mod ocrs_backend;

pub use backend::{
    create_backend, OcrBackend, OcrBackendType, OcrConfig, OcrError, OcrResult, PSM_SINGLE_BLOCK,
};
pub use engine::{normalize_text, BackendFactory, RecognitionEngine};
pub use preprocess::{ImagePreprocessor, PreprocessError, PreprocessOptions};
pub use tesseract::{check_binary, TesseractBackend};

#[cfg(feature = "ocr-ocrs")]
pub use ocrs_backend::OcrsBackend;
