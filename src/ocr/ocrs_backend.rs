//! OCRS OCR backend implementation.
//!
//! Pure-Rust OCR with no external binaries. Page segmentation and DPI hints
//! do not apply to this engine and are ignored.
//!
//! Models are downloaded on first initialization from:
//! https://ocrs-models.s3-accelerate.amazonaws.com/

use std::path::PathBuf;
use std::time::Instant;

use super::backend::{OcrBackend, OcrBackendType, OcrConfig, OcrError, OcrResult};
use super::model_utils::{ensure_model_file, ModelDirConfig, ModelSpec};

const MODEL_CONFIG: ModelDirConfig = ModelDirConfig {
    subdir: "ocrs",
    required_files: &["text-detection.rten", "text-recognition.rten"],
};

const DETECTION_MODEL: ModelSpec = ModelSpec {
    url: "https://ocrs-models.s3-accelerate.amazonaws.com/text-detection.rten",
    filename: "text-detection.rten",
    size_hint: "2.5 MB",
};

const RECOGNITION_MODEL: ModelSpec = ModelSpec {
    url: "https://ocrs-models.s3-accelerate.amazonaws.com/text-recognition.rten",
    filename: "text-recognition.rten",
    size_hint: "10 MB",
};

/// OCRS OCR backend (pure Rust).
pub struct OcrsBackend {
    config: OcrConfig,
    engine: Option<ocrs::OcrEngine>,
}

impl OcrsBackend {
    pub fn new() -> Self {
        Self::with_config(OcrConfig::default())
    }

    pub fn with_config(config: OcrConfig) -> Self {
        Self {
            config,
            engine: None,
        }
    }

    /// Ensure models are present, downloading them if necessary.
    fn ensure_models(&self) -> Result<PathBuf, OcrError> {
        if let Some(dir) = MODEL_CONFIG.locate(self.config.model_path.as_deref()) {
            return Ok(dir);
        }

        let model_dir = MODEL_CONFIG.default_dir();
        std::fs::create_dir_all(&model_dir)?;
        ensure_model_file(&DETECTION_MODEL, &model_dir)?;
        ensure_model_file(&RECOGNITION_MODEL, &model_dir)?;
        Ok(model_dir)
    }
}

impl Default for OcrsBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl OcrBackend for OcrsBackend {
    fn backend_type(&self) -> OcrBackendType {
        OcrBackendType::Ocrs
    }

    fn is_available(&self) -> bool {
        // Models are fetched during initialization.
        true
    }

    fn availability_hint(&self) -> String {
        match MODEL_CONFIG.locate(self.config.model_path.as_deref()) {
            Some(path) => format!("OCRS models found at {:?}", path),
            None => format!(
                "OCRS models will be downloaded on first use (~12 MB) to {:?}",
                MODEL_CONFIG.default_dir()
            ),
        }
    }

    fn initialize(&mut self) -> Result<(), OcrError> {
        if self.engine.is_some() {
            return Ok(());
        }
        let model_dir = self.ensure_models()?;

        let detection_model = rten::Model::load_file(model_dir.join(DETECTION_MODEL.filename))
            .map_err(|e| OcrError::ModelNotFound(format!("detection model: {}", e)))?;
        let recognition_model = rten::Model::load_file(model_dir.join(RECOGNITION_MODEL.filename))
            .map_err(|e| OcrError::ModelNotFound(format!("recognition model: {}", e)))?;

        let engine = ocrs::OcrEngine::new(ocrs::OcrEngineParams {
            detection_model: Some(detection_model),
            recognition_model: Some(recognition_model),
            ..Default::default()
        })
        .map_err(|e| OcrError::OcrFailed(format!("Failed to create OCR engine: {}", e)))?;

        self.engine = Some(engine);
        tracing::info!("OCRS engine ready (models in {:?})", model_dir);
        Ok(())
    }

    fn ocr_bytes(&self, image: &[u8]) -> Result<OcrResult, OcrError> {
        let start = Instant::now();
        let engine = self
            .engine
            .as_ref()
            .ok_or_else(|| OcrError::OcrFailed("OCRS engine not initialized".to_string()))?;

        let rgb = image::load_from_memory(image)
            .map_err(|e| OcrError::ImageError(format!("Failed to decode image: {}", e)))?
            .to_rgb8();
        let (width, height) = rgb.dimensions();

        let source = ocrs::ImageSource::from_bytes(rgb.as_raw(), (width, height))
            .map_err(|e| OcrError::ImageError(format!("Failed to convert image: {}", e)))?;
        let input = engine
            .prepare_input(source)
            .map_err(|e| OcrError::OcrFailed(format!("Failed to prepare input: {}", e)))?;
        let text = engine
            .get_text(&input)
            .map_err(|e| OcrError::OcrFailed(format!("Failed to extract text: {}", e)))?;

        Ok(OcrResult {
            text,
            confidence: None,
            backend: OcrBackendType::Ocrs,
            processing_time_ms: start.elapsed().as_millis() as u64,
        })
    }
}
