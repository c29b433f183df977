//! Recognition engine adapter.
//!
//! Owns one long-lived OCR worker per engine instance. The worker is started
//! lazily by the first recognition request; concurrent first callers all
//! await the same startup. Requests are queued to the worker and processed
//! one at a time, each with its own image buffer and reply channel.
//!
//! The public [`RecognitionEngine::recognize`] never fails: unreadable
//! input and engine errors are logged and reported as empty text.

use std::io::Cursor;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, OnceCell};

use super::backend::{create_backend, OcrBackend, OcrBackendType, OcrConfig, OcrError, OcrResult};

/// Builds the backend the worker will drive.
pub type BackendFactory =
    Arc<dyn Fn(&OcrConfig) -> Result<Box<dyn OcrBackend>, OcrError> + Send + Sync>;

/// Pending requests allowed to queue up behind the worker.
const QUEUE_DEPTH: usize = 64;

struct RecognitionJob {
    image: Vec<u8>,
    reply: oneshot::Sender<Result<OcrResult, OcrError>>,
}

struct RecognitionWorker {
    jobs: mpsc::Sender<RecognitionJob>,
    backend: OcrBackendType,
}

/// Lazily started, shared OCR worker.
pub struct RecognitionEngine {
    config: OcrConfig,
    factory: BackendFactory,
    worker: OnceCell<RecognitionWorker>,
    starts: AtomicUsize,
}

impl RecognitionEngine {
    /// Engine backed by the backend named in `config`.
    pub fn new(config: OcrConfig) -> Self {
        Self::with_factory(config, Arc::new(create_backend))
    }

    /// Engine backed by a custom backend factory.
    pub fn with_factory(config: OcrConfig, factory: BackendFactory) -> Self {
        Self {
            config,
            factory,
            worker: OnceCell::new(),
            starts: AtomicUsize::new(0),
        }
    }

    pub fn config(&self) -> &OcrConfig {
        &self.config
    }

    /// Whether the worker has finished starting.
    pub fn is_started(&self) -> bool {
        self.worker.initialized()
    }

    /// How many times worker startup has been attempted.
    pub fn start_attempts(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }

    async fn worker(&self) -> Result<&RecognitionWorker, OcrError> {
        self.worker.get_or_try_init(|| self.start_worker()).await
    }

    async fn start_worker(&self) -> Result<RecognitionWorker, OcrError> {
        self.starts.fetch_add(1, Ordering::SeqCst);
        let config = self.config.clone();
        let factory = Arc::clone(&self.factory);

        let backend = tokio::task::spawn_blocking(move || {
            let mut backend = factory(&config)?;
            backend.initialize()?;
            Ok::<_, OcrError>(backend)
        })
        .await
        .map_err(|e| OcrError::OcrFailed(format!("engine startup panicked: {}", e)))??;

        let backend: Arc<dyn OcrBackend> = Arc::from(backend);
        let backend_type = backend.backend_type();
        let (jobs, rx) = mpsc::channel(QUEUE_DEPTH);
        tokio::spawn(run_worker(backend, rx));

        tracing::info!("Recognition worker started ({})", backend_type);
        Ok(RecognitionWorker {
            jobs,
            backend: backend_type,
        })
    }

    /// Backend the worker is running, once started.
    pub fn backend(&self) -> Option<OcrBackendType> {
        self.worker.get().map(|w| w.backend)
    }

    /// Recognize an encoded image. Starts the worker if needed.
    pub async fn recognize_bytes(&self, image: Vec<u8>) -> Result<OcrResult, OcrError> {
        let worker = self.worker().await?;
        let (reply, response) = oneshot::channel();
        worker
            .jobs
            .send(RecognitionJob { image, reply })
            .await
            .map_err(|_| OcrError::OcrFailed("recognition worker stopped".to_string()))?;
        response
            .await
            .map_err(|_| OcrError::OcrFailed("recognition worker dropped request".to_string()))?
    }

    /// Recognize the image at `path`, reading `fallback` instead when `path`
    /// is missing, empty or not an image. Returns normalized text, or an
    /// empty string when nothing could be recognized.
    pub async fn recognize(&self, path: &Path, fallback: Option<&Path>) -> String {
        let image = match read_image(path).await {
            Some(bytes) => Some(bytes),
            None => match fallback.filter(|f| *f != path) {
                Some(original) => {
                    tracing::warn!(
                        "Unreadable image {}, falling back to {}",
                        path.display(),
                        original.display()
                    );
                    read_image(original).await
                }
                None => None,
            },
        };

        let Some(image) = image else {
            tracing::warn!("No readable image for {}", path.display());
            return String::new();
        };

        match self.recognize_bytes(image).await {
            Ok(result) => {
                tracing::debug!(
                    "Recognized {} chars from {} in {}ms ({})",
                    result.text.len(),
                    path.display(),
                    result.processing_time_ms,
                    result.backend
                );
                normalize_text(&result.text)
            }
            Err(e) => {
                tracing::warn!("Recognition failed for {}: {}", path.display(), e);
                String::new()
            }
        }
    }

    /// Start the worker and push a blank image through it so the first real
    /// request doesn't pay for engine startup. Failures are only logged.
    pub async fn warm_up(&self) {
        let image = match warm_up_image() {
            Ok(image) => image,
            Err(e) => {
                tracing::warn!("Could not build warm-up image: {}", e);
                return;
            }
        };
        match self.recognize_bytes(image).await {
            Ok(result) => tracing::info!("OCR warm-up finished in {}ms", result.processing_time_ms),
            Err(e) => tracing::warn!("OCR warm-up failed: {}", e),
        }
    }
}

async fn run_worker(backend: Arc<dyn OcrBackend>, mut jobs: mpsc::Receiver<RecognitionJob>) {
    while let Some(RecognitionJob { image, reply }) = jobs.recv().await {
        let backend = Arc::clone(&backend);
        let result = tokio::task::spawn_blocking(move || backend.ocr_bytes(&image))
            .await
            .unwrap_or_else(|e| Err(OcrError::OcrFailed(format!("engine panicked: {}", e))));
        // The requester may have given up (timeout); nothing to do then.
        let _ = reply.send(result);
    }
    tracing::debug!("Recognition worker shutting down");
}

/// Read an image fully into memory. `None` if missing, empty or not an image.
async fn read_image(path: &Path) -> Option<Vec<u8>> {
    match tokio::fs::read(path).await {
        Ok(bytes) if bytes.is_empty() => {
            tracing::debug!("{} is empty", path.display());
            None
        }
        Ok(bytes) if !infer::is_image(&bytes) => {
            tracing::debug!("{} does not look like an image", path.display());
            None
        }
        Ok(bytes) => Some(bytes),
        Err(e) => {
            tracing::debug!("Cannot read {}: {}", path.display(), e);
            None
        }
    }
}

/// Strip carriage returns and trailing whitespace at line ends.
pub fn normalize_text(raw: &str) -> String {
    raw.replace('\r', "")
        .lines()
        .map(str::trim_end)
        .collect::<Vec<_>>()
        .join("\n")
        .trim_end()
        .to_string()
}

/// A small blank PNG used to exercise the engine at startup.
fn warm_up_image() -> Result<Vec<u8>, OcrError> {
    let img = image::GrayImage::from_pixel(64, 32, image::Luma([255u8]));
    let mut buf = Cursor::new(Vec::new());
    image::DynamicImage::ImageLuma8(img)
        .write_to(&mut buf, image::ImageFormat::Png)
        .map_err(|e| OcrError::ImageError(e.to_string()))?;
    Ok(buf.into_inner())
}
