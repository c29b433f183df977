//! Receipt processing service.
//!
//! Runs an uploaded receipt image through preprocessing, recognition and
//! field extraction, then records the result on the receipt. The whole
//! pipeline runs under one timeout; the receipt is only written back after
//! the pipeline has finished, so a timed-out receipt stays unprocessed and
//! can be retried.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::models::{ProcessedReceipt, ReceiptId, UserId};
use crate::ocr::{ImagePreprocessor, RecognitionEngine};
use crate::repository::{ReceiptStore, ReceiptUpdate, StoreError};
use crate::services::extraction;

/// Default end-to-end budget; must absorb a cold engine start.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(180);

/// Errors that end processing of a single receipt.
#[derive(Debug, thiserror::Error)]
pub enum ReceiptError {
    #[error("Receipt {0} not found")]
    NotFound(ReceiptId),
    #[error("Receipt {receipt_id} image missing at {path}")]
    ImageMissing { receipt_id: ReceiptId, path: PathBuf },
    #[error("Receipt {receipt_id} processing timed out after {timeout:?}")]
    Timeout {
        receipt_id: ReceiptId,
        timeout: Duration,
    },
    #[error(transparent)]
    Store(StoreError),
}

/// Service for turning receipt images into extracted fields.
pub struct ReceiptProcessor {
    engine: Arc<RecognitionEngine>,
    preprocessor: Option<ImagePreprocessor>,
    receipts: Arc<dyn ReceiptStore>,
    timeout: Duration,
}

impl ReceiptProcessor {
    pub fn new(engine: Arc<RecognitionEngine>, receipts: Arc<dyn ReceiptStore>) -> Self {
        Self {
            engine,
            preprocessor: Some(ImagePreprocessor::default()),
            receipts,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Use `preprocessor`, or skip preprocessing entirely with `None`.
    pub fn with_preprocessor(mut self, preprocessor: Option<ImagePreprocessor>) -> Self {
        self.preprocessor = preprocessor;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn engine(&self) -> &RecognitionEngine {
        &self.engine
    }

    /// Process a stored receipt owned by `owner_id` and record the result.
    pub async fn process_receipt(
        &self,
        receipt_id: ReceiptId,
        owner_id: UserId,
    ) -> Result<ProcessedReceipt, ReceiptError> {
        let path = match self.receipts.image_path(receipt_id, owner_id).await {
            Ok(path) => path,
            Err(StoreError::NotFound(_)) => return Err(ReceiptError::NotFound(receipt_id)),
            Err(e) => return Err(ReceiptError::Store(e)),
        };

        if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
            return Err(ReceiptError::ImageMissing { receipt_id, path });
        }

        let processed = tokio::time::timeout(self.timeout, self.extract_from_path(&path))
            .await
            .map_err(|_| {
                tracing::warn!(
                    "Receipt {} timed out after {:?}; left unprocessed",
                    receipt_id,
                    self.timeout
                );
                ReceiptError::Timeout {
                    receipt_id,
                    timeout: self.timeout,
                }
            })?;

        let update = ReceiptUpdate {
            raw_text: processed.raw_text.clone(),
            fields: processed.fields.clone(),
            processing_time_ms: processed.processing_time_ms,
        };
        self.receipts
            .mark_processed(receipt_id, &update)
            .await
            .map_err(ReceiptError::Store)?;

        tracing::info!(
            "Processed receipt {} in {}ms ({} chars)",
            receipt_id,
            processed.processing_time_ms,
            processed.raw_text_length
        );
        Ok(processed)
    }

    /// Preprocess, recognize and parse one image. Never fails: an unusable
    /// image yields empty text and empty fields.
    pub async fn extract_from_path(&self, path: &Path) -> ProcessedReceipt {
        let start = Instant::now();

        let prepared = match &self.preprocessor {
            Some(preprocessor) => {
                let preprocessor = preprocessor.clone();
                let source = path.to_path_buf();
                tokio::task::spawn_blocking(move || preprocessor.preprocess(&source))
                    .await
                    .unwrap_or_else(|e| {
                        tracing::warn!("Preprocessing task failed: {}", e);
                        path.to_path_buf()
                    })
            }
            None => path.to_path_buf(),
        };

        let raw_text = self.engine.recognize(&prepared, Some(path)).await;
        let fields = extraction::parse(&raw_text);

        ProcessedReceipt {
            fields,
            raw_text_length: raw_text.chars().count(),
            raw_text,
            processing_time_ms: start.elapsed().as_millis() as u64,
        }
    }
}
