//! Collaborator contracts for receipt, expense and category storage.
//!
//! The OCR and categorization core never owns persistence. Anything that
//! implements these traits (a SQL store, an HTTP client, the in-memory store
//! used by the CLI and tests) can be injected.

use std::path::PathBuf;

use async_trait::async_trait;

use crate::models::{
    Category, CategoryId, Expense, ExpenseId, ExtractedFields, NewExpense, ReceiptId,
    TrainingExample, UserId,
};

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors from store backends.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Backend unavailable: {0}")]
    Unavailable(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Data written back once a receipt has been through OCR.
#[derive(Debug, Clone)]
pub struct ReceiptUpdate {
    pub raw_text: String,
    pub fields: ExtractedFields,
    pub processing_time_ms: u64,
}

impl ReceiptUpdate {
    pub fn raw_text_length(&self) -> usize {
        self.raw_text.chars().count()
    }
}

/// Storage for uploaded receipt images.
#[async_trait]
pub trait ReceiptStore: Send + Sync {
    /// Path of the stored image. `NotFound` if the receipt does not exist or
    /// is not owned by `owner_id`.
    async fn image_path(&self, receipt_id: ReceiptId, owner_id: UserId) -> StoreResult<PathBuf>;

    /// Record recognized text and parsed fields; marks the receipt processed.
    async fn mark_processed(&self, receipt_id: ReceiptId, update: &ReceiptUpdate)
        -> StoreResult<()>;
}

/// Storage for expenses.
#[async_trait]
pub trait ExpenseStore: Send + Sync {
    async fn create(&self, owner_id: UserId, expense: &NewExpense) -> StoreResult<ExpenseId>;

    async fn find_by_id(&self, expense_id: ExpenseId, owner_id: UserId)
        -> StoreResult<Option<Expense>>;

    async fn update_category(
        &self,
        expense_id: ExpenseId,
        owner_id: UserId,
        category_id: CategoryId,
    ) -> StoreResult<()>;

    /// Labeled history for a user: only expenses with a non-empty
    /// description and a category that resolves to a name.
    async fn training_examples(&self, owner_id: UserId) -> StoreResult<Vec<TrainingExample>>;
}

/// Read-only access to the category table.
#[async_trait]
pub trait CategoryStore: Send + Sync {
    async fn find_by_name(&self, name: &str) -> StoreResult<Option<Category>>;

    async fn find_by_id(&self, id: CategoryId) -> StoreResult<Option<Category>>;

    async fn all(&self) -> StoreResult<Vec<Category>>;
}
