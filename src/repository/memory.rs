//! In-memory store backend for single-process operation.
//!
//! Implements all three store contracts over lock-protected maps. State is
//! not persisted; it can be seeded from a fixture file (JSON, TOML or YAML)
//! for the CLI and for tests.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::sync::RwLock;

use super::backend::{
    CategoryStore, ExpenseStore, ReceiptStore, ReceiptUpdate, StoreError, StoreResult,
};
use crate::models::{
    Category, CategoryId, Expense, ExpenseId, NewExpense, ReceiptId, ReceiptImage,
    TrainingExample, UserId,
};

/// Seed data for an in-memory store.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Fixture {
    #[serde(default)]
    pub categories: Vec<Category>,
    #[serde(default)]
    pub expenses: Vec<Expense>,
    #[serde(default)]
    pub receipts: Vec<ReceiptImage>,
}

impl Fixture {
    /// Load a fixture file; format is chosen from the file extension.
    pub async fn load(path: &Path) -> StoreResult<Self> {
        let contents = tokio::fs::read_to_string(path).await?;
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("json");
        match ext {
            "toml" => toml::from_str(&contents).map_err(|e| StoreError::Serialization(e.to_string())),
            "yaml" | "yml" => {
                serde_yaml::from_str(&contents).map_err(|e| StoreError::Serialization(e.to_string()))
            }
            _ => serde_json::from_str(&contents)
                .map_err(|e| StoreError::Serialization(e.to_string())),
        }
    }
}

#[derive(Debug, Default)]
struct Tables {
    categories: Vec<Category>,
    expenses: HashMap<ExpenseId, Expense>,
    receipts: HashMap<ReceiptId, ReceiptImage>,
    /// Last update per processed receipt, kept for inspection.
    processing: HashMap<ReceiptId, ReceiptUpdate>,
}

/// In-memory receipt, expense and category store.
#[derive(Clone)]
pub struct InMemoryStore {
    tables: Arc<RwLock<Tables>>,
    next_expense_id: Arc<AtomicI64>,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::from_fixture(Fixture::default())
    }

    /// Build a store pre-populated from a fixture.
    pub fn from_fixture(fixture: Fixture) -> Self {
        let next_id = fixture.expenses.iter().map(|e| e.id).max().unwrap_or(0) + 1;
        let tables = Tables {
            categories: fixture.categories,
            expenses: fixture.expenses.into_iter().map(|e| (e.id, e)).collect(),
            receipts: fixture.receipts.into_iter().map(|r| (r.id, r)).collect(),
            processing: HashMap::new(),
        };
        Self {
            tables: Arc::new(RwLock::new(tables)),
            next_expense_id: Arc::new(AtomicI64::new(next_id)),
        }
    }

    pub async fn add_category(&self, id: CategoryId, name: &str) -> Category {
        let category = Category::new(id, name);
        self.tables.write().await.categories.push(category.clone());
        category
    }

    /// Insert an expense with an explicit id.
    pub async fn insert_expense(&self, expense: Expense) {
        self.next_expense_id.fetch_max(expense.id + 1, Ordering::SeqCst);
        self.tables.write().await.expenses.insert(expense.id, expense);
    }

    pub async fn add_receipt(&self, id: ReceiptId, owner_id: UserId, path: PathBuf) {
        let receipt = ReceiptImage {
            id,
            owner_id,
            path,
            raw_text: None,
            processed: false,
        };
        self.tables.write().await.receipts.insert(id, receipt);
    }

    pub async fn receipt(&self, id: ReceiptId) -> Option<ReceiptImage> {
        self.tables.read().await.receipts.get(&id).cloned()
    }

    pub async fn processing_record(&self, id: ReceiptId) -> Option<ReceiptUpdate> {
        self.tables.read().await.processing.get(&id).cloned()
    }
}

#[async_trait]
impl ReceiptStore for InMemoryStore {
    async fn image_path(&self, receipt_id: ReceiptId, owner_id: UserId) -> StoreResult<PathBuf> {
        let tables = self.tables.read().await;
        tables
            .receipts
            .get(&receipt_id)
            .filter(|r| r.owner_id == owner_id)
            .map(|r| r.path.clone())
            .ok_or_else(|| StoreError::NotFound(format!("receipt {}", receipt_id)))
    }

    async fn mark_processed(
        &self,
        receipt_id: ReceiptId,
        update: &ReceiptUpdate,
    ) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        let receipt = tables
            .receipts
            .get_mut(&receipt_id)
            .ok_or_else(|| StoreError::NotFound(format!("receipt {}", receipt_id)))?;
        receipt.raw_text = Some(update.raw_text.clone());
        receipt.processed = true;
        tables.processing.insert(receipt_id, update.clone());
        Ok(())
    }
}

#[async_trait]
impl ExpenseStore for InMemoryStore {
    async fn create(&self, owner_id: UserId, expense: &NewExpense) -> StoreResult<ExpenseId> {
        let id = self.next_expense_id.fetch_add(1, Ordering::SeqCst);
        let record = Expense {
            id,
            owner_id,
            description: expense.description.clone(),
            merchant: expense.merchant.clone(),
            category_id: expense.category_id,
        };
        self.tables.write().await.expenses.insert(id, record);
        Ok(id)
    }

    async fn find_by_id(
        &self,
        expense_id: ExpenseId,
        owner_id: UserId,
    ) -> StoreResult<Option<Expense>> {
        let tables = self.tables.read().await;
        Ok(tables
            .expenses
            .get(&expense_id)
            .filter(|e| e.owner_id == owner_id)
            .cloned())
    }

    async fn update_category(
        &self,
        expense_id: ExpenseId,
        owner_id: UserId,
        category_id: CategoryId,
    ) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        match tables
            .expenses
            .get_mut(&expense_id)
            .filter(|e| e.owner_id == owner_id)
        {
            Some(expense) => {
                expense.category_id = Some(category_id);
                Ok(())
            }
            None => Err(StoreError::NotFound(format!("expense {}", expense_id))),
        }
    }

    async fn training_examples(&self, owner_id: UserId) -> StoreResult<Vec<TrainingExample>> {
        let tables = self.tables.read().await;
        let mut expenses: Vec<&Expense> = tables
            .expenses
            .values()
            .filter(|e| e.owner_id == owner_id)
            .collect();
        expenses.sort_by_key(|e| e.id);

        Ok(expenses
            .into_iter()
            .filter_map(|e| {
                let text = e.description_text()?;
                let category_id = e.category_id?;
                let category = tables.categories.iter().find(|c| c.id == category_id)?;
                Some(TrainingExample::new(text, category.name.clone()))
            })
            .collect())
    }
}

#[async_trait]
impl CategoryStore for InMemoryStore {
    async fn find_by_name(&self, name: &str) -> StoreResult<Option<Category>> {
        let tables = self.tables.read().await;
        Ok(tables.categories.iter().find(|c| c.name == name).cloned())
    }

    async fn find_by_id(&self, id: CategoryId) -> StoreResult<Option<Category>> {
        let tables = self.tables.read().await;
        Ok(tables.categories.iter().find(|c| c.id == id).cloned())
    }

    async fn all(&self) -> StoreResult<Vec<Category>> {
        let mut categories = self.tables.read().await.categories.clone();
        categories.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(categories)
    }
}
