//! Per-user classifier cache.
//!
//! Each user gets a slot holding a lazily fitted [`NaiveBayes`] model. The
//! first request for a user loads their labeled history and fits the model;
//! requests arriving while that fit is running await the same fit. Once
//! ready, a model only ever grows: corrections are added incrementally under
//! the slot's write lock. Slots for different users share nothing but the
//! map lookup.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{OnceCell, RwLock};

use super::classifier::NaiveBayes;
use super::CategorizeError;
use crate::models::{Category, CategoryId, UserId};
use crate::repository::{CategoryStore, ExpenseStore};

/// Lifecycle of one user's classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ClassifierState {
    Uninitialized,
    Training,
    Ready { examples: u64 },
}

#[derive(Default)]
struct UserSlot {
    model: OnceCell<RwLock<NaiveBayes>>,
    training: AtomicBool,
}

/// Clears the training flag however the fit ends, including cancellation.
struct TrainingFlag<'a>(&'a AtomicBool);

impl<'a> TrainingFlag<'a> {
    fn raise(flag: &'a AtomicBool) -> Self {
        flag.store(true, Ordering::SeqCst);
        Self(flag)
    }
}

impl Drop for TrainingFlag<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Owns one text classifier per user.
pub struct ClassifierManager {
    expenses: Arc<dyn ExpenseStore>,
    categories: Arc<dyn CategoryStore>,
    smoothing: f64,
    slots: RwLock<HashMap<UserId, Arc<UserSlot>>>,
    fits: AtomicU64,
    inferences: AtomicU64,
}

impl ClassifierManager {
    pub fn new(expenses: Arc<dyn ExpenseStore>, categories: Arc<dyn CategoryStore>) -> Self {
        Self::with_smoothing(expenses, categories, 1.0)
    }

    pub fn with_smoothing(
        expenses: Arc<dyn ExpenseStore>,
        categories: Arc<dyn CategoryStore>,
        smoothing: f64,
    ) -> Self {
        Self {
            expenses,
            categories,
            smoothing,
            slots: RwLock::new(HashMap::new()),
            fits: AtomicU64::new(0),
            inferences: AtomicU64::new(0),
        }
    }

    /// Fit passes started since creation, across all users.
    pub fn fit_count(&self) -> u64 {
        self.fits.load(Ordering::SeqCst)
    }

    /// Times the model was actually consulted for a prediction.
    pub fn inference_count(&self) -> u64 {
        self.inferences.load(Ordering::SeqCst)
    }

    pub async fn state(&self, user_id: UserId) -> ClassifierState {
        let slot = match self.slots.read().await.get(&user_id) {
            Some(slot) => slot.clone(),
            None => return ClassifierState::Uninitialized,
        };

        if let Some(model) = slot.model.get() {
            ClassifierState::Ready {
                examples: model.read().await.example_count(),
            }
        } else if slot.training.load(Ordering::SeqCst) {
            ClassifierState::Training
        } else {
            ClassifierState::Uninitialized
        }
    }

    async fn slot(&self, user_id: UserId) -> Arc<UserSlot> {
        if let Some(slot) = self.slots.read().await.get(&user_id) {
            return slot.clone();
        }
        self.slots
            .write()
            .await
            .entry(user_id)
            .or_default()
            .clone()
    }

    async fn trained<'a>(
        &self,
        user_id: UserId,
        slot: &'a UserSlot,
    ) -> Result<&'a RwLock<NaiveBayes>, CategorizeError> {
        slot.model
            .get_or_try_init(|| self.fit(user_id, &slot.training))
            .await
    }

    async fn fit(
        &self,
        user_id: UserId,
        training: &AtomicBool,
    ) -> Result<RwLock<NaiveBayes>, CategorizeError> {
        let _flag = TrainingFlag::raise(training);
        self.fits.fetch_add(1, Ordering::SeqCst);

        let examples = self.expenses.training_examples(user_id).await?;
        let mut model = NaiveBayes::new(self.smoothing);
        for example in &examples {
            model.add_document(&example.text, &example.category);
        }

        tracing::info!(
            "Trained classifier for user {} on {} examples",
            user_id,
            model.example_count()
        );
        Ok(RwLock::new(model))
    }

    /// Make sure the user's model is ready; returns how many examples it holds.
    pub async fn ensure_trained(&self, user_id: UserId) -> Result<u64, CategorizeError> {
        let slot = self.slot(user_id).await;
        let model = self.trained(user_id, &slot).await?;
        let examples = model.read().await.example_count();
        Ok(examples)
    }

    /// Predict a category for `text`. `None` when the user has no training
    /// data or the predicted name does not resolve to a category.
    pub async fn classify(
        &self,
        user_id: UserId,
        text: &str,
    ) -> Result<Option<Category>, CategorizeError> {
        let slot = self.slot(user_id).await;
        let model = self.trained(user_id, &slot).await?;

        let label = {
            let model = model.read().await;
            if model.is_empty() {
                return Ok(None);
            }
            self.inferences.fetch_add(1, Ordering::SeqCst);
            model.classify(text)
        };

        let Some(label) = label else {
            return Ok(None);
        };

        let category = self.categories.find_by_name(&label).await?;
        if category.is_none() {
            tracing::warn!(
                "Classifier for user {} predicted unknown category {:?}",
                user_id,
                label
            );
        }
        Ok(category)
    }

    /// Teach the user's model that `text` belongs to `category_id`.
    ///
    /// Returns `false` without touching the model when the text is blank or
    /// the category does not exist.
    pub async fn train_with_feedback(
        &self,
        user_id: UserId,
        text: &str,
        category_id: CategoryId,
    ) -> Result<bool, CategorizeError> {
        let text = text.trim();
        if text.is_empty() {
            tracing::debug!("Ignoring correction with empty text for user {}", user_id);
            return Ok(false);
        }

        let Some(category) = self.categories.find_by_id(category_id).await? else {
            tracing::debug!(
                "Ignoring correction to unknown category {} for user {}",
                category_id,
                user_id
            );
            return Ok(false);
        };

        let slot = self.slot(user_id).await;
        let model = self.trained(user_id, &slot).await?;
        let added = model.write().await.add_document(text, &category.name);

        tracing::debug!(
            "Correction for user {}: {:?} -> {} (added: {})",
            user_id,
            text,
            category.name,
            added
        );
        Ok(added)
    }
}
