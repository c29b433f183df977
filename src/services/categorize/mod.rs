//! Expense categorization.
//!
//! Keyword rules are tried first; on a miss the user's own classifier,
//! trained from their labeled history, is consulted.

mod classifier;
mod manager;
mod rules;
mod service;

pub use classifier::{tokenize, NaiveBayes};
pub use manager::{ClassifierManager, ClassifierState};
pub use rules::{Rule, RuleCategorizer, RuleConfig};
pub use service::{CategorizationService, CreatedExpense, FeedbackOutcome};

use crate::models::ExpenseId;
use crate::repository::StoreError;

/// Errors from categorization.
#[derive(Debug, thiserror::Error)]
pub enum CategorizeError {
    #[error("Expense {0} not found")]
    ExpenseNotFound(ExpenseId),
    #[error("Invalid rule pattern {pattern:?}: {reason}")]
    InvalidRule { pattern: String, reason: String },
    #[error(transparent)]
    Store(#[from] StoreError),
}
