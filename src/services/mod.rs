//! Service layer: receipt processing, field extraction and categorization.
//!
//! Services take their collaborators as injected trait objects so the same
//! logic runs against the in-memory store, a database, or test doubles.

pub mod categorize;
pub mod extraction;
pub mod receipt;

pub use categorize::{
    CategorizationService, CategorizeError, ClassifierManager, ClassifierState, CreatedExpense,
    FeedbackOutcome, RuleCategorizer, RuleConfig,
};
pub use receipt::{ReceiptError, ReceiptProcessor};
