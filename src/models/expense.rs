//! Expense records as seen by categorization.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::{Amount, CategoryId, ExpenseId, ReceiptId, UserId};

/// A stored expense.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Expense {
    pub id: ExpenseId,
    pub owner_id: UserId,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub merchant: Option<String>,
    #[serde(default)]
    pub category_id: Option<CategoryId>,
}

impl Expense {
    /// Text used for rule matching and classification: description and
    /// merchant, lower-cased.
    pub fn categorization_text(&self) -> String {
        [self.description.as_deref(), self.merchant.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
            .to_lowercase()
    }

    /// Description, if present and not blank.
    pub fn description_text(&self) -> Option<&str> {
        self.description
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

/// Input for creating an expense, typically pre-filled from extracted receipt fields.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewExpense {
    pub amount: Option<Amount>,
    pub date: Option<NaiveDate>,
    pub merchant: Option<String>,
    pub description: Option<String>,
    pub category_id: Option<CategoryId>,
    pub receipt_id: Option<ReceiptId>,
}

/// A labeled (text, category name) pair drawn from a user's history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrainingExample {
    pub text: String,
    pub category: String,
}

impl TrainingExample {
    pub fn new(text: impl Into<String>, category: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            category: category.into(),
        }
    }
}
