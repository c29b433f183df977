//! Spending categories.

use serde::{Deserialize, Serialize};

use super::CategoryId;

/// A spending category, addressed globally by exact (case-sensitive) name.
///
/// Categories are looked up, never created, by categorization.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
}

impl Category {
    pub fn new(id: CategoryId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }
}

/// Outcome of categorizing an expense.
///
/// Both fields are `None` when neither the rules nor the classifier produced
/// a category that exists; that is a valid result, not an error.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CategoryAssignment {
    pub category_id: Option<CategoryId>,
    pub category_name: Option<String>,
}

impl CategoryAssignment {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn is_none(&self) -> bool {
        self.category_id.is_none()
    }
}

impl From<Category> for CategoryAssignment {
    fn from(category: Category) -> Self {
        Self {
            category_id: Some(category.id),
            category_name: Some(category.name),
        }
    }
}
