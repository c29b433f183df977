//! Expense categorization: rules first, then the user's classifier.

use std::sync::Arc;

use serde::Serialize;

use super::manager::ClassifierManager;
use super::rules::RuleCategorizer;
use super::CategorizeError;
use crate::models::{Category, CategoryAssignment, CategoryId, ExpenseId, NewExpense, UserId};
use crate::repository::{CategoryStore, ExpenseStore};

/// Result of a user correction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum FeedbackOutcome {
    /// The classifier learned the example and the expense now carries the category.
    Applied { category: Category },
    /// Blank description or unknown category; nothing changed.
    Ignored,
}

/// An expense just created, with whatever category it ended up with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreatedExpense {
    pub id: ExpenseId,
    pub category: CategoryAssignment,
}

pub struct CategorizationService {
    rules: RuleCategorizer,
    classifiers: Arc<ClassifierManager>,
    expenses: Arc<dyn ExpenseStore>,
    categories: Arc<dyn CategoryStore>,
}

impl CategorizationService {
    pub fn new(
        rules: RuleCategorizer,
        classifiers: Arc<ClassifierManager>,
        expenses: Arc<dyn ExpenseStore>,
        categories: Arc<dyn CategoryStore>,
    ) -> Self {
        Self {
            rules,
            classifiers,
            expenses,
            categories,
        }
    }

    pub fn rules(&self) -> &RuleCategorizer {
        &self.rules
    }

    pub fn classifiers(&self) -> &ClassifierManager {
        &self.classifiers
    }

    /// Assign a category to an existing expense and persist it.
    ///
    /// A rule hit never consults the classifier. When neither produces an
    /// existing category the expense is left as is and an empty assignment
    /// is returned. So is an expense that does not exist for this owner.
    pub async fn categorize(
        &self,
        expense_id: ExpenseId,
        owner_id: UserId,
    ) -> Result<CategoryAssignment, CategorizeError> {
        let Some(expense) = self.expenses.find_by_id(expense_id, owner_id).await? else {
            tracing::debug!("Expense {} not found for user {}", expense_id, owner_id);
            return Ok(CategoryAssignment::none());
        };

        let text = expense.categorization_text();
        if text.is_empty() {
            tracing::debug!("Expense {} has no text to categorize", expense_id);
            return Ok(CategoryAssignment::none());
        }

        let category = match self.rules.match_text(&text, self.categories.as_ref()).await? {
            Some(category) => Some(category),
            None => self.classifiers.classify(owner_id, &text).await?,
        };

        let Some(category) = category else {
            tracing::debug!("No category for expense {}", expense_id);
            return Ok(CategoryAssignment::none());
        };

        self.expenses
            .update_category(expense_id, owner_id, category.id)
            .await?;
        tracing::info!("Expense {} categorized as {}", expense_id, category.name);
        Ok(category.into())
    }

    /// Record a user's correction: train on the expense description, then
    /// store the corrected category on the expense.
    pub async fn train_with_feedback(
        &self,
        owner_id: UserId,
        expense_id: ExpenseId,
        category_id: CategoryId,
    ) -> Result<FeedbackOutcome, CategorizeError> {
        let expense = self
            .expenses
            .find_by_id(expense_id, owner_id)
            .await?
            .ok_or(CategorizeError::ExpenseNotFound(expense_id))?;

        let Some(description) = expense.description_text() else {
            tracing::debug!("Ignoring correction for expense {} without description", expense_id);
            return Ok(FeedbackOutcome::Ignored);
        };

        let Some(category) = self.categories.find_by_id(category_id).await? else {
            tracing::debug!("Ignoring correction to unknown category {}", category_id);
            return Ok(FeedbackOutcome::Ignored);
        };

        self.classifiers
            .train_with_feedback(owner_id, description, category.id)
            .await?;
        self.expenses
            .update_category(expense_id, owner_id, category.id)
            .await?;

        Ok(FeedbackOutcome::Applied { category })
    }

    /// Persist a new expense, categorizing it when no category was given.
    pub async fn create_expense(
        &self,
        owner_id: UserId,
        expense: NewExpense,
    ) -> Result<CreatedExpense, CategorizeError> {
        let id = self.expenses.create(owner_id, &expense).await?;

        let category = match expense.category_id {
            Some(category_id) => match self.categories.find_by_id(category_id).await? {
                Some(category) => category.into(),
                None => CategoryAssignment {
                    category_id: Some(category_id),
                    category_name: None,
                },
            },
            None => self.categorize(id, owner_id).await?,
        };

        Ok(CreatedExpense { id, category })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Expense;
    use crate::repository::InMemoryStore;

    async fn service() -> (CategorizationService, InMemoryStore) {
        let store = InMemoryStore::new();
        store.add_category(1, "Groceries").await;
        store.add_category(2, "Fuel").await;
        store.add_category(3, "Office").await;

        let expenses: Arc<dyn ExpenseStore> = Arc::new(store.clone());
        let categories: Arc<dyn CategoryStore> = Arc::new(store.clone());
        let manager = Arc::new(ClassifierManager::new(expenses.clone(), categories.clone()));
        let service =
            CategorizationService::new(RuleCategorizer::builtin(), manager, expenses, categories);
        (service, store)
    }

    fn expense(id: i64, description: &str, merchant: Option<&str>) -> Expense {
        Expense {
            id,
            owner_id: 7,
            description: Some(description.to_string()),
            merchant: merchant.map(str::to_string),
            category_id: None,
        }
    }

    #[tokio::test]
    async fn test_rule_hit_persists_category() {
        let (service, store) = service().await;
        store
            .insert_expense(expense(1, "weekly shop", Some("TESCO STORES")))
            .await;

        let assignment = service.categorize(1, 7).await.unwrap();
        assert_eq!(assignment.category_name.as_deref(), Some("Groceries"));

        let stored = ExpenseStore::find_by_id(&store, 1, 7).await.unwrap().unwrap();
        assert_eq!(stored.category_id, Some(1));
        assert_eq!(service.classifiers().fit_count(), 0);
    }

    #[tokio::test]
    async fn test_no_signal_leaves_expense_uncategorized() {
        let (service, store) = service().await;
        store.insert_expense(expense(1, "misc", None)).await;

        let assignment = service.categorize(1, 7).await.unwrap();
        assert!(assignment.is_none());
        let stored = ExpenseStore::find_by_id(&store, 1, 7).await.unwrap().unwrap();
        assert_eq!(stored.category_id, None);
    }

    #[tokio::test]
    async fn test_unknown_or_foreign_expense_gets_no_category() {
        let (service, store) = service().await;
        store.insert_expense(expense(1, "tesco", None)).await;

        assert!(service.categorize(1, 8).await.unwrap().is_none());
        assert!(service.categorize(99, 7).await.unwrap().is_none());

        let stored = ExpenseStore::find_by_id(&store, 1, 7).await.unwrap().unwrap();
        assert_eq!(stored.category_id, None);
        assert_eq!(service.classifiers().fit_count(), 0);
        assert_eq!(service.classifiers().inference_count(), 0);
    }

    #[tokio::test]
    async fn test_feedback_trains_and_persists() {
        let (service, store) = service().await;
        store.insert_expense(expense(1, "printer paper", None)).await;
        store.insert_expense(expense(2, "printer paper", None)).await;

        let outcome = service.train_with_feedback(7, 1, 3).await.unwrap();
        assert_eq!(
            outcome,
            FeedbackOutcome::Applied {
                category: Category::new(3, "Office")
            }
        );
        assert_eq!(ExpenseStore::find_by_id(&store, 1, 7).await.unwrap().unwrap().category_id, Some(3));

        let assignment = service.categorize(2, 7).await.unwrap();
        assert_eq!(assignment.category_id, Some(3));
    }

    #[tokio::test]
    async fn test_feedback_ignored_cases() {
        let (service, store) = service().await;
        store
            .insert_expense(Expense {
                description: None,
                ..expense(1, "", Some("Acme"))
            })
            .await;
        store.insert_expense(expense(2, "stamps", None)).await;

        assert_eq!(
            service.train_with_feedback(7, 1, 3).await.unwrap(),
            FeedbackOutcome::Ignored
        );
        assert_eq!(
            service.train_with_feedback(7, 2, 42).await.unwrap(),
            FeedbackOutcome::Ignored
        );
        assert!(matches!(
            service.train_with_feedback(7, 99, 3).await.unwrap_err(),
            CategorizeError::ExpenseNotFound(99)
        ));
        assert_eq!(ExpenseStore::find_by_id(&store, 2, 7).await.unwrap().unwrap().category_id, None);
    }

    #[tokio::test]
    async fn test_create_expense_auto_categorizes() {
        let (service, _store) = service().await;

        let created = service
            .create_expense(
                7,
                NewExpense {
                    merchant: Some("Shell Garage".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(created.category.category_name.as_deref(), Some("Fuel"));

        let explicit = service
            .create_expense(
                7,
                NewExpense {
                    merchant: Some("Shell Garage".to_string()),
                    category_id: Some(3),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(
            explicit.category,
            CategoryAssignment::from(Category::new(3, "Office"))
        );
        assert_ne!(created.id, explicit.id);
    }
}
