//! Categorization tests: rule precedence, per-user classifier isolation,
//! corrections and training deduplication.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use spendscan::models::{
    Category, CategoryId, Expense, ExpenseId, NewExpense, TrainingExample, UserId,
};
use spendscan::repository::{CategoryStore, ExpenseStore, InMemoryStore, StoreResult};
use spendscan::services::extraction;
use spendscan::services::{
    CategorizationService, ClassifierManager, ClassifierState, FeedbackOutcome, RuleCategorizer,
};

const GROCERIES: CategoryId = 1;
const FOOD: CategoryId = 2;
const FUEL: CategoryId = 3;
const OFFICE: CategoryId = 4;

/// Expense store that counts (and can slow down) history loads.
struct InstrumentedHistory {
    inner: InMemoryStore,
    delay: Duration,
    slow_user: Option<UserId>,
    loads: AtomicUsize,
}

impl InstrumentedHistory {
    fn new(inner: InMemoryStore, delay: Duration, slow_user: Option<UserId>) -> Self {
        Self {
            inner,
            delay,
            slow_user,
            loads: AtomicUsize::new(0),
        }
    }

    fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ExpenseStore for InstrumentedHistory {
    async fn create(&self, owner_id: UserId, expense: &NewExpense) -> StoreResult<ExpenseId> {
        self.inner.create(owner_id, expense).await
    }

    async fn find_by_id(
        &self,
        expense_id: ExpenseId,
        owner_id: UserId,
    ) -> StoreResult<Option<Expense>> {
        ExpenseStore::find_by_id(&self.inner, expense_id, owner_id).await
    }

    async fn update_category(
        &self,
        expense_id: ExpenseId,
        owner_id: UserId,
        category_id: CategoryId,
    ) -> StoreResult<()> {
        self.inner
            .update_category(expense_id, owner_id, category_id)
            .await
    }

    async fn training_examples(&self, owner_id: UserId) -> StoreResult<Vec<TrainingExample>> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        if self.slow_user.map_or(true, |user| user == owner_id) {
            tokio::time::sleep(self.delay).await;
        }
        self.inner.training_examples(owner_id).await
    }
}

async fn seeded_store() -> InMemoryStore {
    let store = InMemoryStore::new();
    store.add_category(GROCERIES, "Groceries").await;
    store.add_category(FOOD, "Food").await;
    store.add_category(FUEL, "Fuel").await;
    store.add_category(OFFICE, "Office").await;
    store
}

fn expense(
    id: ExpenseId,
    owner_id: UserId,
    description: &str,
    category_id: Option<CategoryId>,
) -> Expense {
    Expense {
        id,
        owner_id,
        description: Some(description.to_string()),
        merchant: None,
        category_id,
    }
}

fn service_over(
    expenses: Arc<dyn ExpenseStore>,
    store: &InMemoryStore,
) -> (CategorizationService, Arc<ClassifierManager>) {
    let categories: Arc<dyn CategoryStore> = Arc::new(store.clone());
    let manager = Arc::new(ClassifierManager::new(expenses.clone(), categories.clone()));
    let service = CategorizationService::new(
        RuleCategorizer::builtin(),
        manager.clone(),
        expenses,
        categories,
    );
    (service, manager)
}

#[tokio::test]
async fn test_rule_hit_never_touches_classifier() {
    let store = seeded_store().await;
    store
        .insert_expense(expense(1, 7, "printer ink", Some(OFFICE)))
        .await;
    store
        .insert_expense(Expense {
            merchant: Some("Tesco Express".to_string()),
            ..expense(2, 7, "weekly shop and some printer paper", None)
        })
        .await;

    let (service, manager) = service_over(Arc::new(store.clone()), &store);
    let assignment = service.categorize(2, 7).await.unwrap();

    assert_eq!(assignment.category_id, Some(GROCERIES));
    assert_eq!(assignment.category_name.as_deref(), Some("Groceries"));
    assert_eq!(manager.fit_count(), 0);
    assert_eq!(manager.inference_count(), 0);
    assert_eq!(manager.state(7).await, ClassifierState::Uninitialized);
}

#[tokio::test]
async fn test_rule_miss_uses_users_history() {
    let store = seeded_store().await;
    store
        .insert_expense(expense(1, 7, "printer ink cartridges", Some(OFFICE)))
        .await;
    store
        .insert_expense(expense(2, 7, "sandwich lunch", Some(FOOD)))
        .await;
    store.insert_expense(expense(3, 7, "ink for printer", None)).await;

    let (service, manager) = service_over(Arc::new(store.clone()), &store);
    let assignment = service.categorize(3, 7).await.unwrap();

    assert_eq!(assignment.category_id, Some(OFFICE));
    assert_eq!(
        ExpenseStore::find_by_id(&store, 3, 7).await.unwrap().unwrap().category_id,
        Some(OFFICE)
    );
    assert_eq!(manager.fit_count(), 1);
    assert_eq!(manager.inference_count(), 1);
}

#[tokio::test]
async fn test_rule_with_unknown_category_defers_to_history() {
    // No "Groceries" category exists, so the tesco rule cannot resolve.
    let store = InMemoryStore::new();
    store.add_category(FOOD, "Food").await;
    store.add_category(OFFICE, "Office").await;
    store
        .insert_expense(expense(1, 7, "tesco sandwich lunch", Some(FOOD)))
        .await;
    store
        .insert_expense(expense(2, 7, "printer paper", Some(OFFICE)))
        .await;
    store.insert_expense(expense(3, 7, "tesco lunch", None)).await;

    let (service, manager) = service_over(Arc::new(store.clone()), &store);
    let assignment = service.categorize(3, 7).await.unwrap();

    assert_eq!(assignment.category_id, Some(FOOD));
    assert_eq!(assignment.category_name.as_deref(), Some("Food"));
    assert_eq!(
        ExpenseStore::find_by_id(&store, 3, 7).await.unwrap().unwrap().category_id,
        Some(FOOD)
    );
    assert_eq!(manager.fit_count(), 1);
    assert_eq!(manager.inference_count(), 1);
}

#[tokio::test]
async fn test_classifiers_are_isolated_per_user() {
    let store = seeded_store().await;
    store
        .insert_expense(expense(1, 1, "coffee beans", Some(GROCERIES)))
        .await;
    store
        .insert_expense(expense(2, 2, "coffee beans", Some(GROCERIES)))
        .await;

    let (_, manager) = service_over(Arc::new(store.clone()), &store);

    let before = manager.classify(2, "coffee run").await.unwrap();
    assert_eq!(before.as_ref().map(|c| c.id), Some(GROCERIES));

    for _ in 0..3 {
        manager.train_with_feedback(1, "coffee run", FOOD).await.unwrap();
    }
    let a = manager.classify(1, "coffee run").await.unwrap();
    assert_eq!(a.map(|c| c.id), Some(FOOD));

    let after = manager.classify(2, "coffee run").await.unwrap();
    assert_eq!(after, before);
    assert_eq!(manager.state(2).await, ClassifierState::Ready { examples: 1 });
}

#[tokio::test]
async fn test_correction_applies_to_next_inference() {
    let store = seeded_store().await;
    store
        .insert_expense(expense(1, 7, "weekly team lunch", Some(FOOD)))
        .await;

    let (_, manager) = service_over(Arc::new(store.clone()), &store);
    assert!(manager
        .train_with_feedback(7, "weekly fuel", FUEL)
        .await
        .unwrap());

    let category = manager.classify(7, "weekly fuel").await.unwrap();
    assert_eq!(category, Some(Category::new(FUEL, "Fuel")));
}

#[tokio::test]
async fn test_feedback_through_service_persists_and_retrains() {
    let store = seeded_store().await;
    store
        .insert_expense(expense(1, 7, "toner", Some(FOOD)))
        .await;
    store.insert_expense(expense(2, 7, "toner", None)).await;

    let (service, manager) = service_over(Arc::new(store.clone()), &store);

    let outcome = service.train_with_feedback(7, 1, OFFICE).await.unwrap();
    assert!(matches!(outcome, FeedbackOutcome::Applied { ref category } if category.id == OFFICE));
    assert_eq!(manager.state(7).await, ClassifierState::Ready { examples: 2 });

    // One Food and one Office example for "toner"; a second correction tips it.
    service.train_with_feedback(7, 1, OFFICE).await.unwrap();
    let assignment = service.categorize(2, 7).await.unwrap();
    assert_eq!(assignment.category_id, Some(OFFICE));
}

#[tokio::test]
async fn test_concurrent_first_requests_train_once() {
    let store = seeded_store().await;
    store
        .insert_expense(expense(1, 7, "printer ink", Some(OFFICE)))
        .await;
    store.insert_expense(expense(2, 7, "ink refill", None)).await;
    store.insert_expense(expense(3, 7, "printer paper", None)).await;

    let history = Arc::new(InstrumentedHistory::new(
        store.clone(),
        Duration::from_millis(100),
        None,
    ));
    let (service, manager) = service_over(history.clone(), &store);

    let (a, b) = tokio::join!(service.categorize(2, 7), service.categorize(3, 7));
    assert_eq!(a.unwrap().category_id, Some(OFFICE));
    assert_eq!(b.unwrap().category_id, Some(OFFICE));

    assert_eq!(history.loads(), 1);
    assert_eq!(manager.fit_count(), 1);
    assert_eq!(manager.inference_count(), 2);
}

#[tokio::test]
async fn test_training_one_user_does_not_block_another() {
    let store = seeded_store().await;
    store
        .insert_expense(expense(1, 1, "printer ink", Some(OFFICE)))
        .await;
    store
        .insert_expense(expense(2, 2, "printer ink", Some(OFFICE)))
        .await;

    let history = Arc::new(InstrumentedHistory::new(
        store.clone(),
        Duration::from_millis(500),
        Some(1),
    ));
    let (_, manager) = service_over(history, &store);

    let slow = {
        let manager = manager.clone();
        tokio::spawn(async move { manager.classify(1, "ink").await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(manager.state(1).await, ClassifierState::Training);

    let fast = tokio::time::timeout(Duration::from_millis(200), manager.classify(2, "ink"))
        .await
        .expect("user 2 waited on user 1's training")
        .unwrap();
    assert_eq!(fast.map(|c| c.id), Some(OFFICE));

    let slow = slow.await.unwrap().unwrap();
    assert_eq!(slow.map(|c| c.id), Some(OFFICE));
}

#[tokio::test]
async fn test_user_without_history_gets_no_category() {
    let store = seeded_store().await;
    store.insert_expense(expense(1, 7, "mystery item", None)).await;

    let (service, manager) = service_over(Arc::new(store.clone()), &store);

    assert_eq!(manager.classify(7, "anything").await.unwrap(), None);
    let assignment = service.categorize(1, 7).await.unwrap();
    assert!(assignment.is_none());
    assert_eq!(manager.inference_count(), 0);
    assert_eq!(ExpenseStore::find_by_id(&store, 1, 7).await.unwrap().unwrap().category_id, None);
}

#[tokio::test]
async fn test_receipt_text_to_categorized_expense() {
    let store = seeded_store().await;
    let (service, manager) = service_over(Arc::new(store.clone()), &store);

    let fields = extraction::parse("TESCO STORES\n123 High St\nTOTAL   £17.85\n2024-03-02");
    assert_eq!(fields.amount.map(|a| a.to_string()).as_deref(), Some("17.85"));
    assert_eq!(fields.date.map(|d| d.to_string()).as_deref(), Some("2024-03-02"));
    assert_eq!(fields.merchant.as_deref(), Some("TESCO STORES"));

    let created = service
        .create_expense(
            7,
            NewExpense {
                amount: fields.amount,
                date: fields.date,
                merchant: fields.merchant,
                receipt_id: Some(1),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(created.category.category_name.as_deref(), Some("Groceries"));
    assert_eq!(manager.fit_count(), 0);
    assert_eq!(manager.inference_count(), 0);
}
