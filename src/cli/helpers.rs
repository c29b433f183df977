//! Shared helper functions for CLI commands.

use std::path::Path;
use std::sync::Arc;

use serde::Serialize;

use crate::config::Config;
use crate::repository::{CategoryStore, ExpenseStore, Fixture, InMemoryStore};
use crate::services::{CategorizationService, ClassifierManager};

/// Print a value as pretty JSON on stdout.
pub fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// In-memory store seeded from a fixture file.
pub async fn load_store(fixture: &Path) -> anyhow::Result<InMemoryStore> {
    let fixture = Fixture::load(fixture)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to load fixture {}: {}", fixture.display(), e))?;
    Ok(InMemoryStore::from_fixture(fixture))
}

/// Categorization service over `store`, configured from `config`.
pub fn categorization_service(
    config: &Config,
    store: &InMemoryStore,
) -> anyhow::Result<CategorizationService> {
    let expenses: Arc<dyn ExpenseStore> = Arc::new(store.clone());
    let categories: Arc<dyn CategoryStore> = Arc::new(store.clone());
    let manager = ClassifierManager::with_smoothing(
        expenses.clone(),
        categories.clone(),
        config.categorization.smoothing,
    );
    let rules = config.categorization.rule_categorizer()?;
    Ok(CategorizationService::new(
        rules,
        Arc::new(manager),
        expenses,
        categories,
    ))
}

/// Truncate a string for single-line display.
pub fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max_chars.saturating_sub(3)).collect();
        format!("{}...", cut)
    }
}
