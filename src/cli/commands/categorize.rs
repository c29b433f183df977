//! Categorization commands over fixture-seeded stores.

use std::path::Path;

use console::style;
use serde_json::json;

use crate::cli::helpers::{categorization_service, load_store, print_json, truncate};
use crate::config::Config;
use crate::models::{CategoryAssignment, CategoryId, ExpenseId, UserId};

/// List active rules in evaluation order.
pub fn cmd_rules(config: &Config) -> anyhow::Result<()> {
    let rules = config.categorization.rule_categorizer()?;

    println!("\n{}", style("Categorization Rules").bold());
    println!("{}", "-".repeat(70));
    if rules.is_empty() {
        println!("  {}", style("no rules configured").dim());
    }
    for (i, rule) in rules.rules().iter().enumerate() {
        println!(
            "  {:>2}. {:<14} {}",
            i + 1,
            style(rule.category()).cyan(),
            style(truncate(rule.pattern(), 50)).dim()
        );
    }
    Ok(())
}

/// Categorize one expense and print the assignment.
pub async fn cmd_categorize(
    config: &Config,
    fixture: &Path,
    user: UserId,
    expense: ExpenseId,
) -> anyhow::Result<()> {
    let store = load_store(fixture).await?;
    let service = categorization_service(config, &store)?;

    let assignment = service.categorize(expense, user).await?;
    print_json(&json!({
        "expense_id": expense,
        "category_id": assignment.category_id,
        "category_name": assignment.category_name,
        "classifier": service.classifiers().state(user).await,
        "classifier_fits": service.classifiers().fit_count(),
    }))
}

/// Classify free text with a user's classifier.
pub async fn cmd_classify(
    config: &Config,
    fixture: &Path,
    user: UserId,
    text: &str,
) -> anyhow::Result<()> {
    let store = load_store(fixture).await?;
    let service = categorization_service(config, &store)?;
    let classifiers = service.classifiers();

    let assignment = classifiers
        .classify(user, &text.to_lowercase())
        .await?
        .map(CategoryAssignment::from)
        .unwrap_or_default();

    print_json(&json!({
        "text": text,
        "category_id": assignment.category_id,
        "category_name": assignment.category_name,
        "classifier": classifiers.state(user).await,
    }))
}

/// Apply a correction and show the classifier's prediction for the same text.
pub async fn cmd_feedback(
    config: &Config,
    fixture: &Path,
    user: UserId,
    expense: ExpenseId,
    category: CategoryId,
) -> anyhow::Result<()> {
    let store = load_store(fixture).await?;
    let service = categorization_service(config, &store)?;

    let outcome = service.train_with_feedback(user, expense, category).await?;
    print_json(&json!({
        "expense_id": expense,
        "feedback": outcome,
        "classifier": service.classifiers().state(user).await,
    }))
}
