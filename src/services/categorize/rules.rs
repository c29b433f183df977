//! Keyword rules evaluated ahead of the learned classifier.

use std::fmt;

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};

use super::CategorizeError;
use crate::models::Category;
use crate::repository::{CategoryStore, StoreResult};

/// Merchant keywords per category, in evaluation order.
const BUILTIN_RULES: &[(&[&str], &str)] = &[
    (&["tesco", "asda", "aldi", "lidl", "sainsbury"], "Groceries"),
    (&["uber", "bolt", "taxi", "train", "bus", "tfl", "metro", "rail"], "Transport"),
    (
        &[
            "starbucks", "costa", "café", "cafe", "coffee", "restaurant", "mcdonald", "kfc",
            "burger", "pizza", "domino",
        ],
        "Food",
    ),
    (&["shell", "bp", "esso", "petrol", "diesel", "fuel"], "Fuel"),
    (&["boots", "pharmacy", "chemist"], "Health"),
    (&["amazon", "argos", "currys", "ikea"], "Shopping"),
];

/// A rule as written in configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleConfig {
    /// Regular expression, matched case-insensitively.
    pub pattern: String,
    /// Category name the rule assigns.
    pub category: String,
}

/// A compiled keyword rule.
#[derive(Debug, Clone)]
pub struct Rule {
    pattern: Regex,
    category: String,
}

impl Rule {
    pub fn new(pattern: &str, category: impl Into<String>) -> Result<Self, CategorizeError> {
        let pattern = RegexBuilder::new(pattern)
            .case_insensitive(true)
            .build()
            .map_err(|e| CategorizeError::InvalidRule {
                pattern: pattern.to_string(),
                reason: e.to_string(),
            })?;
        Ok(Self {
            pattern,
            category: category.into(),
        })
    }

    /// Whole-word keyword rule. A trailing "s" or "'s" is tolerated so
    /// "Sainsbury's" and "McDonalds" still hit.
    pub fn keywords(words: &[&str], category: impl Into<String>) -> Result<Self, CategorizeError> {
        let alternation = words
            .iter()
            .map(|w| regex::escape(w))
            .collect::<Vec<_>>()
            .join("|");
        Self::new(&format!(r"\b(?:{})(?:'?s)?\b", alternation), category)
    }

    pub fn pattern(&self) -> &str {
        self.pattern.as_str()
    }

    pub fn category(&self) -> &str {
        &self.category
    }

    pub fn is_match(&self, text: &str) -> bool {
        self.pattern.is_match(text)
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.pattern, self.category)
    }
}

/// Ordered rule list. First rule that matches and resolves wins.
#[derive(Debug, Clone, Default)]
pub struct RuleCategorizer {
    rules: Vec<Rule>,
}

impl RuleCategorizer {
    pub fn new(rules: Vec<Rule>) -> Self {
        Self { rules }
    }

    /// The built-in merchant keyword table.
    pub fn builtin() -> Self {
        let rules = BUILTIN_RULES
            .iter()
            .filter_map(|(words, category)| Rule::keywords(words, *category).ok())
            .collect();
        Self { rules }
    }

    /// Build from configuration: built-ins (if enabled) followed by custom rules.
    pub fn from_config(builtin: bool, custom: &[RuleConfig]) -> Result<Self, CategorizeError> {
        let mut categorizer = if builtin {
            Self::builtin()
        } else {
            Self::default()
        };
        for rule in custom {
            categorizer
                .rules
                .push(Rule::new(&rule.pattern, rule.category.clone())?);
        }
        Ok(categorizer)
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Category names of every rule matching `text`, in evaluation order.
    pub fn matching<'a>(&'a self, text: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.rules
            .iter()
            .filter(move |rule| rule.is_match(text))
            .map(Rule::category)
    }

    /// Resolve the first matching rule against the category store.
    ///
    /// A matched name with no category behind it is skipped so a later rule
    /// or the classifier still gets a chance.
    pub async fn match_text(
        &self,
        text: &str,
        categories: &dyn CategoryStore,
    ) -> StoreResult<Option<Category>> {
        for name in self.matching(text) {
            match categories.find_by_name(name).await? {
                Some(category) => {
                    tracing::debug!("rule hit: {} for {:?}", category.name, text);
                    return Ok(Some(category));
                }
                None => tracing::warn!("rule category {:?} does not exist, skipping", name),
            }
        }
        Ok(None)
    }
}
