//! Multinomial naive Bayes text classifier.
//!
//! Documents are bags of lower-cased alphanumeric tokens. Training is
//! incremental: adding a document only bumps counts, so a model never needs
//! rebuilding from scratch to absorb a correction. Ordered maps keep
//! tie-breaking deterministic.

use std::collections::BTreeMap;

/// Words too common on receipts and in descriptions to carry signal.
const STOPWORDS: &[&str] = &["the", "and", "for", "of", "to", "at", "in", "on", "a", "an"];

#[derive(Debug, Clone, Default)]
struct LabelStats {
    documents: u64,
    tokens: u64,
    counts: BTreeMap<String, u64>,
}

/// Naive Bayes over token counts with additive (Laplace) smoothing.
#[derive(Debug, Clone)]
pub struct NaiveBayes {
    smoothing: f64,
    labels: BTreeMap<String, LabelStats>,
    vocabulary: BTreeMap<String, u64>,
    documents: u64,
}

impl Default for NaiveBayes {
    fn default() -> Self {
        Self::new(1.0)
    }
}

impl NaiveBayes {
    pub fn new(smoothing: f64) -> Self {
        Self {
            smoothing: if smoothing > 0.0 { smoothing } else { 1.0 },
            labels: BTreeMap::new(),
            vocabulary: BTreeMap::new(),
            documents: 0,
        }
    }

    /// Add one labeled document. Documents with no usable tokens are dropped.
    pub fn add_document(&mut self, text: &str, label: &str) -> bool {
        let tokens = tokenize(text);
        if tokens.is_empty() || label.is_empty() {
            return false;
        }

        let stats = self.labels.entry(label.to_string()).or_default();
        stats.documents += 1;
        for token in tokens {
            stats.tokens += 1;
            *stats.counts.entry(token.clone()).or_insert(0) += 1;
            *self.vocabulary.entry(token).or_insert(0) += 1;
        }
        self.documents += 1;
        true
    }

    /// Number of documents the model has been trained on.
    pub fn example_count(&self) -> u64 {
        self.documents
    }

    pub fn is_empty(&self) -> bool {
        self.documents == 0
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.labels.keys().map(String::as_str)
    }

    /// Log-posterior (up to a constant) for every label, best first.
    pub fn scores(&self, text: &str) -> Vec<(String, f64)> {
        if self.is_empty() {
            return Vec::new();
        }

        let tokens = tokenize(text);
        let vocabulary = self.vocabulary.len() as f64;
        let total = self.documents as f64;

        let mut scores: Vec<(String, f64)> = self
            .labels
            .iter()
            .map(|(label, stats)| {
                let prior = (stats.documents as f64 / total).ln();
                let denominator = stats.tokens as f64 + self.smoothing * vocabulary;
                let likelihood: f64 = tokens
                    .iter()
                    .map(|token| {
                        let count = stats.counts.get(token).copied().unwrap_or(0) as f64;
                        ((count + self.smoothing) / denominator).ln()
                    })
                    .sum();
                (label.clone(), prior + likelihood)
            })
            .collect();

        // Stable sort keeps label order for equal scores.
        scores.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scores
    }

    /// Most probable label, or `None` for an untrained model.
    pub fn classify(&self, text: &str) -> Option<String> {
        self.scores(text).into_iter().next().map(|(label, _)| label)
    }
}

/// Lower-cased alphanumeric runs of two or more characters, minus stopwords.
pub fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|token| token.chars().count() >= 2 && !STOPWORDS.contains(token))
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenize() {
        assert_eq!(
            tokenize("Coffee at the Station, 2x LATTE!"),
            vec!["coffee", "station", "2x", "latte"]
        );
        assert!(tokenize("a - & .").is_empty());
    }

    #[test]
    fn test_empty_model_has_no_opinion() {
        let model = NaiveBayes::default();
        assert!(model.is_empty());
        assert_eq!(model.classify("anything at all"), None);
    }

    #[test]
    fn test_classifies_by_vocabulary() {
        let mut model = NaiveBayes::default();
        model.add_document("weekly fuel top up", "Fuel");
        model.add_document("diesel for the van", "Fuel");
        model.add_document("coffee run", "Food");
        model.add_document("team lunch sandwiches", "Food");

        assert_eq!(model.classify("fuel").as_deref(), Some("Fuel"));
        assert_eq!(model.classify("lunch and coffee").as_deref(), Some("Food"));
        assert_eq!(model.example_count(), 4);
        assert_eq!(model.labels().collect::<Vec<_>>(), vec!["Food", "Fuel"]);
    }

    #[test]
    fn test_incremental_correction_takes_effect() {
        let mut model = NaiveBayes::default();
        model.add_document("coffee run", "Food");
        assert_eq!(model.classify("weekly fuel").as_deref(), Some("Food"));

        model.add_document("weekly fuel", "Fuel");
        assert_eq!(model.classify("weekly fuel").as_deref(), Some("Fuel"));
        assert_eq!(model.example_count(), 2);
    }

    #[test]
    fn test_untokenizable_documents_are_dropped() {
        let mut model = NaiveBayes::default();
        assert!(!model.add_document("- -", "Food"));
        assert!(!model.add_document("coffee", ""));
        assert!(model.is_empty());
    }

    #[test]
    fn test_query_without_tokens_uses_prior() {
        let mut model = NaiveBayes::default();
        model.add_document("bus fare", "Transport");
        model.add_document("train ticket", "Transport");
        model.add_document("pizza", "Food");
        assert_eq!(model.classify("!!").as_deref(), Some("Transport"));
    }
}
