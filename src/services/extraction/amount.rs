//! Amount extraction.
//!
//! Strategies, first success wins:
//! 1. last monetary token on the last total-like line
//! 2. largest monetary token anywhere in the text

use std::sync::LazyLock;

use regex::Regex;

use crate::models::Amount;

/// Digits with a two-digit decimal part, optionally a currency symbol and
/// thousands separators: `£17.85`, `1,234.56`, `1.234,56`, `17,85`.
static MONEY_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:[£$€]\s?)?\b(\d{1,3}(?:[.,]\d{3})+|\d+)[.,](\d{2})\b").unwrap()
});

/// Words that mark the line carrying the receipt total. Word boundaries keep
/// "SUBTOTAL" from counting.
static TOTAL_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:grand\s+total|total|amount\s+due|balance\s+due)\b").unwrap()
});

type AmountStrategy = fn(&str) -> Option<Amount>;

const STRATEGIES: &[(&str, AmountStrategy)] = &[
    ("total_line", from_total_line),
    ("largest_value", largest_value),
];

/// Extract the receipt total.
pub fn parse_amount(text: &str) -> Option<Amount> {
    STRATEGIES.iter().find_map(|(name, strategy)| {
        let amount = strategy(text)?;
        tracing::trace!("amount {} via {}", amount, name);
        Some(amount)
    })
}

/// Last money token of the last total-like line that has one.
pub fn from_total_line(text: &str) -> Option<Amount> {
    text.lines()
        .filter(|line| TOTAL_LINE.is_match(line))
        .filter_map(|line| money_tokens(line).pop())
        .last()
}

/// Largest money token in the whole text.
pub fn largest_value(text: &str) -> Option<Amount> {
    text.lines().flat_map(money_tokens).max()
}

/// All monetary tokens in a line, in order of appearance.
pub fn money_tokens(line: &str) -> Vec<Amount> {
    MONEY_PATTERN
        .captures_iter(line)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            if is_embedded(line, whole.start(), whole.end()) {
                return None;
            }
            let integer: String = caps
                .get(1)?
                .as_str()
                .chars()
                .filter(char::is_ascii_digit)
                .collect();
            let integer: i64 = integer.parse().ok()?;
            let fraction: i64 = caps.get(2)?.as_str().parse().ok()?;
            Some(Amount::from_minor_units(integer.checked_mul(100)? + fraction))
        })
        .collect()
}

/// True when the match is part of a longer numeric run such as a date
/// (`02.03.2024`) or a version-like string.
fn is_embedded(line: &str, start: usize, end: usize) -> bool {
    let before = line[..start].chars().rev().take(2).collect::<Vec<_>>();
    let after = line[end..].chars().take(2).collect::<Vec<_>>();

    let separator = |c: char| matches!(c, '.' | ',' | '/' | '-' | ':');
    let joined_after = matches!(after.as_slice(), [s, d, ..] if separator(*s) && d.is_ascii_digit());
    let joined_before =
        matches!(before.as_slice(), [s, d, ..] if separator(*s) && d.is_ascii_digit());
    joined_after || joined_before
}
