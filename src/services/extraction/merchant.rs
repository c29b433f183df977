//! Merchant name extraction.
//!
//! The business name is usually near the top and mostly letters. Look at the
//! first dozen non-blank lines, drop boilerplate and reference-number lines,
//! and keep the one with the highest share of alphabetic characters.

use std::sync::LazyLock;

use regex::Regex;

/// How many leading non-blank lines are considered.
const HEADER_LINES: usize = 12;

/// Words that mark lines which are never the merchant name.
static BOILERPLATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:receipt|invoice|sub\s*total|total|vat|tax|cashier|card|visa|mastercard|change|thank|tel|phone)\b|www\.",
    )
    .unwrap()
});

/// Long digit runs: card numbers, transaction and VAT registration numbers.
static REFERENCE_NUMBER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d{6,}").unwrap());

static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

/// Extract the merchant name.
pub fn parse_merchant(text: &str) -> Option<String> {
    let header: Vec<String> = text
        .lines()
        .map(collapse_whitespace)
        .filter(|line| !line.is_empty())
        .take(HEADER_LINES)
        .collect();

    let first = header.first()?;

    let best = header
        .iter()
        .filter(|line| !is_boilerplate(line))
        .fold(None::<(&String, f64)>, |best, line| {
            let ratio = alphabetic_ratio(line);
            match best {
                Some((_, best_ratio)) if best_ratio >= ratio => best,
                _ => Some((line, ratio)),
            }
        });

    Some(best.map(|(line, _)| line).unwrap_or(first).clone())
}

fn collapse_whitespace(line: &str) -> String {
    WHITESPACE.replace_all(line.trim(), " ").into_owned()
}

fn is_boilerplate(line: &str) -> bool {
    BOILERPLATE.is_match(line) || REFERENCE_NUMBER.is_match(line)
}

fn alphabetic_ratio(line: &str) -> f64 {
    let total = line.chars().count();
    if total == 0 {
        return 0.0;
    }
    let alphabetic = line.chars().filter(|c| c.is_alphabetic()).count();
    alphabetic as f64 / total as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_picks_most_alphabetic_header_line() {
        let text = "TESCO STORES\n123 High St\nTOTAL   £17.85\n2024-03-02";
        assert_eq!(parse_merchant(text).as_deref(), Some("TESCO STORES"));
    }

    #[test]
    fn test_skips_boilerplate_at_top() {
        let text = "RECEIPT #4411\n  Corner   Cafe  \nVAT No 123456789\n2 x Latte 6.40";
        assert_eq!(parse_merchant(text).as_deref(), Some("Corner Cafe"));
    }

    #[test]
    fn test_markers_match_whole_words() {
        let text = "Harbour Hotel\nTel 01234 567 890";
        assert_eq!(parse_merchant(text).as_deref(), Some("Harbour Hotel"));
    }

    #[test]
    fn test_first_best_line_wins_ties() {
        let text = "ALDI\nLIDL";
        assert_eq!(parse_merchant(text).as_deref(), Some("ALDI"));
    }

    #[test]
    fn test_falls_back_to_first_line_when_all_filtered() {
        let text = "\n\n  Tax   Invoice \nTOTAL 4.00\nVisa 1234567890";
        assert_eq!(parse_merchant(text).as_deref(), Some("Tax Invoice"));
    }

    #[test]
    fn test_only_header_lines_are_considered() {
        let mut text = String::new();
        for i in 0..HEADER_LINES {
            text.push_str(&format!("{} 1.00\n", i));
        }
        text.push_str("Late Merchant Name\n");
        assert_eq!(parse_merchant(&text).as_deref(), Some("0 1.00"));
    }

    #[test]
    fn test_empty_text() {
        assert_eq!(parse_merchant(""), None);
        assert_eq!(parse_merchant("  \n\t\n"), None);
    }
}
