//! Transaction date extraction.
//!
//! Numeric dates are read day-first (`02/03/2024` is 2 March). There is no
//! locale detection. When nothing matches the result is `None`; the caller
//! must ask the user rather than assume today.

use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::{Captures, Regex};

static ISO_DATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(\d{4})[-/](\d{1,2})[-/](\d{1,2})\b").unwrap());

static DAY_FIRST_DATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(\d{1,2})[/.\-](\d{1,2})[/.\-](\d{4}|\d{2})\b").unwrap());

static DAY_MONTH_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(\d{1,2})(?:st|nd|rd|th)?\s+([a-z]{3,9})\.?,?\s+(\d{4})\b").unwrap()
});

static MONTH_NAME_DAY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b([a-z]{3,9})\.?\s+(\d{1,2})(?:st|nd|rd|th)?,?\s+(\d{4})\b").unwrap()
});

const MONTHS: &[(&str, u32)] = &[
    ("jan", 1),
    ("january", 1),
    ("feb", 2),
    ("february", 2),
    ("mar", 3),
    ("march", 3),
    ("apr", 4),
    ("april", 4),
    ("may", 5),
    ("jun", 6),
    ("june", 6),
    ("jul", 7),
    ("july", 7),
    ("aug", 8),
    ("august", 8),
    ("sep", 9),
    ("sept", 9),
    ("september", 9),
    ("oct", 10),
    ("october", 10),
    ("nov", 11),
    ("november", 11),
    ("dec", 12),
    ("december", 12),
];

type DateStrategy = fn(&str) -> Option<NaiveDate>;

const STRATEGIES: &[(&str, DateStrategy)] = &[
    ("iso", iso_date),
    ("day_first", day_first_date),
    ("day_month_name", day_month_name),
    ("month_name_day", month_name_day),
];

/// Extract the transaction date.
pub fn parse_date(text: &str) -> Option<NaiveDate> {
    STRATEGIES.iter().find_map(|(name, strategy)| {
        let date = strategy(text)?;
        tracing::trace!("date {} via {}", date, name);
        Some(date)
    })
}

/// `2024-03-02` or `2024/03/02`.
pub fn iso_date(text: &str) -> Option<NaiveDate> {
    first_valid(&ISO_DATE, text, |caps| {
        ymd(caps.get(1)?.as_str(), caps.get(2)?.as_str(), caps.get(3)?.as_str())
    })
}

/// `02/03/2024`, `2.3.2024`, `02-03-24`, read as day/month/year.
pub fn day_first_date(text: &str) -> Option<NaiveDate> {
    first_valid(&DAY_FIRST_DATE, text, |caps| {
        ymd(caps.get(3)?.as_str(), caps.get(2)?.as_str(), caps.get(1)?.as_str())
    })
}

/// `2 March 2024`, `2nd Mar. 2024`.
pub fn day_month_name(text: &str) -> Option<NaiveDate> {
    first_valid(&DAY_MONTH_NAME, text, |caps| {
        let month = month_number(caps.get(2)?.as_str())?;
        let year: i32 = caps.get(3)?.as_str().parse().ok()?;
        let day: u32 = caps.get(1)?.as_str().parse().ok()?;
        NaiveDate::from_ymd_opt(year, month, day)
    })
}

/// `March 2, 2024`, `Mar 2nd 2024`.
pub fn month_name_day(text: &str) -> Option<NaiveDate> {
    first_valid(&MONTH_NAME_DAY, text, |caps| {
        let month = month_number(caps.get(1)?.as_str())?;
        let year: i32 = caps.get(3)?.as_str().parse().ok()?;
        let day: u32 = caps.get(2)?.as_str().parse().ok()?;
        NaiveDate::from_ymd_opt(year, month, day)
    })
}

/// First match of `pattern` that converts to a real calendar date.
fn first_valid(
    pattern: &Regex,
    text: &str,
    convert: impl Fn(&Captures) -> Option<NaiveDate>,
) -> Option<NaiveDate> {
    pattern.captures_iter(text).find_map(|caps| convert(&caps))
}

fn ymd(year: &str, month: &str, day: &str) -> Option<NaiveDate> {
    let mut year: i32 = year.parse().ok()?;
    if year < 100 {
        year += 2000;
    }
    NaiveDate::from_ymd_opt(year, month.parse().ok()?, day.parse().ok()?)
}

fn month_number(name: &str) -> Option<u32> {
    let name = name.to_lowercase();
    MONTHS
        .iter()
        .find(|(candidate, _)| *candidate == name)
        .map(|(_, number)| *number)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(text: &str) -> Option<String> {
        parse_date(text).map(|d| d.format("%Y-%m-%d").to_string())
    }

    #[test]
    fn test_iso_dates() {
        assert_eq!(date("Date: 2024-03-02 14:11").as_deref(), Some("2024-03-02"));
        assert_eq!(date("2024/3/2").as_deref(), Some("2024-03-02"));
    }

    #[test]
    fn test_numeric_dates_are_day_first() {
        assert_eq!(date("02/03/2024").as_deref(), Some("2024-03-02"));
        assert_eq!(date("2.3.2024").as_deref(), Some("2024-03-02"));
        assert_eq!(date("25-12-23").as_deref(), Some("2023-12-25"));
    }

    #[test]
    fn test_textual_months() {
        assert_eq!(date("2 March 2024").as_deref(), Some("2024-03-02"));
        assert_eq!(date("2nd Mar. 2024").as_deref(), Some("2024-03-02"));
        assert_eq!(date("March 2, 2024").as_deref(), Some("2024-03-02"));
        assert_eq!(date("SEPT 30TH 2023").as_deref(), Some("2023-09-30"));
    }

    #[test]
    fn test_iso_takes_precedence_over_earlier_numeric_date() {
        let text = "Printed 05/06/2023\nSale 2024-03-02";
        assert_eq!(date(text).as_deref(), Some("2024-03-02"));
    }

    #[test]
    fn test_invalid_calendar_dates_are_skipped() {
        assert_eq!(date("31/02/2024"), None);
        assert_eq!(date("31/02/2024 then 01/03/2024").as_deref(), Some("2024-03-01"));
    }

    #[test]
    fn test_no_date_is_none_not_today() {
        assert_eq!(date("TESCO STORES\nTOTAL 17.85"), None);
        assert_eq!(date(""), None);
        assert_eq!(date("Total 12 items 2024"), None);
    }

    #[test]
    fn test_unknown_month_words_ignored() {
        assert_eq!(date("12 items 2024"), None);
    }
}
