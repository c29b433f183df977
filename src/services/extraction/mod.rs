//! Structured field extraction from OCR text.
//!
//! Each field has its own parser with an ordered list of strategies. The
//! parsers are pure: the same text always yields the same fields, and a field
//! that cannot be found is left empty rather than failing the whole parse.

mod amount;
mod date;
mod merchant;

pub use amount::parse_amount;
pub use date::parse_date;
pub use merchant::parse_merchant;

use crate::models::ExtractedFields;

/// Extract amount, date and merchant from raw receipt text.
pub fn parse(raw_text: &str) -> ExtractedFields {
    let fields = ExtractedFields {
        amount: parse_amount(raw_text),
        date: parse_date(raw_text),
        merchant: parse_merchant(raw_text),
    };

    tracing::debug!(
        "extracted amount={:?} date={:?} merchant={:?}",
        fields.amount.map(|a| a.to_string()),
        fields.date,
        fields.merchant
    );

    fields
}
