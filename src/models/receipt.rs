//! Receipt models: the uploaded image record and the fields parsed from it.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::{ReceiptId, UserId};

/// An uploaded receipt photo.
///
/// Created by the upload subsystem. The OCR pipeline only reads `path` and
/// writes `raw_text`/`processed` back once.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReceiptImage {
    pub id: ReceiptId,
    pub owner_id: UserId,
    /// Location of the stored image on disk.
    pub path: PathBuf,
    #[serde(default)]
    pub raw_text: Option<String>,
    #[serde(default)]
    pub processed: bool,
}

/// A monetary amount held in minor units (pence, cents).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Amount {
    minor_units: i64,
}

impl Amount {
    pub fn from_minor_units(minor_units: i64) -> Self {
        Self { minor_units }
    }

    pub fn minor_units(&self) -> i64 {
        self.minor_units
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.minor_units < 0 { "-" } else { "" };
        let abs = self.minor_units.unsigned_abs();
        write!(f, "{}{}.{:02}", sign, abs / 100, abs % 100)
    }
}

impl FromStr for Amount {
    type Err = String;

    /// Parse a plain decimal such as `17.85`, `17.8` or `17`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (negative, digits) = match s.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, s),
        };
        let (whole, frac) = digits.split_once('.').unwrap_or((digits, ""));
        if whole.is_empty() || frac.len() > 2 {
            return Err(format!("invalid amount: {:?}", s));
        }
        let whole: i64 = whole
            .parse()
            .map_err(|_| format!("invalid amount: {:?}", s))?;
        let frac: i64 = match frac.len() {
            0 => 0,
            1 => frac.parse::<i64>().map_err(|_| format!("invalid amount: {:?}", s))? * 10,
            _ => frac.parse().map_err(|_| format!("invalid amount: {:?}", s))?,
        };
        let minor = whole * 100 + frac;
        Ok(Self::from_minor_units(if negative { -minor } else { minor }))
    }
}

impl Serialize for Amount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Fields derived from recognized receipt text.
///
/// Ephemeral: produced fresh by every parse and never stored by this crate.
/// A missing field is `None`; in particular an absent date is never
/// replaced with today's date.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExtractedFields {
    pub amount: Option<Amount>,
    pub date: Option<NaiveDate>,
    pub merchant: Option<String>,
}

impl ExtractedFields {
    /// True when no field could be extracted.
    pub fn is_empty(&self) -> bool {
        self.amount.is_none() && self.date.is_none() && self.merchant.is_none()
    }
}

/// Result of running a receipt through the OCR pipeline.
#[derive(Debug, Clone, Serialize)]
pub struct ProcessedReceipt {
    pub fields: ExtractedFields,
    #[serde(skip)]
    pub raw_text: String,
    pub raw_text_length: usize,
    pub processing_time_ms: u64,
}
