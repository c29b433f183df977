//! spendscan - receipt OCR, field extraction and adaptive expense categorization.
//!
//! Receipt photos are normalized, recognized by a long-lived OCR worker and
//! parsed into amount, date and merchant. Expenses are categorized by keyword
//! rules first and, on a miss, by a per-user classifier trained from that
//! user's own corrected history.

pub mod cli;
pub mod config;
pub mod models;
pub mod ocr;
pub mod repository;
pub mod services;
