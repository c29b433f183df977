//! Data models for receipts, expenses and categories.

mod category;
mod expense;
mod receipt;

pub use category::{Category, CategoryAssignment};
pub use expense::{Expense, NewExpense, TrainingExample};
pub use receipt::{Amount, ExtractedFields, ProcessedReceipt, ReceiptImage};

pub type UserId = i64;
pub type ReceiptId = i64;
pub type ExpenseId = i64;
pub type CategoryId = i64;
