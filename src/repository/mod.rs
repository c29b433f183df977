//! Storage contracts and the in-memory backend.
//!
//! Persistence belongs to collaborators; this module only defines what the
//! pipeline needs from them.

mod backend;
mod memory;

pub use backend::{
    CategoryStore, ExpenseStore, ReceiptStore, ReceiptUpdate, StoreError, StoreResult,
};
pub use memory::{Fixture, InMemoryStore};
