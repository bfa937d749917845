//! `tally-core`: ledger domain building blocks.
//!
//! This crate contains **pure domain** types shared by the client layers
//! (no networking, no persistence).

pub mod credentials;
pub mod error;
pub mod id;
pub mod transaction;

pub use credentials::{Credentials, Token};
pub use error::{DomainError, DomainResult};
pub use id::TransactionId;
pub use transaction::{Transaction, TransactionDraft, TransactionKind};
