//! `tally-client`
//!
//! **Responsibility:** session-authenticated synchronization with a remote
//! transaction ledger.
//!
//! This crate provides:
//! - `ApiTransport`: HTTP access with bearer credentials and failure classification
//! - `SessionManager`: token lifecycle, persisted across restarts
//! - `AuthController`: login/registration round trips
//! - `LedgerStore`: authenticated CRUD with write-then-refetch consistency
//!
//! The server stays the authority; the client never keeps unconfirmed state.

pub mod app;
pub mod auth;
pub mod config;
pub mod ledger;
pub mod session;
pub mod storage;
pub mod sync;
pub mod transport;

pub use app::TallyClient;
pub use auth::{AuthController, AuthError, AuthMode, AuthOutcome};
pub use config::{ClientConfig, Deployment};
pub use ledger::{Ledger, LedgerStore, LedgerTotals, SyncError};
pub use session::{Session, SessionEvent, SessionManager, SessionState};
pub use storage::{FileTokenStore, MemoryTokenStore, StorageError, TokenStore};
pub use sync::LedgerSync;
pub use transport::{ApiTransport, TransportError};
