//! Authenticated CRUD over the transaction collection, with a local
//! snapshot that only ever reflects what the server returned.

use std::sync::{Arc, RwLock};

use rust_decimal::Decimal;
use tally_core::{DomainError, Transaction, TransactionDraft, TransactionId, TransactionKind};

use crate::session::SessionManager;
use crate::transport::{ApiTransport, TransportError};

pub const TRANSACTIONS_PATH: &str = "/api/transactions";

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("could not decode ledger: {0}")]
    Decode(String),
    #[error("invalid transaction: {0}")]
    Validation(#[from] DomainError),
}

/// Ordered snapshot of the ledger, in server response order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Ledger {
    entries: Vec<Transaction>,
}

/// Sums over a ledger snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LedgerTotals {
    pub income: Decimal,
    pub expense: Decimal,
    pub balance: Decimal,
}

impl Ledger {
    pub fn new(entries: Vec<Transaction>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &[Transaction] {
        &self.entries
    }

    pub fn iter(&self) -> impl Iterator<Item = &Transaction> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, id: &TransactionId) -> Option<&Transaction> {
        self.entries.iter().find(|tx| &tx.id == id)
    }

    pub fn contains(&self, id: &TransactionId) -> bool {
        self.get(id).is_some()
    }

    /// Income, expense and balance over the snapshot.
    ///
    /// `None` when a sum leaves the range of `Decimal`; amounts come from
    /// the server and are not bounded.
    pub fn totals(&self) -> Option<LedgerTotals> {
        let mut income = Decimal::ZERO;
        let mut expense = Decimal::ZERO;
        for tx in &self.entries {
            match tx.kind {
                TransactionKind::Income => income = income.checked_add(tx.amount)?,
                TransactionKind::Expense => expense = expense.checked_add(tx.amount)?,
            }
        }
        Some(LedgerTotals {
            income,
            expense,
            balance: income.checked_sub(expense)?,
        })
    }
}

/// Client-side view of the server's transaction list.
///
/// Mutations never touch the snapshot directly: a successful `add` or
/// `remove` is followed by `fetch_all`, and only that fetch replaces the
/// snapshot. A failed call leaves the snapshot as it was.
pub struct LedgerStore {
    transport: Arc<ApiTransport>,
    session: Arc<SessionManager>,
    ledger: RwLock<Ledger>,
}

impl LedgerStore {
    pub fn new(transport: Arc<ApiTransport>, session: Arc<SessionManager>) -> Self {
        Self {
            transport,
            session,
            ledger: RwLock::new(Ledger::default()),
        }
    }

    /// Copy of the current snapshot.
    pub fn snapshot(&self) -> Ledger {
        match self.ledger.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Drop the cached ledger (on logout).
    pub fn clear(&self) {
        self.replace(Ledger::default());
        tracing::debug!("ledger cleared");
    }

    /// Replace the snapshot with the server's current list.
    ///
    /// Succeeds without a request when no session is held.
    pub async fn fetch_all(&self) -> Result<(), SyncError> {
        let session = self.session.current();
        if !session.is_authenticated() {
            tracing::debug!("fetch skipped: not authenticated");
            return Ok(());
        }

        let body = self
            .transport
            .get(TRANSACTIONS_PATH, &session)
            .await
            .inspect_err(|e| tracing::warn!(error = %e, "ledger fetch failed"))?;

        let entries: Vec<Transaction> = serde_json::from_value(body).map_err(|e| {
            tracing::warn!(error = %e, "ledger response did not decode");
            SyncError::Decode(e.to_string())
        })?;

        // A logout (or re-login) while the request was in flight wins.
        if self.session.current() != session {
            tracing::debug!("session changed during fetch; discarding response");
            return Ok(());
        }

        tracing::info!(entries = entries.len(), "ledger synced");
        self.replace(Ledger::new(entries));
        Ok(())
    }

    /// Create a transaction, then refetch the ledger.
    pub async fn add(&self, draft: &TransactionDraft) -> Result<(), SyncError> {
        draft.validate()?;

        let body = serde_json::to_value(draft).map_err(|e| SyncError::Decode(e.to_string()))?;
        self.transport
            .post(TRANSACTIONS_PATH, &body, &self.session.current())
            .await
            .inspect_err(|e| tracing::warn!(category = %draft.category, error = %e, "add failed"))?;

        tracing::debug!(category = %draft.category, kind = %draft.kind, "transaction created");
        self.fetch_all().await
    }

    /// Replace a transaction's fields, then refetch the ledger.
    pub async fn update(&self, id: &TransactionId, draft: &TransactionDraft) -> Result<(), SyncError> {
        draft.validate()?;

        let body = serde_json::to_value(draft).map_err(|e| SyncError::Decode(e.to_string()))?;
        self.transport
            .put(&Self::item_path(id), &body, &self.session.current())
            .await
            .inspect_err(|e| tracing::warn!(%id, error = %e, "update failed"))?;

        tracing::debug!(%id, category = %draft.category, "transaction updated");
        self.fetch_all().await
    }

    /// Delete a transaction, then refetch the ledger.
    pub async fn remove(&self, id: &TransactionId) -> Result<(), SyncError> {
        self.transport
            .delete(&Self::item_path(id), &self.session.current())
            .await
            .inspect_err(|e| tracing::warn!(%id, error = %e, "remove failed"))?;

        tracing::debug!(%id, "transaction deleted");
        self.fetch_all().await
    }

    fn item_path(id: &TransactionId) -> String {
        format!("{}/{}", TRANSACTIONS_PATH, id.as_path_segment())
    }

    fn replace(&self, ledger: Ledger) {
        match self.ledger.write() {
            Ok(mut guard) => *guard = ledger,
            Err(poisoned) => *poisoned.into_inner() = ledger,
        }
    }
}
