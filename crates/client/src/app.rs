//! Application facade wiring the sync layer together for a view.

use std::sync::Arc;

use tally_core::{Credentials, TransactionDraft, TransactionId};

use crate::auth::{AuthController, AuthError, AuthMode, AuthOutcome};
use crate::config::ClientConfig;
use crate::ledger::{Ledger, LedgerStore, SyncError};
use crate::session::SessionManager;
use crate::storage::{FileTokenStore, MemoryTokenStore, StorageError, TokenStore};
use crate::sync::LedgerSync;
use crate::transport::ApiTransport;

/// Everything a front end needs: auth actions, ledger actions, and the
/// synchronized ledger snapshot.
///
/// Session transitions are pumped into the ledger right after each auth
/// action, so a successful login is followed by exactly one fetch.
pub struct TallyClient {
    session: Arc<SessionManager>,
    auth: AuthController,
    ledger: Arc<LedgerStore>,
    sync: LedgerSync,
}

impl TallyClient {
    pub fn new(config: &ClientConfig, store: Arc<dyn TokenStore>) -> Self {
        let transport = Arc::new(ApiTransport::new(config.api_url.clone()));
        let session = Arc::new(SessionManager::new(store));
        let auth = AuthController::new(transport.clone(), session.clone());
        let ledger = Arc::new(LedgerStore::new(transport, session.clone()));
        let sync = LedgerSync::new(&session, ledger.clone());

        tracing::debug!(api_url = %config.api_url, deployment = ?config.deployment, "client configured");

        Self {
            session,
            auth,
            ledger,
            sync,
        }
    }

    /// Build with the file-backed token store from `config`, or an
    /// in-memory one when no location is available.
    pub fn from_config(config: &ClientConfig) -> Self {
        let store: Arc<dyn TokenStore> = match &config.token_path {
            Some(path) => Arc::new(FileTokenStore::new(path)),
            None => {
                tracing::warn!("no config directory; session will not survive restart");
                Arc::new(MemoryTokenStore::new())
            }
        };
        Self::new(config, store)
    }

    /// Restore any stored session and run the initial fetch.
    ///
    /// An unreadable token store leaves the client signed out; a later
    /// login or logout overwrites whatever is stored.
    pub async fn start(&mut self) {
        if let Err(e) = self.session.restore() {
            tracing::warn!(error = %e, "stored session unreadable; starting signed out");
        }
        self.sync.drain().await;
    }

    pub async fn login(&mut self, credentials: &Credentials) -> Result<(), AuthError> {
        self.auth.login(credentials).await?;
        self.sync.drain().await;
        Ok(())
    }

    /// Register, then switch the form back to login.
    pub async fn register(&mut self, credentials: &Credentials) -> Result<(), AuthError> {
        let next = self.auth.register(credentials).await?;
        self.auth.set_mode(next);
        Ok(())
    }

    /// Submit the auth form in its current mode.
    pub async fn submit(&mut self, credentials: &Credentials) -> Result<AuthOutcome, AuthError> {
        let outcome = self.auth.submit(credentials).await?;
        self.sync.drain().await;
        Ok(outcome)
    }

    pub fn mode(&self) -> AuthMode {
        self.auth.mode()
    }

    pub fn toggle_mode(&mut self) -> AuthMode {
        self.auth.toggle_mode()
    }

    pub async fn logout(&mut self) -> Result<(), StorageError> {
        self.session.clear()?;
        self.sync.drain().await;
        Ok(())
    }

    pub async fn refresh(&self) -> Result<(), SyncError> {
        self.ledger.fetch_all().await
    }

    pub async fn add(&self, draft: &TransactionDraft) -> Result<(), SyncError> {
        self.ledger.add(draft).await
    }

    pub async fn update(&self, id: &TransactionId, draft: &TransactionDraft) -> Result<(), SyncError> {
        self.ledger.update(id, draft).await
    }

    pub async fn remove(&self, id: &TransactionId) -> Result<(), SyncError> {
        self.ledger.remove(id).await
    }

    pub fn ledger(&self) -> Ledger {
        self.ledger.snapshot()
    }

    pub fn is_authenticated(&self) -> bool {
        self.session.is_authenticated()
    }

    pub fn session(&self) -> &Arc<SessionManager> {
        &self.session
    }

    pub fn ledger_store(&self) -> &Arc<LedgerStore> {
        &self.ledger
    }
}
