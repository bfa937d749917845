//! Session-driven ledger synchronization.
//!
//! Subscribes to [`SessionManager`] transitions and keeps the
//! [`LedgerStore`] in step: a new token triggers a fetch, a logout
//! discards the cached ledger.

use std::sync::Arc;

use tokio::sync::Notify;

use crate::ledger::{LedgerStore, SyncError};
use crate::session::{SessionEvent, SessionManager, SessionSubscription};

pub struct LedgerSync {
    subscription: SessionSubscription,
    ledger: Arc<LedgerStore>,
}

impl LedgerSync {
    pub fn new(session: &SessionManager, ledger: Arc<LedgerStore>) -> Self {
        Self {
            subscription: session.subscribe(),
            ledger,
        }
    }

    /// React to a single session event.
    pub async fn handle(&self, event: SessionEvent) -> Result<(), SyncError> {
        match event {
            SessionEvent::Authenticated => self.ledger.fetch_all().await,
            SessionEvent::SignedOut => {
                self.ledger.clear();
                Ok(())
            }
        }
    }

    /// Handle every event already queued, in order. Failures are logged and
    /// absorbed; the ledger keeps its previous state.
    ///
    /// Returns the number of events handled.
    pub async fn drain(&mut self) -> usize {
        let mut handled = 0;
        while let Some(event) = self.subscription.try_recv() {
            if let Err(e) = self.handle(event).await {
                tracing::warn!(?event, error = %e, "ledger sync failed");
            }
            handled += 1;
        }
        handled
    }

    /// Process events as they arrive until `shutdown` is notified or the
    /// session manager goes away.
    pub async fn run(mut self, shutdown: Arc<Notify>) {
        tracing::info!("ledger sync started");

        loop {
            tokio::select! {
                _ = shutdown.notified() => {
                    tracing::info!("ledger sync received shutdown signal");
                    break;
                }
                event = self.subscription.recv() => {
                    let Some(event) = event else {
                        tracing::debug!("session event stream closed");
                        break;
                    };
                    if let Err(e) = self.handle(event).await {
                        tracing::warn!(?event, error = %e, "ledger sync failed");
                    }
                }
            }
        }

        tracing::info!("ledger sync stopped");
    }
}
