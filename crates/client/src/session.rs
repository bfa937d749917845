//! Session state machine and token lifecycle.
//!
//! Transitions are pure: [`Session::apply`] returns the next session plus
//! the side effects the transition requires. [`SessionManager`] executes
//! those effects against the token store and its subscribers.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use tally_core::Token;
use tokio::sync::mpsc;

use crate::storage::{StorageError, StorageResult, TokenStore};

/// Coarse authentication state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Unauthenticated,
    Authenticated,
}

/// The client's authentication state: absent, or holding a bearer token.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    token: Option<Token>,
}

/// Requested change to the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionCommand {
    /// Startup load from durable storage.
    Restore(Option<Token>),
    /// Successful login.
    SignIn(Token),
    /// Logout.
    SignOut,
}

/// Notification published to session subscribers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    /// A token became available; the ledger should be fetched.
    Authenticated,
    /// The token was dropped; the cached ledger must be discarded.
    SignedOut,
}

/// Side effect requested by a transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    PersistToken(Token),
    ForgetToken,
    Publish(SessionEvent),
}

/// Result of applying a command to a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub session: Session,
    pub effects: Vec<Effect>,
}

impl Session {
    pub fn anonymous() -> Self {
        Self { token: None }
    }

    pub fn authenticated(token: Token) -> Self {
        Self { token: Some(token) }
    }

    pub fn token(&self) -> Option<&Token> {
        self.token.as_ref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }

    pub fn state(&self) -> SessionState {
        if self.is_authenticated() {
            SessionState::Authenticated
        } else {
            SessionState::Unauthenticated
        }
    }

    /// Compute the next session and the effects needed to get there.
    pub fn apply(&self, command: SessionCommand) -> Transition {
        match command {
            // Already in storage; nothing to persist.
            SessionCommand::Restore(Some(token)) => Transition {
                session: Session::authenticated(token),
                effects: vec![Effect::Publish(SessionEvent::Authenticated)],
            },
            SessionCommand::Restore(None) => Transition {
                session: self.clone(),
                effects: Vec::new(),
            },
            SessionCommand::SignIn(token) => Transition {
                session: Session::authenticated(token.clone()),
                effects: vec![
                    Effect::PersistToken(token),
                    Effect::Publish(SessionEvent::Authenticated),
                ],
            },
            SessionCommand::SignOut => Transition {
                session: Session::anonymous(),
                effects: vec![
                    Effect::ForgetToken,
                    Effect::Publish(SessionEvent::SignedOut),
                ],
            },
        }
    }
}

/// Receiving end of the session event stream.
#[derive(Debug)]
pub struct SessionSubscription {
    receiver: mpsc::UnboundedReceiver<SessionEvent>,
}

impl SessionSubscription {
    /// Wait for the next event. `None` once the manager is gone.
    pub async fn recv(&mut self) -> Option<SessionEvent> {
        self.receiver.recv().await
    }

    /// Take the next event if one is already queued.
    pub fn try_recv(&mut self) -> Option<SessionEvent> {
        self.receiver.try_recv().ok()
    }
}

/// Owner of the session token.
///
/// The in-memory session only changes after every storage effect of a
/// transition has succeeded, so memory and disk never disagree once a
/// call returns.
pub struct SessionManager {
    session: RwLock<Session>,
    store: Arc<dyn TokenStore>,
    subscribers: Mutex<Vec<mpsc::UnboundedSender<SessionEvent>>>,
    restored: AtomicBool,
}

impl SessionManager {
    pub fn new(store: Arc<dyn TokenStore>) -> Self {
        Self {
            session: RwLock::new(Session::anonymous()),
            store,
            subscribers: Mutex::new(Vec::new()),
            restored: AtomicBool::new(false),
        }
    }

    /// Snapshot of the current session.
    pub fn current(&self) -> Session {
        match self.session.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.current().is_authenticated()
    }

    /// Register for transition events.
    pub fn subscribe(&self) -> SessionSubscription {
        let (tx, rx) = mpsc::unbounded_channel();

        // A poisoned list still hands out a subscription; it just never fires.
        if let Ok(mut subs) = self.subscribers.lock() {
            subs.push(tx);
        }

        SessionSubscription { receiver: rx }
    }

    /// Load a previously stored token. Only the first call per manager does
    /// any work; later calls return the current session unchanged.
    pub fn restore(&self) -> StorageResult<Session> {
        if self.restored.swap(true, Ordering::SeqCst) {
            tracing::debug!("session already restored; skipping");
            return Ok(self.current());
        }

        let stored = self.store.load().inspect_err(|e| {
            tracing::warn!(error = %e, "could not read stored token; staying signed out");
        })?;

        if stored.is_some() {
            tracing::info!("restored session from storage");
        } else {
            tracing::debug!("no stored session");
        }

        self.commit(SessionCommand::Restore(stored))?;
        Ok(self.current())
    }

    /// Persist a freshly issued token and become authenticated.
    pub fn set_token(&self, token: Token) -> StorageResult<()> {
        self.commit(SessionCommand::SignIn(token))?;
        tracing::info!("session authenticated");
        Ok(())
    }

    /// Forget the token and become unauthenticated. Idempotent.
    pub fn clear(&self) -> StorageResult<()> {
        self.commit(SessionCommand::SignOut)?;
        tracing::info!("session cleared");
        Ok(())
    }

    fn commit(&self, command: SessionCommand) -> StorageResult<()> {
        let transition = self.current().apply(command);

        for effect in &transition.effects {
            match effect {
                Effect::PersistToken(token) => self.store.save(token)?,
                Effect::ForgetToken => {
                    self.store.remove()?;
                }
                Effect::Publish(_) => {}
            }
        }

        {
            let mut guard = self.session.write().map_err(|_| StorageError::Poisoned)?;
            *guard = transition.session;
        }

        for effect in transition.effects {
            if let Effect::Publish(event) = effect {
                self.publish(event);
            }
        }

        Ok(())
    }

    fn publish(&self, event: SessionEvent) {
        let Ok(mut subs) = self.subscribers.lock() else {
            tracing::warn!(?event, "subscriber list poisoned; event dropped");
            return;
        };

        // Drop any dead subscribers while publishing.
        subs.retain(|tx| tx.send(event).is_ok());
        tracing::debug!(?event, subscribers = subs.len(), "session event published");
    }
}

impl core::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SessionManager")
            .field("state", &self.current().state())
            .field("restored", &self.restored.load(Ordering::SeqCst))
            .finish()
    }
}
