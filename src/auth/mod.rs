//! Authentication gateway.
//!
//! [`AuthGateway`] owns the session of one browser tab. It forwards credential
//! operations to an [`AuthProvider`] and tells subscribers about every session
//! transition (sign-in, registration, sign-out).

use std::sync::{Arc, Weak};

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::model::Session;

mod cognito;
mod memory;

pub use cognito::CognitoAuthProvider;
pub use memory::MemoryAuthProvider;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("auth/user-not-found")]
    UserNotFound,

    #[error("auth/wrong-password")]
    WrongPassword,

    #[error("auth/email-already-in-use")]
    EmailAlreadyInUse,

    #[error("auth/invalid-email")]
    InvalidEmail,

    #[error("auth/weak-password")]
    WeakPassword,

    #[error("{0}")]
    Other(String),
}

#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// Creates an account and returns a signed-in session for it.
    async fn register(
        &self,
        email: &str,
        password: &str,
        username: &str,
    ) -> Result<Session, AuthError>;

    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, AuthError>;

    /// Revokes the session at the provider.
    async fn sign_out(&self, session: &Session) -> Result<(), AuthError>;
}

type Callback = Box<dyn FnMut(Option<&Session>) + Send>;

struct Subscriber {
    id: u64,
    callback: Callback,
}

#[derive(Default)]
struct Subscribers {
    next_id: u64,
    entries: Vec<Subscriber>,
}

#[derive(Clone)]
pub struct AuthGateway {
    provider: Arc<dyn AuthProvider>,
    session: Arc<Mutex<Option<Session>>>,
    subscribers: Arc<Mutex<Subscribers>>,
}

impl AuthGateway {
    pub fn new(provider: Arc<dyn AuthProvider>) -> Self {
        Self {
            provider,
            session: Arc::new(Mutex::new(None)),
            subscribers: Arc::new(Mutex::new(Subscribers::default())),
        }
    }

    pub async fn register(
        &self,
        email: &str,
        password: &str,
        username: &str,
    ) -> Result<Session, AuthError> {
        let session = self.provider.register(email, password, username).await?;
        tracing::info!(user_id = %session.user_id, "registered new account");
        self.transition(Some(session.clone()));
        Ok(session)
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> Result<Session, AuthError> {
        let session = self.provider.sign_in(email, password).await?;
        tracing::info!(user_id = %session.user_id, "signed in");
        self.transition(Some(session.clone()));
        Ok(session)
    }

    /// Clears the local session, then revokes it at the provider. Revocation
    /// failures are logged only; the tab is signed out either way.
    pub async fn sign_out(&self) {
        let Some(session) = self.session.lock().take() else {
            return;
        };
        self.transition(None);
        tracing::info!(user_id = %session.user_id, "signed out");

        if let Err(err) = self.provider.sign_out(&session).await {
            tracing::warn!(error = %err, "provider sign-out failed");
        }
    }

    pub fn current_user(&self) -> Option<Session> {
        self.session.lock().clone()
    }

    /// Calls `callback` right away with the current session and again on every
    /// transition until the returned handle is unsubscribed.
    ///
    /// Callbacks run while the subscriber list is locked and must not
    /// subscribe or unsubscribe from inside the callback.
    pub fn subscribe<F>(&self, callback: F) -> AuthSubscription
    where
        F: FnMut(Option<&Session>) + Send + 'static,
    {
        let mut callback: Callback = Box::new(callback);
        let current = self.current_user();
        callback(current.as_ref());

        let mut subscribers = self.subscribers.lock();
        let id = subscribers.next_id;
        subscribers.next_id += 1;
        subscribers.entries.push(Subscriber { id, callback });

        AuthSubscription {
            id,
            subscribers: Arc::downgrade(&self.subscribers),
        }
    }

    fn transition(&self, next: Option<Session>) {
        *self.session.lock() = next.clone();
        let mut subscribers = self.subscribers.lock();
        for subscriber in subscribers.entries.iter_mut() {
            (subscriber.callback)(next.as_ref());
        }
    }
}

/// Handle returned by [`AuthGateway::subscribe`]. Dropping it keeps the
/// subscription alive.
#[must_use = "an AuthSubscription can only be cancelled through its handle"]
pub struct AuthSubscription {
    id: u64,
    subscribers: Weak<Mutex<Subscribers>>,
}

impl AuthSubscription {
    pub fn unsubscribe(self) {
        if let Some(subscribers) = self.subscribers.upgrade() {
            subscribers.lock().entries.retain(|s| s.id != self.id);
        }
    }
}
