use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;

use super::{AuthError, AuthProvider};
use crate::model::Session;

const MIN_PASSWORD_LEN: usize = 6;

struct Account {
    user_id: String,
    password: String,
    username: String,
}

/// In-process account registry for tests and `AUTH_BACKEND=memory`.
///
/// Applies the same rules a hosted provider reports back: malformed emails,
/// short passwords, duplicate accounts, unknown accounts and wrong passwords.
/// Every call is counted so tests can tell whether a request was issued.
#[derive(Default)]
pub struct MemoryAuthProvider {
    accounts: Mutex<HashMap<String, Account>>,
    sign_in_calls: AtomicUsize,
    register_calls: AtomicUsize,
    sign_out_calls: AtomicUsize,
}

impl MemoryAuthProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sign_in_calls(&self) -> usize {
        self.sign_in_calls.load(Ordering::SeqCst)
    }

    pub fn register_calls(&self) -> usize {
        self.register_calls.load(Ordering::SeqCst)
    }

    pub fn sign_out_calls(&self) -> usize {
        self.sign_out_calls.load(Ordering::SeqCst)
    }
}

fn is_valid_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty() && domain.contains('.') && !domain.starts_with('.')
        }
        None => false,
    }
}

fn session_for(email: &str, account: &Account) -> Session {
    Session::new(&account.user_id, email).with_display_name(&account.username)
}

#[async_trait]
impl AuthProvider for MemoryAuthProvider {
    async fn register(
        &self,
        email: &str,
        password: &str,
        username: &str,
    ) -> Result<Session, AuthError> {
        self.register_calls.fetch_add(1, Ordering::SeqCst);
        let email = email.trim().to_lowercase();
        if !is_valid_email(&email) {
            return Err(AuthError::InvalidEmail);
        }
        if password.len() < MIN_PASSWORD_LEN {
            return Err(AuthError::WeakPassword);
        }

        let mut accounts = self.accounts.lock();
        if accounts.contains_key(&email) {
            return Err(AuthError::EmailAlreadyInUse);
        }
        let account = Account {
            user_id: uuid::Uuid::new_v4().to_string(),
            password: password.to_string(),
            username: username.to_string(),
        };
        let session = session_for(&email, &account);
        accounts.insert(email, account);
        Ok(session)
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, AuthError> {
        self.sign_in_calls.fetch_add(1, Ordering::SeqCst);
        let email = email.trim().to_lowercase();
        if !is_valid_email(&email) {
            return Err(AuthError::InvalidEmail);
        }

        let accounts = self.accounts.lock();
        let account = accounts.get(&email).ok_or(AuthError::UserNotFound)?;
        if account.password != password {
            return Err(AuthError::WrongPassword);
        }
        Ok(session_for(&email, account))
    }

    async fn sign_out(&self, _session: &Session) -> Result<(), AuthError> {
        self.sign_out_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
