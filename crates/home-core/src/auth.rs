//! Authentication contract and friendly error mapping

use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;
use thiserror::Error;

/// User id recorded for mutations made without a signed-in user
pub const ANONYMOUS_USER: &str = "anonymous";

/// User id recorded for entries written by the panel itself
pub const SYSTEM_USER: &str = "system";

/// Minimum accepted password length for [`InMemoryAuthenticator`]
pub const MIN_PASSWORD_LEN: usize = 6;

/// Which authentication call failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthOperation {
    Login,
    Register,
    Logout,
}

/// Raw error reported by an identity provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderError {
    /// Provider error code, e.g. `auth/invalid-email`
    pub code: String,
    pub message: String,
}

impl ProviderError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

/// Authentication errors as shown to users
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("Network error. Please check your internet connection.")]
    Network,

    #[error("An account with this email already exists.")]
    EmailInUse,

    #[error("Invalid email address.")]
    InvalidEmail,

    #[error("Password is too weak. Please use a stronger password.")]
    WeakPassword,

    /// Provider error without a friendly mapping, passed through as-is
    #[error("{message} ({code})")]
    Provider { code: String, message: String },
}

impl AuthError {
    /// Map a provider error to the message shown for `operation`.
    ///
    /// Network failures are mapped for every operation; duplicate account,
    /// invalid email and weak password only for registration.
    #[must_use]
    pub fn from_provider(operation: AuthOperation, error: ProviderError) -> Self {
        match (operation, error.code.as_str()) {
            (_, "auth/network-request-failed") => Self::Network,
            (AuthOperation::Register, "auth/email-already-in-use") => Self::EmailInUse,
            (AuthOperation::Register, "auth/invalid-email") => Self::InvalidEmail,
            (AuthOperation::Register, "auth/weak-password") => Self::WeakPassword,
            _ => Self::Provider {
                code: error.code,
                message: error.message,
            },
        }
    }
}

/// Supplies the acting user and pass-through account operations
#[async_trait]
pub trait Authenticator: Send + Sync {
    /// Id of the signed-in user, if any
    fn current_user(&self) -> Option<String>;

    /// Sign in, returning the user id
    async fn login(&self, email: &str, password: &str) -> Result<String, AuthError>;

    /// Create an account and sign in, returning the user id
    async fn register(&self, email: &str, password: &str) -> Result<String, AuthError>;

    /// Sign out
    async fn logout(&self) -> Result<(), AuthError>;
}

struct Account {
    uid: String,
    password: String,
}

/// Process-local accounts for tests and local development
#[derive(Default)]
pub struct InMemoryAuthenticator {
    /// Accounts keyed by lowercase email
    accounts: DashMap<String, Account>,
    current: RwLock<Option<String>>,
    offline: AtomicBool,
}

impl InMemoryAuthenticator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate loss of connectivity: every call fails with a network error
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    fn check_online(&self) -> Result<(), ProviderError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(ProviderError::new(
                "auth/network-request-failed",
                "A network error has occurred.",
            ));
        }
        Ok(())
    }

    fn set_current(&self, uid: Option<String>) {
        match self.current.write() {
            Ok(mut current) => *current = uid,
            Err(poisoned) => *poisoned.into_inner() = uid,
        }
    }

    fn provider_register(&self, email: &str, password: &str) -> Result<String, ProviderError> {
        self.check_online()?;
        let key = email.trim().to_lowercase();
        let valid_email = key
            .split_once('@')
            .is_some_and(|(user, domain)| !user.is_empty() && domain.contains('.'));
        if !valid_email {
            return Err(ProviderError::new("auth/invalid-email", "The email address is badly formatted."));
        }
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(ProviderError::new(
                "auth/weak-password",
                "Password should be at least 6 characters.",
            ));
        }

        let uid = match self.accounts.entry(key) {
            dashmap::mapref::entry::Entry::Occupied(_) => {
                return Err(ProviderError::new(
                    "auth/email-already-in-use",
                    "The email address is already in use by another account.",
                ))
            }
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                let uid = uuid::Uuid::new_v4().simple().to_string();
                slot.insert(Account {
                    uid: uid.clone(),
                    password: password.to_string(),
                });
                uid
            }
        };
        self.set_current(Some(uid.clone()));
        Ok(uid)
    }

    fn provider_login(&self, email: &str, password: &str) -> Result<String, ProviderError> {
        self.check_online()?;
        let account = self
            .accounts
            .get(&email.trim().to_lowercase())
            .ok_or_else(|| ProviderError::new("auth/user-not-found", "There is no user record for this email."))?;
        if account.password != password {
            return Err(ProviderError::new("auth/wrong-password", "The password is invalid."));
        }
        let uid = account.uid.clone();
        drop(account);

        self.set_current(Some(uid.clone()));
        Ok(uid)
    }
}

#[async_trait]
impl Authenticator for InMemoryAuthenticator {
    fn current_user(&self) -> Option<String> {
        match self.current.read() {
            Ok(current) => current.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    async fn login(&self, email: &str, password: &str) -> Result<String, AuthError> {
        let uid = self
            .provider_login(email, password)
            .map_err(|e| AuthError::from_provider(AuthOperation::Login, e))?;
        tracing::info!("User {} signed in", uid);
        Ok(uid)
    }

    async fn register(&self, email: &str, password: &str) -> Result<String, AuthError> {
        let uid = self
            .provider_register(email, password)
            .map_err(|e| AuthError::from_provider(AuthOperation::Register, e))?;
        tracing::info!("Registered user {}", uid);
        Ok(uid)
    }

    async fn logout(&self) -> Result<(), AuthError> {
        self.check_online()
            .map_err(|e| AuthError::from_provider(AuthOperation::Logout, e))?;
        self.set_current(None);
        Ok(())
    }
}
