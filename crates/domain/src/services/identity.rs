//! Identity provider abstraction (e-mail/password accounts).

use std::collections::HashMap;
use std::sync::Mutex;

use thiserror::Error;
use uuid::Uuid;

use crate::error::DomainError;
use shared::validation::normalize_email;

/// Error type for identity provider calls.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum IdentityError {
    #[error("An account with this email already exists")]
    EmailExists,

    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Password rejected: {0}")]
    WeakPassword(String),

    #[error("Identity provider network error: {0}")]
    Network(String),

    #[error("Identity provider error: {0}")]
    Provider(String),
}

impl From<IdentityError> for DomainError {
    fn from(err: IdentityError) -> Self {
        match err {
            IdentityError::EmailExists | IdentityError::WeakPassword(_) => {
                DomainError::Validation(err.to_string())
            }
            IdentityError::InvalidCredentials => DomainError::Authorization(err.to_string()),
            IdentityError::Network(_) | IdentityError::Provider(_) => {
                DomainError::Upstream(err.to_string())
            }
        }
    }
}

/// Signed-in account as reported by the provider.
#[derive(Clone, PartialEq, Eq)]
pub struct IdentitySession {
    pub uid: String,
    pub email: String,
    /// Provider token, needed for follow-up calls such as verification mail.
    pub id_token: String,
    pub email_verified: bool,
}

impl std::fmt::Debug for IdentitySession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentitySession")
            .field("uid", &self.uid)
            .field("email", &self.email)
            .field("id_token", &"[REDACTED]")
            .field("email_verified", &self.email_verified)
            .finish()
    }
}

#[async_trait::async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn sign_up(&self, email: &str, password: &str) -> Result<IdentitySession, IdentityError>;

    async fn send_email_verification(&self, session: &IdentitySession)
        -> Result<(), IdentityError>;

    /// Signs in and reports whether the e-mail has been verified.
    async fn sign_in(&self, email: &str, password: &str) -> Result<IdentitySession, IdentityError>;
}

#[derive(Debug, Clone)]
struct MockAccount {
    uid: String,
    password: String,
    verified: bool,
}

/// Mock identity provider for development and testing.
///
/// Keeps accounts in memory. Verification mail is "sent" by logging; tests
/// mark accounts verified with [`MockIdentityProvider::mark_verified`].
#[derive(Debug, Default)]
pub struct MockIdentityProvider {
    accounts: Mutex<HashMap<String, MockAccount>>,
    /// Verify accounts as soon as the verification mail is sent.
    pub auto_verify: bool,
    /// Whether to simulate provider outages.
    pub simulate_failure: bool,
}

impl MockIdentityProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Provider that treats every verification mail as clicked.
    pub fn auto_verifying() -> Self {
        Self {
            auto_verify: true,
            ..Self::default()
        }
    }

    pub fn failing() -> Self {
        Self {
            simulate_failure: true,
            ..Self::default()
        }
    }

    pub fn mark_verified(&self, email: &str) -> bool {
        self.accounts
            .lock()
            .ok()
            .and_then(|mut accounts| {
                accounts
                    .get_mut(&normalize_email(email))
                    .map(|account| account.verified = true)
            })
            .is_some()
    }

    fn outage(&self) -> Result<(), IdentityError> {
        if self.simulate_failure {
            tracing::warn!("Mock identity provider simulating failure");
            return Err(IdentityError::Network("Simulated failure".to_string()));
        }
        Ok(())
    }

    fn lock(
        &self,
    ) -> Result<std::sync::MutexGuard<'_, HashMap<String, MockAccount>>, IdentityError> {
        self.accounts
            .lock()
            .map_err(|_| IdentityError::Provider("mock account table poisoned".to_string()))
    }
}

#[async_trait::async_trait]
impl IdentityProvider for MockIdentityProvider {
    async fn sign_up(&self, email: &str, password: &str) -> Result<IdentitySession, IdentityError> {
        self.outage()?;
        if password.len() < 6 {
            return Err(IdentityError::WeakPassword(
                "Password should be at least 6 characters".to_string(),
            ));
        }

        let email = normalize_email(email);
        let mut accounts = self.lock()?;
        if accounts.contains_key(&email) {
            return Err(IdentityError::EmailExists);
        }

        let uid = Uuid::new_v4().simple().to_string();
        accounts.insert(
            email.clone(),
            MockAccount {
                uid: uid.clone(),
                password: password.to_string(),
                verified: false,
            },
        );
        tracing::info!(email = %email, uid = %uid, "Mock: Would create account");

        Ok(IdentitySession {
            id_token: format!("mock-id-token-{}", uid),
            uid,
            email,
            email_verified: false,
        })
    }

    async fn send_email_verification(
        &self,
        session: &IdentitySession,
    ) -> Result<(), IdentityError> {
        self.outage()?;
        tracing::info!(email = %session.email, "Mock: Would send verification email");
        if self.auto_verify {
            let mut accounts = self.lock()?;
            if let Some(account) = accounts.get_mut(&session.email) {
                account.verified = true;
            }
        }
        Ok(())
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<IdentitySession, IdentityError> {
        self.outage()?;
        let email = normalize_email(email);
        let accounts = self.lock()?;
        match accounts.get(&email) {
            Some(account) if account.password == password => Ok(IdentitySession {
                uid: account.uid.clone(),
                id_token: format!("mock-id-token-{}", account.uid),
                email,
                email_verified: account.verified,
            }),
            _ => Err(IdentityError::InvalidCredentials),
        }
    }
}
