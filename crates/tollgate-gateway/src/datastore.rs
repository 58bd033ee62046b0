//! Credential store used by the login and register handlers.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use tollgate_auth::DEFAULT_LANGUAGE;

/// Datastore errors.
#[derive(Debug, Error)]
pub enum DatastoreError {
    /// An account with the e-mail already exists.
    #[error("an account using that email already exists")]
    DuplicateEmail,

    /// Password hashing failed.
    #[error("password hashing failed: {0}")]
    Hash(#[from] bcrypt::BcryptError),

    /// Backend failure.
    #[error("datastore backend error: {0}")]
    Backend(String),
}

/// Stored login data for one account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    /// Account id, used as the token subject.
    pub subject_id: i64,
    /// bcrypt hash of the password.
    pub password_hash: String,
    /// Preferred language.
    pub language: String,
}

/// A new account.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Registration {
    /// E-mail, unique per account.
    #[serde(default)]
    pub email: String,
    /// Plain-text password.
    #[serde(default)]
    pub pass: String,
    /// Optional first name.
    #[serde(default)]
    pub first_name: String,
    /// Last name.
    #[serde(default)]
    pub last_name: String,
}

/// Account storage.
#[async_trait]
pub trait Datastore: Send + Sync {
    /// Credentials for `email`, if an account exists.
    async fn lookup_credentials(&self, email: &str) -> Result<Option<Credentials>, DatastoreError>;

    /// Create an account and return its id.
    async fn register(&self, registration: Registration) -> Result<i64, DatastoreError>;
}

/// A stored account.
#[derive(Debug, Clone)]
pub struct Account {
    /// Login data.
    pub credentials: Credentials,
    /// First name, possibly empty.
    pub first_name: String,
    /// Last name.
    pub last_name: String,
}

/// In-process [`Datastore`].
///
/// Ids increase from 1. New accounts get the default language.
#[derive(Debug)]
pub struct MemoryDatastore {
    accounts: RwLock<HashMap<String, Account>>,
    next_id: AtomicI64,
    hash_cost: u32,
}

impl MemoryDatastore {
    /// Empty store hashing at bcrypt's default cost.
    pub fn new() -> Self {
        Self::with_hash_cost(bcrypt::DEFAULT_COST)
    }

    /// Empty store hashing at `cost`.
    pub fn with_hash_cost(cost: u32) -> Self {
        Self {
            accounts: RwLock::new(HashMap::new()),
            next_id: AtomicI64::new(1),
            hash_cost: cost,
        }
    }

    /// Seed an account with a given language.
    pub async fn with_user(
        self,
        email: &str,
        pass: &str,
        language: &str,
    ) -> Result<Self, DatastoreError> {
        self.register(Registration {
            email: email.to_string(),
            pass: pass.to_string(),
            first_name: String::new(),
            last_name: "Seed".to_string(),
        })
        .await?;
        if let Some(account) = self.accounts.write().get_mut(email) {
            account.credentials.language = language.to_string();
        }
        Ok(self)
    }

    /// Account stored under `email`.
    pub fn account(&self, email: &str) -> Option<Account> {
        self.accounts.read().get(email).cloned()
    }

    /// Number of accounts.
    pub fn len(&self) -> usize {
        self.accounts.read().len()
    }

    /// `true` if no accounts exist.
    pub fn is_empty(&self) -> bool {
        self.accounts.read().is_empty()
    }
}

impl Default for MemoryDatastore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Datastore for MemoryDatastore {
    async fn lookup_credentials(&self, email: &str) -> Result<Option<Credentials>, DatastoreError> {
        Ok(self
            .accounts
            .read()
            .get(email)
            .map(|account| account.credentials.clone()))
    }

    async fn register(&self, registration: Registration) -> Result<i64, DatastoreError> {
        if self.accounts.read().contains_key(&registration.email) {
            return Err(DatastoreError::DuplicateEmail);
        }

        let cost = self.hash_cost;
        let pass = registration.pass;
        let password_hash = tokio::task::spawn_blocking(move || bcrypt::hash(pass, cost))
            .await
            .map_err(|e| DatastoreError::Backend(format!("hashing task failed: {e}")))??;

        // Re-check under the write lock; another registration may have won.
        let mut accounts = self.accounts.write();
        if accounts.contains_key(&registration.email) {
            return Err(DatastoreError::DuplicateEmail);
        }

        let subject_id = self.next_id.fetch_add(1, Ordering::Relaxed);
        accounts.insert(
            registration.email,
            Account {
                credentials: Credentials {
                    subject_id,
                    password_hash,
                    language: DEFAULT_LANGUAGE.to_string(),
                },
                first_name: registration.first_name,
                last_name: registration.last_name,
            },
        );
        debug!(subject_id, "registered account");

        Ok(subject_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registration(email: &str) -> Registration {
        Registration {
            email: email.to_string(),
            pass: "hunter2".to_string(),
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
        }
    }

    #[tokio::test]
    async fn test_register_and_lookup() {
        let store = MemoryDatastore::with_hash_cost(4);
        let id = store.register(registration("ada@example.com")).await.unwrap();
        assert_eq!(id, 1);

        let creds = store.lookup_credentials("ada@example.com").await.unwrap().unwrap();
        assert_eq!(creds.subject_id, 1);
        assert_eq!(creds.language, "en");
        assert_ne!(creds.password_hash, "hunter2");
        assert!(bcrypt::verify("hunter2", &creds.password_hash).unwrap());
    }

    #[tokio::test]
    async fn test_ids_increase() {
        let store = MemoryDatastore::with_hash_cost(4);
        let a = store.register(registration("a@example.com")).await.unwrap();
        let b = store.register(registration("b@example.com")).await.unwrap();
        assert_eq!((a, b), (1, 2));
        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn test_duplicate_email() {
        let store = MemoryDatastore::with_hash_cost(4);
        store.register(registration("a@example.com")).await.unwrap();
        let err = store.register(registration("a@example.com")).await.unwrap_err();
        assert!(matches!(err, DatastoreError::DuplicateEmail));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_unknown_email() {
        let store = MemoryDatastore::with_hash_cost(4);
        assert!(store.is_empty());
        assert!(store.lookup_credentials("nobody@example.com").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_seeded_language() {
        let store = MemoryDatastore::with_hash_cost(4)
            .with_user("de@example.com", "pw", "de")
            .await
            .unwrap();
        let creds = store.lookup_credentials("de@example.com").await.unwrap().unwrap();
        assert_eq!(creds.language, "de");
    }

    #[test]
    fn test_registration_json() {
        let r: Registration = serde_json::from_str(
            r#"{"email":"a@b.co","pass":"x","firstName":"A","lastName":"B"}"#,
        )
        .unwrap();
        assert_eq!(r.first_name, "A");
        assert_eq!(r.last_name, "B");
    }

    #[tokio::test]
    async fn test_names_are_stored() {
        let store = MemoryDatastore::with_hash_cost(4);
        store.register(registration("ada@example.com")).await.unwrap();
        let account = store.account("ada@example.com").unwrap();
        assert_eq!(account.first_name, "Ada");
        assert_eq!(account.last_name, "Lovelace");
    }
}
