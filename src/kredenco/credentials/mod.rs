//! Credential Manager: decides whether to accept a registration or
//! validate a login. Owns the password-protection policy and the
//! verification algorithm; talks to its two collaborators (record
//! store, secret protector) only through the traits below.

pub mod policy;

use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, instrument};

/// One registered principal. The credential is the protected form of
/// the password, never the password itself; the salt used to derive it
/// is persisted alongside so login can re-derive the same value.
#[derive(Debug, Clone)]
pub struct UserRecord {
    pub username: String,
    pub email: String,
    pub salt: Vec<u8>,
    pub credential: String,
}

/// The only record shape that leaves the Credential Manager.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct PublicUser {
    pub username: String,
    pub email: String,
}

impl From<&UserRecord> for PublicUser {
    fn from(record: &UserRecord) -> Self {
        Self {
            username: record.username.clone(),
            email: record.email.clone(),
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    /// A record with the same username already exists, the write did
    /// not happen.
    Conflict,
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("{0} is required")]
    Validation(&'static str),

    #[error("user already exists")]
    AlreadyExists,

    #[error("user not found")]
    NotFound,

    /// Uniform message: must not reveal whether the username or the
    /// password was wrong.
    #[error("invalid username or password")]
    LoginFailed,

    #[error("record store error: {0}")]
    Store(anyhow::Error),

    #[error("secret protector error: {0}")]
    Protector(anyhow::Error),
}

/// Key-value lookup and insert by username.
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn lookup(&self, username: &str) -> anyhow::Result<Option<UserRecord>>;

    /// Conditional put: must not overwrite an existing record, and must
    /// report `Conflict` when one exists. This is what makes concurrent
    /// registrations for the same username safe.
    async fn insert(&self, record: &UserRecord) -> anyhow::Result<InsertOutcome>;
}

/// Reversible protection (encrypt/decrypt) of an opaque byte blob at
/// rest, e.g. an external transit/KMS engine.
#[async_trait]
pub trait SecretProtector: Send + Sync {
    async fn protect(&self, plaintext: &[u8], context: &str) -> anyhow::Result<String>;

    async fn unprotect(&self, token: &str, context: &str) -> anyhow::Result<Vec<u8>>;
}

pub struct CredentialManager {
    store: Arc<dyn RecordStore>,
    protector: Arc<dyn SecretProtector>,
}

impl CredentialManager {
    #[must_use]
    pub fn new(store: Arc<dyn RecordStore>, protector: Arc<dyn SecretProtector>) -> Self {
        Self { store, protector }
    }

    /// Register a new user.
    ///
    /// The lookup in front of the insert keeps the common duplicate
    /// case from paying for a KDF run; correctness against the
    /// check-then-write race rests on the store's conditional insert.
    /// # Errors
    /// `Validation` on a missing field, `AlreadyExists` when the
    /// username is taken, `Store`/`Protector` on collaborator faults.
    #[instrument(skip(self, password, email))]
    pub async fn register(&self, username: &str, password: &str, email: &str) -> Result<(), Error> {
        if username.is_empty() {
            return Err(Error::Validation("username"));
        }

        if password.is_empty() {
            return Err(Error::Validation("password"));
        }

        if email.is_empty() {
            return Err(Error::Validation("email"));
        }

        if self
            .store
            .lookup(username)
            .await
            .map_err(Error::Store)?
            .is_some()
        {
            debug!("username already taken");

            return Err(Error::AlreadyExists);
        }

        // Fresh salt per registration, persisted with the record
        let salt = policy::generate_salt();

        let derived = policy::derive(password, &salt);

        let credential = self
            .protector
            .protect(&derived, username)
            .await
            .map_err(Error::Protector)?;

        let record = UserRecord {
            username: username.to_string(),
            email: email.to_string(),
            salt,
            credential,
        };

        match self.store.insert(&record).await.map_err(Error::Store)? {
            InsertOutcome::Inserted => Ok(()),
            // Lost the race against a concurrent registration
            InsertOutcome::Conflict => Err(Error::AlreadyExists),
        }
    }

    /// Validate a login and return the public fields of the record.
    /// # Errors
    /// `Validation` on a missing field, `NotFound` for an unknown
    /// username, `LoginFailed` on a credential mismatch,
    /// `Store`/`Protector` on collaborator faults.
    #[instrument(skip(self, password))]
    pub async fn login(&self, username: &str, password: &str) -> Result<PublicUser, Error> {
        if username.is_empty() {
            return Err(Error::Validation("username"));
        }

        if password.is_empty() {
            return Err(Error::Validation("password"));
        }

        let record = self
            .store
            .lookup(username)
            .await
            .map_err(Error::Store)?
            .ok_or(Error::NotFound)?;

        let stored = self
            .protector
            .unprotect(&record.credential, username)
            .await
            .map_err(Error::Protector)?;

        // Re-derive with the salt stored at registration, never a new one
        let derived = policy::derive(password, &record.salt);

        if policy::verify(&derived, &stored) {
            debug!("login successful");

            Ok(PublicUser::from(&record))
        } else {
            Err(Error::LoginFailed)
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::{InsertOutcome, RecordStore, SecretProtector, UserRecord};
    use anyhow::anyhow;
    use async_trait::async_trait;
    use base64ct::{Base64, Encoding};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, Ordering};
    use tokio::sync::Mutex;

    /// In-memory record store; the mutex makes insert a conditional
    /// put, mirroring the production `ON CONFLICT DO NOTHING`.
    #[derive(Default)]
    pub struct MemoryStore {
        records: Mutex<HashMap<String, UserRecord>>,
        pub fail_lookup: AtomicBool,
        pub force_conflict: AtomicBool,
    }

    impl MemoryStore {
        pub async fn record(&self, username: &str) -> Option<UserRecord> {
            self.records.lock().await.get(username).cloned()
        }
    }

    #[async_trait]
    impl RecordStore for MemoryStore {
        async fn lookup(&self, username: &str) -> anyhow::Result<Option<UserRecord>> {
            if self.fail_lookup.load(Ordering::SeqCst) {
                return Err(anyhow!("store unavailable"));
            }

            Ok(self.records.lock().await.get(username).cloned())
        }

        async fn insert(&self, record: &UserRecord) -> anyhow::Result<InsertOutcome> {
            if self.force_conflict.load(Ordering::SeqCst) {
                return Ok(InsertOutcome::Conflict);
            }

            let mut records = self.records.lock().await;

            if records.contains_key(&record.username) {
                return Ok(InsertOutcome::Conflict);
            }

            records.insert(record.username.clone(), record.clone());

            Ok(InsertOutcome::Inserted)
        }
    }

    /// Reversible protector double that records every plaintext it is
    /// handed, so tests can assert the raw password never reaches it.
    #[derive(Default)]
    pub struct RecordingProtector {
        pub seen_plaintexts: Mutex<Vec<Vec<u8>>>,
        pub fail_protect: AtomicBool,
        pub fail_unprotect: AtomicBool,
    }

    #[async_trait]
    impl SecretProtector for RecordingProtector {
        async fn protect(&self, plaintext: &[u8], context: &str) -> anyhow::Result<String> {
            if self.fail_protect.load(Ordering::SeqCst) {
                return Err(anyhow!("protector unavailable"));
            }

            self.seen_plaintexts.lock().await.push(plaintext.to_vec());

            Ok(format!("prot:{context}:{}", Base64::encode_string(plaintext)))
        }

        async fn unprotect(&self, token: &str, context: &str) -> anyhow::Result<Vec<u8>> {
            if self.fail_unprotect.load(Ordering::SeqCst) {
                return Err(anyhow!("protector unavailable"));
            }

            let encoded = token
                .strip_prefix(&format!("prot:{context}:"))
                .ok_or_else(|| anyhow!("token context mismatch"))?;

            Base64::decode_vec(encoded).map_err(|e| anyhow!("bad token: {e}"))
        }
    }
}
