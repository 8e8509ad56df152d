//! Authentication boundary collaborators
//!
//! User storage, password hashing and token issuance are external
//! concerns; the risk pipeline only touches them at this seam. The
//! provided implementations are thin KV-backed stand-ins: a salted
//! digest directory and opaque session tokens with a 24 hour TTL.

use crate::models::{Location, LoginAttempt, Session, UserRecord};
use crate::persistence::{self, KeyValueStore, PersistenceError};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum DirectoryError {
    #[error("User already exists")]
    AlreadyExists,

    #[error(transparent)]
    Store(#[from] PersistenceError),
}

/// External user directory, consumed by the login flow.
pub trait UserDirectory: Send + Sync {
    fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>, PersistenceError>;

    /// `Some(user)` when the credentials match.
    fn verify_credentials(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Option<UserRecord>, PersistenceError>;

    /// Update last-login bookkeeping after a successful login. The
    /// stored login time and location become the geo-velocity reference
    /// for the identity's next attempt.
    fn record_login_success(
        &self,
        email: &str,
        timestamp: i64,
        location: Option<&Location>,
    ) -> Result<(), PersistenceError>;
}

/// Keyed-store directory holding `user:<email>` records with salted
/// SHA-256 password digests.
pub struct KvUserDirectory {
    store: Arc<dyn KeyValueStore>,
    salt: String,
}

impl KvUserDirectory {
    pub fn new(store: Arc<dyn KeyValueStore>, salt: impl Into<String>) -> Self {
        KvUserDirectory {
            store,
            salt: salt.into(),
        }
    }

    fn user_key(email: &str) -> String {
        format!("user:{}", email)
    }

    pub fn hash_password(&self, password: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(password.as_bytes());
        hasher.update(self.salt.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    /// Provision a new user (ops path, used by the CLI).
    pub fn create_user(
        &self,
        email: &str,
        password: &str,
        now: i64,
    ) -> Result<UserRecord, DirectoryError> {
        if self.find_by_email(email)?.is_some() {
            return Err(DirectoryError::AlreadyExists);
        }

        let user = UserRecord {
            id: Uuid::new_v4().to_string(),
            email: email.to_string(),
            password_hash: self.hash_password(password),
            created_at: now,
            last_login: None,
            last_location: None,
        };
        persistence::put_json(self.store.as_ref(), &Self::user_key(email), &user, None)?;
        Ok(user)
    }
}

impl UserDirectory for KvUserDirectory {
    fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>, PersistenceError> {
        persistence::get_json(self.store.as_ref(), &Self::user_key(email))
    }

    fn verify_credentials(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Option<UserRecord>, PersistenceError> {
        let user = match self.find_by_email(email)? {
            Some(user) => user,
            None => return Ok(None),
        };

        if user.password_hash == self.hash_password(password) {
            Ok(Some(user))
        } else {
            Ok(None)
        }
    }

    fn record_login_success(
        &self,
        email: &str,
        timestamp: i64,
        location: Option<&Location>,
    ) -> Result<(), PersistenceError> {
        if let Some(mut user) = self.find_by_email(email)? {
            user.last_login = Some(timestamp);
            if let Some(location) = location {
                user.last_location = Some(location.clone());
            }
            persistence::put_json(self.store.as_ref(), &Self::user_key(email), &user, None)?;
        }
        Ok(())
    }
}

/// Issues opaque bearer tokens backed by TTL-expiring session records.
pub struct SessionIssuer {
    store: Arc<dyn KeyValueStore>,
    ttl_seconds: i64,
}

impl SessionIssuer {
    pub fn new(store: Arc<dyn KeyValueStore>, ttl_seconds: i64) -> Self {
        SessionIssuer { store, ttl_seconds }
    }

    /// Create a session for a verified login. The session id is the
    /// bearer token returned to the client.
    pub fn issue(
        &self,
        user: &UserRecord,
        attempt: &LoginAttempt,
    ) -> Result<Session, PersistenceError> {
        let session = Session {
            id: Uuid::new_v4().to_string(),
            user_id: user.id.clone(),
            created_at: attempt.timestamp,
            expires_at: attempt.timestamp + self.ttl_seconds,
            ip_address: attempt.ip_address.clone(),
            user_agent: attempt.user_agent.clone(),
            device_fingerprint: attempt.device_fingerprint.clone(),
        };

        persistence::put_json(
            self.store.as_ref(),
            &format!("session:{}", session.id),
            &session,
            Some(self.ttl_seconds),
        )?;
        Ok(session)
    }
}
