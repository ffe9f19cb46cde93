//! Durable user and email storage.
//!
//! The [`Directory`] trait is the capability the orchestrator depends on.
//! [`PostgresDirectory`] is the production backend; [`MemoryDirectory`]
//! keeps everything in process and is used for tests and local runs.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::password::PasswordHash;
use crate::token::Identity;

mod memory;
#[cfg(feature = "database")]
mod postgres;

pub use memory::MemoryDirectory;
#[cfg(feature = "database")]
#[cfg_attr(docsrs, doc(cfg(feature = "database")))]
pub use postgres::PostgresDirectory;

/// Storage failures and lookup misses.
#[derive(Debug, Error)]
pub enum DirectoryError {
    /// No matching user.
    #[error("record not found")]
    NotFound,
    /// A unique constraint rejected the write. `what` names the field.
    #[error("{what} already exists")]
    AlreadyExists {
        /// `"name"` or `"email"`.
        what: &'static str,
    },
    /// Anything else the backend reports.
    #[error("storage failure: {0:#}")]
    Storage(#[from] anyhow::Error),
}

/// A persisted user with its email rows, in insertion order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    /// Assigned by the directory.
    pub id: i64,
    /// Unique user name.
    pub name: String,
    /// `None` when the account was created without a password. Such an
    /// account can never authenticate with a password.
    pub password_hash: Option<PasswordHash>,
    /// Whether the user opted into public lookup.
    pub public: bool,
    /// Creation instant.
    pub created_at: DateTime<Utc>,
    /// Email rows, in insertion order.
    pub emails: Vec<Email>,
}

impl User {
    /// The claims-facing subset of the user.
    pub fn identity(&self) -> Identity {
        Identity {
            id: self.id,
            name: self.name.clone(),
            public: self.public,
        }
    }

    /// The address flagged primary, if any.
    pub fn primary_email(&self) -> Option<&Email> {
        self.emails.iter().find(|email| email.is_primary)
    }
}

/// A stored email address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Email {
    /// Assigned by the directory.
    pub id: i64,
    /// Unique address.
    pub address: String,
    /// Whether this is the user's primary address.
    pub is_primary: bool,
    /// Whether the address has been verified.
    pub is_verified: bool,
    /// Opaque code sent for address verification. May be empty.
    pub verification_code: String,
}

/// Input to [`Directory::create`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    /// Unique user name.
    pub name: String,
    /// `None` creates an account that cannot log in with a password.
    pub password_hash: Option<PasswordHash>,
    /// Whether the user opts into public lookup.
    pub public: bool,
    /// Upserted by address in the same transaction as the user.
    pub emails: Vec<NewEmail>,
}

/// An email address to attach to a new user.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NewEmail {
    /// Unique address.
    pub address: String,
    /// Whether this is the primary address.
    #[serde(default)]
    pub is_primary: bool,
    /// Whether the address is already verified.
    #[serde(default)]
    pub is_verified: bool,
    /// Verification code, empty when none was sent.
    #[serde(default)]
    pub verification_code: String,
}

impl NewEmail {
    /// An unverified, non-primary address.
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            ..Self::default()
        }
    }

    /// Mark as the primary address.
    pub fn primary(mut self) -> Self {
        self.is_primary = true;
        self
    }
}

/// User and email storage.
///
/// Implementations must make [`create`](Directory::create) all-or-nothing
/// and report unique-constraint violations as
/// [`DirectoryError::AlreadyExists`]. Dropping a pending future must not
/// leave a partial write behind.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Directory: Send + Sync {
    /// Exact match on the user name.
    async fn find_by_name(&self, name: &str) -> Result<User, DirectoryError>;

    /// Resolve an email address to its owning user.
    async fn find_by_email(&self, address: &str) -> Result<User, DirectoryError>;

    /// Insert the user and upsert its emails in one atomic unit. Returns
    /// the stored user with ids assigned.
    async fn create(&self, user: NewUser) -> Result<User, DirectoryError>;

    /// Every user with `public = true`, ordered by name.
    async fn list_public_users(&self) -> Result<Vec<User>, DirectoryError>;
}
