//! # fsauth Core
//!
//! Identity primitives for the file-sharing platform: user registration,
//! credential verification and signed identity tokens that downstream
//! services trust without re-checking a password.
//!
//! ## Overview
//!
//! - **Password hashing**: Argon2id with a server-side pepper ([`password`])
//! - **Tokens**: asymmetric JWTs (Ed25519 or RS256) with an injected clock
//!   ([`token`])
//! - **Credential directory**: users and their email rows behind the
//!   [`directory::Directory`] capability, with PostgreSQL and in-memory
//!   backends
//! - **Orchestration**: the register / authenticate / public lookup
//!   operations and their business outcomes ([`service`])
//!
//! ## Feature Flags
//!
//! - `database` (default): PostgreSQL directory and embedded migrations
//!
//! ## Examples
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use fsauth_core::{
//!     directory::MemoryDirectory,
//!     password::PasswordCrypto,
//!     service::{AuthService, CallContext, CreateUserRequest},
//!     token::{Algorithm, KeyMaterial, SystemClock, TokenIssuer, TokenSettings},
//! };
//!
//! async fn register(
//!     private_pem: &str,
//!     public_pem: &str,
//! ) -> Result<(), Box<dyn std::error::Error>> {
//!     let keys = KeyMaterial::from_pem(Algorithm::EdDsa, private_pem, public_pem)?;
//!     let issuer = TokenIssuer::new(
//!         &keys,
//!         TokenSettings::default(),
//!         Arc::new(SystemClock),
//!     );
//!     let service = AuthService::new(
//!         Arc::new(MemoryDirectory::new()),
//!         Arc::new(PasswordCrypto::new("pepper")?),
//!         Arc::new(issuer),
//!     )?;
//!
//!     let outcome = service
//!         .create_user(
//!             &CallContext::default(),
//!             CreateUserRequest::new("alice", "correct horse", false),
//!         )
//!         .await?;
//!     println!("register: {:?}", outcome.status());
//!     Ok(())
//! }
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]

/// Credential directory: users, emails and storage backends
pub mod directory;

/// Argon2id password hashing and verification
pub mod password;

/// Auth orchestrator exposing the RPC-level operations
pub mod service;

/// Identity token issuance and verification
pub mod token;

/// Embedded schema migrations for the PostgreSQL directory.
#[cfg(feature = "database")]
#[cfg_attr(docsrs, doc(cfg(feature = "database")))]
pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

pub use directory::{Directory, DirectoryError, Email, NewUser, User};
pub use password::{PasswordCrypto, PasswordError, PasswordHash};
pub use service::{AuthService, AuthServiceError, AuthStatus, CallContext};
pub use token::{Claims, Identity, IssuedToken, TokenError};
