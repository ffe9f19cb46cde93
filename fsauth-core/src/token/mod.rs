//! Identity tokens.
//!
//! A token is a compact JWS (`header.payload.signature`) signed with an
//! asymmetric key. The payload carries the subject's identity, the issuer
//! and the issue/expiry instants in Unix seconds:
//!
//! ```json
//! {"sub":"42","user":{"id":42,"name":"alice","public":false},
//!  "iss":"filesharing.auth.service","iat":1700000000,"exp":1700086400}
//! ```
//!
//! Expiry is judged against an injected [`Clock`] rather than the process
//! clock, so issuance and verification behave identically under test.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

mod clock;
mod issuer;
mod keys;
mod verifier;

pub use clock::{Clock, ManualClock, SystemClock};
pub use issuer::TokenIssuer;
pub use keys::{Algorithm, KeyMaterial, VerificationKey};
pub use verifier::TokenVerifier;

/// Issuer string stamped into every token unless configured otherwise.
pub const DEFAULT_ISSUER: &str = "filesharing.auth.service";

/// Default validity window.
pub const DEFAULT_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Token issue and verification failures.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenError {
    /// A PEM key could not be parsed or does not match its pair.
    #[error("invalid key material: {0}")]
    InvalidKey(String),
    /// The signing backend failed.
    #[error("token signing failed: {0}")]
    Signing(String),
    /// Not three non-empty segments, or a payload that does not decode.
    #[error("token is malformed")]
    Malformed,
    /// Signature, algorithm or issuer mismatch.
    #[error("token signature is invalid")]
    InvalidSignature,
    /// Past its `exp` instant.
    #[error("token has expired")]
    Expired,
}

/// The subject a token vouches for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Directory id.
    pub id: i64,
    /// Unique user name.
    pub name: String,
    /// Whether the user opted into public lookup.
    pub public: bool,
}

/// Decoded token payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Decimal user id; always equal to `user.id`.
    pub sub: String,
    /// The identity the token vouches for.
    pub user: Identity,
    /// Issuer name.
    pub iss: String,
    /// Issued at, Unix seconds.
    pub iat: i64,
    /// Expires at, Unix seconds. The token is invalid from this instant on.
    pub exp: i64,
}

impl Claims {
    /// `iat` as a timestamp, if in range.
    pub fn issued_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.iat, 0)
    }

    /// `exp` as a timestamp, if in range.
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.exp, 0)
    }
}

/// An encoded token together with the instant it stops being valid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedToken {
    /// Compact JWS.
    pub value: String,
    /// Same instant as the `exp` claim.
    pub expires_at: DateTime<Utc>,
}

/// Validity window and issuer name applied to new tokens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenSettings {
    /// Validity window of each token.
    pub ttl: Duration,
    /// Value of the `iss` claim.
    pub issuer: String,
}

impl Default for TokenSettings {
    fn default() -> Self {
        Self {
            ttl: DEFAULT_TTL,
            issuer: DEFAULT_ISSUER.to_string(),
        }
    }
}

#[cfg(test)]
pub(crate) mod test_keys {
    pub const ED25519_PRIVATE: &str =
        include_str!("../../tests/fixtures/ed25519_private.pem");
    pub const ED25519_PUBLIC: &str =
        include_str!("../../tests/fixtures/ed25519_public.pem");
    pub const OTHER_ED25519_PRIVATE: &str =
        include_str!("../../tests/fixtures/other_ed25519_private.pem");
    pub const OTHER_ED25519_PUBLIC: &str =
        include_str!("../../tests/fixtures/other_ed25519_public.pem");
    pub const RSA_PRIVATE: &str =
        include_str!("../../tests/fixtures/rsa_private.pem");
    pub const RSA_PUBLIC: &str =
        include_str!("../../tests/fixtures/rsa_public.pem");
}
