use std::fmt;
use std::str::FromStr;

use jsonwebtoken::{DecodingKey, EncodingKey, crypto};
use serde::{Deserialize, Serialize};

use super::TokenError;

/// Signature schemes accepted for identity tokens.
///
/// Only asymmetric schemes: downstream services hold the public half and
/// must never be able to mint tokens themselves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Algorithm {
    /// Ed25519 (`EdDSA` in the JOSE header).
    #[default]
    #[serde(rename = "EdDSA", alias = "Ed25519")]
    EdDsa,
    /// RSASSA-PKCS1-v1_5 with SHA-256.
    #[serde(rename = "RS256")]
    Rs256,
}

impl Algorithm {
    /// JOSE `alg` name.
    pub fn as_str(self) -> &'static str {
        match self {
            Algorithm::EdDsa => "EdDSA",
            Algorithm::Rs256 => "RS256",
        }
    }
}

impl From<Algorithm> for jsonwebtoken::Algorithm {
    fn from(value: Algorithm) -> Self {
        match value {
            Algorithm::EdDsa => jsonwebtoken::Algorithm::EdDSA,
            Algorithm::Rs256 => jsonwebtoken::Algorithm::RS256,
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Algorithm {
    type Err = TokenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "eddsa" | "ed25519" => Ok(Algorithm::EdDsa),
            "rs256" => Ok(Algorithm::Rs256),
            other => Err(TokenError::InvalidKey(format!(
                "unsupported token algorithm '{other}' (expected EdDSA or RS256)"
            ))),
        }
    }
}

/// Public half of the signing key pair. This is what verifiers hold.
#[derive(Clone)]
pub struct VerificationKey {
    algorithm: Algorithm,
    key: DecodingKey,
}

impl VerificationKey {
    /// Parse a PEM-encoded public key.
    pub fn from_pem(
        algorithm: Algorithm,
        public_pem: &str,
    ) -> Result<Self, TokenError> {
        let bytes = public_pem.as_bytes();
        let key = match algorithm {
            Algorithm::EdDsa => DecodingKey::from_ed_pem(bytes),
            Algorithm::Rs256 => DecodingKey::from_rsa_pem(bytes),
        }
        .map_err(|err| {
            TokenError::InvalidKey(format!("public key ({algorithm}): {err}"))
        })?;
        Ok(Self { algorithm, key })
    }

    /// Signature scheme of the key.
    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    pub(crate) fn decoding_key(&self) -> &DecodingKey {
        &self.key
    }
}

impl fmt::Debug for VerificationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VerificationKey")
            .field("algorithm", &self.algorithm)
            .finish_non_exhaustive()
    }
}

/// A loaded signing key pair.
///
/// Construction signs and verifies a fixed message, so a private key that
/// does not belong to the configured public key is rejected at startup
/// instead of producing tokens nobody can verify.
#[derive(Clone)]
pub struct KeyMaterial {
    signing: EncodingKey,
    verification: VerificationKey,
}

impl KeyMaterial {
    const PAIRING_MESSAGE: &'static [u8] = b"fsauth.key-pair-check";

    /// Parse both halves and check that they belong together.
    pub fn from_pem(
        algorithm: Algorithm,
        private_pem: &str,
        public_pem: &str,
    ) -> Result<Self, TokenError> {
        let bytes = private_pem.as_bytes();
        let signing = match algorithm {
            Algorithm::EdDsa => EncodingKey::from_ed_pem(bytes),
            Algorithm::Rs256 => EncodingKey::from_rsa_pem(bytes),
        }
        .map_err(|err| {
            TokenError::InvalidKey(format!("private key ({algorithm}): {err}"))
        })?;
        let verification = VerificationKey::from_pem(algorithm, public_pem)?;

        let signature = crypto::sign(Self::PAIRING_MESSAGE, &signing, algorithm.into())
            .map_err(|err| {
                TokenError::InvalidKey(format!("private key ({algorithm}): {err}"))
            })?;
        let paired = crypto::verify(
            &signature,
            Self::PAIRING_MESSAGE,
            verification.decoding_key(),
            algorithm.into(),
        )
        .map_err(|err| {
            TokenError::InvalidKey(format!("public key ({algorithm}): {err}"))
        })?;
        if !paired {
            return Err(TokenError::InvalidKey(
                "private and public keys do not belong to the same pair".into(),
            ));
        }

        Ok(Self {
            signing,
            verification,
        })
    }

    /// Signature scheme of both halves.
    pub fn algorithm(&self) -> Algorithm {
        self.verification.algorithm
    }

    /// The public half, for handing to a [`TokenVerifier`](super::TokenVerifier).
    pub fn verification_key(&self) -> VerificationKey {
        self.verification.clone()
    }

    pub(crate) fn encoding_key(&self) -> &EncodingKey {
        &self.signing
    }
}

impl fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyMaterial")
            .field("algorithm", &self.algorithm())
            .field("signing", &"[redacted]")
            .finish()
    }
}
