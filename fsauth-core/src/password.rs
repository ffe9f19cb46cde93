use std::fmt;

use argon2::{
    Algorithm, Argon2, ParamsBuilder, Version,
    password_hash::{
        self, PasswordHash as PhcString, PasswordHasher, PasswordVerifier,
        SaltString,
    },
};
use rand::{TryRngCore, rngs::OsRng};
use thiserror::Error;
use zeroize::Zeroizing;

/// Argon2id password hashing with a server-side pepper.
///
/// Hashes are PHC strings carrying their own salt and cost parameters, so
/// the work factor can be raised later without invalidating stored hashes:
/// verification always uses the parameters recorded in the hash itself.
pub struct PasswordCrypto {
    argon2: Argon2<'static>,
    password_pepper: Zeroizing<Vec<u8>>,
}

impl fmt::Debug for PasswordCrypto {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PasswordCrypto")
            .field("params", self.argon2.params())
            .field("password_pepper", &"[redacted]")
            .finish()
    }
}

/// Hashing and verification failures.
#[derive(Debug, Error)]
pub enum PasswordError {
    /// The pepper was empty.
    #[error("password pepper must not be empty")]
    EmptyPepper,
    /// Argon2 rejected the cost parameters.
    #[error("invalid Argon2 parameters: {0}")]
    InvalidParams(String),
    /// The Argon2 backend or the entropy source failed.
    #[error("password hashing failed: {0}")]
    Hashing(String),
    /// A stored digest is not a valid PHC string.
    #[error("stored password hash is malformed: {0}")]
    MalformedHash(String),
}

/// Argon2id cost parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Argon2Params {
    /// Memory cost in KiB.
    pub memory_kib: u32,
    /// Passes over memory.
    pub iterations: u32,
    /// Lanes.
    pub parallelism: u32,
}

impl Argon2Params {
    /// Cheapest parameters Argon2 accepts. Only meant for tests.
    pub const MINIMAL: Self = Self {
        memory_kib: 8,
        iterations: 1,
        parallelism: 1,
    };
}

impl Default for Argon2Params {
    /// ~64 MiB memory and 3 iterations, a solid baseline for servers
    /// without dedicated tuning.
    fn default() -> Self {
        Self {
            memory_kib: 64 * 1024,
            iterations: 3,
            parallelism: 1,
        }
    }
}

/// A stored password digest (PHC string).
///
/// Never the plaintext. `Debug` output is redacted so the digest does not
/// end up in logs.
#[derive(Clone, PartialEq, Eq)]
pub struct PasswordHash(String);

impl PasswordHash {
    /// Wrap a stored PHC string.
    pub fn from_phc(phc: impl Into<String>) -> Self {
        Self(phc.into())
    }

    /// The PHC string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for PasswordHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PasswordHash([redacted])")
    }
}

impl PasswordCrypto {
    const SALT_LENGTH: usize = password_hash::Salt::RECOMMENDED_LENGTH;

    /// Build a helper with default Argon2id parameters.
    pub fn new(password_pepper: impl AsRef<[u8]>) -> Result<Self, PasswordError> {
        Self::with_params(password_pepper, Argon2Params::default())
    }

    /// Build a helper with explicit Argon2id parameters.
    pub fn with_params(
        password_pepper: impl AsRef<[u8]>,
        params: Argon2Params,
    ) -> Result<Self, PasswordError> {
        let pepper = password_pepper.as_ref();
        if pepper.is_empty() {
            return Err(PasswordError::EmptyPepper);
        }

        let params = ParamsBuilder::new()
            .m_cost(params.memory_kib)
            .t_cost(params.iterations)
            .p_cost(params.parallelism)
            .output_len(32)
            .build()
            .map_err(|err| PasswordError::InvalidParams(err.to_string()))?;

        Ok(Self {
            argon2: Argon2::new(Algorithm::Argon2id, Version::default(), params),
            password_pepper: Zeroizing::new(pepper.to_vec()),
        })
    }

    /// Hash a plaintext password with a fresh random salt.
    ///
    /// Fails only when the entropy source or the hashing backend fails;
    /// the content of `password` never causes an error.
    pub fn hash_password(
        &self,
        password: &str,
    ) -> Result<PasswordHash, PasswordError> {
        let material = self.peppered(password);

        let mut salt_bytes = [0u8; Self::SALT_LENGTH];
        OsRng
            .try_fill_bytes(&mut salt_bytes)
            .map_err(|err| PasswordError::Hashing(err.to_string()))?;
        let salt = SaltString::encode_b64(&salt_bytes)
            .map_err(|err| PasswordError::Hashing(err.to_string()))?;

        let hash = self
            .argon2
            .hash_password(&material, &salt)
            .map_err(|err| PasswordError::Hashing(err.to_string()))?;
        Ok(PasswordHash(hash.to_string()))
    }

    /// Verify `password` against a stored hash.
    ///
    /// A wrong password is `Ok(false)`. `Err(MalformedHash)` means the
    /// stored value is not a usable Argon2 PHC string (data corruption).
    /// The digest comparison inside `argon2` is constant time.
    pub fn verify_password(
        &self,
        password_hash: &PasswordHash,
        password: &str,
    ) -> Result<bool, PasswordError> {
        let parsed = PhcString::new(password_hash.as_str())
            .map_err(|err| PasswordError::MalformedHash(err.to_string()))?;

        let material = self.peppered(password);
        match self.argon2.verify_password(&material, &parsed) {
            Ok(()) => Ok(true),
            Err(password_hash::Error::Password) => Ok(false),
            Err(err) => Err(PasswordError::MalformedHash(err.to_string())),
        }
    }

    fn peppered(&self, password: &str) -> Zeroizing<Vec<u8>> {
        let mut material = Zeroizing::new(Vec::with_capacity(
            password.len() + self.password_pepper.len(),
        ));
        material.extend_from_slice(password.as_bytes());
        material.extend_from_slice(&self.password_pepper);
        material
    }
}
