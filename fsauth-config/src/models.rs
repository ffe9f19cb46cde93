use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use fsauth_core::password::Argon2Params;
use fsauth_core::token::{Algorithm, TokenSettings};
use url::Url;
use zeroize::Zeroizing;

use crate::constants::DEFAULT_PASSWORD_PEPPER;
use crate::loader::ConfigLoadError;

/// Fully composed service configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP listener.
    pub server: ServerConfig,
    /// PostgreSQL.
    pub database: DatabaseConfig,
    /// Password hashing.
    pub password: PasswordConfig,
    /// Token signing.
    pub token: TokenConfig,
    /// Where the values came from.
    pub metadata: ConfigMetadata,
}

/// HTTP listener settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Bind host.
    pub host: String,
    /// Bind port.
    pub port: u16,
    /// Reported by the health endpoint.
    pub service_name: String,
    /// Deadline applied to the storage calls of every request.
    pub request_timeout: Duration,
}

impl ServerConfig {
    /// `host:port` for the listener.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// PostgreSQL connection settings.
#[derive(Clone)]
pub struct DatabaseConfig {
    /// Optional so the in-memory backend can run without one.
    pub url: Option<Zeroizing<String>>,
    /// Pool size.
    pub max_connections: u32,
    /// Attempts before startup gives up.
    pub connect_attempts: u32,
    /// Pause between attempts.
    pub connect_backoff: Duration,
}

impl DatabaseConfig {
    /// The connection URL, required by anything that talks to PostgreSQL.
    pub fn require_url(&self) -> Result<&str, ConfigLoadError> {
        self.url
            .as_deref()
            .map(String::as_str)
            .ok_or(ConfigLoadError::MissingKey { key: "database.url" })
    }
}

impl fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let url = self.url.as_deref().map(|raw| redact_url(raw));
        f.debug_struct("DatabaseConfig")
            .field("url", &url)
            .field("max_connections", &self.max_connections)
            .field("connect_attempts", &self.connect_attempts)
            .field("connect_backoff", &self.connect_backoff)
            .finish()
    }
}

fn redact_url(raw: &str) -> String {
    match Url::parse(raw) {
        Ok(mut url) => {
            if url.password().is_some() {
                let _ = url.set_password(Some("redacted"));
            }
            url.to_string()
        }
        Err(_) => "[unparseable]".to_string(),
    }
}

/// Password hashing settings.
#[derive(Clone)]
pub struct PasswordConfig {
    /// Server-side secret mixed into every hash.
    pub pepper: Zeroizing<String>,
    /// Cost parameters for new hashes.
    pub argon2: Argon2Params,
}

impl PasswordConfig {
    /// Whether the built-in development pepper is in use.
    pub fn is_default_pepper(&self) -> bool {
        self.pepper.as_str() == DEFAULT_PASSWORD_PEPPER
    }
}

impl fmt::Debug for PasswordConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PasswordConfig")
            .field("pepper", &"[redacted]")
            .field("argon2", &self.argon2)
            .finish()
    }
}

/// Token signing settings.
#[derive(Debug, Clone)]
pub struct TokenConfig {
    /// Signature scheme.
    pub algorithm: Algorithm,
    /// `None` until keys are configured. Only `serve` requires them.
    pub keys: Option<TokenKeyPair>,
    /// Validity window of issued tokens.
    pub ttl: Duration,
    /// `iss` claim.
    pub issuer: String,
}

impl TokenConfig {
    /// PEM key material, required for issuing tokens.
    pub fn require_keys(&self) -> Result<&TokenKeyPair, ConfigLoadError> {
        self.keys.as_ref().ok_or(ConfigLoadError::MissingKey {
            key: "token.private_key / token.public_key",
        })
    }

    /// Validity window and issuer for the token issuer.
    pub fn settings(&self) -> TokenSettings {
        TokenSettings {
            ttl: self.ttl,
            issuer: self.issuer.clone(),
        }
    }
}

/// PEM-encoded signing pair. The private half is wiped on drop.
#[derive(Clone)]
pub struct TokenKeyPair {
    /// Private half, PEM.
    pub private_pem: Zeroizing<String>,
    /// Public half, PEM.
    pub public_pem: String,
}

impl fmt::Debug for TokenKeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenKeyPair")
            .field("private_pem", &"[redacted]")
            .field("public_pem", &self.public_pem)
            .finish()
    }
}

/// Where the configuration came from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigMetadata {
    /// TOML file that was read, if any.
    pub config_path: Option<PathBuf>,
    /// Whether a `.env` file was found and loaded.
    pub env_file_loaded: bool,
}
