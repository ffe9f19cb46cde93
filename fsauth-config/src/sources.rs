use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Raw configuration as defined in a TOML file.
#[derive(Debug, Default, Clone, Deserialize, Serialize)]
#[serde(rename_all = "snake_case", deny_unknown_fields)]
pub struct FileConfig {
    /// `[server]`
    #[serde(default)]
    pub server: FileServerConfig,
    /// `[database]`
    #[serde(default)]
    pub database: FileDatabaseConfig,
    /// `[auth]`
    #[serde(default)]
    pub auth: FileAuthConfig,
    /// `[token]`
    #[serde(default)]
    pub token: FileTokenConfig,
}

/// `[server]` table.
#[derive(Debug, Default, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct FileServerConfig {
    /// Bind host.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    /// Bind port.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    /// Name reported by the health endpoint.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_name: Option<String>,
    /// humantime, e.g. `"10s"`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_timeout: Option<String>,
}

/// `[database]` table.
#[derive(Debug, Default, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct FileDatabaseConfig {
    /// PostgreSQL URL.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Pool size.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_connections: Option<u32>,
    /// Attempts before startup gives up.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connect_attempts: Option<u32>,
    /// humantime
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connect_backoff: Option<String>,
}

/// `[auth]` table.
#[derive(Debug, Default, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct FileAuthConfig {
    /// Prefer the environment for this one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password_pepper: Option<String>,
    /// Cost parameters.
    #[serde(default)]
    pub argon2: FileArgon2Config,
}

/// `[auth.argon2]` table.
#[derive(Debug, Default, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct FileArgon2Config {
    /// KiB.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory_kib: Option<u32>,
    /// Passes over memory.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iterations: Option<u32>,
    /// Lanes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parallelism: Option<u32>,
}

/// `[token]` table. An inline PEM wins over a path to the same key.
#[derive(Debug, Default, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct FileTokenConfig {
    /// `EdDSA` or `RS256`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub algorithm: Option<String>,
    /// Inline PEM.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub private_key: Option<String>,
    /// Path to a PEM file.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub private_key_path: Option<PathBuf>,
    /// Inline PEM.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public_key: Option<String>,
    /// Path to a PEM file.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public_key_path: Option<PathBuf>,
    /// humantime
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ttl: Option<String>,
    /// `iss` claim.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issuer: Option<String>,
}

/// Environment-derived configuration values.
///
/// Values are kept as raw strings; parsing happens during composition so a
/// malformed variable is reported instead of silently ignored.
#[derive(Debug, Default, Clone)]
pub struct EnvConfig {
    /// `FSAUTH_CONFIG`
    pub config_path: Option<PathBuf>,
    /// `SERVER_HOST`
    pub server_host: Option<String>,
    /// `SERVER_PORT`
    pub server_port: Option<String>,
    /// `FS_SERVICE_NAME`
    pub service_name: Option<String>,
    /// `REQUEST_TIMEOUT`
    pub request_timeout: Option<String>,
    /// `DATABASE_URL`, falling back to `FS_DB_CONNECTION_STRING`
    pub database_url: Option<String>,
    /// `DATABASE_URL_FILE`
    pub database_url_file: Option<PathBuf>,
    /// `DATABASE_MAX_CONNECTIONS`
    pub database_max_connections: Option<String>,
    /// `DATABASE_CONNECT_ATTEMPTS`
    pub database_connect_attempts: Option<String>,
    /// `DATABASE_CONNECT_BACKOFF`
    pub database_connect_backoff: Option<String>,
    /// `AUTH_PASSWORD_PEPPER`
    pub password_pepper: Option<String>,
    /// `AUTH_ARGON2_MEMORY_KIB`
    pub argon2_memory_kib: Option<String>,
    /// `AUTH_ARGON2_ITERATIONS`
    pub argon2_iterations: Option<String>,
    /// `AUTH_ARGON2_PARALLELISM`
    pub argon2_parallelism: Option<String>,
    /// `AUTH_TOKEN_ALGORITHM`
    pub token_algorithm: Option<String>,
    /// `AUTH_TOKEN_PRIVATE_KEY`
    pub token_private_key: Option<String>,
    /// `AUTH_TOKEN_PRIVATE_KEY_PATH`
    pub token_private_key_path: Option<PathBuf>,
    /// `AUTH_TOKEN_PUBLIC_KEY`
    pub token_public_key: Option<String>,
    /// `AUTH_TOKEN_PUBLIC_KEY_PATH`
    pub token_public_key_path: Option<PathBuf>,
    /// `AUTH_TOKEN_TTL`
    pub token_ttl: Option<String>,
    /// `FS_TOKEN_EXPIRE_PERIOD_SEC`, whole seconds
    pub token_ttl_seconds: Option<String>,
    /// `AUTH_TOKEN_ISSUER`
    pub token_issuer: Option<String>,
}

impl EnvConfig {
    /// Read the process environment.
    pub fn gather() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        let path = |key: &str| var(key).map(PathBuf::from);

        Self {
            config_path: path(crate::constants::CONFIG_PATH_ENV),
            server_host: var("SERVER_HOST"),
            server_port: var("SERVER_PORT"),
            service_name: var("FS_SERVICE_NAME"),
            request_timeout: var("REQUEST_TIMEOUT"),
            database_url: var("DATABASE_URL").or_else(|| var("FS_DB_CONNECTION_STRING")),
            database_url_file: path("DATABASE_URL_FILE"),
            database_max_connections: var("DATABASE_MAX_CONNECTIONS"),
            database_connect_attempts: var("DATABASE_CONNECT_ATTEMPTS"),
            database_connect_backoff: var("DATABASE_CONNECT_BACKOFF"),
            password_pepper: var("AUTH_PASSWORD_PEPPER"),
            argon2_memory_kib: var("AUTH_ARGON2_MEMORY_KIB"),
            argon2_iterations: var("AUTH_ARGON2_ITERATIONS"),
            argon2_parallelism: var("AUTH_ARGON2_PARALLELISM"),
            token_algorithm: var("AUTH_TOKEN_ALGORITHM"),
            token_private_key: var("AUTH_TOKEN_PRIVATE_KEY"),
            token_private_key_path: path("AUTH_TOKEN_PRIVATE_KEY_PATH"),
            token_public_key: var("AUTH_TOKEN_PUBLIC_KEY"),
            token_public_key_path: path("AUTH_TOKEN_PUBLIC_KEY_PATH"),
            token_ttl: var("AUTH_TOKEN_TTL"),
            token_ttl_seconds: var("FS_TOKEN_EXPIRE_PERIOD_SEC"),
            token_issuer: var("AUTH_TOKEN_ISSUER"),
        }
    }
}
