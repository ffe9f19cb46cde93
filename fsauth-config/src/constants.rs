//! Built-in defaults.

use std::time::Duration;

/// Development-only pepper. Using it produces a warning at load time.
pub const DEFAULT_PASSWORD_PEPPER: &str = "fsauth-development-pepper-change-me";

/// Listen on every interface.
pub const DEFAULT_HOST: &str = "0.0.0.0";
/// Default listener port.
pub const DEFAULT_PORT: u16 = 8080;
/// Reported by the health endpoint.
pub const DEFAULT_SERVICE_NAME: &str = "auth.service";
/// Per-request storage deadline.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// PostgreSQL pool size.
pub const DEFAULT_MAX_CONNECTIONS: u32 = 10;
/// Connection attempts at startup before giving up.
pub const DEFAULT_CONNECT_ATTEMPTS: u32 = 3;
/// Pause between connection attempts.
pub const DEFAULT_CONNECT_BACKOFF: Duration = Duration::from_secs(1);

/// Tokens living longer than this trigger a warning.
pub const MAX_RECOMMENDED_TOKEN_TTL: Duration = Duration::from_secs(30 * 24 * 60 * 60);

/// OWASP floor for Argon2id memory cost.
pub const MIN_RECOMMENDED_ARGON2_MEMORY_KIB: u32 = 19 * 1024;

/// Environment variable naming the TOML file.
pub const CONFIG_PATH_ENV: &str = "FSAUTH_CONFIG";
/// Searched in order when no file is named explicitly.
pub const DEFAULT_CONFIG_LOCATIONS: [&str; 2] = ["fsauth.toml", "config/fsauth.toml"];
