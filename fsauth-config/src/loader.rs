use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use fsauth_core::password::Argon2Params;
use fsauth_core::token::Algorithm;
use thiserror::Error;
use url::Url;
use zeroize::Zeroizing;

use crate::constants::{
    DEFAULT_CONFIG_LOCATIONS, DEFAULT_CONNECT_ATTEMPTS, DEFAULT_CONNECT_BACKOFF,
    DEFAULT_HOST, DEFAULT_MAX_CONNECTIONS, DEFAULT_PASSWORD_PEPPER, DEFAULT_PORT,
    DEFAULT_REQUEST_TIMEOUT, DEFAULT_SERVICE_NAME,
};
use crate::models::{
    Config, ConfigMetadata, DatabaseConfig, PasswordConfig, ServerConfig,
    TokenConfig, TokenKeyPair,
};
use crate::sources::{EnvConfig, FileConfig, FileTokenConfig};
use crate::validation::{self, ConfigWarnings};

/// Where to look for configuration beyond the defaults.
#[derive(Debug, Default, Clone)]
pub struct ConfigLoaderOptions {
    /// Explicit TOML file. Overrides `FSAUTH_CONFIG` and the default locations.
    pub config_path: Option<PathBuf>,
    /// `.env` file to load. Defaults to the nearest `.env`, if any.
    pub env_file: Option<PathBuf>,
}

/// Composes [`Config`] from defaults, TOML and the environment.
#[derive(Debug, Default)]
pub struct ConfigLoader {
    options: ConfigLoaderOptions,
}

/// A loaded configuration and the warnings raised while composing it.
#[derive(Debug)]
pub struct ConfigLoad {
    /// The composed configuration.
    pub config: Config,
    /// Risky but accepted settings.
    pub warnings: ConfigWarnings,
}

/// Reasons configuration cannot be loaded.
#[derive(Debug, Error)]
pub enum ConfigLoadError {
    /// An explicitly named file does not exist.
    #[error("configuration file missing: {path}")]
    MissingConfig {
        /// The path that was asked for.
        path: PathBuf,
    },
    /// The file exists but could not be read.
    #[error("failed to read configuration {path}")]
    Io {
        /// File that failed.
        path: PathBuf,
        /// Read error.
        #[source]
        source: std::io::Error,
    },
    /// The file is not valid TOML for [`FileConfig`](crate::FileConfig).
    #[error("failed to parse configuration {path}")]
    Parse {
        /// File that failed.
        path: PathBuf,
        /// Position and reason.
        #[source]
        source: toml::de::Error,
    },
    /// A setting required for the chosen mode is unset.
    #[error("missing required setting {key}")]
    MissingKey {
        /// Dotted setting name.
        key: &'static str,
    },
    /// A `*_PATH` or `*_FILE` secret could not be read.
    #[error("failed to read secret file {path}")]
    SecretFileIo {
        /// Secret file that failed.
        path: PathBuf,
        /// Read error.
        #[source]
        source: std::io::Error,
    },
    /// A value is present but unusable.
    #[error("invalid value for {key}: {reason}")]
    Invalid {
        /// Dotted setting name.
        key: &'static str,
        /// What is wrong with the value.
        reason: String,
    },
    /// The `.env` file exists but is malformed.
    #[error(transparent)]
    EnvFile(#[from] dotenvy::Error),
}

impl ConfigLoader {
    /// Defaults plus the process environment.
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from explicit options.
    pub fn with_options(options: ConfigLoaderOptions) -> Self {
        Self { options }
    }

    /// Read this TOML file instead of searching for one.
    pub fn with_config_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.options.config_path = Some(path.into());
        self
    }

    /// Load this `.env` file instead of `./.env`.
    pub fn with_env_file<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.options.env_file = Some(path.into());
        self
    }

    /// Load `.env`, the TOML file and the process environment, in that
    /// order of increasing precedence.
    pub fn load(&self) -> Result<ConfigLoad, ConfigLoadError> {
        let env_file_loaded = match &self.options.env_file {
            Some(path) => dotenvy::from_path(path).map(|_| true).or_else(
                |err| match err {
                    dotenvy::Error::Io(_) => Ok(false),
                    _ => Err(err),
                },
            )?,
            None => dotenvy::dotenv().map(|_| true).or_else(|err| match err {
                dotenvy::Error::Io(_) => Ok(false),
                _ => Err(err),
            })?,
        };

        let env = EnvConfig::gather();
        let (file, config_path) = self.load_file_config(&env)?;

        Self::compose(
            file,
            env,
            ConfigMetadata {
                config_path,
                env_file_loaded,
            },
        )
    }

    fn load_file_config(
        &self,
        env: &EnvConfig,
    ) -> Result<(Option<FileConfig>, Option<PathBuf>), ConfigLoadError> {
        let explicit = self
            .options
            .config_path
            .clone()
            .or_else(|| env.config_path.clone());

        let path = match explicit {
            Some(path) if !path.exists() => {
                return Err(ConfigLoadError::MissingConfig { path });
            }
            Some(path) => path,
            None => match DEFAULT_CONFIG_LOCATIONS
                .iter()
                .map(PathBuf::from)
                .find(|candidate| candidate.exists())
            {
                Some(path) => path,
                None => return Ok((None, None)),
            },
        };

        let contents = fs::read_to_string(&path).map_err(|source| {
            ConfigLoadError::Io {
                path: path.clone(),
                source,
            }
        })?;
        let file: FileConfig = toml::from_str(&contents).map_err(|source| {
            ConfigLoadError::Parse {
                path: path.clone(),
                source,
            }
        })?;
        Ok((Some(file), Some(path)))
    }

    /// Merge defaults, file values and environment values into a
    /// [`Config`] and collect guard-rail warnings.
    ///
    /// Touches the filesystem only to read key and secret files named by
    /// the inputs.
    pub fn compose(
        file: Option<FileConfig>,
        env: EnvConfig,
        metadata: ConfigMetadata,
    ) -> Result<ConfigLoad, ConfigLoadError> {
        let mut warnings = ConfigWarnings::default();
        if metadata.config_path.is_none() {
            warnings.push_with_hint(
                "No fsauth.toml detected; using environment variables and defaults",
                "Pass --config or set FSAUTH_CONFIG to use a configuration file",
            );
        }

        let FileConfig {
            server: file_server,
            database: file_database,
            auth: file_auth,
            token: file_token,
        } = file.unwrap_or_default();

        let server = ServerConfig {
            host: env
                .server_host
                .clone()
                .or(file_server.host)
                .unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port: parse_env("server.port", env.server_port.as_deref())?
                .or(file_server.port)
                .unwrap_or(DEFAULT_PORT),
            service_name: env
                .service_name
                .clone()
                .or(file_server.service_name)
                .unwrap_or_else(|| DEFAULT_SERVICE_NAME.to_string()),
            request_timeout: parse_duration(
                "server.request_timeout",
                env.request_timeout.as_deref().or(file_server.request_timeout.as_deref()),
            )?
            .unwrap_or(DEFAULT_REQUEST_TIMEOUT),
        };
        if server.request_timeout.is_zero() {
            return Err(invalid("server.request_timeout", "must be greater than zero"));
        }

        let database = DatabaseConfig {
            url: resolve_database_url(&env, file_database.url.as_deref())?,
            max_connections: parse_env(
                "database.max_connections",
                env.database_max_connections.as_deref(),
            )?
            .or(file_database.max_connections)
            .unwrap_or(DEFAULT_MAX_CONNECTIONS),
            connect_attempts: parse_env(
                "database.connect_attempts",
                env.database_connect_attempts.as_deref(),
            )?
            .or(file_database.connect_attempts)
            .unwrap_or(DEFAULT_CONNECT_ATTEMPTS)
            .max(1),
            connect_backoff: parse_duration(
                "database.connect_backoff",
                env.database_connect_backoff
                    .as_deref()
                    .or(file_database.connect_backoff.as_deref()),
            )?
            .unwrap_or(DEFAULT_CONNECT_BACKOFF),
        };
        if database.max_connections == 0 {
            return Err(invalid("database.max_connections", "must be at least 1"));
        }

        let defaults = Argon2Params::default();
        let password = PasswordConfig {
            pepper: Zeroizing::new(
                env.password_pepper
                    .clone()
                    .or(file_auth.password_pepper)
                    .unwrap_or_else(|| DEFAULT_PASSWORD_PEPPER.to_string()),
            ),
            argon2: Argon2Params {
                memory_kib: parse_env(
                    "auth.argon2.memory_kib",
                    env.argon2_memory_kib.as_deref(),
                )?
                .or(file_auth.argon2.memory_kib)
                .unwrap_or(defaults.memory_kib),
                iterations: parse_env(
                    "auth.argon2.iterations",
                    env.argon2_iterations.as_deref(),
                )?
                .or(file_auth.argon2.iterations)
                .unwrap_or(defaults.iterations),
                parallelism: parse_env(
                    "auth.argon2.parallelism",
                    env.argon2_parallelism.as_deref(),
                )?
                .or(file_auth.argon2.parallelism)
                .unwrap_or(defaults.parallelism),
            },
        };

        let token = resolve_token(&env, file_token)?;

        let config = Config {
            server,
            database,
            password,
            token,
            metadata,
        };

        warnings.extend(validation::apply_guard_rails(&config));
        Ok(ConfigLoad { config, warnings })
    }
}

fn invalid(key: &'static str, reason: impl Into<String>) -> ConfigLoadError {
    ConfigLoadError::Invalid {
        key,
        reason: reason.into(),
    }
}

fn parse_env<T>(key: &'static str, raw: Option<&str>) -> Result<Option<T>, ConfigLoadError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.map(|value| {
        value
            .trim()
            .parse::<T>()
            .map_err(|err| invalid(key, format!("'{value}': {err}")))
    })
    .transpose()
}

fn parse_duration(
    key: &'static str,
    raw: Option<&str>,
) -> Result<Option<Duration>, ConfigLoadError> {
    raw.map(|value| {
        humantime::parse_duration(value.trim())
            .map_err(|err| invalid(key, format!("'{value}': {err}")))
    })
    .transpose()
}

fn resolve_database_url(
    env: &EnvConfig,
    file_url: Option<&str>,
) -> Result<Option<Zeroizing<String>>, ConfigLoadError> {
    let raw = match (&env.database_url, &env.database_url_file) {
        (Some(url), _) => Some(url.trim().to_string()),
        (None, Some(path)) => read_secret_file(path)?,
        (None, None) => file_url
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .map(str::to_string),
    };

    match raw {
        Some(url) => {
            Url::parse(&url).map_err(|err| invalid("database.url", err.to_string()))?;
            Ok(Some(Zeroizing::new(url)))
        }
        None => Ok(None),
    }
}

fn resolve_token(
    env: &EnvConfig,
    file: FileTokenConfig,
) -> Result<TokenConfig, ConfigLoadError> {
    let algorithm = match env.token_algorithm.as_deref().or(file.algorithm.as_deref()) {
        Some(raw) => Algorithm::from_str(raw)
            .map_err(|err| invalid("token.algorithm", err.to_string()))?,
        None => Algorithm::default(),
    };

    let configured_ttl = if let Some(raw) = env.token_ttl.as_deref() {
        parse_duration("token.ttl", Some(raw))?
    } else if let Some(raw) = env.token_ttl_seconds.as_deref() {
        parse_env::<u64>("token.ttl", Some(raw))?.map(Duration::from_secs)
    } else {
        parse_duration("token.ttl", file.ttl.as_deref())?
    };
    let ttl = configured_ttl.unwrap_or(fsauth_core::token::DEFAULT_TTL);
    if ttl.is_zero() {
        return Err(invalid("token.ttl", "must be greater than zero"));
    }

    let private_pem = resolve_pem(
        env.token_private_key.as_deref(),
        env.token_private_key_path.as_deref(),
        file.private_key.as_deref(),
        file.private_key_path.as_deref(),
    )?;
    let public_pem = resolve_pem(
        env.token_public_key.as_deref(),
        env.token_public_key_path.as_deref(),
        file.public_key.as_deref(),
        file.public_key_path.as_deref(),
    )?;

    let keys = match (private_pem, public_pem) {
        (Some(private_pem), Some(public_pem)) => Some(TokenKeyPair {
            private_pem: Zeroizing::new(private_pem),
            public_pem,
        }),
        (None, None) => None,
        (Some(_), None) => {
            return Err(ConfigLoadError::MissingKey {
                key: "token.public_key",
            });
        }
        (None, Some(_)) => {
            return Err(ConfigLoadError::MissingKey {
                key: "token.private_key",
            });
        }
    };

    Ok(TokenConfig {
        algorithm,
        keys,
        ttl,
        issuer: env
            .token_issuer
            .clone()
            .or(file.issuer)
            .unwrap_or_else(|| fsauth_core::token::DEFAULT_ISSUER.to_string()),
    })
}

/// Environment beats file; within a source an inline PEM beats a path.
fn resolve_pem(
    env_inline: Option<&str>,
    env_path: Option<&Path>,
    file_inline: Option<&str>,
    file_path: Option<&Path>,
) -> Result<Option<String>, ConfigLoadError> {
    if let Some(pem) = env_inline {
        return Ok(Some(unescape_newlines(pem)));
    }
    if let Some(path) = env_path {
        return read_secret_file(path);
    }
    if let Some(pem) = file_inline.filter(|pem| !pem.trim().is_empty()) {
        return Ok(Some(pem.to_string()));
    }
    if let Some(path) = file_path {
        return read_secret_file(path);
    }
    Ok(None)
}

/// PEM passed through a single-line environment variable usually carries
/// literal `\n` sequences.
fn unescape_newlines(raw: &str) -> String {
    if raw.contains('\n') {
        raw.to_string()
    } else {
        raw.replace("\\n", "\n")
    }
}

fn read_secret_file(path: &Path) -> Result<Option<String>, ConfigLoadError> {
    let contents = fs::read_to_string(path).map_err(|source| {
        ConfigLoadError::SecretFileIo {
            path: path.to_path_buf(),
            source,
        }
    })?;
    let trimmed = contents.trim();
    if trimmed.is_empty() {
        Ok(None)
    } else {
        Ok(Some(trimmed.to_string()))
    }
}
