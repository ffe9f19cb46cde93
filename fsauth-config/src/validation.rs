use std::fmt;

use tracing::warn;

use crate::constants::{MAX_RECOMMENDED_TOKEN_TTL, MIN_RECOMMENDED_ARGON2_MEMORY_KIB};
use crate::models::Config;

/// A risky setting, with an optional remedy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigWarning {
    /// What is risky.
    pub message: String,
    /// How to fix it.
    pub hint: Option<String>,
}

impl fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.hint {
            Some(hint) => write!(f, "{} ({hint})", self.message),
            None => f.write_str(&self.message),
        }
    }
}

/// Warnings collected during loading.
#[derive(Debug, Default, Clone)]
pub struct ConfigWarnings {
    /// In the order they were raised.
    pub items: Vec<ConfigWarning>,
}

impl ConfigWarnings {
    /// Record a warning without a hint.
    pub fn push<S: Into<String>>(&mut self, message: S) {
        self.items.push(ConfigWarning {
            message: message.into(),
            hint: None,
        });
    }

    /// Record a warning with a remedy.
    pub fn push_with_hint<S: Into<String>, H: Into<String>>(
        &mut self,
        message: S,
        hint: H,
    ) {
        self.items.push(ConfigWarning {
            message: message.into(),
            hint: Some(hint.into()),
        });
    }

    /// Whether nothing was raised.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Append `other`'s warnings.
    pub fn extend(&mut self, other: ConfigWarnings) {
        self.items.extend(other.items);
    }

    /// Warnings in the order they were raised.
    pub fn iter(&self) -> impl Iterator<Item = &ConfigWarning> {
        self.items.iter()
    }

    /// Whether any message contains `needle`.
    pub fn contains(&self, needle: &str) -> bool {
        self.items.iter().any(|item| item.message.contains(needle))
    }

    /// Emit every warning through `tracing`.
    pub fn log(&self) {
        for item in &self.items {
            match &item.hint {
                Some(hint) => warn!(hint = %hint, "{}", item.message),
                None => warn!("{}", item.message),
            }
        }
    }
}

/// Settings that load fine but are risky in production.
pub fn apply_guard_rails(config: &Config) -> ConfigWarnings {
    let mut warnings = ConfigWarnings::default();

    if config.password.is_default_pepper() {
        warnings.push_with_hint(
            "AUTH_PASSWORD_PEPPER uses the built-in development value",
            "Set AUTH_PASSWORD_PEPPER to a random secret before storing real passwords",
        );
    }

    if config.token.ttl > MAX_RECOMMENDED_TOKEN_TTL {
        warnings.push(format!(
            "token ttl of {} exceeds the recommended maximum of {}",
            humantime::format_duration(config.token.ttl),
            humantime::format_duration(MAX_RECOMMENDED_TOKEN_TTL),
        ));
    }

    if config.password.argon2.memory_kib < MIN_RECOMMENDED_ARGON2_MEMORY_KIB {
        warnings.push_with_hint(
            format!(
                "Argon2 memory cost of {} KiB is below the recommended {} KiB",
                config.password.argon2.memory_kib, MIN_RECOMMENDED_ARGON2_MEMORY_KIB
            ),
            "Raise AUTH_ARGON2_MEMORY_KIB unless this is a test environment",
        );
    }

    warnings
}
