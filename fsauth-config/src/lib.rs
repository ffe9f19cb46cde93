//! Configuration for the fsauth identity service.
//!
//! Values come from built-in defaults, an optional TOML file and the
//! process environment (optionally seeded from a `.env` file), in that
//! order of increasing precedence. Loading never fails on risky but
//! workable settings; those surface as [`ConfigWarnings`].

pub mod constants;
/// Source discovery and composition.
pub mod loader;
/// The composed, validated configuration.
pub mod models;
/// Raw TOML and environment inputs.
pub mod sources;
/// Load-time warnings for risky settings.
pub mod validation;

pub use loader::{ConfigLoad, ConfigLoadError, ConfigLoader, ConfigLoaderOptions};
pub use models::{
    Config, ConfigMetadata, DatabaseConfig, PasswordConfig, ServerConfig,
    TokenConfig, TokenKeyPair,
};
pub use sources::{EnvConfig, FileConfig};
pub use validation::{ConfigWarning, ConfigWarnings};
