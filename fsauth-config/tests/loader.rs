use std::collections::HashMap;
use std::fs;
use std::time::Duration;

use fsauth_config::{
    ConfigLoadError, ConfigLoader, ConfigMetadata, EnvConfig, FileConfig,
};
use fsauth_core::token::Algorithm;
use tempfile::TempDir;

const PRIVATE_PEM: &str = include_str!("../../fsauth-core/tests/fixtures/ed25519_private.pem");
const PUBLIC_PEM: &str = include_str!("../../fsauth-core/tests/fixtures/ed25519_public.pem");

fn env(vars: &[(&str, &str)]) -> EnvConfig {
    let vars: HashMap<String, String> = vars
        .iter()
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .collect();
    EnvConfig::from_lookup(|key| vars.get(key).cloned())
}

fn metadata_with_file() -> ConfigMetadata {
    ConfigMetadata {
        config_path: Some("fsauth.toml".into()),
        env_file_loaded: false,
    }
}

struct KeyFiles {
    _dir: TempDir,
    private_path: String,
    public_path: String,
}

fn key_files() -> KeyFiles {
    let dir = TempDir::new().unwrap();
    let private_path = dir.path().join("signing.pem");
    let public_path = dir.path().join("signing.pub.pem");
    fs::write(&private_path, PRIVATE_PEM).unwrap();
    fs::write(&public_path, PUBLIC_PEM).unwrap();
    KeyFiles {
        private_path: private_path.display().to_string(),
        public_path: public_path.display().to_string(),
        _dir: dir,
    }
}

#[test]
fn defaults_apply_without_any_source() {
    let load = ConfigLoader::compose(None, env(&[]), ConfigMetadata::default()).unwrap();
    let config = load.config;

    assert_eq!(config.server.host, "0.0.0.0");
    assert_eq!(config.server.port, 8080);
    assert_eq!(config.server.service_name, "auth.service");
    assert_eq!(config.server.request_timeout, Duration::from_secs(10));
    assert_eq!(config.database.max_connections, 10);
    assert_eq!(config.database.connect_attempts, 3);
    assert_eq!(config.database.connect_backoff, Duration::from_secs(1));
    assert!(config.database.url.is_none());
    assert_eq!(config.token.algorithm, Algorithm::EdDsa);
    assert_eq!(config.token.ttl, Duration::from_secs(24 * 60 * 60));
    assert_eq!(config.token.issuer, "filesharing.auth.service");
    assert!(config.password.is_default_pepper());

    assert!(!load.warnings.is_empty());
    assert!(load.warnings.contains("No fsauth.toml detected"));
    assert!(load.warnings.contains("AUTH_PASSWORD_PEPPER"));
}

#[test]
fn required_settings_are_reported_on_demand() {
    let config = ConfigLoader::compose(None, env(&[]), ConfigMetadata::default())
        .unwrap()
        .config;
    assert!(matches!(
        config.database.require_url(),
        Err(ConfigLoadError::MissingKey { key: "database.url" })
    ));
    assert!(matches!(
        config.token.require_keys(),
        Err(ConfigLoadError::MissingKey { .. })
    ));
}

#[test]
fn environment_overrides_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("fsauth.toml");
    fs::write(
        &path,
        r#"
[server]
host = "127.0.0.1"
port = 7000
request_timeout = "3s"

[database]
url = "postgres://file@localhost/fsauth"
max_connections = 4

[auth]
password_pepper = "from-file"

[auth.argon2]
memory_kib = 32768

[token]
algorithm = "RS256"
ttl = "2h"
issuer = "file.issuer"
"#,
    )
    .unwrap();
    let file: FileConfig = toml::from_str(&fs::read_to_string(&path).unwrap()).unwrap();

    let config = ConfigLoader::compose(
        Some(file),
        env(&[
            ("SERVER_PORT", "9090"),
            ("DATABASE_URL", "postgres://env:secret@db/fsauth"),
            ("AUTH_TOKEN_ALGORITHM", "EdDSA"),
            ("FS_TOKEN_EXPIRE_PERIOD_SEC", "600"),
        ]),
        metadata_with_file(),
    )
    .unwrap()
    .config;

    assert_eq!(config.server.host, "127.0.0.1");
    assert_eq!(config.server.port, 9090);
    assert_eq!(config.server.request_timeout, Duration::from_secs(3));
    assert_eq!(config.database.require_url().unwrap(), "postgres://env:secret@db/fsauth");
    assert_eq!(config.database.max_connections, 4);
    assert_eq!(config.password.pepper.as_str(), "from-file");
    assert_eq!(config.password.argon2.memory_kib, 32768);
    assert_eq!(config.password.argon2.iterations, 3);
    assert_eq!(config.token.algorithm, Algorithm::EdDsa);
    assert_eq!(config.token.ttl, Duration::from_secs(600));
    assert_eq!(config.token.issuer, "file.issuer");
}

#[test]
fn humantime_ttl_beats_legacy_seconds() {
    let config = ConfigLoader::compose(
        None,
        env(&[("AUTH_TOKEN_TTL", "15m"), ("FS_TOKEN_EXPIRE_PERIOD_SEC", "600")]),
        metadata_with_file(),
    )
    .unwrap()
    .config;
    assert_eq!(config.token.ttl, Duration::from_secs(15 * 60));
    assert_eq!(config.token.settings().ttl, Duration::from_secs(15 * 60));
}

#[test]
fn keys_load_from_paths_and_inline_values() {
    let keys = key_files();
    let config = ConfigLoader::compose(
        None,
        env(&[
            ("AUTH_TOKEN_PRIVATE_KEY_PATH", keys.private_path.as_str()),
            ("AUTH_TOKEN_PUBLIC_KEY_PATH", keys.public_path.as_str()),
        ]),
        metadata_with_file(),
    )
    .unwrap()
    .config;
    let pair = config.token.require_keys().unwrap();
    assert_eq!(pair.private_pem.as_str(), PRIVATE_PEM.trim());
    assert_eq!(pair.public_pem, PUBLIC_PEM.trim());

    let escaped = PUBLIC_PEM.trim().replace('\n', "\\n");
    let config = ConfigLoader::compose(
        None,
        env(&[
            ("AUTH_TOKEN_PRIVATE_KEY_PATH", keys.private_path.as_str()),
            ("AUTH_TOKEN_PUBLIC_KEY", escaped.as_str()),
        ]),
        metadata_with_file(),
    )
    .unwrap()
    .config;
    assert_eq!(config.token.require_keys().unwrap().public_pem, PUBLIC_PEM.trim());
}

#[test]
fn half_a_key_pair_is_an_error() {
    let keys = key_files();
    let err = ConfigLoader::compose(
        None,
        env(&[("AUTH_TOKEN_PRIVATE_KEY_PATH", keys.private_path.as_str())]),
        metadata_with_file(),
    )
    .unwrap_err();
    assert!(matches!(
        err,
        ConfigLoadError::MissingKey {
            key: "token.public_key"
        }
    ));
}

#[test]
fn unreadable_key_file_is_secret_file_io() {
    let err = ConfigLoader::compose(
        None,
        env(&[
            ("AUTH_TOKEN_PRIVATE_KEY_PATH", "/definitely/not/here.pem"),
            ("AUTH_TOKEN_PUBLIC_KEY_PATH", "/definitely/not/here.pub"),
        ]),
        metadata_with_file(),
    )
    .unwrap_err();
    assert!(matches!(err, ConfigLoadError::SecretFileIo { .. }));
}

#[test]
fn malformed_values_are_invalid() {
    for (key, value, expected) in [
        ("AUTH_TOKEN_ALGORITHM", "HS256", "token.algorithm"),
        ("AUTH_TOKEN_TTL", "forever", "token.ttl"),
        ("AUTH_TOKEN_TTL", "0s", "token.ttl"),
        ("SERVER_PORT", "http", "server.port"),
        ("DATABASE_URL", "not a url", "database.url"),
        ("REQUEST_TIMEOUT", "soon", "server.request_timeout"),
    ] {
        let err = ConfigLoader::compose(None, env(&[(key, value)]), metadata_with_file())
            .unwrap_err();
        match err {
            ConfigLoadError::Invalid { key: reported, .. } => {
                assert_eq!(reported, expected, "{key}={value}")
            }
            other => panic!("{key}={value}: unexpected {other:?}"),
        }
    }
}

#[test]
fn guard_rails_warn_about_risky_settings() {
    let load = ConfigLoader::compose(
        None,
        env(&[
            ("AUTH_PASSWORD_PEPPER", "a-real-secret"),
            ("AUTH_TOKEN_TTL", "90days"),
            ("AUTH_ARGON2_MEMORY_KIB", "4096"),
        ]),
        metadata_with_file(),
    )
    .unwrap();
    assert!(!load.warnings.contains("AUTH_PASSWORD_PEPPER"));
    assert!(load.warnings.contains("token ttl"));
    assert!(load.warnings.contains("Argon2 memory cost"));
    assert_eq!(load.warnings.items.len(), 2);
    let hinted: Vec<_> = load
        .warnings
        .iter()
        .filter(|warning| warning.hint.is_some())
        .collect();
    assert_eq!(hinted.len(), 1);
    assert!(hinted[0].to_string().contains("AUTH_ARGON2_MEMORY_KIB"));
}

#[test]
fn debug_output_redacts_secrets() {
    let keys = key_files();
    let config = ConfigLoader::compose(
        None,
        env(&[
            ("AUTH_PASSWORD_PEPPER", "pepper-value-123"),
            ("DATABASE_URL", "postgres://user:hunter2@db/fsauth"),
            ("AUTH_TOKEN_PRIVATE_KEY_PATH", keys.private_path.as_str()),
            ("AUTH_TOKEN_PUBLIC_KEY_PATH", keys.public_path.as_str()),
        ]),
        metadata_with_file(),
    )
    .unwrap()
    .config;
    let rendered = format!("{config:?}");
    assert!(!rendered.contains("pepper-value-123"));
    assert!(!rendered.contains("hunter2"));
    assert!(!rendered.contains("PRIVATE KEY"));
}

#[test]
fn explicit_config_path_must_exist() {
    let err = ConfigLoader::new()
        .with_config_path("/definitely/not/fsauth.toml")
        .with_env_file("/definitely/not/.env")
        .load()
        .unwrap_err();
    assert!(matches!(err, ConfigLoadError::MissingConfig { .. }));
}
