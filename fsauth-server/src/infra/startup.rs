use std::sync::Arc;

use anyhow::Context;
use fsauth_config::{Config, DatabaseConfig};
use fsauth_core::{
    AuthService, Directory, PasswordCrypto,
    directory::{MemoryDirectory, PostgresDirectory},
    token::{KeyMaterial, SystemClock, TokenIssuer},
};
use sqlx::{PgPool, postgres::PgPoolOptions};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::infra::app_state::AppState;

/// Install the global subscriber. `RUST_LOG` overrides the default filter.
pub fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=warn,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Open the pool, retrying `connect_attempts` times with
/// `connect_backoff` in between.
pub async fn connect_with_retry(database: &DatabaseConfig) -> anyhow::Result<PgPool> {
    let url = database.require_url()?;
    let attempts = database.connect_attempts.max(1);

    let mut attempt = 1;
    loop {
        let result = PgPoolOptions::new()
            .max_connections(database.max_connections)
            .connect(url)
            .await;
        match result {
            Ok(pool) => {
                info!(attempt, "connected to PostgreSQL");
                return Ok(pool);
            }
            Err(err) if attempt < attempts => {
                warn!(
                    attempt,
                    attempts,
                    error = %err,
                    "PostgreSQL connection failed, retrying in {:?}",
                    database.connect_backoff
                );
                tokio::time::sleep(database.connect_backoff).await;
                attempt += 1;
            }
            Err(err) => {
                return Err(err).with_context(|| {
                    format!("failed to connect to PostgreSQL after {attempts} attempts")
                });
            }
        }
    }
}

pub async fn run_migrations(pool: &PgPool) -> anyhow::Result<()> {
    fsauth_core::MIGRATOR
        .run(pool)
        .await
        .context("database migration failed")?;
    info!("database migrations applied");
    Ok(())
}

/// Storage backend selected at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    Postgres,
    /// Process-local, lost on exit. For local development only.
    Memory,
}

pub async fn open_directory(
    config: &Config,
    backend: Backend,
) -> anyhow::Result<Arc<dyn Directory>> {
    match backend {
        Backend::Postgres => {
            let pool = connect_with_retry(&config.database).await?;
            run_migrations(&pool).await?;
            Ok(Arc::new(PostgresDirectory::new(pool)))
        }
        Backend::Memory => {
            warn!("using the in-memory directory; users are lost on exit");
            Ok(Arc::new(MemoryDirectory::new()))
        }
    }
}

/// Load keys, build the password and token components and the
/// orchestrator on top of `directory`.
pub fn build_auth_service(
    config: &Config,
    directory: Arc<dyn Directory>,
) -> anyhow::Result<AuthService> {
    let pair = config.token.require_keys()?;
    let keys = KeyMaterial::from_pem(
        config.token.algorithm,
        &pair.private_pem,
        &pair.public_pem,
    )
    .context("failed to load token signing keys")?;
    info!(algorithm = %keys.algorithm(), issuer = %config.token.issuer, "token keys loaded");

    let crypto = PasswordCrypto::with_params(
        config.password.pepper.as_bytes(),
        config.password.argon2,
    )
    .context("invalid password hashing configuration")?;

    let issuer = TokenIssuer::new(&keys, config.token.settings(), Arc::new(SystemClock));

    AuthService::new(directory, Arc::new(crypto), Arc::new(issuer))
        .context("failed to initialise auth service")
}

pub fn build_state(config: &Config, auth_service: AuthService) -> AppState {
    AppState::new(
        Arc::new(auth_service),
        config.server.service_name.as_str(),
        config.server.request_timeout,
    )
}

/// Resolve on Ctrl-C (or SIGTERM on unix) and cancel in-flight calls.
pub async fn shutdown_signal(shutdown: CancellationToken) {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(error = %err, "failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                warn!(error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("shutdown signal received, cancelling in-flight calls");
    shutdown.cancel();
}
