use std::path::PathBuf;

use anyhow::Context;
use clap::{Args as ClapArgs, CommandFactory, Parser, Subcommand, error::ErrorKind};
use fsauth_config::{ConfigLoad, ConfigLoader, ConfigLoaderOptions};
use fsauth_server::{
    create_router,
    infra::startup::{self, Backend},
};
use tracing::info;

/// CLI entry point
#[derive(Parser, Debug)]
#[command(name = "fsauth-server")]
#[command(about = "Identity service for the file-sharing platform")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    #[command(flatten)]
    sources: ConfigArgs,

    // serve flags given without a subcommand
    #[command(flatten)]
    serve: ServeArgs,
}

#[derive(ClapArgs, Debug, Clone, Default)]
struct ConfigArgs {
    /// Path to the TOML configuration file
    #[arg(long, env = "FSAUTH_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Path to a .env file loaded before reading the environment
    #[arg(long, global = true)]
    env_file: Option<PathBuf>,
}

#[derive(ClapArgs, Debug, Clone, Default, PartialEq, Eq)]
struct ServeArgs {
    /// Server port (overrides config)
    #[arg(short, long)]
    port: Option<u16>,

    /// Server host (overrides config)
    #[arg(long)]
    host: Option<String>,

    /// Keep users in memory instead of PostgreSQL (development only)
    #[arg(long, default_value_t = false)]
    memory: bool,
}

impl ServeArgs {
    fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Flags given after `serve` win over flags given before it.
    fn overridden_by(self, later: ServeArgs) -> Self {
        Self {
            port: later.port.or(self.port),
            host: later.host.or(self.host),
            memory: self.memory || later.memory,
        }
    }
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the HTTP server (default)
    Serve(ServeArgs),
    /// Apply database migrations and exit
    Migrate,
}

#[derive(Debug, PartialEq, Eq)]
enum Mode {
    Serve(ServeArgs),
    Migrate,
}

impl Cli {
    /// Resolve the command to run. `migrate` accepts no serve flags.
    fn into_mode(self) -> Result<(ConfigArgs, Mode), clap::Error> {
        let mode = match self.command {
            None => Mode::Serve(self.serve),
            Some(Command::Serve(args)) => Mode::Serve(self.serve.overridden_by(args)),
            Some(Command::Migrate) if !self.serve.is_empty() => {
                return Err(Cli::command().error(
                    ErrorKind::ArgumentConflict,
                    "--host, --port and --memory only apply to `serve`",
                ));
            }
            Some(Command::Migrate) => Mode::Migrate,
        };
        Ok((self.sources, mode))
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let (sources, mode) = Cli::parse().into_mode().unwrap_or_else(|err| err.exit());
    let ConfigLoad {
        mut config,
        warnings,
    } = ConfigLoader::with_options(ConfigLoaderOptions {
        config_path: sources.config,
        env_file: sources.env_file,
    })
    .load()
    .context("failed to load configuration")?;

    startup::init_tracing();

    if config.metadata.env_file_loaded {
        info!("loaded .env file");
    }
    if let Some(path) = &config.metadata.config_path {
        info!(path = %path.display(), "configuration file loaded");
    }
    warnings.log();

    match mode {
        Mode::Migrate => {
            let pool = startup::connect_with_retry(&config.database).await?;
            startup::run_migrations(&pool).await
        }
        Mode::Serve(args) => {
            if let Some(port) = args.port {
                config.server.port = port;
            }
            if let Some(host) = args.host {
                config.server.host = host;
            }
            let backend = if args.memory {
                Backend::Memory
            } else {
                Backend::Postgres
            };
            run_server(config, backend).await
        }
    }
}

async fn run_server(config: fsauth_config::Config, backend: Backend) -> anyhow::Result<()> {
    let directory = startup::open_directory(&config, backend).await?;
    let auth_service = startup::build_auth_service(&config, directory)?;
    let state = startup::build_state(&config, auth_service);
    let shutdown = state.shutdown_token().clone();
    let app = create_router(state);

    let addr = config.server.bind_address();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(
        service = %config.server.service_name,
        addr = %addr,
        "listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(startup::shutdown_signal(shutdown))
        .await
        .context("server error")?;

    info!("server stopped");
    Ok(())
}
