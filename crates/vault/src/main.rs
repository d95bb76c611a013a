//! `field-vault` binary entry point.
//!
//! `serve` startup sequence:
//! 1. Load and validate [`Config`] from environment variables.
//! 2. Initialise structured logging, plus OTLP span export when configured.
//! 3. Resolve the process key (configured or ephemeral).
//! 4. Seed the [`SchemaRegistry`] and load the schema document, if any.
//! 5. Spawn the schema refresh task.
//! 6. Build the Axum router and start the HTTP server.

use std::io;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};

use field_vault::config::Config;
use field_vault::crypto::FieldCipher;
use field_vault::key::{self, EncryptionKey};
use field_vault::rotation::rotate_stream;
use field_vault::schema::{self, SchemaRegistry};
use field_vault::server::{self, state::AppState};
use field_vault::telemetry::{self, LogTarget};

#[derive(Debug, Parser)]
#[command(name = "field-vault", version, about = "Field-level encryption for health records")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the HTTP service (default).
    Serve,
    /// Print a fresh 64-character hex key for ENCRYPTION_KEY.
    GenerateKey,
    /// Re-encrypt newline-delimited JSON records from stdin under a new key.
    Rotate {
        /// Entity type of every record on stdin.
        #[arg(long)]
        entity: String,
        /// Environment variable holding the current key.
        #[arg(long)]
        old_key_env: String,
        /// Environment variable holding the replacement key.
        #[arg(long)]
        new_key_env: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command.unwrap_or(Command::Serve) {
        Command::GenerateKey => {
            println!("{}", key::generate_key_hex());
            Ok(())
        }
        Command::Serve => {
            let cfg = load_config()?;
            tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()
                .context("failed to build tokio runtime")?
                .block_on(serve(cfg))
        }
        Command::Rotate {
            entity,
            old_key_env,
            new_key_env,
        } => {
            let failed = rotate(load_config()?, &entity, &old_key_env, &new_key_env)?;
            if failed > 0 {
                anyhow::bail!("{failed} record(s) failed to rotate");
            }
            Ok(())
        }
    }
}

fn load_config() -> Result<Config> {
    Config::from_env().map_err(|e| {
        // Logging is not yet up; write to stderr directly.
        eprintln!("ERROR: configuration invalid: {e:#}");
        e
    })
}

async fn serve(cfg: Config) -> Result<()> {
    telemetry::init_telemetry(&cfg.log_level, LogTarget::Stdout, cfg.otlp_endpoint())?;
    info!(
        version = env!("CARGO_PKG_VERSION"),
        listen_port = cfg.listen_port,
        otlp_export = cfg.otlp_endpoint().is_some(),
        "field-vault starting"
    );

    let loaded = key::load(cfg.encryption_key.as_deref(), cfg.require_encryption_key)
        .context("failed to load encryption key")?;

    let registry = SchemaRegistry::new();
    if let Some(path) = &cfg.schema_path {
        schema::load_all(path, &registry).await?;
        let _schema_refresh =
            schema::refresh_task(path.clone(), cfg.schema_refresh_interval(), registry.clone());
    }
    info!(entities = ?registry.names(), "entity schemas ready");

    let state = AppState::new(loaded, registry, cfg.entity_header_name.clone());
    let router = server::router::build(state);

    let addr: std::net::SocketAddr = ([0, 0, 0, 0], cfg.listen_port).into();
    info!(addr = %addr, "listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router).await?;

    Ok(())
}

/// Rotate every record on stdin to stdout and return the number that failed.
///
/// Runs without a long-lived async runtime; one is built only to read the
/// schema document, if configured.
fn rotate(cfg: Config, entity: &str, old_key_env: &str, new_key_env: &str) -> Result<usize> {
    telemetry::init_telemetry(&cfg.log_level, LogTarget::Stderr, None)?;

    let old = FieldCipher::new(key_from_env(old_key_env)?);
    let new = FieldCipher::new(key_from_env(new_key_env)?);
    if old.fingerprint() == new.fingerprint() {
        warn!("old and new keys are identical; values will be re-encrypted with fresh IVs");
    }

    let registry = SchemaRegistry::new();
    if let Some(path) = &cfg.schema_path {
        tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .context("failed to build tokio runtime")?
            .block_on(schema::load_all(path, &registry))?;
    }
    let schema = registry.get(entity)?;

    info!(
        entity = %schema.name,
        old_key = %old.fingerprint(),
        new_key = %new.fingerprint(),
        "rotating records from stdin"
    );

    let summary = rotate_stream(
        io::stdin().lock(),
        io::stdout().lock(),
        &schema,
        &old,
        &new,
    )
    .context("failed to stream records")?;
    Ok(summary.failed)
}

fn key_from_env(var: &str) -> Result<EncryptionKey> {
    let value = std::env::var(var).with_context(|| format!("{var} is not set"))?;
    EncryptionKey::from_hex(&value).with_context(|| format!("{var} does not hold a valid key"))
}
