//! coldcall-server binary.
//!
//! Reads `config.toml` (or the path specified with `--config`), opens the
//! SQLite store, and serves the webhook endpoints plus the `/api` JSON
//! surface over HTTP.

use std::{
  path::{Path, PathBuf},
  sync::Arc,
  time::Duration,
};

use anyhow::Context as _;
use clap::Parser;
use coldcall_engine::{
  conversation::ConversationEngine,
  locks::CallLocks,
  orchestrator::{Orchestrator, OrchestratorConfig},
};
use coldcall_server::{
  AppState, ServerConfig,
  auth::SignatureConfig,
  gateway::{GatewayConfig, HttpTelephonyGateway},
  textgen::{HttpTextGenerator, TextGenConfig},
};
use coldcall_store_sqlite::SqliteStore;
use tokio::net::TcpListener;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Coldcall outbound voice-calling server")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  let settings = config::Config::builder()
    .add_source(config::File::from(cli.config).required(false))
    .add_source(config::Environment::with_prefix("COLDCALL"))
    .build()
    .context("failed to read config file")?;
  let server_cfg: ServerConfig = settings
    .try_deserialize()
    .context("failed to deserialise ServerConfig")?;

  let store_path = expand_tilde(&server_cfg.store_path);
  let store = SqliteStore::open(&store_path)
    .await
    .with_context(|| format!("failed to open store at {store_path:?}"))?;

  let gateway =
    HttpTelephonyGateway::new(GatewayConfig::from_server_config(&server_cfg));
  let textgen =
    HttpTextGenerator::new(TextGenConfig::from_server_config(&server_cfg));

  let orchestrator = Orchestrator::new(
    store.clone(),
    gateway.clone(),
    OrchestratorConfig {
      enabled: server_cfg.calling_enabled,
      max_active_calls: server_cfg.max_active_calls,
      max_attempts_per_target: server_cfg.max_attempts_per_target,
      max_batch_size: server_cfg.max_batch_size,
      bulk_dispatch_interval: Duration::from_secs(
        server_cfg.bulk_dispatch_interval_secs,
      ),
    },
  );
  let engine = ConversationEngine::new(store.clone(), textgen);

  let state = AppState {
    store,
    engine: Arc::new(engine),
    orchestrator: Arc::new(orchestrator),
    locks: CallLocks::new(),
    auth: Arc::new(SignatureConfig {
      auth_token:      server_cfg.webhook_auth_token.clone(),
      public_base_url: server_cfg.public_base_url.clone(),
    }),
  };

  let app = coldcall_server::router(state);
  let address = format!("{}:{}", server_cfg.host, server_cfg.port);

  tracing::info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app).await.context("server error")?;

  Ok(())
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  if let Ok(stripped) = path.strip_prefix("~") {
    if let Some(home) = std::env::var_os("HOME") {
      return PathBuf::from(home).join(stripped);
    }
  }
  path.to_path_buf()
}
