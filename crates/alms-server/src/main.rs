//! Alms server binary.
//!
//! Reads `config.toml` (or the path specified with `--config`) and `ALMS_*`
//! environment variables, opens the SQLite store, and serves the JSON API
//! over HTTP.
//!
//! # Bootstrapping an administrator
//!
//! Register an account through the API, then grant it the admin role:
//!
//! ```
//! cargo run -p alms-server --bin server -- --promote admin@example.org
//! ```

use std::{
  path::{Path, PathBuf},
  sync::Arc,
  time::Duration,
};

use alms_core::{Engine, session::CredentialHasher as _};
use alms_server::{AppState, ServerConfig, auth::Argon2Hasher};
use alms_store_sqlite::SqliteStore;
use anyhow::Context as _;
use clap::Parser;
use tokio::net::TcpListener;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Alms donation server")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,

  /// Print the argon2 hash for a password entered on stdin and exit.
  #[arg(long)]
  hash_password: bool,

  /// Grant the admin role to the account with this email and exit.
  #[arg(long, value_name = "EMAIL")]
  promote: Option<String>,
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

  if cli.hash_password {
    let password = read_password()?;
    println!("{}", Argon2Hasher::default().hash(&password)?);
    return Ok(());
  }

  let settings = config::Config::builder()
    .add_source(config::File::from(cli.config).required(false))
    .add_source(config::Environment::with_prefix("ALMS"))
    .build()
    .context("failed to read config file")?;

  let server_cfg: ServerConfig = settings
    .try_deserialize()
    .context("failed to deserialise ServerConfig")?;

  let store_path = expand_tilde(&server_cfg.store_path);
  if let Some(parent) = store_path.parent()
    && !parent.as_os_str().is_empty()
  {
    std::fs::create_dir_all(parent)
      .with_context(|| format!("failed to create {parent:?}"))?;
  }

  let store = SqliteStore::open(&store_path)
    .await
    .with_context(|| format!("failed to open store at {store_path:?}"))?;
  let engine = Engine::new(Arc::new(store), Arc::new(Argon2Hasher::default()));

  if let Some(email) = cli.promote {
    let user = engine.promote_to_admin(&email).await?;
    tracing::info!(user_id = %user.id, email = %user.email, "promoted to admin");
    return Ok(());
  }

  let state = AppState::new(engine, server_cfg.clone());

  if server_cfg.expiry_sweep_secs > 0 {
    tokio::spawn(sweep(state.clone(), Duration::from_secs(server_cfg.expiry_sweep_secs)));
  }

  let app = alms_server::router(state);
  let address = format!("{}:{}", server_cfg.host, server_cfg.port);

  tracing::info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app).await.context("server error")?;

  Ok(())
}

/// Periodic housekeeping: expire due offers, retry queued notifications,
/// and drop dead sessions.
async fn sweep(state: AppState<SqliteStore>, period: Duration) {
  let mut ticker = tokio::time::interval(period);
  loop {
    ticker.tick().await;
    match state.engine.expire_due_offers(None).await {
      Ok(expired) if !expired.is_empty() => {
        tracing::info!(count = expired.len(), "expired due offers");
      }
      Ok(_) => {}
      Err(e) => tracing::warn!(error = %e, "expiry sweep failed"),
    }
    if let Err(e) = state.engine.flush_notifications().await {
      tracing::warn!(error = %e, "notification flush failed");
    }
    let purged = state.sessions.purge_expired();
    if purged > 0 {
      tracing::debug!(purged, "expired sessions purged");
    }
  }
}

/// Read one password line from stdin.
fn read_password() -> anyhow::Result<String> {
  use std::io::{self, BufRead, Write};
  print!("Password: ");
  io::stdout().flush().ok();
  let mut line = String::new();
  io::stdin().lock().read_line(&mut line)?;
  Ok(line.trim_end_matches(['\n', '\r']).to_owned())
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
