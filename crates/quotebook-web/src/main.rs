//! quotebook-server binary.
//!
//! Reads `config.toml` (or the path specified with `--config`), opens the
//! SQLite store, and serves the site over HTTP.
//!
//! # Creating an account from the shell
//!
//! The password is read twice from stdin and must pass the signup rules.
//!
//! ```text
//! cargo run -p quotebook-web --bin quotebook-server -- --create-user alice
//! ```

use std::{
  io::BufRead,
  net::SocketAddr,
  path::{Path, PathBuf},
  sync::Arc,
};

use anyhow::Context as _;
use clap::Parser;
use quotebook_core::{
  store::QuoteStore,
  user::{check_new_password, check_username},
};
use quotebook_store_sqlite::SqliteStore;
use quotebook_web::{AppState, ServerConfig, auth::hash_password};
use tokio::net::TcpListener;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Quotebook server")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,

  /// Create an account, reading its password from stdin, then exit.
  #[arg(long, value_name = "USERNAME")]
  create_user: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  // Initialise tracing.
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  // Load configuration.
  let settings = config::Config::builder()
    .add_source(config::File::from(cli.config).required(false))
    .add_source(config::Environment::with_prefix("QUOTEBOOK"))
    .build()
    .context("failed to read config file")?;

  let server_cfg: ServerConfig = settings
    .try_deserialize()
    .context("failed to deserialise ServerConfig")?;

  let store_path = store_location(&server_cfg.store_path);
  let store = SqliteStore::open(&store_path)
    .await
    .with_context(|| format!("failed to open store at {store_path:?}"))?;

  if let Some(username) = cli.create_user {
    let stdin = std::io::stdin();
    let (username, password) = read_new_account(&username, stdin.lock())?;
    let user = store
      .create_user(username, hash_password(&password)?)
      .await
      .context("failed to create user")?;
    println!("created user {} (id {})", user.username, user.user_id);
    return Ok(());
  }

  let state = AppState {
    store:  Arc::new(store),
    config: Arc::new(server_cfg.clone()),
  };

  let app = quotebook_web::router(state);
  let address = format!("{}:{}", server_cfg.host, server_cfg.port);

  tracing::info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(
    listener,
    app.into_make_service_with_connect_info::<SocketAddr>(),
  )
  .await
  .context("server error")?;

  Ok(())
}

/// Read a password and its confirmation, one per line, and apply the same
/// rules as the signup form.
fn read_new_account(
  username: &str,
  mut input: impl BufRead,
) -> anyhow::Result<(String, String)> {
  let mut lines = [String::new(), String::new()];
  for (prompt, line) in ["Password: ", "Password (again): "].into_iter().zip(&mut lines) {
    eprint!("{prompt}");
    input.read_line(line).context("failed to read password")?;
    let len = line.trim_end_matches(['\r', '\n']).len();
    line.truncate(len);
  }
  let [password, confirmation] = lines;

  let username = username.trim();
  let mut errors = check_username(username);
  errors.merge(check_new_password(&password, &confirmation));
  if !errors.is_empty() {
    anyhow::bail!("cannot create {username:?}: {errors}");
  }
  Ok((username.to_owned(), password))
}

/// `~/…` resolves against `$HOME`; anything else is used as given.
fn store_location(path: &Path) -> PathBuf {
  match (path.strip_prefix("~"), std::env::var_os("HOME")) {
    (Ok(rest), Some(home)) => PathBuf::from(home).join(rest),
    _ => path.to_path_buf(),
  }
}
