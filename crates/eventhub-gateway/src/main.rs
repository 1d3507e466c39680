use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;

mod app;
mod auth;
mod http;
mod trigger;
mod ws;

#[derive(Parser, Debug)]
#[command(name = "eventhub-gateway", version, about = "Event management backend with live notifications")]
struct Cli {
    /// Config file path (default: $EVENTHUB_CONFIG or ~/.eventhub/eventhub.toml)
    #[arg(long, global = true)]
    config: Option<String>,
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP + WebSocket server (default).
    Serve,
    /// Print a signed bearer token for the given identity.
    Token {
        #[arg(long)]
        user_id: String,
        #[arg(long)]
        name: String,
        #[arg(long, default_value = "participant")]
        role: eventhub_core::types::Role,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "eventhub_gateway=info,tower_http=debug".into()),
        )
        .init();

    let cli = Cli::parse();

    // load config: --config > EVENTHUB_CONFIG env > ~/.eventhub/eventhub.toml
    let config_path = cli.config.or_else(|| std::env::var("EVENTHUB_CONFIG").ok());
    let config = eventhub_core::config::EventhubConfig::load(config_path.as_deref())
        .unwrap_or_else(|e| {
            tracing::warn!("Config load failed ({}), using defaults", e);
            eventhub_core::config::EventhubConfig::default()
        });

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config).await,
        Command::Token { user_id, name, role } => {
            let identity = eventhub_core::types::Identity::new(user_id, name, role);
            let auth = &config.gateway.auth;
            println!("{}", auth::issue_token(&auth.secret, &identity, auth.token_ttl_secs)?);
            Ok(())
        }
    }
}

async fn serve(config: eventhub_core::config::EventhubConfig) -> anyhow::Result<()> {
    // single SQLite file for all subsystems
    let db_path = config.database.path.clone();
    ensure_parent_dir(&db_path);
    info!(path = %db_path, "opening SQLite database");

    let db = open_db(&db_path)?;
    db.execute_batch("PRAGMA journal_mode=WAL;")?;
    eventhub_notifications::db::init_db(&db)?;
    eventhub_events::db::init_db(&db)?;
    info!("database migrations complete");

    // each store gets its own connection
    let notifications = eventhub_notifications::NotificationStore::new(open_db(&db_path)?);
    let events = eventhub_events::EventStore::new(open_db(&db_path)?);

    if config.gateway.auth.uses_default_secret() {
        tracing::warn!(
            "gateway.auth.secret is the built-in default; anyone can forge tokens. \
             Set EVENTHUB_GATEWAY__AUTH__SECRET or [gateway.auth] secret"
        );
    }

    let addr: SocketAddr = config.listen_addr().parse()?;
    let state = Arc::new(app::AppState::new(config, notifications, events));
    let router = app::build_router(Arc::clone(&state));

    info!("Eventhub gateway listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal(Arc::clone(&state)))
        .await?;

    info!("Eventhub gateway stopped");
    Ok(())
}

/// Resolve on ctrl-c, after telling every push connection to close.
async fn shutdown_signal(state: Arc<app::AppState>) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!(
        connections = state.registry.connection_count(),
        "shutdown requested, closing push connections"
    );
    state.begin_shutdown();
}

/// Open a connection with foreign key enforcement, which SQLite scopes to
/// the connection.
fn open_db(path: &str) -> rusqlite::Result<rusqlite::Connection> {
    let conn = rusqlite::Connection::open(path)?;
    conn.execute_batch("PRAGMA foreign_keys=ON;")?;
    Ok(conn)
}

fn ensure_parent_dir(path: &str) {
    if let Some(parent) = std::path::Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            if let Err(e) = std::fs::create_dir_all(parent) {
                tracing::warn!(path = %parent.display(), error = %e, "could not create database directory");
            }
        }
    }
}
