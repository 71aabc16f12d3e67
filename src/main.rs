use std::sync::Arc;

use anyhow::Context;
use onboarding_portal::config::PortalConfig;
use onboarding_portal::server::{PortalState, portal_routes};
use onboarding_portal::session::{SessionRegistry, spawn_change_listener, spawn_idle_pruner};
use onboarding_portal::store::{LibSqlBackend, NotifyingStore, RecordStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = Arc::new(PortalConfig::from_env().context("Invalid portal configuration")?);

    eprintln!("Onboarding Portal v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   API: http://0.0.0.0:{}/api", config.port);
    eprintln!("   Session WS: ws://0.0.0.0:{}/ws/session", config.port);
    eprintln!("   Database: {}", config.db_path.display());
    eprintln!("   Admin domain: {}", config.admin_domain);
    eprintln!("   Session idle timeout: {}s", config.session_idle_timeout.as_secs());

    // ── Database ─────────────────────────────────────────────────────────
    let backend = LibSqlBackend::new_local(&config.db_path)
        .await
        .with_context(|| format!("Failed to open database at {}", config.db_path.display()))?;
    let store = Arc::new(NotifyingStore::new(backend));
    let changes = store.subscribe();
    let store: Arc<dyn RecordStore> = store;

    // ── Sessions ─────────────────────────────────────────────────────────
    let sessions = SessionRegistry::new(store, Arc::clone(&config));
    let _listener = spawn_change_listener(Arc::clone(&sessions), changes);
    let _pruner = spawn_idle_pruner(Arc::clone(&sessions), config.session_idle_timeout);

    // ── HTTP ─────────────────────────────────────────────────────────────
    let app = portal_routes(PortalState::new(sessions));
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.port))
        .await
        .with_context(|| format!("Failed to bind port {}", config.port))?;
    tracing::info!(port = config.port, "Portal server started");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    tracing::info!("Portal server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
