/**
 * Gavel Client - Headless Entry Point
 *
 * Restores the persisted session, prints its state and the loaded
 * collections, then keeps the periodic token check running until Ctrl-C.
 *
 * Configuration: `GAVEL_CONFIG` names an optional TOML file; `GAVEL_*`
 * variables override it. Logging follows `RUST_LOG` (default `gavel=info`).
 */
use gavel::client::{
    Config, CredentialStore, FileStore, MemoryStore, ResourceKind, SessionController,
    TracingNotifier,
};
use gavel::shared::AppConfig;
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "gavel=info".to_string());
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(&env_filter))
        .init();

    let app = match std::env::var("GAVEL_CONFIG") {
        Ok(path) => {
            tracing::info!("Loading configuration from {}", path);
            AppConfig::load_with_env(&path)?
        }
        Err(_) => AppConfig::from_env()?,
    };
    let config = Config::from_app(app);
    tracing::info!("Using API at {}", config.server_url());

    let store = match config.store_path() {
        Some(path) => {
            tracing::info!("Credentials file: {}", path.display());
            CredentialStore::new(Arc::new(FileStore::open(path).await?))
        }
        None => {
            tracing::warn!("No data directory available, credentials will not persist");
            CredentialStore::new(Arc::new(MemoryStore::new()))
        }
    };

    let controller = Arc::new(SessionController::new(
        config,
        store,
        Arc::new(TracingNotifier::new()),
    )?);

    let outcome = controller.restore_session().await;
    tracing::info!("Startup: {:?}", outcome);

    let snapshot = controller.snapshot().await;
    println!("phase:        {:?}", snapshot.phase);
    println!("signed in:    {}", snapshot.is_authenticated);
    if let Some(name) = snapshot.profile.as_ref().and_then(|p| p.display_name()) {
        println!("user:         {}", name);
    }
    for kind in ResourceKind::ALL {
        let collection = controller.collection(kind).await;
        match collection.error() {
            Some(detail) => println!("{:<13} error: {}", format!("{}:", kind), detail),
            None => println!("{:<13} {} item(s)", format!("{}:", kind), collection.items().len()),
        }
    }

    let mut monitor = controller.start_monitor();
    tracing::info!("Session monitor running every {:?}; Ctrl-C to exit", monitor.interval());
    tokio::signal::ctrl_c().await?;

    monitor.stop();
    tracing::info!("Shutting down");
    Ok(())
}
