use std::str::FromStr;
use std::time::Duration;

use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use fuel_finder::client::{ClientConfig, FuelFinderClient, ReqwestTransport};
use fuel_finder::service::{FileSnapshotStore, NodeService};
use fuel_finder::web::{AppState, create_router};

/// Default interval between registry refreshes (1 hour).
const DEFAULT_REFRESH_INTERVAL_SECS: u64 = 60 * 60;

/// Deadline for a single upstream request.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Get credentials from environment
    let client_id = std::env::var("FUEL_FINDER_CLIENT_ID").unwrap_or_else(|_| {
        warn!("FUEL_FINDER_CLIENT_ID not set. API calls will fail.");
        String::new()
    });
    let client_secret = std::env::var("FUEL_FINDER_CLIENT_SECRET").unwrap_or_else(|_| {
        warn!("FUEL_FINDER_CLIENT_SECRET not set. API calls will fail.");
        String::new()
    });

    let mut config = ClientConfig::new(client_id, client_secret);
    if let Ok(base_url) = std::env::var("FUEL_FINDER_BASE_URL") {
        config = config.with_base_url(base_url);
    }
    if let Some(ttl) = env_parse("FUEL_FINDER_CACHE_TTL") {
        config = config.with_cache_ttl(ttl);
    }

    let transport =
        ReqwestTransport::with_timeout(REQUEST_TIMEOUT).expect("Failed to create HTTP transport");
    let client = FuelFinderClient::with_transport(config, transport)
        .expect("Failed to create Fuel Finder client");

    // Requests recover by authenticating on their own, so this only fails early
    if let Err(e) = client.authenticate().await {
        warn!(error = %e, "initial authentication failed");
    }

    let service = NodeService::new(client);

    let store = std::env::var("FUEL_FINDER_SNAPSHOT")
        .ok()
        .map(FileSnapshotStore::new);
    if let Some(store) = &store {
        match service.restore(store).await {
            Ok(true) => {
                let nodes = service.len().await;
                info!(path = %store.path().display(), nodes, "restored snapshot");
            }
            Ok(false) => info!(path = %store.path().display(), "no snapshot yet"),
            Err(e) => warn!(error = %e, "failed to restore snapshot"),
        }
    }

    let interval = refresh_interval(env_parse("FUEL_FINDER_REFRESH_INTERVAL"));
    service
        .start(interval, false)
        .await
        .expect("Failed to start node service");

    // First refresh runs in the background so the server is up immediately
    tokio::spawn({
        let service = service.clone();
        async move {
            if let Err(e) = service.refresh().await {
                warn!(error = %e, "initial refresh failed");
            }
        }
    });

    let app = create_router(AppState::new(service.clone()));

    let host = std::env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
    let port: u16 = env_parse("PORT").unwrap_or(3000);
    let addr = format!("{host}:{port}");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("Failed to bind listener");
    info!(%addr, "fuel finder listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    if let Err(e) = service.stop().await {
        warn!(error = %e, "failed to stop node service");
    }
    if let Some(store) = &store {
        match service.persist(store).await {
            Ok(()) => info!(path = %store.path().display(), "saved snapshot"),
            Err(e) => error!(error = %e, "failed to save snapshot"),
        }
    }
}

/// Parse an environment variable, ignoring it (with a warning) if malformed.
fn env_parse<T: FromStr>(name: &str) -> Option<T> {
    let value = std::env::var(name).ok()?;
    match value.parse() {
        Ok(parsed) => Some(parsed),
        Err(_) => {
            warn!(name, %value, "ignoring malformed environment variable");
            None
        }
    }
}

/// Refresh interval from its configured seconds. Unset or zero falls back
/// to the default.
fn refresh_interval(secs: Option<u64>) -> Duration {
    let secs = match secs {
        Some(0) => {
            warn!(
                default = DEFAULT_REFRESH_INTERVAL_SECS,
                "FUEL_FINDER_REFRESH_INTERVAL must be positive, using default"
            );
            DEFAULT_REFRESH_INTERVAL_SECS
        }
        Some(secs) => secs,
        None => DEFAULT_REFRESH_INTERVAL_SECS,
    };
    Duration::from_secs(secs)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutting down");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn refresh_interval_falls_back_to_default() {
        let default = Duration::from_secs(DEFAULT_REFRESH_INTERVAL_SECS);

        assert_eq!(refresh_interval(None), default);
        assert_eq!(refresh_interval(Some(0)), default);
        assert_eq!(refresh_interval(Some(90)), Duration::from_secs(90));
    }
}
