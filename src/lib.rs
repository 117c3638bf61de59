pub mod api;
pub mod auth;
pub mod config;
pub mod model;
pub mod seed;
pub mod store;

// Export API types
pub use api::handlers::{AppContext, AppState};
pub use api::routes;

// Export all model types
pub use model::*;

// Export store types
pub use store::{MemoryStore, PostgresStore, Store};

use axum::{extract::Request, Router, ServiceExt};
use tokio::net::TcpListener;
use tower::Layer;
use tower_http::normalize_path::{NormalizePath, NormalizePathLayer};

/// The full application. Trailing slashes are trimmed before routing, so
/// `/api/v1/dataset/` and `/api/v1/dataset` are the same resource.
pub fn build_app<S: Store + 'static>(state: AppState<S>) -> NormalizePath<Router> {
    NormalizePathLayer::trim_trailing_slash().layer(routes::create_router().with_state(state))
}

/// Serve the application on an already bound listener until it fails.
pub async fn serve<S: Store + 'static>(listener: TcpListener, state: AppState<S>) -> anyhow::Result<()> {
    let app = build_app(state);
    axum::serve(listener, ServiceExt::<Request>::into_make_service(app)).await?;
    Ok(())
}

/// Run the server as configured, against PostgreSQL or the in-memory store.
pub async fn run_server(config: &config::AppConfig) -> anyhow::Result<()> {
    let validator = auth::build_validator(&config.auth)?;
    let listener = TcpListener::bind(config.server_address()).await?;
    log::info!("Listening on http://{}", listener.local_addr()?);

    match config.database.backend {
        config::StoreBackend::Postgres => {
            let store =
                PostgresStore::new(&config.database_url()?, config.max_connections()).await?;
            store.migrate().await?;
            maybe_seed(&store).await?;
            serve(listener, AppContext::new(store, validator)).await
        }
        config::StoreBackend::Memory => {
            log::warn!("Using the in-memory store: records are lost on shutdown");
            let store = MemoryStore::new();
            maybe_seed(&store).await?;
            serve(listener, AppContext::new(store, validator)).await
        }
    }
}

async fn maybe_seed<S: Store>(store: &S) -> anyhow::Result<()> {
    if std::env::var("LOAD_SEED_DATA").unwrap_or_default() == "true" {
        log::info!("Loading seed data...");
        let seeded = seed::load_seed_data(store).await?;
        log::info!(
            "Seed data loaded: dataset {}, model {}, training {}",
            seeded.dataset.id,
            seeded.model.id,
            seeded.training.id
        );
    }
    Ok(())
}
