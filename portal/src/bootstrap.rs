//! Wiring a [`PortalService`] over `PostgreSQL` from configuration.

use crate::config::PortalConfig;
use crate::service::PortalService;
use municipal_portal_core::environment::SystemClock;
use municipal_portal_core::error::Result;
use municipal_portal_postgres::PostgresPortalStore;
use std::sync::Arc;
use tracing::info;

/// Facade over the `PostgreSQL` store.
pub type PostgresPortal = PortalService<PostgresPortalStore>;

/// Connect the pool, run migrations and wire the facade.
///
/// # Errors
///
/// Returns `DependencyFailure` if the database is unreachable or migrations fail.
pub async fn connect(config: &PortalConfig) -> Result<(Arc<PostgresPortalStore>, PostgresPortal)> {
    info!("Connecting to portal database...");
    let store = Arc::new(
        PostgresPortalStore::connect(
            &config.postgres.url,
            config.postgres.max_connections,
            config.postgres.min_connections,
            config.postgres.connect_timeout(),
        )
        .await?,
    );
    store.migrate().await?;
    info!("Portal database ready");

    let service = PortalService::new(Arc::clone(&store), Arc::new(SystemClock), &config.portal);
    Ok((store, service))
}
