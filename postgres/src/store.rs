//! `PostgreSQL` portal store: pool ownership, migrations and the resource catalogue.

use crate::rows::{ResourceRow, ServiceSlotRow, db_error, to_column};
use municipal_portal_core::error::{PortalError, Result};
use municipal_portal_core::providers::ResourceStore;
use municipal_portal_core::types::{
    BookableResource, ResourceId, ServiceId, ServiceSlotResource,
};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use std::time::Duration;

/// `PostgreSQL` implementation of every portal store trait.
///
/// Conditional writes that carry a capacity guard or a slot adjustment run in
/// one transaction holding a row lock on the resource, so concurrent approvals
/// on the same resource are serialized.
#[derive(Clone, Debug)]
pub struct PostgresPortalStore {
    pub(crate) pool: PgPool,
}

impl PostgresPortalStore {
    /// Wrap an existing pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect a new pool.
    ///
    /// # Errors
    ///
    /// Returns `DependencyFailure` if the database is unreachable.
    pub async fn connect(
        database_url: &str,
        max_connections: u32,
        min_connections: u32,
        connect_timeout: Duration,
    ) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .acquire_timeout(connect_timeout)
            .connect(database_url)
            .await
            .map_err(db_error("Failed to connect"))?;
        Ok(Self::new(pool))
    }

    /// Underlying pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Run database migrations.
    ///
    /// # Errors
    ///
    /// Returns error if migrations fail.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| PortalError::dependency("postgres", format!("Migration failed: {e}")))?;
        Ok(())
    }

    /// Register a bookable resource.
    ///
    /// # Errors
    ///
    /// `ValidationFailed` if the unit count does not fit, `DependencyFailure` on database errors.
    pub async fn insert_resource(&self, resource: &BookableResource) -> Result<()> {
        sqlx::query(
            r"
            INSERT INTO bookable_resources (id, name, description, total_units, created_at)
            VALUES ($1, $2, $3, $4, $5)
            ",
        )
        .bind(resource.id.as_uuid())
        .bind(&resource.name)
        .bind(&resource.description)
        .bind(to_column(resource.total_units)?)
        .bind(resource.created_at)
        .execute(&self.pool)
        .await
        .map_err(db_error("Failed to insert resource"))?;
        Ok(())
    }

    /// Register a service with its opening slot balance.
    ///
    /// # Errors
    ///
    /// `ValidationFailed` if the slot count does not fit, `DependencyFailure` on database errors.
    pub async fn insert_service_resource(&self, service: &ServiceSlotResource) -> Result<()> {
        sqlx::query("INSERT INTO service_slot_resources (id, name, slots) VALUES ($1, $2, $3)")
            .bind(service.id.as_uuid())
            .bind(&service.name)
            .bind(to_column(service.slots)?)
            .execute(&self.pool)
            .await
            .map_err(db_error("Failed to insert service resource"))?;
        Ok(())
    }
}

impl ResourceStore for PostgresPortalStore {
    async fn get_resource(&self, resource_id: ResourceId) -> Result<Option<BookableResource>> {
        sqlx::query_as::<_, ResourceRow>(
            r"
            SELECT id, name, description, total_units, created_at
            FROM bookable_resources
            WHERE id = $1
            ",
        )
        .bind(resource_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("Failed to get resource"))?
        .map(BookableResource::try_from)
        .transpose()
    }

    async fn get_service_resource(
        &self,
        service_id: ServiceId,
    ) -> Result<Option<ServiceSlotResource>> {
        sqlx::query_as::<_, ServiceSlotRow>(
            "SELECT id, name, slots FROM service_slot_resources WHERE id = $1",
        )
        .bind(service_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("Failed to get service resource"))?
        .map(ServiceSlotResource::try_from)
        .transpose()
    }
}
