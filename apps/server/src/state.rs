//! Shared application state

use crate::{
    config::{Config, StoreBackend},
    db::{standard_indexes, DocumentStore, InMemoryDocumentStore, PostgresDocumentStore},
    services::{
        IdentityResolver, ReferenceValidator, ResourceQueries, UniquenessGuard, WriteCoordinator,
    },
    Result,
};
use ris_validator::{ShapeValidator, StructuralValidator};
use sqlx::PgPool;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct AppStateOptions {
    pub run_migrations: bool,
    pub ensure_indexes: bool,
}

impl Default for AppStateOptions {
    fn default() -> Self {
        Self {
            run_migrations: true,
            ensure_indexes: true,
        }
    }
}

/// Shared application state passed to all handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: Arc<dyn DocumentStore>,
    pub write_coordinator: Arc<WriteCoordinator>,
    pub queries: Arc<ResourceQueries>,
}

impl AppState {
    pub async fn new(config: Config) -> Result<Self> {
        let options = AppStateOptions {
            run_migrations: config.database.run_migrations,
            ..AppStateOptions::default()
        };
        Self::new_with_options(config, options).await
    }

    pub async fn new_with_options(config: Config, options: AppStateOptions) -> Result<Self> {
        let store: Arc<dyn DocumentStore> = match config.database.backend {
            StoreBackend::Postgres => {
                let pool = create_db_pool(&config).await?;
                if options.run_migrations {
                    tracing::info!("Running database migrations...");
                    sqlx::migrate!("./migrations").run(&pool).await?;
                }
                Arc::new(PostgresDocumentStore::new(pool))
            }
            StoreBackend::Memory => {
                tracing::warn!("Using in-memory document store; data is lost on shutdown");
                Arc::new(InMemoryDocumentStore::new())
            }
        };

        Self::with_store(config, store, options.ensure_indexes).await
    }

    /// Build the services over an existing store.
    pub async fn with_store(
        config: Config,
        store: Arc<dyn DocumentStore>,
        ensure_indexes: bool,
    ) -> Result<Self> {
        if ensure_indexes {
            ensure_standard_indexes(store.as_ref(), &config).await?;
        }

        let validator: Arc<dyn ShapeValidator> = Arc::new(StructuralValidator::new());
        let identity = IdentityResolver::new(store.clone());
        let references = ReferenceValidator::new(
            store.clone(),
            identity.clone(),
            config.integrity.compatible_service_request_statuses.clone(),
        );
        let uniqueness = UniquenessGuard::new(store.clone());

        let write_coordinator = Arc::new(WriteCoordinator::new(
            store.clone(),
            validator,
            identity.clone(),
            references,
            uniqueness,
        ));
        let queries = Arc::new(ResourceQueries::new(store.clone(), identity));

        Ok(Self {
            config: Arc::new(config),
            store,
            write_coordinator,
            queries,
        })
    }
}

async fn ensure_standard_indexes(store: &dyn DocumentStore, config: &Config) -> Result<()> {
    for (kind, index) in standard_indexes(config.integrity.enforce_reference_cardinality_index) {
        store
            .ensure_unique_index(kind.collection(), &index)
            .await
            .map_err(|e| {
                tracing::error!(
                    collection = kind.collection(),
                    index = %index.name,
                    error = %e,
                    "Failed to ensure unique index"
                );
                e
            })?;
        tracing::debug!(
            collection = kind.collection(),
            index = %index.name,
            "Unique index ensured"
        );
    }
    Ok(())
}

async fn create_db_pool(config: &Config) -> Result<PgPool> {
    tracing::info!("Creating database connection pool...");

    let statement_timeout = config.database.statement_timeout_seconds;
    let lock_timeout = config.database.lock_timeout_seconds;

    let pool = sqlx::postgres::PgPoolOptions::new()
        .min_connections(config.database.pool_min_size)
        .max_connections(config.database.pool_max_size)
        .acquire_timeout(std::time::Duration::from_secs(
            config.database.pool_timeout_seconds,
        ))
        .after_connect(move |conn, _meta| {
            Box::pin(async move {
                sqlx::query(&format!("SET statement_timeout = '{}s'", statement_timeout))
                    .execute(&mut *conn)
                    .await?;
                sqlx::query(&format!("SET lock_timeout = '{}s'", lock_timeout))
                    .execute(&mut *conn)
                    .await?;
                Ok(())
            })
        })
        .connect(&config.database.url)
        .await
        .map_err(crate::Error::Database)?;

    tracing::info!(
        "Database pool created (min: {}, max: {})",
        config.database.pool_min_size,
        config.database.pool_max_size
    );

    Ok(pool)
}
