//! Core ModelKit functionality
//!
//! `ModelKit` owns the connection pool and the loaded configuration, and hands
//! out stores wired to them.

use sqlx::postgres::PgRow;
use sqlx::PgPool;
use std::time::Duration;
use store_object::{GenericStore, Record};

use crate::errors::ModelKitError;
use crate::history::{HistoryHook, HistoryRecord};
use crate::model_store::ModelStore;
use config::{AppConfig, DatabaseConfig, HistoryConfig, OverlapPolicy};

/// Main coordinator that manages the database connection
pub struct ModelKit {
    pool: PgPool,
    history: HistoryConfig,
}

impl ModelKit {
    /// Connect with default history settings
    pub async fn connect(config: DatabaseConfig) -> Result<Self, ModelKitError> {
        let pool = Self::open_pool(&config).await?;
        Ok(Self::with_pool(pool, HistoryConfig::default()))
    }

    /// Connect using a loaded application configuration
    pub async fn from_config(config: AppConfig) -> Result<Self, ModelKitError> {
        let pool = Self::open_pool(&config.database).await?;
        Ok(Self::with_pool(pool, config.history))
    }

    /// Load configuration from the environment (see `AppConfig::load`) and connect
    pub async fn from_env() -> Result<Self, ModelKitError> {
        let config = AppConfig::load()?;
        Self::from_config(config).await
    }

    /// Wrap an existing pool
    pub fn with_pool(pool: PgPool, history: HistoryConfig) -> Self {
        Self { pool, history }
    }

    async fn open_pool(config: &DatabaseConfig) -> Result<PgPool, ModelKitError> {
        let connection_string = config.connection_string();

        let mut pool_options = sqlx::postgres::PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(Duration::from_secs(config.connection_timeout_seconds))
            .idle_timeout(Duration::from_secs(config.idle_timeout_seconds));

        // Set max lifetime if specified
        if config.max_lifetime_seconds > 0 {
            pool_options =
                pool_options.max_lifetime(Duration::from_secs(config.max_lifetime_seconds));
        }

        let pool = pool_options.connect(&connection_string).await?;
        tracing::info!(
            host = %config.host,
            database = %config.database,
            max_connections = config.max_connections,
            "database pool ready"
        );
        Ok(pool)
    }

    /// Get database pool reference
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub fn overlap_policy(&self) -> OverlapPolicy {
        self.history.overlap_policy
    }

    /// Plain store for `T`
    pub fn store<T>(&self) -> Result<GenericStore<T>, ModelKitError>
    where
        T: Record + for<'r> sqlx::FromRow<'r, PgRow>,
    {
        Ok(GenericStore::new(self.pool.clone())?)
    }

    /// Hooked store for `T` with no hooks attached yet
    pub fn models<T>(&self) -> Result<ModelStore<T, GenericStore<T>>, ModelKitError>
    where
        T: Record + for<'r> sqlx::FromRow<'r, PgRow>,
    {
        Ok(ModelStore::new(self.store::<T>()?))
    }

    /// Hooked store for a history record, validated with the configured
    /// overlap policy
    pub fn history<T>(&self) -> Result<ModelStore<T, GenericStore<T>>, ModelKitError>
    where
        T: HistoryRecord + for<'r> sqlx::FromRow<'r, PgRow>,
    {
        Ok(self
            .models::<T>()?
            .with_hook(HistoryHook::new(self.overlap_policy())))
    }

    /// Check database connection health
    pub async fn health_check(&self) -> Result<(), ModelKitError> {
        sqlx::query("SELECT 1").fetch_one(&self.pool).await?;
        Ok(())
    }
}
