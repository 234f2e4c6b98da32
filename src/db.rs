use crate::config::AppConfig;
use crate::errors::ServiceError;
use sea_orm::{
    ConnectOptions, ConnectionTrait, Database, DatabaseConnection, Schema,
};
use std::time::Duration;
use tracing::{debug, info};

/// Type alias for a database connection pool
pub type DbPool = DatabaseConnection;

/// Configuration for database connection
#[derive(Debug, Clone)]
pub struct DbConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connect_timeout: Duration,
    pub acquire_timeout: Duration,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            max_connections: 10,
            min_connections: 1,
            connect_timeout: Duration::from_secs(30),
            acquire_timeout: Duration::from_secs(8),
        }
    }
}

impl DbConfig {
    pub fn from_app_config(cfg: &AppConfig) -> Self {
        Self {
            url: cfg.database_url.clone(),
            max_connections: cfg.db_max_connections,
            min_connections: cfg.db_min_connections,
            connect_timeout: Duration::from_secs(cfg.db_connect_timeout_secs),
            acquire_timeout: Duration::from_secs(cfg.db_acquire_timeout_secs),
        }
    }
}

/// Establishes a connection pool using the application configuration.
pub async fn establish_connection(cfg: &AppConfig) -> Result<DbPool, ServiceError> {
    establish_connection_with_config(&DbConfig::from_app_config(cfg)).await
}

/// Establishes a connection pool with explicit settings.
pub async fn establish_connection_with_config(config: &DbConfig) -> Result<DbPool, ServiceError> {
    debug!("configuring database connection: {:?}", config);

    let mut opt = ConnectOptions::new(config.url.clone());
    opt.max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .connect_timeout(config.connect_timeout)
        .acquire_timeout(config.acquire_timeout)
        .sqlx_logging(false);

    let pool = Database::connect(opt).await?;

    info!(
        max_connections = config.max_connections,
        "database connection established"
    );
    Ok(pool)
}

/// Creates any missing tables from the entity definitions.
///
/// Backend-appropriate DDL is derived from the entities themselves, so the
/// same bootstrap works for Postgres in production and SQLite in tests.
pub async fn bootstrap_schema(db: &DatabaseConnection) -> Result<(), ServiceError> {
    let backend = db.get_database_backend();
    let schema = Schema::new(backend);

    let statements = [
        schema.create_table_from_entity(crate::entities::product::Entity),
        schema.create_table_from_entity(crate::entities::product_variant::Entity),
        schema.create_table_from_entity(crate::entities::cart::Entity),
        schema.create_table_from_entity(crate::entities::cart_item::Entity),
        schema.create_table_from_entity(crate::entities::payment_intent::Entity),
    ];

    for mut stmt in statements {
        db.execute(backend.build(stmt.if_not_exists())).await?;
    }

    info!("database schema bootstrap complete");
    Ok(())
}
