//! PostgreSQL 启动依赖
//!
//! 同一个对象同时承担就绪检查、schema 同步和运行期探针

use async_trait::async_trait;
use sqlx::{Connection, PgPool};
use storefront_config::DatabaseConfig;
use storefront_errors::{AppError, AppResult};
use storefront_ports::{DatabaseReadiness, DependencyProbe, ModelDefinition, SchemaSynchronizer};
use tokio::sync::OnceCell;
use tracing::{info, warn};

use crate::connection::{check_connection, connect, create_pool, maintenance_options};
use crate::provision::{ensure_database, DatabaseStatus, PgCatalog};
use crate::schema::synchronize_models;

/// PostgreSQL 数据库
pub struct PostgresDatabase {
    config: DatabaseConfig,
    pool: OnceCell<PgPool>,
}

impl PostgresDatabase {
    pub fn new(config: DatabaseConfig) -> Self {
        Self {
            config,
            pool: OnceCell::new(),
        }
    }

    /// 获取连接池，首次调用时创建
    ///
    /// 必须在数据库确认存在之后调用。
    pub async fn pool(&self) -> AppResult<&PgPool> {
        self.pool
            .get_or_try_init(|| async {
                let pool = create_pool(&self.config).await?;
                info!(
                    database = %self.config.database,
                    max_connections = self.config.pool.max,
                    min_connections = self.config.pool.min,
                    "PostgreSQL connection pool created"
                );
                Ok::<_, AppError>(pool)
            })
            .await
    }

    /// 已创建的连接池
    pub fn try_pool(&self) -> Option<&PgPool> {
        self.pool.get()
    }

    pub fn config(&self) -> &DatabaseConfig {
        &self.config
    }
}

#[async_trait]
impl DatabaseReadiness for PostgresDatabase {
    async fn ensure_database_ready(&self) -> AppResult<()> {
        let options = maintenance_options(&self.config);
        let mut conn = connect(&options, &self.config).await?;

        let status = ensure_database(&mut PgCatalog::new(&mut conn), &self.config.database).await;

        if let Err(e) = conn.close().await {
            warn!(error = %e, "Failed to close maintenance connection");
        }

        if status? == DatabaseStatus::Created {
            info!(
                database = %self.config.database,
                host = %self.config.host,
                "Database provisioned"
            );
        }
        Ok(())
    }
}

#[async_trait]
impl SchemaSynchronizer for PostgresDatabase {
    async fn synchronize(&self, models: &[ModelDefinition]) -> AppResult<()> {
        let pool = self.pool().await?;
        synchronize_models(pool, models).await
    }
}

#[async_trait]
impl DependencyProbe for PostgresDatabase {
    fn component_name(&self) -> &'static str {
        "postgres"
    }

    async fn probe(&self) -> AppResult<()> {
        match self.try_pool() {
            Some(pool) => check_connection(pool).await,
            None => Err(AppError::unavailable("Connection pool not initialized")),
        }
    }
}
