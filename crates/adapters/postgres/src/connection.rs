//! PostgreSQL 连接管理

use secrecy::ExposeSecret;
use sqlx::postgres::{PgConnectOptions, PgConnection, PgPool, PgPoolOptions};
use sqlx::Connection;
use storefront_config::DatabaseConfig;
use storefront_errors::{AppError, AppResult};

/// 用于创建数据库的维护库
pub const MAINTENANCE_DATABASE: &str = "postgres";

/// 目标数据库的连接参数
pub fn connect_options(config: &DatabaseConfig) -> PgConnectOptions {
    PgConnectOptions::new()
        .host(&config.host)
        .port(config.port)
        .username(&config.username)
        .password(config.password.expose_secret())
        .database(&config.database)
}

/// 维护库的连接参数（目标库可能还不存在）
pub fn maintenance_options(config: &DatabaseConfig) -> PgConnectOptions {
    connect_options(config).database(MAINTENANCE_DATABASE)
}

/// 建立单个连接，超时取连接池的 acquire 配置
pub async fn connect(options: &PgConnectOptions, config: &DatabaseConfig) -> AppResult<PgConnection> {
    let timeout = config.pool.acquire;
    match tokio::time::timeout(timeout, PgConnection::connect_with(options)).await {
        Ok(Ok(conn)) => Ok(conn),
        Ok(Err(e)) => Err(AppError::database(format!(
            "Failed to connect to {}:{}: {}",
            config.host, config.port, e
        ))),
        Err(_) => Err(AppError::timeout(format!(
            "Connecting to {}:{} took longer than {:?}",
            config.host, config.port, timeout
        ))),
    }
}

/// 创建 PostgreSQL 连接池
pub async fn create_pool(config: &DatabaseConfig) -> AppResult<PgPool> {
    PgPoolOptions::new()
        .max_connections(config.pool.max)
        .min_connections(config.pool.min)
        .acquire_timeout(config.pool.acquire)
        .idle_timeout(config.pool.idle)
        .connect_with(connect_options(config))
        .await
        .map_err(|e| AppError::database(format!("Failed to create pool: {}", e)))
}

/// 检查数据库连接
pub async fn check_connection(pool: &PgPool) -> AppResult<()> {
    sqlx::query("SELECT 1")
        .execute(pool)
        .await
        .map_err(|e| AppError::database(format!("Database health check failed: {}", e)))?;
    Ok(())
}

/// 双引号包裹标识符，内部双引号转义
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_identifier() {
        assert_eq!(quote_identifier("orders"), "\"orders\"");
        assert_eq!(quote_identifier("billing-db"), "\"billing-db\"");
        assert_eq!(quote_identifier("we\"ird"), "\"we\"\"ird\"");
    }
}
