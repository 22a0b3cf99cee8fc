//! 数据库存在性检查与创建

use async_trait::async_trait;
use sqlx::postgres::PgConnection;
use sqlx::Executor;
use storefront_errors::{AppError, AppResult};
use tracing::{debug, info};

use crate::connection::quote_identifier;

/// `duplicate_database`
const DUPLICATE_DATABASE: &str = "42P04";

/// 创建结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateOutcome {
    Created,
    /// 其他实例抢先创建
    AlreadyExists,
}

/// 数据库状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatabaseStatus {
    Existing,
    Created,
}

/// 数据库目录操作
#[async_trait]
pub trait DatabaseCatalog: Send {
    async fn database_exists(&mut self, name: &str) -> AppResult<bool>;

    async fn create_database(&mut self, name: &str) -> AppResult<CreateOutcome>;
}

/// 确保数据库存在
///
/// 已存在时只做一次查询；并发创建导致的重复错误视为成功。
pub async fn ensure_database<C>(catalog: &mut C, name: &str) -> AppResult<DatabaseStatus>
where
    C: DatabaseCatalog + ?Sized,
{
    if catalog.database_exists(name).await? {
        debug!(database = %name, "Database already exists");
        return Ok(DatabaseStatus::Existing);
    }

    match catalog.create_database(name).await? {
        CreateOutcome::Created => info!(database = %name, "Database created"),
        CreateOutcome::AlreadyExists => {
            info!(database = %name, "Database was created concurrently")
        }
    }
    Ok(DatabaseStatus::Created)
}

/// 基于维护库连接的 PostgreSQL 目录
pub struct PgCatalog<'c> {
    conn: &'c mut PgConnection,
}

impl<'c> PgCatalog<'c> {
    pub fn new(conn: &'c mut PgConnection) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl<'c> DatabaseCatalog for PgCatalog<'c> {
    async fn database_exists(&mut self, name: &str) -> AppResult<bool> {
        sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM pg_database WHERE datname = $1)",
        )
        .bind(name)
        .fetch_one(&mut *self.conn)
        .await
        .map_err(|e| AppError::database(format!("Failed to look up database {}: {}", name, e)))
    }

    async fn create_database(&mut self, name: &str) -> AppResult<CreateOutcome> {
        // CREATE DATABASE 不能放进事务，也不能预编译
        let sql = format!("CREATE DATABASE {}", quote_identifier(name));
        match (&mut *self.conn).execute(sql.as_str()).await {
            Ok(_) => Ok(CreateOutcome::Created),
            Err(sqlx::Error::Database(db))
                if db.code().as_deref() == Some(DUPLICATE_DATABASE) =>
            {
                Ok(CreateOutcome::AlreadyExists)
            }
            Err(e) => Err(AppError::database(format!(
                "Failed to create database {}: {}",
                name, e
            ))),
        }
    }
}
