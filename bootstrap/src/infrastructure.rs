//! 基础设施资源管理
//!
//! 按服务配置创建依赖资源，网关不持有数据库

use std::sync::Arc;

use storefront_adapter_postgres::PostgresDatabase;
use storefront_config::ServiceConfig;
use tracing::info;

use crate::starter::DatabaseDependency;

/// 基础设施资源容器
#[derive(Clone, Default)]
pub struct Infrastructure {
    /// PostgreSQL 数据库（计费、库存服务）
    database: Option<Arc<PostgresDatabase>>,
}

impl Infrastructure {
    /// 从配置创建基础设施资源
    ///
    /// 这里只构造句柄，真正的连接发生在依赖检查步骤中。
    pub fn from_config(config: &ServiceConfig) -> Self {
        let database = config.database.as_ref().map(|db| {
            info!(
                host = %db.host,
                port = db.port,
                database = %db.database,
                dialect = db.dialect.as_str(),
                "PostgreSQL dependency configured"
            );
            Arc::new(PostgresDatabase::new(db.clone()))
        });

        if database.is_none() {
            info!("Database not configured, skipping");
        }

        Self { database }
    }

    /// 获取 PostgreSQL 数据库
    pub fn database(&self) -> Option<Arc<PostgresDatabase>> {
        self.database.clone()
    }

    /// 是否配置了数据库
    pub fn has_database(&self) -> bool {
        self.database.is_some()
    }

    /// 启动流程使用的数据库依赖
    pub fn dependency(&self) -> Option<DatabaseDependency> {
        self.database.clone().map(DatabaseDependency::from_database)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use storefront_config::{EnvSource, ServiceProfile};

    fn source(pairs: &[(&str, &str)]) -> EnvSource {
        EnvSource::from_pairs(pairs.iter().copied())
    }

    #[test]
    fn test_gateway_has_no_database() {
        let config = ServiceConfig::from_source(
            ServiceProfile::Gateway,
            &source(&[
                ("HOST", "127.0.0.1"),
                ("PORT", "8080"),
                ("INVENTORY_URL", "http://localhost:8081"),
            ]),
        )
        .unwrap();

        let infra = Infrastructure::from_config(&config);
        assert!(!infra.has_database());
        assert!(infra.dependency().is_none());
    }

    #[test]
    fn test_billing_gets_postgres_dependency() {
        let config = ServiceConfig::from_source(
            ServiceProfile::Billing,
            &source(&[
                ("HOST", "127.0.0.1"),
                ("PORT", "8082"),
                ("DB_USER", "billing"),
                ("DB_PASSWORD", "secret"),
                ("DB_NAME", "billing"),
                ("DB_HOST", "localhost"),
                ("DB_PORT", "5432"),
            ]),
        )
        .unwrap();

        let infra = Infrastructure::from_config(&config);
        let database = infra.database().unwrap();
        assert_eq!(database.config().database, "billing");
        // 构造句柄不会建立连接
        assert!(database.try_pool().is_none());
        assert!(infra.dependency().is_some());
    }
}
