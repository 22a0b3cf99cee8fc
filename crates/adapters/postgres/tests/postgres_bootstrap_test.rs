//! 标记为 ignore 的用例需要真实 PostgreSQL，运行方式：
//!
//! TEST_DATABASE_HOST=localhost TEST_DATABASE_USER=postgres TEST_DATABASE_PASSWORD=postgres \
//!     cargo test -p storefront-adapter-postgres -- --ignored

use secrecy::Secret;
use storefront_adapter_postgres::PostgresDatabase;
use storefront_config::{DatabaseConfig, Dialect, PoolConfig};
use storefront_ports::{
    ColumnDefinition, ColumnType, DatabaseReadiness, DependencyProbe, ModelDefinition,
    SchemaSynchronizer,
};

fn test_config(database: &str) -> DatabaseConfig {
    let var = |key: &str, default: &str| std::env::var(key).unwrap_or_else(|_| default.to_string());
    DatabaseConfig {
        username: var("TEST_DATABASE_USER", "postgres"),
        password: Secret::new(var("TEST_DATABASE_PASSWORD", "postgres")),
        database: database.to_string(),
        host: var("TEST_DATABASE_HOST", "localhost"),
        port: var("TEST_DATABASE_PORT", "5432").parse().unwrap(),
        dialect: Dialect::Postgres,
        pool: PoolConfig::default(),
    }
}

fn widgets() -> ModelDefinition {
    ModelDefinition::new("widgets")
        .column(ColumnDefinition::new("id", ColumnType::Serial).primary_key())
        .column(ColumnDefinition::new("name", ColumnType::Varchar(100)).not_null())
        .with_timestamps()
}

#[tokio::test]
#[ignore]
async fn test_readiness_and_sync_are_idempotent() {
    let db = PostgresDatabase::new(test_config("storefront_bootstrap_test"));

    db.ensure_database_ready().await.unwrap();
    db.ensure_database_ready().await.unwrap();

    db.synchronize(&[widgets()]).await.unwrap();
    let pool = db.pool().await.unwrap();
    sqlx::query("INSERT INTO widgets (name) VALUES ('kept')")
        .execute(pool)
        .await
        .unwrap();

    // 再次同步并追加一列，已有数据保留
    let extended = widgets().column(ColumnDefinition::new("color", ColumnType::Text));
    db.synchronize(&[extended]).await.unwrap();

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM widgets WHERE name = 'kept'")
        .fetch_one(pool)
        .await
        .unwrap();
    assert!(count >= 1);

    db.probe().await.unwrap();
}

#[tokio::test]
async fn test_unreachable_host_fails_instead_of_hanging() {
    let mut config = test_config("storefront_unreachable");
    config.host = "127.0.0.1".to_string();
    config.port = 1;
    config.pool.acquire = std::time::Duration::from_secs(2);

    let db = PostgresDatabase::new(config);
    assert!(db.ensure_database_ready().await.is_err());
}
