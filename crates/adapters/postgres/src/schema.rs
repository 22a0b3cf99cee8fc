//! PostgreSQL schema 同步
//!
//! 根据模型定义建表、补齐缺失列；从不删除或修改已有列

use sqlx::PgPool;
use storefront_errors::{AppError, AppResult};
use storefront_ports::{ColumnDefinition, ColumnType, ModelDefinition};
use tracing::{debug, info};

use crate::connection::quote_identifier;

/// 列类型对应的 SQL
pub fn column_type_sql(column_type: ColumnType) -> String {
    match column_type {
        ColumnType::Serial => "SERIAL".to_string(),
        ColumnType::BigSerial => "BIGSERIAL".to_string(),
        ColumnType::Integer => "INTEGER".to_string(),
        ColumnType::BigInt => "BIGINT".to_string(),
        ColumnType::Boolean => "BOOLEAN".to_string(),
        ColumnType::Text => "TEXT".to_string(),
        ColumnType::Varchar(len) => format!("VARCHAR({})", len),
        ColumnType::Numeric { precision, scale } => format!("NUMERIC({}, {})", precision, scale),
        ColumnType::Timestamptz => "TIMESTAMPTZ".to_string(),
        ColumnType::Uuid => "UUID".to_string(),
        ColumnType::Jsonb => "JSONB".to_string(),
    }
}

/// 列定义 SQL
///
/// 给已有表补列时，没有默认值的 NOT NULL 列按可空添加，已有行无法满足约束。
fn column_sql(column: &ColumnDefinition, existing_table: bool) -> String {
    let mut sql = format!(
        "{} {}",
        quote_identifier(&column.name),
        column_type_sql(column.column_type)
    );
    let enforce_not_null = !column.nullable && !(existing_table && column.default.is_none());
    if enforce_not_null {
        sql.push_str(" NOT NULL");
    }
    if let Some(default) = &column.default {
        sql.push_str(" DEFAULT ");
        sql.push_str(default);
    }
    sql
}

/// 建表语句
pub fn create_table_sql(model: &ModelDefinition) -> String {
    let columns = model.all_columns();
    let mut parts: Vec<String> = columns.iter().map(|c| column_sql(c, false)).collect();

    let primary_key: Vec<String> = columns
        .iter()
        .filter(|c| c.primary_key)
        .map(|c| quote_identifier(&c.name))
        .collect();
    if !primary_key.is_empty() {
        parts.push(format!("PRIMARY KEY ({})", primary_key.join(", ")));
    }

    format!(
        "CREATE TABLE IF NOT EXISTS {} ({})",
        quote_identifier(&model.table),
        parts.join(", ")
    )
}

/// 补列语句（主键列不补）
pub fn add_column_sql(model: &ModelDefinition) -> Vec<String> {
    model
        .all_columns()
        .iter()
        .filter(|c| !c.primary_key)
        .map(|c| {
            format!(
                "ALTER TABLE {} ADD COLUMN IF NOT EXISTS {}",
                quote_identifier(&model.table),
                column_sql(c, true)
            )
        })
        .collect()
}

/// 单个模型的全部同步语句
pub fn sync_statements(model: &ModelDefinition) -> Vec<String> {
    let mut statements = vec![create_table_sql(model)];
    statements.extend(add_column_sql(model));
    statements
}

/// 在一个事务内同步所有模型
pub async fn synchronize_models(pool: &PgPool, models: &[ModelDefinition]) -> AppResult<()> {
    for model in models {
        model.validate()?;
    }

    let mut tx = pool
        .begin()
        .await
        .map_err(|e| AppError::database(format!("Failed to begin transaction: {}", e)))?;

    for model in models {
        for statement in sync_statements(model) {
            debug!(table = %model.table, sql = %statement, "Applying schema statement");
            sqlx::query(&statement)
                .execute(&mut *tx)
                .await
                .map_err(|e| {
                    AppError::database(format!(
                        "Failed to synchronize table {}: {}",
                        model.table, e
                    ))
                })?;
        }
    }

    tx.commit()
        .await
        .map_err(|e| AppError::database(format!("Failed to commit schema sync: {}", e)))?;

    info!(tables = models.len(), "Database schema synchronized");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn movies() -> ModelDefinition {
        ModelDefinition::new("movies")
            .column(ColumnDefinition::new("id", ColumnType::Serial).primary_key())
            .column(ColumnDefinition::new("title", ColumnType::Varchar(255)).not_null())
            .column(ColumnDefinition::new("description", ColumnType::Text))
            .with_timestamps()
    }

    #[test]
    fn test_create_table_sql() {
        assert_eq!(
            create_table_sql(&movies()),
            "CREATE TABLE IF NOT EXISTS \"movies\" (\
             \"id\" SERIAL NOT NULL, \
             \"title\" VARCHAR(255) NOT NULL, \
             \"description\" TEXT, \
             \"created_at\" TIMESTAMPTZ NOT NULL DEFAULT NOW(), \
             \"updated_at\" TIMESTAMPTZ NOT NULL DEFAULT NOW(), \
             PRIMARY KEY (\"id\"))"
        );
    }

    #[test]
    fn test_add_columns_skip_primary_key_and_relax_required_columns() {
        let statements = add_column_sql(&movies());

        assert_eq!(statements.len(), 4);
        assert!(statements.iter().all(|s| !s.contains("\"id\"")));
        assert_eq!(
            statements[0],
            "ALTER TABLE \"movies\" ADD COLUMN IF NOT EXISTS \"title\" VARCHAR(255)"
        );
        // 有默认值的 NOT NULL 列保留约束
        assert_eq!(
            statements[2],
            "ALTER TABLE \"movies\" ADD COLUMN IF NOT EXISTS \"created_at\" TIMESTAMPTZ NOT NULL DEFAULT NOW()"
        );
    }

    #[test]
    fn test_statements_are_non_destructive() {
        for statement in sync_statements(&movies()) {
            let upper = statement.to_uppercase();
            assert!(upper.contains("IF NOT EXISTS"));
            assert!(!upper.contains("DROP"));
            assert!(!upper.contains("ALTER COLUMN"));
        }
    }

    #[test]
    fn test_numeric_type() {
        assert_eq!(
            column_type_sql(ColumnType::Numeric { precision: 10, scale: 2 }),
            "NUMERIC(10, 2)"
        );
    }
}
