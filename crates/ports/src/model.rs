//! 数据模型定义
//!
//! 服务声明自己的表结构，由 [`SchemaSynchronizer`](crate::SchemaSynchronizer) 同步到数据库

use std::collections::HashSet;

use storefront_errors::{AppError, AppResult};

/// PostgreSQL 标识符最大长度
pub const MAX_IDENTIFIER_LEN: usize = 63;

/// 列类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Serial,
    BigSerial,
    Integer,
    BigInt,
    Boolean,
    Text,
    Varchar(u32),
    Numeric { precision: u8, scale: u8 },
    Timestamptz,
    Uuid,
    Jsonb,
}

/// 列定义
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDefinition {
    pub name: String,
    pub column_type: ColumnType,
    pub nullable: bool,
    pub primary_key: bool,
    /// 默认值 SQL 表达式
    pub default: Option<String>,
}

impl ColumnDefinition {
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
            nullable: true,
            primary_key: false,
            default: None,
        }
    }

    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self.nullable = false;
        self
    }

    pub fn default_sql(mut self, expr: impl Into<String>) -> Self {
        self.default = Some(expr.into());
        self
    }
}

/// 表模型定义
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelDefinition {
    pub table: String,
    pub columns: Vec<ColumnDefinition>,
    /// 自动追加 created_at / updated_at
    pub timestamps: bool,
}

impl ModelDefinition {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            columns: Vec::new(),
            timestamps: false,
        }
    }

    pub fn column(mut self, column: ColumnDefinition) -> Self {
        self.columns.push(column);
        self
    }

    pub fn with_timestamps(mut self) -> Self {
        self.timestamps = true;
        self
    }

    /// 全部列，包括自动时间戳列
    pub fn all_columns(&self) -> Vec<ColumnDefinition> {
        let mut columns = self.columns.clone();
        if self.timestamps {
            for name in ["created_at", "updated_at"] {
                if !columns.iter().any(|c| c.name == name) {
                    columns.push(
                        ColumnDefinition::new(name, ColumnType::Timestamptz)
                            .not_null()
                            .default_sql("NOW()"),
                    );
                }
            }
        }
        columns
    }

    /// 校验表名与列名，在生成任何 SQL 之前调用
    pub fn validate(&self) -> AppResult<()> {
        if !is_valid_identifier(&self.table) {
            return Err(AppError::validation(format!(
                "Invalid table name '{}'",
                self.table
            )));
        }

        let columns = self.all_columns();
        if columns.is_empty() {
            return Err(AppError::validation(format!(
                "Model '{}' has no columns",
                self.table
            )));
        }

        let mut seen = HashSet::new();
        for column in &columns {
            if !is_valid_identifier(&column.name) {
                return Err(AppError::validation(format!(
                    "Invalid column name '{}' in model '{}'",
                    column.name, self.table
                )));
            }
            if !seen.insert(column.name.as_str()) {
                return Err(AppError::validation(format!(
                    "Duplicate column '{}' in model '{}'",
                    column.name, self.table
                )));
            }
        }

        Ok(())
    }
}

/// 标识符只允许 `[A-Za-z_][A-Za-z0-9_]*`
pub fn is_valid_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    let first_ok = matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_');
    first_ok
        && name.len() <= MAX_IDENTIFIER_LEN
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn orders() -> ModelDefinition {
        ModelDefinition::new("orders")
            .column(ColumnDefinition::new("id", ColumnType::Serial).primary_key())
            .column(ColumnDefinition::new("user_id", ColumnType::Varchar(255)).not_null())
    }

    #[test]
    fn test_identifier_rules() {
        assert!(is_valid_identifier("orders"));
        assert!(is_valid_identifier("_private_1"));
        assert!(!is_valid_identifier(""));
        assert!(!is_valid_identifier("1orders"));
        assert!(!is_valid_identifier("orders; DROP TABLE users"));
        assert!(!is_valid_identifier(&"a".repeat(MAX_IDENTIFIER_LEN + 1)));
    }

    #[test]
    fn test_timestamps_are_appended_once() {
        let model = orders().with_timestamps();
        let names: Vec<_> = model.all_columns().into_iter().map(|c| c.name).collect();
        assert_eq!(names, vec!["id", "user_id", "created_at", "updated_at"]);
    }

    #[test]
    fn test_primary_key_implies_not_null() {
        let column = ColumnDefinition::new("id", ColumnType::Serial).primary_key();
        assert!(column.primary_key);
        assert!(!column.nullable);
    }

    #[test]
    fn test_validate_rejects_bad_models() {
        assert!(orders().validate().is_ok());
        assert!(ModelDefinition::new("empty").validate().is_err());
        assert!(ModelDefinition::new("bad-name")
            .column(ColumnDefinition::new("id", ColumnType::Integer))
            .validate()
            .is_err());

        let duplicated = orders().column(ColumnDefinition::new("user_id", ColumnType::Text));
        assert!(matches!(duplicated.validate(), Err(AppError::Validation(_))));
    }
}
