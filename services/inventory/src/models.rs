//! 库存服务数据模型

use storefront_ports::{ColumnDefinition, ColumnType, ModelDefinition};

/// 电影表
pub fn movie() -> ModelDefinition {
    ModelDefinition::new("movies")
        .column(ColumnDefinition::new("id", ColumnType::Serial).primary_key())
        .column(ColumnDefinition::new("title", ColumnType::Varchar(255)).not_null())
        .column(ColumnDefinition::new("description", ColumnType::Text))
        .with_timestamps()
}

pub fn all() -> Vec<ModelDefinition> {
    vec![movie()]
}

#[cfg(test)]
mod tests {
    use super::*;
    use storefront_adapter_postgres::add_column_sql;

    #[test]
    fn test_models_are_valid() {
        for model in all() {
            model.validate().unwrap();
        }
    }

    #[test]
    fn test_movie_columns_can_be_added_to_existing_table() {
        let statements = add_column_sql(&movie());

        // 主键不补，其余列逐个补齐
        assert_eq!(statements.len(), 4);
        assert_eq!(
            statements[0],
            "ALTER TABLE \"movies\" ADD COLUMN IF NOT EXISTS \"title\" VARCHAR(255)"
        );
        assert_eq!(
            statements[1],
            "ALTER TABLE \"movies\" ADD COLUMN IF NOT EXISTS \"description\" TEXT"
        );
    }
}
