//! 计费服务数据模型

use storefront_ports::{ColumnDefinition, ColumnType, ModelDefinition};

/// 订单表
pub fn order() -> ModelDefinition {
    ModelDefinition::new("orders")
        .column(ColumnDefinition::new("id", ColumnType::Serial).primary_key())
        .column(ColumnDefinition::new("user_id", ColumnType::Varchar(255)).not_null())
        .column(ColumnDefinition::new("number_of_items", ColumnType::Integer).not_null())
        .column(
            ColumnDefinition::new(
                "total_amount",
                ColumnType::Numeric {
                    precision: 10,
                    scale: 2,
                },
            )
            .not_null(),
        )
        .with_timestamps()
}

/// 启动时同步的全部模型
pub fn all() -> Vec<ModelDefinition> {
    vec![order()]
}

#[cfg(test)]
mod tests {
    use super::*;
    use storefront_adapter_postgres::create_table_sql;

    #[test]
    fn test_models_are_valid() {
        for model in all() {
            model.validate().unwrap();
        }
    }

    #[test]
    fn test_order_table_sql() {
        assert_eq!(
            create_table_sql(&order()),
            "CREATE TABLE IF NOT EXISTS \"orders\" (\"id\" SERIAL NOT NULL, \
             \"user_id\" VARCHAR(255) NOT NULL, \"number_of_items\" INTEGER NOT NULL, \
             \"total_amount\" NUMERIC(10, 2) NOT NULL, \
             \"created_at\" TIMESTAMPTZ NOT NULL DEFAULT NOW(), \
             \"updated_at\" TIMESTAMPTZ NOT NULL DEFAULT NOW(), PRIMARY KEY (\"id\"))"
        );
    }
}
