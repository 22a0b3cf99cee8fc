//! 数据库协作者 trait 定义

use async_trait::async_trait;
use storefront_errors::AppResult;

use crate::ModelDefinition;

/// 数据库就绪检查
///
/// 实现方在构造时持有连接参数。
#[async_trait]
pub trait DatabaseReadiness: Send + Sync {
    /// 确保目标数据库存在，不存在则创建
    ///
    /// 必须幂等：数据库已存在时不产生任何副作用。连接失败必须以错误返回，不能无限挂起。
    async fn ensure_database_ready(&self) -> AppResult<()>;
}

/// Schema 同步
#[async_trait]
pub trait SchemaSynchronizer: Send + Sync {
    /// 使线上 schema 与模型定义一致
    ///
    /// 必须幂等，且不得删除已有数据。
    async fn synchronize(&self, models: &[ModelDefinition]) -> AppResult<()>;
}

/// 运行期依赖探针，供 readiness 端点使用
#[async_trait]
pub trait DependencyProbe: Send + Sync {
    /// 组件名称
    fn component_name(&self) -> &'static str;

    /// 探测依赖当前是否可用
    async fn probe(&self) -> AppResult<()>;
}
