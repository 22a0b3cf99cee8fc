//! Storefront API Gateway
//!
//! 网关没有数据库，启动时跳过依赖检查与 schema 同步，直接监听。

use std::process::ExitCode;

use storefront_bootstrap::{run_service, ServiceDefinition};
use storefront_config::ServiceProfile;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    run_service(ServiceDefinition::new(ServiceProfile::Gateway)).await
}
