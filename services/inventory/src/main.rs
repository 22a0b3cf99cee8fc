//! Storefront 库存服务

mod models;

use std::process::ExitCode;

use storefront_bootstrap::{run_service, ServiceDefinition};
use storefront_config::ServiceProfile;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let definition = ServiceDefinition::new(ServiceProfile::Inventory).with_models(models::all());
    run_service(definition).await
}
