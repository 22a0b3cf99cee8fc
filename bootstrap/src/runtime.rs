//! 服务运行时

use storefront_config::TelemetryConfig;
use storefront_telemetry::{init_tracing, init_tracing_json};
use tracing::{info, warn};

/// 初始化服务运行时
///
/// 生产环境输出 JSON 日志，其余环境输出可读格式。
pub fn init_runtime(telemetry: &TelemetryConfig, app_env: &str) {
    if app_env == "production" {
        init_tracing_json(&telemetry.log_level);
    } else {
        init_tracing(&telemetry.log_level);
    }

    info!(
        app_env = %app_env,
        log_level = %telemetry.log_level,
        "Runtime initialized"
    );
}

/// 等待关闭信号
///
/// 信号处理器安装失败时只记录日志，该信号不再触发关闭。
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
