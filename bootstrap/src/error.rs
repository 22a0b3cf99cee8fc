//! 启动错误

use storefront_config::ConfigError;
use storefront_errors::AppError;
use thiserror::Error;

use crate::state::BootstrapStep;

/// 启动失败时的进程退出码
pub const FAILURE_EXIT_CODE: u8 = 1;

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("{step} failed: {source}")]
    Step {
        step: BootstrapStep,
        #[source]
        source: AppError,
    },

    #[error("Failed to bind listener on {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Server error: {0}")]
    Serve(#[source] std::io::Error),
}

impl BootstrapError {
    /// 出错的启动步骤
    pub fn step(&self) -> BootstrapStep {
        match self {
            Self::Config(_) => BootstrapStep::LoadConfiguration,
            Self::Step { step, .. } => *step,
            Self::Bind { .. } | Self::Serve(_) => BootstrapStep::BindListener,
        }
    }

    /// 所有启动错误都是致命的
    pub fn exit_code(&self) -> u8 {
        FAILURE_EXIT_CODE
    }
}
