//! storefront-config - 配置加载库
//!
//! 每个服务进程启动时从环境变量（以及可选的 `.env` 文件）构建一次不可变配置。
//! 所有必需字段在任何启动步骤之前完成校验，缺失或格式错误立即失败。

mod source;

use std::path::PathBuf;
use std::time::Duration;

use secrecy::Secret;
use thiserror::Error;
use tracing::info;
use url::Url;

pub use source::{env_file_location, resolve_env_file, EnvSource, ENV_FILE_VAR};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read env file {path}: {source}")]
    EnvFile {
        path: PathBuf,
        #[source]
        source: dotenvy::Error,
    },

    #[error("Required environment variable {0} is not set")]
    Missing(String),

    #[error("Environment variable {key} has an invalid value {value:?}: {reason}")]
    Invalid {
        key: String,
        value: String,
        reason: String,
    },
}

impl ConfigError {
    fn invalid(key: &str, value: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key: key.to_string(),
            value: value.into(),
            reason: reason.into(),
        }
    }
}

/// 服务类型，决定需要哪些配置段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceProfile {
    /// API 网关：无数据库，需要 inventory 地址
    Gateway,
    /// 账单服务
    Billing,
    /// 库存服务
    Inventory,
}

impl ServiceProfile {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Gateway => "api-gateway",
            Self::Billing => "billing",
            Self::Inventory => "inventory",
        }
    }

    pub fn requires_database(&self) -> bool {
        !matches!(self, Self::Gateway)
    }

    fn queue_url_var(&self) -> &'static str {
        match self {
            Self::Gateway => "RABBITMQ_API_URL",
            Self::Billing | Self::Inventory => "RABBITMQ_LOCAL_URL",
        }
    }
}

/// 服务器配置
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// 仅网关使用
    pub inventory_url: Option<Url>,
}

impl ServerConfig {
    /// 监听地址，IPv6 主机自动加方括号
    pub fn bind_address(&self) -> String {
        if self.host.contains(':') && !self.host.starts_with('[') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }
}

/// 数据库方言
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Dialect {
    #[default]
    Postgres,
}

impl Dialect {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Postgres => "postgres",
        }
    }
}

impl std::str::FromStr for Dialect {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(Self::Postgres),
            other => Err(format!("unsupported dialect '{}', only postgres is available", other)),
        }
    }
}

/// 连接池配置
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolConfig {
    pub max: u32,
    pub min: u32,
    /// 获取连接（以及建立连接）的超时
    pub acquire: Duration,
    /// 空闲连接回收时间
    pub idle: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max: 5,
            min: 0,
            acquire: Duration::from_millis(30_000),
            idle: Duration::from_millis(10_000),
        }
    }
}

/// 数据库配置
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub username: String,
    pub password: Secret<String>,
    pub database: String,
    pub host: String,
    pub port: u16,
    pub dialect: Dialect,
    pub pool: PoolConfig,
}

/// 消息队列地址（网关走 API 地址，后端服务走本地地址）
#[derive(Debug, Clone)]
pub enum QueueEndpoint {
    Api(Secret<String>),
    Local(Secret<String>),
}

/// RabbitMQ 配置
#[derive(Debug, Clone)]
pub struct RabbitMqConfig {
    pub endpoint: QueueEndpoint,
    pub queue: String,
}

/// 遥测配置
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

impl TelemetryConfig {
    /// 日志配置不会失败，缺省为 info
    pub fn from_source(source: &EnvSource) -> Self {
        Self {
            log_level: source.get("LOG_LEVEL").unwrap_or("info").trim().to_string(),
        }
    }
}

/// 依赖步骤的重试策略
///
/// 默认只尝试一次，失败交给进程守护方重启。
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 1,
            initial_delay: Duration::from_millis(1000),
            max_delay: Duration::from_millis(30_000),
            multiplier: 2.0,
        }
    }
}

/// 启动流程配置
#[derive(Debug, Clone, Default)]
pub struct BootstrapConfig {
    pub retry: RetryPolicy,
    /// 单个启动步骤的超时，未设置表示不限
    pub step_timeout: Option<Duration>,
}

/// 服务配置
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub app_name: String,
    pub app_env: String,
    pub server: ServerConfig,
    pub database: Option<DatabaseConfig>,
    pub rabbitmq: Option<RabbitMqConfig>,
    pub telemetry: TelemetryConfig,
    pub bootstrap: BootstrapConfig,
}

impl ServiceConfig {
    /// 从 `.env` 与进程环境变量加载配置
    pub fn load(profile: ServiceProfile) -> Result<Self, ConfigError> {
        let source = EnvSource::load(&resolve_env_file())?;
        Self::from_source(profile, &source)
    }

    /// 从环境变量快照构建并校验配置
    pub fn from_source(profile: ServiceProfile, source: &EnvSource) -> Result<Self, ConfigError> {
        let server = ServerConfig {
            host: source.required("HOST")?.trim().to_string(),
            port: source.required_parsed("PORT")?,
            inventory_url: match profile {
                ServiceProfile::Gateway => Some(parse_url(source, "INVENTORY_URL")?),
                _ => None,
            },
        };

        let database = if profile.requires_database() {
            Some(database_from_source(source)?)
        } else {
            None
        };

        let config = Self {
            app_name: profile.name().to_string(),
            app_env: source.get("APP_ENV").unwrap_or("development").trim().to_string(),
            server,
            database,
            rabbitmq: rabbitmq_from_source(profile, source)?,
            telemetry: TelemetryConfig::from_source(source),
            bootstrap: bootstrap_from_source(source)?,
        };

        config.log_summary();
        Ok(config)
    }

    /// 是否为生产环境
    pub fn is_production(&self) -> bool {
        self.app_env == "production"
    }

    /// 是否为开发环境
    pub fn is_development(&self) -> bool {
        self.app_env == "development"
    }

    /// 输出不含凭据的配置摘要
    pub fn log_summary(&self) {
        let db = self.database.as_ref();
        info!(
            service = %self.app_name,
            app_env = %self.app_env,
            host = %self.server.host,
            port = self.server.port,
            inventory_url = self.server.inventory_url.as_ref().map(Url::as_str),
            db_host = db.map(|d| d.host.as_str()),
            db_port = db.map(|d| d.port),
            db_name = db.map(|d| d.database.as_str()),
            queue = self.rabbitmq.as_ref().map(|q| q.queue.as_str()),
            "{} configuration loaded",
            self.app_name
        );
    }
}

fn parse_url(source: &EnvSource, key: &str) -> Result<Url, ConfigError> {
    let raw = source.required(key)?;
    Url::parse(raw).map_err(|e| ConfigError::invalid(key, raw, e.to_string()))
}

fn database_from_source(source: &EnvSource) -> Result<DatabaseConfig, ConfigError> {
    let defaults = PoolConfig::default();
    let pool = PoolConfig {
        max: source.parsed("DB_POOL_MAX")?.unwrap_or(defaults.max),
        min: source.parsed("DB_POOL_MIN")?.unwrap_or(defaults.min),
        acquire: source
            .parsed("DB_POOL_ACQUIRE_MS")?
            .map(Duration::from_millis)
            .unwrap_or(defaults.acquire),
        idle: source
            .parsed("DB_POOL_IDLE_MS")?
            .map(Duration::from_millis)
            .unwrap_or(defaults.idle),
    };

    if pool.max == 0 {
        return Err(ConfigError::invalid("DB_POOL_MAX", "0", "must be at least 1"));
    }
    if pool.min > pool.max {
        return Err(ConfigError::invalid(
            "DB_POOL_MIN",
            pool.min.to_string(),
            format!("must not exceed DB_POOL_MAX ({})", pool.max),
        ));
    }

    Ok(DatabaseConfig {
        username: source.required("DB_USER")?.to_string(),
        password: Secret::new(source.required("DB_PASSWORD")?.to_string()),
        database: source.required("DB_NAME")?.to_string(),
        host: source.required("DB_HOST")?.trim().to_string(),
        port: source.required_parsed("DB_PORT")?,
        dialect: source.parsed("DB_DIALECT")?.unwrap_or_default(),
        pool,
    })
}

fn rabbitmq_from_source(
    profile: ServiceProfile,
    source: &EnvSource,
) -> Result<Option<RabbitMqConfig>, ConfigError> {
    let url_var = profile.queue_url_var();
    let Some(url) = source.get(url_var) else {
        return Ok(None);
    };

    let url = Secret::new(url.to_string());
    let endpoint = match profile {
        ServiceProfile::Gateway => QueueEndpoint::Api(url),
        ServiceProfile::Billing | ServiceProfile::Inventory => QueueEndpoint::Local(url),
    };

    Ok(Some(RabbitMqConfig {
        endpoint,
        queue: source.required("RABBITMQ_QUEUE")?.to_string(),
    }))
}

fn bootstrap_from_source(source: &EnvSource) -> Result<BootstrapConfig, ConfigError> {
    let defaults = RetryPolicy::default();
    let retry = RetryPolicy {
        max_attempts: source
            .parsed("BOOTSTRAP_RETRY_MAX_ATTEMPTS")?
            .unwrap_or(defaults.max_attempts),
        initial_delay: source
            .parsed("BOOTSTRAP_RETRY_INITIAL_DELAY_MS")?
            .map(Duration::from_millis)
            .unwrap_or(defaults.initial_delay),
        max_delay: source
            .parsed("BOOTSTRAP_RETRY_MAX_DELAY_MS")?
            .map(Duration::from_millis)
            .unwrap_or(defaults.max_delay),
        multiplier: defaults.multiplier,
    };

    if retry.max_attempts == 0 {
        return Err(ConfigError::invalid(
            "BOOTSTRAP_RETRY_MAX_ATTEMPTS",
            "0",
            "must be at least 1",
        ));
    }

    let step_timeout = match source.parsed::<u64>("BOOTSTRAP_STEP_TIMEOUT_SECS")? {
        Some(0) => {
            return Err(ConfigError::invalid(
                "BOOTSTRAP_STEP_TIMEOUT_SECS",
                "0",
                "must be positive when set",
            ));
        }
        secs => secs.map(Duration::from_secs),
    };

    Ok(BootstrapConfig {
        retry,
        step_timeout,
    })
}
