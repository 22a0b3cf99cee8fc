//! 服务启动器
//!
//! 按固定顺序执行启动步骤：加载配置 → 数据库就绪检查 → schema 同步 → 绑定监听。
//! 任一步骤失败都会终止启动，不会出现部分启动的服务。

use std::fmt;
use std::future::Future;
use std::net::SocketAddr;
use std::process::ExitCode;
use std::sync::Arc;

use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;
use storefront_config::{resolve_env_file, EnvSource, ServiceConfig, ServiceProfile, TelemetryConfig};
use storefront_errors::{AppError, AppResult};
use storefront_ports::{DatabaseReadiness, DependencyProbe, ModelDefinition, SchemaSynchronizer};
use storefront_telemetry::init_metrics;
use tokio::net::TcpListener;
use tokio::time::Instant;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::error::{BootstrapError, FAILURE_EXIT_CODE};
use crate::health::{fallback_handler, health_routes, HealthChecker};
use crate::infrastructure::Infrastructure;
use crate::metrics;
use crate::retry::retry_step;
use crate::runtime::{init_runtime, shutdown_signal};
use crate::state::{BootstrapState, BootstrapStatus, BootstrapStep, StateMachine};

/// 启动流程依赖的数据库协作者
#[derive(Clone)]
pub struct DatabaseDependency {
    readiness: Arc<dyn DatabaseReadiness>,
    schema: Arc<dyn SchemaSynchronizer>,
    probe: Option<Arc<dyn DependencyProbe>>,
}

impl DatabaseDependency {
    pub fn new(readiness: Arc<dyn DatabaseReadiness>, schema: Arc<dyn SchemaSynchronizer>) -> Self {
        Self {
            readiness,
            schema,
            probe: None,
        }
    }

    /// 就绪检查使用的运行期探针
    pub fn with_probe(mut self, probe: Arc<dyn DependencyProbe>) -> Self {
        self.probe = Some(probe);
        self
    }

    /// 同一个对象承担全部三个角色
    pub fn from_database<D>(database: Arc<D>) -> Self
    where
        D: DatabaseReadiness + SchemaSynchronizer + DependencyProbe + 'static,
    {
        Self {
            readiness: database.clone(),
            schema: database.clone(),
            probe: Some(database),
        }
    }
}

/// 启动编排器
pub struct Bootstrap {
    config: ServiceConfig,
    infrastructure: Infrastructure,
    dependency: Option<DatabaseDependency>,
    models: Vec<ModelDefinition>,
    routes: Router,
    metrics: Option<PrometheusHandle>,
    state: StateMachine,
}

impl Bootstrap {
    /// 启动步骤 1：加载并校验配置
    pub fn load(profile: ServiceProfile, source: &EnvSource) -> Result<Self, BootstrapError> {
        Self::load_with_state(profile, source, StateMachine::new())
    }

    /// 同 [`Bootstrap::load`]，状态机由调用方提前创建
    ///
    /// 配置校验失败时状态机进入 `Failed`，订阅者能观察到失败原因。
    pub fn load_with_state(
        profile: ServiceProfile,
        source: &EnvSource,
        state: StateMachine,
    ) -> Result<Self, BootstrapError> {
        let started = Instant::now();
        let result = ServiceConfig::from_source(profile, source);
        metrics::record_step(
            BootstrapStep::LoadConfiguration,
            started.elapsed(),
            result.is_ok(),
        );

        match result {
            Ok(config) => Ok(Self::with_state(config, state)),
            Err(e) => {
                let err = BootstrapError::from(e);
                report_failure(&err);
                state.fail(err.step(), err.to_string());
                Err(err)
            }
        }
    }

    /// 使用已校验的配置创建启动器，依赖取自配置中的基础设施
    pub fn new(config: ServiceConfig) -> Self {
        Self::with_state(config, StateMachine::new())
    }

    fn with_state(config: ServiceConfig, state: StateMachine) -> Self {
        let infrastructure = Infrastructure::from_config(&config);
        let dependency = infrastructure.dependency();

        Self {
            config,
            infrastructure,
            dependency,
            models: Vec::new(),
            routes: Router::new(),
            metrics: None,
            state,
        }
    }

    /// 服务自己的业务路由
    pub fn with_routes(mut self, routes: Router) -> Self {
        self.routes = routes;
        self
    }

    /// 需要同步的模型
    pub fn with_models(mut self, models: Vec<ModelDefinition>) -> Self {
        self.models = models;
        self
    }

    /// 替换数据库依赖，`None` 表示没有数据库
    pub fn with_dependency(mut self, dependency: Option<DatabaseDependency>) -> Self {
        self.dependency = dependency;
        self
    }

    pub fn with_metrics(mut self, metrics: Option<PrometheusHandle>) -> Self {
        self.metrics = metrics;
        self
    }

    /// 启动状态的只读视图
    pub fn status(&self) -> BootstrapStatus {
        self.state.subscribe()
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    pub fn infrastructure(&self) -> &Infrastructure {
        &self.infrastructure
    }

    /// 执行启动步骤 2-4，返回已绑定但尚未开始服务的监听
    pub async fn prepare(self) -> Result<BoundService, BootstrapError> {
        info!("Starting {} service", self.config.app_name);

        if let Err(e) = self.prepare_dependency().await {
            return Err(self.fail(e));
        }

        let started = Instant::now();
        let bound = self.bind().await;
        metrics::record_step(BootstrapStep::BindListener, started.elapsed(), bound.is_ok());
        let (listener, local_addr) = match bound {
            Ok(bound) => bound,
            Err(e) => return Err(self.fail(e)),
        };

        if let Err(e) = self.advance(BootstrapState::Listening, BootstrapStep::BindListener) {
            return Err(self.fail(e));
        }
        metrics::set_ready(true);

        info!(
            "{} service is running on {}:{}",
            self.config.app_name,
            self.config.server.host,
            local_addr.port()
        );

        let status = self.state.subscribe();
        let mut checker = HealthChecker::new(status.clone());
        if let Some(probe) = self.dependency.as_ref().and_then(|d| d.probe.clone()) {
            checker = checker.with_probe(probe);
        }

        let router = self
            .routes
            .merge(health_routes(Arc::new(checker), self.metrics))
            .fallback(fallback_handler)
            .layer(TraceLayer::new_for_http());

        Ok(BoundService {
            app_name: self.config.app_name,
            listener,
            router,
            local_addr,
            status,
        })
    }

    /// 启动并一直服务到收到关闭信号
    pub async fn run(self) -> Result<(), BootstrapError> {
        self.prepare().await?.serve(shutdown_signal()).await
    }

    async fn prepare_dependency(&self) -> Result<(), BootstrapError> {
        self.advance(BootstrapState::CheckingDependency, BootstrapStep::CheckDependency)?;
        match &self.dependency {
            Some(dependency) => {
                self.run_step(BootstrapStep::CheckDependency, || {
                    dependency.readiness.ensure_database_ready()
                })
                .await?;
            }
            None => info!("No database configured, skipping readiness check"),
        }

        self.advance(BootstrapState::SynchronizingSchema, BootstrapStep::SynchronizeSchema)?;
        match &self.dependency {
            Some(dependency) => {
                let models = self.models.as_slice();
                self.run_step(BootstrapStep::SynchronizeSchema, || {
                    dependency.schema.synchronize(models)
                })
                .await?;
            }
            None => info!("No database configured, skipping schema synchronization"),
        }

        Ok(())
    }

    /// 执行单个依赖步骤：重试、超时、耗时统计
    async fn run_step<F, Fut>(&self, step: BootstrapStep, operation: F) -> Result<(), BootstrapError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = AppResult<()>>,
    {
        let started = Instant::now();

        let attempts = retry_step(&self.config.bootstrap.retry, step, operation);
        let result = match self.config.bootstrap.step_timeout {
            Some(limit) => tokio::time::timeout(limit, attempts)
                .await
                .unwrap_or_else(|_| {
                    Err(AppError::timeout(format!("{} exceeded {:?}", step, limit)))
                }),
            None => attempts.await,
        };

        let elapsed = started.elapsed();
        metrics::record_step(step, elapsed, result.is_ok());
        result.map_err(|source| BootstrapError::Step { step, source })?;

        info!(
            step = step.as_str(),
            elapsed_ms = elapsed.as_millis() as u64,
            "{} completed",
            step
        );
        Ok(())
    }

    async fn bind(&self) -> Result<(TcpListener, SocketAddr), BootstrapError> {
        let address = self.config.server.bind_address();
        let listener = match TcpListener::bind(&address).await {
            Ok(listener) => listener,
            Err(source) => return Err(BootstrapError::Bind { address, source }),
        };
        match listener.local_addr() {
            Ok(local_addr) => Ok((listener, local_addr)),
            Err(source) => Err(BootstrapError::Bind { address, source }),
        }
    }

    fn advance(&self, next: BootstrapState, step: BootstrapStep) -> Result<(), BootstrapError> {
        self.state.advance(next).map_err(|e| BootstrapError::Step {
            step,
            source: AppError::internal(e.to_string()),
        })
    }

    fn fail(&self, err: BootstrapError) -> BootstrapError {
        report_failure(&err);
        self.state.fail(err.step(), err.to_string());
        metrics::set_ready(false);
        err
    }
}

fn report_failure(err: &BootstrapError) {
    let step = err.step();
    error!(step = step.as_str(), error = %err, "Bootstrap failed during {}", step);
    metrics::record_failure(step);
}

/// 已绑定监听的服务
pub struct BoundService {
    app_name: String,
    listener: TcpListener,
    router: Router,
    local_addr: SocketAddr,
    status: BootstrapStatus,
}

impl fmt::Debug for BoundService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundService")
            .field("app_name", &self.app_name)
            .field("local_addr", &self.local_addr)
            .finish_non_exhaustive()
    }
}

impl BoundService {
    /// 实际绑定的地址（端口为 0 时由系统分配）
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn status(&self) -> BootstrapStatus {
        self.status.clone()
    }

    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// 开始服务，`shutdown` 完成后优雅退出
    pub async fn serve<F>(self, shutdown: F) -> Result<(), BootstrapError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        axum::serve(self.listener, self.router)
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(BootstrapError::Serve)?;

        info!("{} service stopped", self.app_name);
        Ok(())
    }
}

/// 服务定义：画像、模型和业务路由
pub struct ServiceDefinition {
    pub profile: ServiceProfile,
    pub models: Vec<ModelDefinition>,
    pub routes: Router,
}

impl ServiceDefinition {
    pub fn new(profile: ServiceProfile) -> Self {
        Self {
            profile,
            models: Vec::new(),
            routes: Router::new(),
        }
    }

    pub fn with_models(mut self, models: Vec<ModelDefinition>) -> Self {
        self.models = models;
        self
    }

    pub fn with_routes(mut self, routes: Router) -> Self {
        self.routes = routes;
        self
    }
}

/// 启动结果对应的进程退出码
pub fn exit_status(result: &Result<(), BootstrapError>) -> u8 {
    match result {
        Ok(()) => 0,
        Err(e) => e.exit_code(),
    }
}

/// 运行服务
///
/// 这是所有服务的统一入口点。它负责：
/// 1. 读取 `.env` 与进程环境变量
/// 2. 初始化运行时（日志、metrics）
/// 3. 按顺序执行启动步骤
/// 4. 服务到收到关闭信号
///
/// `.env` 默认位于可执行文件所在目录，`ENV_FILE` 可以覆盖。
/// 启动失败返回退出码 1，优雅关闭返回 0。
///
/// # 示例
///
/// ```ignore
/// #[tokio::main(flavor = "current_thread")]
/// async fn main() -> ExitCode {
///     let definition = ServiceDefinition::new(ServiceProfile::Billing).with_models(models());
///     run_service(definition).await
/// }
/// ```
pub async fn run_service(definition: ServiceDefinition) -> ExitCode {
    let loaded = EnvSource::load(&resolve_env_file());

    let runtime_source = match &loaded {
        Ok(source) => source.clone(),
        Err(_) => EnvSource::from_process(),
    };
    init_runtime(
        &TelemetryConfig::from_source(&runtime_source),
        runtime_source.get("APP_ENV").unwrap_or("development"),
    );

    let source = match loaded {
        Ok(source) => source,
        Err(e) => {
            report_failure(&BootstrapError::from(e));
            return ExitCode::from(FAILURE_EXIT_CODE);
        }
    };

    let metrics = match init_metrics() {
        Ok(handle) => Some(handle),
        Err(e) => {
            warn!(error = %e, "Failed to install Prometheus recorder, /metrics disabled");
            None
        }
    };

    let result = match Bootstrap::load(definition.profile, &source) {
        Ok(bootstrap) => {
            bootstrap
                .with_models(definition.models)
                .with_routes(definition.routes)
                .with_metrics(metrics)
                .run()
                .await
        }
        Err(e) => Err(e),
    };

    ExitCode::from(exit_status(&result))
}
