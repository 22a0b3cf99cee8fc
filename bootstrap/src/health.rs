//! 健康检查模块
//!
//! 提供 /health、/ready 和 /metrics 端点

use std::sync::Arc;

use axum::{
    extract::State,
    http::{StatusCode, Uri},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Serialize;
use storefront_errors::{AppError, ProblemDetails};
use storefront_ports::DependencyProbe;

use crate::state::BootstrapStatus;

/// 存活检查响应，内容固定
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub message: &'static str,
}

impl HealthResponse {
    pub const OK: HealthResponse = HealthResponse {
        status: "OK",
        message: "Service is healthy",
    };
}

/// 依赖探测结果
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProbeStatus {
    Healthy,
    Unhealthy,
}

/// 单个依赖的探测记录
#[derive(Debug, Clone, Serialize)]
pub struct ComponentHealth {
    pub name: &'static str,
    pub status: ProbeStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ComponentHealth {
    /// 执行一次探测，错误记录为 unhealthy
    pub async fn check(probe: &dyn DependencyProbe) -> Self {
        let (status, error) = match probe.probe().await {
            Ok(()) => (ProbeStatus::Healthy, None),
            Err(e) => (ProbeStatus::Unhealthy, Some(e.to_string())),
        };
        Self {
            name: probe.component_name(),
            status,
            error,
        }
    }
}

/// 就绪检查响应
#[derive(Debug, Clone, Serialize)]
pub struct ReadinessResponse {
    pub status: &'static str,
    pub state: &'static str,
    pub checks: Vec<ComponentHealth>,
}

impl ReadinessResponse {
    pub fn is_ready(&self) -> bool {
        self.status == "READY"
    }
}

/// 健康检查器
pub struct HealthChecker {
    status: BootstrapStatus,
    probes: Vec<Arc<dyn DependencyProbe>>,
}

impl HealthChecker {
    pub fn new(status: BootstrapStatus) -> Self {
        Self {
            status,
            probes: Vec::new(),
        }
    }

    pub fn with_probe(mut self, probe: Arc<dyn DependencyProbe>) -> Self {
        self.probes.push(probe);
        self
    }

    /// 执行存活检查（liveness）
    ///
    /// 只反映监听存活，不检查依赖
    pub fn liveness(&self) -> HealthResponse {
        HealthResponse::OK
    }

    /// 执行就绪检查（readiness）
    ///
    /// 启动完成且所有依赖探针通过才算就绪
    pub async fn readiness(&self) -> ReadinessResponse {
        let state = self.status.current();
        let mut ready = state.is_ready();
        let mut checks = Vec::with_capacity(self.probes.len());

        for probe in &self.probes {
            let check = ComponentHealth::check(probe.as_ref()).await;
            ready &= check.status == ProbeStatus::Healthy;
            checks.push(check);
        }

        ReadinessResponse {
            status: if ready { "READY" } else { "NOT_READY" },
            state: state.name(),
            checks,
        }
    }
}

#[derive(Clone)]
struct HealthState {
    checker: Arc<HealthChecker>,
    metrics: Option<PrometheusHandle>,
}

/// 健康检查路由
pub fn health_routes(checker: Arc<HealthChecker>, metrics: Option<PrometheusHandle>) -> Router {
    let mut router = Router::new()
        .route("/health", get(health_handler))
        .route("/ready", get(ready_handler));

    if metrics.is_some() {
        router = router.route("/metrics", get(metrics_handler));
    }

    router.with_state(HealthState { checker, metrics })
}

/// 未匹配路由返回 Problem Details
pub async fn fallback_handler(uri: Uri) -> ProblemDetails {
    AppError::not_found(format!("No route for {}", uri.path()))
        .to_problem_details()
        .with_instance(uri.path())
}

/// Liveness 端点处理器
async fn health_handler(State(state): State<HealthState>) -> impl IntoResponse {
    (StatusCode::OK, Json(state.checker.liveness()))
}

/// Readiness 端点处理器
async fn ready_handler(State(state): State<HealthState>) -> impl IntoResponse {
    let readiness = state.checker.readiness().await;
    let code = if readiness.is_ready() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (code, Json(readiness))
}

/// Metrics 端点处理器
async fn metrics_handler(State(state): State<HealthState>) -> impl IntoResponse {
    let body = state
        .metrics
        .as_ref()
        .map(PrometheusHandle::render)
        .unwrap_or_default();
    (
        StatusCode::OK,
        [("content-type", "text/plain; charset=utf-8")],
        body,
    )
}
