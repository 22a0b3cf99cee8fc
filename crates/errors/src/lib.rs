//! storefront-errors - 统一错误处理
//!
//! HTTP 层的错误统一渲染为 RFC 7807 `application/problem+json`。

use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

const PROBLEM_BASE: &str = "https://api.storefront.local/problems";
const PROBLEM_JSON: &str = "application/problem+json";

/// 应用错误类型
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("Service unavailable: {0}")]
    Unavailable(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// 每类错误对应的 (状态码, type 后缀, 标题)
type ProblemKind = (StatusCode, &'static str, &'static str);

impl AppError {
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn database(msg: impl Into<String>) -> Self {
        Self::Database(msg.into())
    }

    pub fn timeout(msg: impl Into<String>) -> Self {
        Self::Timeout(msg.into())
    }

    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::Unavailable(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    fn kind(&self) -> ProblemKind {
        match self {
            Self::NotFound(_) => (StatusCode::NOT_FOUND, "not-found", "Resource Not Found"),
            Self::Validation(_) => (StatusCode::BAD_REQUEST, "validation", "Validation Error"),
            Self::Database(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "database",
                "Database Error",
            ),
            Self::Timeout(_) => (StatusCode::GATEWAY_TIMEOUT, "timeout", "Gateway Timeout"),
            Self::Unavailable(_) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "unavailable",
                "Service Unavailable",
            ),
            Self::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal",
                "Internal Server Error",
            ),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.kind().0
    }

    pub fn to_problem_details(&self) -> ProblemDetails {
        let (status, slug, title) = self.kind();
        ProblemDetails {
            r#type: format!("{PROBLEM_BASE}/{slug}"),
            title: title.to_string(),
            status: status.as_u16(),
            detail: self.to_string(),
            instance: None,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        self.to_problem_details().into_response()
    }
}

/// RFC 7807 Problem Details
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProblemDetails {
    pub r#type: String,
    pub title: String,
    pub status: u16,
    pub detail: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instance: Option<String>,
}

impl ProblemDetails {
    /// 记录出错的请求路径
    pub fn with_instance(mut self, instance: impl Into<String>) -> Self {
        self.instance = Some(instance.into());
        self
    }
}

impl IntoResponse for ProblemDetails {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, [(header::CONTENT_TYPE, PROBLEM_JSON)], Json(self)).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_of(response: Response) -> ProblemDetails {
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[test]
    fn test_database_error_maps_to_500() {
        let error = AppError::database("connection refused");
        assert_eq!(error.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let problem = error.to_problem_details();
        assert_eq!(problem.status, 500);
        assert_eq!(problem.title, "Database Error");
        assert_eq!(problem.r#type, format!("{PROBLEM_BASE}/database"));
        assert_eq!(problem.detail, "Database error: connection refused");
        assert!(problem.instance.is_none());
    }

    #[test]
    fn test_timeout_is_gateway_timeout() {
        assert_eq!(AppError::timeout("schema").status(), StatusCode::GATEWAY_TIMEOUT);
    }

    #[test]
    fn test_instance_is_serialized_only_when_set() {
        let bare = serde_json::to_value(AppError::not_found("x").to_problem_details()).unwrap();
        assert!(bare.get("instance").is_none());

        let with_path = AppError::not_found("x")
            .to_problem_details()
            .with_instance("/orders/1");
        let json = serde_json::to_value(with_path).unwrap();
        assert_eq!(json["instance"], "/orders/1");
    }

    #[tokio::test]
    async fn test_into_response_uses_problem_json() {
        let response = AppError::unavailable("database not ready").into_response();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            PROBLEM_JSON
        );

        let problem = body_of(response).await;
        assert_eq!(problem.status, 503);
        assert_eq!(problem.title, "Service Unavailable");
    }

    #[tokio::test]
    async fn test_instance_survives_response() {
        let response = AppError::not_found("No route for /x")
            .to_problem_details()
            .with_instance("/x")
            .into_response();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_of(response).await.instance.as_deref(), Some("/x"));
    }
}
