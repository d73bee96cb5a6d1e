use actix_web::{HttpResponse, ResponseError, http::StatusCode};
use chrono::Utc;
use serde_json::json;
use thiserror::Error;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] sea_orm::DbErr),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Auth error: {0}")]
    AuthError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("External API error: {0}")]
    ExternalApiError(String),

    #[error("Internal server error: {0}")]
    InternalError(String),

    #[error("JWT error: {0}")]
    JwtError(#[from] jsonwebtoken::errors::Error),

    #[error("HTTP request error: {0}")]
    ReqwestError(#[from] reqwest::Error),

    #[error("JSON serialization/deserialization error: {0}")]
    SerdeJsonError(#[from] serde_json::Error),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::ValidationError(_) => StatusCode::BAD_REQUEST,
            AppError::AuthError(_) => StatusCode::UNAUTHORIZED,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::ExternalApiError(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// 对外展示的错误消息；服务端内部错误不向客户端透出细节
    pub fn client_message(&self) -> String {
        match self {
            AppError::ValidationError(msg)
            | AppError::AuthError(msg)
            | AppError::NotFound(msg)
            | AppError::Conflict(msg)
            | AppError::Forbidden(msg)
            | AppError::ExternalApiError(msg) => msg.clone(),
            AppError::DatabaseError(_) => "Database error".to_string(),
            _ => "Internal server error".to_string(),
        }
    }

    fn log(&self) {
        match self {
            AppError::ValidationError(msg) => log::warn!("Validation error: {msg}"),
            AppError::AuthError(msg) => log::warn!("Authentication error: {msg}"),
            AppError::Conflict(msg) => log::warn!("Conflict: {msg}"),
            AppError::Forbidden(msg) => log::warn!("Forbidden: {msg}"),
            AppError::NotFound(_) => {}
            AppError::ExternalApiError(msg) => log::error!("External API error: {msg}"),
            AppError::DatabaseError(err) => log::error!("Database error: {err}"),
            _ => log::error!("Internal error: {self}"),
        }
    }

    /// 结构化错误响应体；path/method 由调用方(handler)提供
    pub fn to_response(&self, path: &str, method: &str) -> HttpResponse {
        self.log();
        let status = self.status();
        HttpResponse::build(status).json(crate::models::ErrorResponse {
            status_code: status.as_u16(),
            path: path.to_string(),
            method: method.to_string(),
            timestamp: Utc::now().to_rfc3339(),
            message: self.client_message(),
        })
    }
}

/// 唯一约束冲突映射为 Conflict，其余数据库错误原样上抛。
/// 并发写入的竞争失败方由此拿到 409 而不是 500。
pub fn conflict_on_unique(e: sea_orm::DbErr, message: &str) -> AppError {
    match e.sql_err() {
        Some(sea_orm::SqlErr::UniqueConstraintViolation(_)) => {
            AppError::Conflict(message.to_string())
        }
        _ => AppError::DatabaseError(e),
    }
}

impl ResponseError for AppError {
    // 中间件层的错误没有 handler 上下文，退化为不带 path/method 的响应体
    fn error_response(&self) -> HttpResponse {
        self.log();
        let status = self.status();
        HttpResponse::build(status).json(json!({
            "statusCode": status.as_u16(),
            "timestamp": Utc::now().to_rfc3339(),
            "message": self.client_message(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            AppError::ValidationError("bad".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::Conflict("dup".into()).status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            AppError::NotFound("missing".into()).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AppError::Forbidden("no".into()).status(),
            StatusCode::FORBIDDEN
        );
    }

    #[test]
    fn test_internal_errors_hide_details() {
        let err = AppError::InternalError("connection pool exhausted".into());
        assert_eq!(err.client_message(), "Internal server error");
    }
}
