//! Error Handling Module
//!
//! Provides type-safe error handling with proper HTTP status code mapping.
//! Uses thiserror for domain errors and integrates with tracing for structured logging.

use axum::{
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// API 에러 타입
///
/// # Design Decision
///
/// 각 에러 variant는 적절한 HTTP 상태 코드에 매핑됨
/// - 클라이언트 에러: 4xx (잘못된 입력, 인증/권한 실패, 상태 충돌)
/// - 서버 에러: 5xx (저장소 오류)
///
/// 민감한 내부 정보는 클라이언트에 노출하지 않음
#[derive(Debug, Error)]
pub enum ApiError {
    // ============ 400 Bad Request ============
    #[error("Validation failed: {0}")]
    ValidationError(String),

    /// pending이 아닌 요청에 대한 전이 시도
    #[error("Invalid state: {0}")]
    InvalidState(String),

    // ============ 401 Unauthorized ============
    #[error("Authentication required: {0}")]
    Unauthorized(String),

    // ============ 403 Forbidden ============
    #[error("Forbidden: {0}")]
    Forbidden(String),

    // ============ 404 Not Found ============
    #[error("Resource not found: {0}")]
    NotFound(String),

    // ============ 409 Conflict ============
    #[error("Conflict: {0}")]
    Conflict(String),

    // ============ 500 Internal Server Error ============
    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Internal server error")]
    InternalError,
}

/// API 에러 응답 구조
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::ValidationError(_) | ApiError::InvalidState(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::DatabaseError(_) | ApiError::InternalError => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let (code, message, details) = match &self {
            // 4xx 클라이언트 에러
            ApiError::ValidationError(msg) => (
                "VALIDATION_ERROR",
                "Validation failed".to_string(),
                Some(msg.clone()),
            ),
            ApiError::InvalidState(msg) => ("INVALID_STATE", msg.clone(), None),
            ApiError::Unauthorized(msg) => ("UNAUTHORIZED", msg.clone(), None),
            ApiError::Forbidden(msg) => ("FORBIDDEN", msg.clone(), None),
            ApiError::NotFound(resource) => ("NOT_FOUND", format!("{} not found", resource), None),
            ApiError::Conflict(msg) => ("CONFLICT", msg.clone(), None),

            // 5xx 서버 에러
            ApiError::DatabaseError(_) => {
                // 내부 에러는 클라이언트에 상세 정보 노출 안 함
                tracing::error!("Database error: {:?}", self);
                ("DATABASE_ERROR", "Database error occurred".to_string(), None)
            }
            ApiError::InternalError => {
                tracing::error!("Internal error: {:?}", self);
                ("INTERNAL_ERROR", "An internal error occurred".to_string(), None)
            }
        };

        let body = ErrorResponse {
            error: message,
            code: code.to_string(),
            details,
        };

        (status, Json(body)).into_response()
    }
}

/// 저장소 계층 에러
///
/// 트레이트 구현체(PostgreSQL, in-memory)가 공통으로 반환한다.
#[derive(Debug, Error)]
pub enum StoreError {
    /// UNIQUE 제약 위반 (이메일 중복 등)
    #[error("Unique constraint violated: {0}")]
    UniqueViolation(String),

    /// 저장된 값이 도메인 타입으로 변환되지 않음
    #[error("Corrupt row: {0}")]
    Corrupt(String),

    /// SERIALIZABLE 트랜잭션 충돌 (SQLSTATE 40001)
    #[error("Serialization failure: {0}")]
    SerializationFailure(String),

    #[error("SQLx error: {0}")]
    Sqlx(sqlx::Error),
}

/// could not serialize access due to concurrent update
const SERIALIZATION_FAILURE: &str = "40001";

impl StoreError {
    /// sqlx 에러를 분류 (23505 → UniqueViolation, 40001 → SerializationFailure)
    pub fn classify(err: sqlx::Error) -> Self {
        if let Some(db_err) = err.as_database_error() {
            if db_err.is_unique_violation() {
                return StoreError::UniqueViolation(db_err.message().to_string());
            }
            if db_err.code().as_deref() == Some(SERIALIZATION_FAILURE) {
                return StoreError::SerializationFailure(db_err.message().to_string());
            }
        }
        StoreError::Sqlx(err)
    }
}

/// 모든 `?` 전파가 분류를 거치도록 함
impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        StoreError::classify(err)
    }
}

impl From<crate::types::UnknownVariant> for StoreError {
    fn from(err: crate::types::UnknownVariant) -> Self {
        StoreError::Corrupt(err.to_string())
    }
}

/// 저장소 에러를 ApiError로 변환
impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::UniqueViolation(msg) => ApiError::Conflict(msg),
            other => {
                tracing::error!("Store error: {:?}", other);
                ApiError::DatabaseError(other.to_string())
            }
        }
    }
}

/// anyhow 에러를 ApiError로 변환
impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        tracing::error!("Anyhow error: {:?}", err);
        ApiError::InternalError
    }
}

// ============ Extractor Rejections ============
// 잘못된 JSON 본문, 경로 id, 쿼리 값은 모두 공통 400 형식으로 응답

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::ValidationError(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::ValidationError(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::ValidationError(rejection.body_text())
    }
}
