//! Bearer Token Extractor
//!
//! # Interview Q&A
//!
//! Q: 인증은 미들웨어가 아니라 extractor로 하는 이유는?
//! A: 핸들러 시그니처만 보고 인증 필요 여부를 알 수 있다.
//!    - `AuthUser`를 인자로 받는 핸들러 = 인증 필요
//!    - 받지 않는 핸들러 = 공개 (GET /items 등)
//!
//! Q: 토큰에서 얻는 것은?
//! A: `user_id` 하나. 역할/소유권은 서비스 계층이 DB 기준으로 다시 확인한다.

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};

use crate::{error::ApiError, AppState};

/// 인증된 호출자
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthUser {
    pub user_id: i64,
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .ok_or_else(|| ApiError::Unauthorized("Authorization header required".to_string()))?
            .to_str()
            .map_err(|_| ApiError::Unauthorized("Invalid authorization header".to_string()))?;

        let token = bearer_token(header)?;
        let claims = state.tokens.validate(token)?;

        Ok(AuthUser {
            user_id: claims.user_id,
        })
    }
}

/// "Bearer <token>" 형식만 허용
fn bearer_token(header: &str) -> Result<&str, ApiError> {
    let token = header
        .strip_prefix("Bearer ")
        .ok_or_else(|| ApiError::Unauthorized("Invalid authorization header format".to_string()))?
        .trim();

    if token.is_empty() {
        return Err(ApiError::Unauthorized("Token required".to_string()));
    }
    Ok(token)
}
