//! Access Token Service
//!
//! # Interview Q&A
//!
//! Q: 세션 대신 JWT를 쓰는 이유는?
//! A: API 서버가 상태를 갖지 않게 하기 위해
//!    - 서명 키 하나만 프로세스 전역으로 공유 (시작 시 로드, 이후 읽기 전용)
//!    - 검증은 동기, 공유 가변 상태 없음
//!
//! Q: 토큰에는 무엇이 들어가는가?
//! A: `user_id`와 `exp`(Unix seconds)뿐
//!    - 역할(role)은 넣지 않음 → 권한 검사는 항상 DB의 현재 사용자 기준
//!
//! Q: 서명 키가 비어 있으면?
//! A: 서버가 시작되지 않는다. `TokenService::new`가 빈 키를 거부함

use anyhow::{bail, Result};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;

/// 토큰 클레임
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    pub user_id: i64,
    /// 만료 시각 (Unix seconds)
    pub exp: i64,
}

/// HS256 토큰 발급/검증
pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    ttl: Duration,
}

impl TokenService {
    pub fn new(secret: &str, ttl_hours: i64) -> Result<Self> {
        if secret.is_empty() {
            bail!("token signing secret must not be empty");
        }
        if ttl_hours <= 0 {
            bail!("token lifetime must be positive");
        }

        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        Ok(Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            ttl: Duration::hours(ttl_hours),
        })
    }

    /// 현재 시각 기준 토큰 발급
    pub fn issue(&self, user_id: i64) -> Result<String, ApiError> {
        self.issue_at(user_id, Utc::now())
    }

    pub fn issue_at(&self, user_id: i64, issued_at: DateTime<Utc>) -> Result<String, ApiError> {
        let claims = Claims {
            user_id,
            exp: (issued_at + self.ttl).timestamp(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding).map_err(|e| {
            tracing::error!("Failed to sign token: {}", e);
            ApiError::InternalError
        })
    }

    /// 서명, 알고리즘, 만료 검증
    pub fn validate(&self, token: &str) -> Result<Claims, ApiError> {
        decode::<Claims>(token, &self.decoding, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| {
                tracing::debug!("Token rejected: {}", e);
                ApiError::Unauthorized("Invalid or expired token".to_string())
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_issue_and_validate() {
        let tokens = TokenService::new("test-secret", 72).unwrap();
        let now = Utc::now();
        let token = tokens.issue_at(42, now).unwrap();

        let claims = tokens.validate(&token).unwrap();
        assert_eq!(claims.user_id, 42);
        assert_eq!(claims.exp, (now + Duration::hours(72)).timestamp());
    }

    #[test]
    fn test_expired_token_rejected() {
        let tokens = TokenService::new("test-secret", 72).unwrap();
        let token = tokens
            .issue_at(42, Utc::now() - Duration::hours(73))
            .unwrap();

        assert!(matches!(tokens.validate(&token), Err(ApiError::Unauthorized(_))));
    }

    #[test]
    fn test_foreign_signature_rejected() {
        let ours = TokenService::new("our-secret", 72).unwrap();
        let theirs = TokenService::new("their-secret", 72).unwrap();
        let token = theirs.issue(42).unwrap();

        assert!(ours.validate(&token).is_err());
        assert!(ours.validate("not.a.jwt").is_err());
    }

    #[test]
    fn test_empty_secret_refused() {
        assert!(TokenService::new("", 72).is_err());
        assert!(TokenService::new("secret", 0).is_err());
    }
}
