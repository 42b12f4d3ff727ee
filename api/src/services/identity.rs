//! Identity Service
//!
//! Registration, login and current-user lookup. Password hashing runs on the
//! blocking pool so Argon2 does not stall the async workers.

use std::sync::Arc;

use serde::Serialize;

use super::password::{hash_password, verify_password};
use super::{access, TokenService};
use crate::db::Repository;
use crate::error::ApiError;
use crate::types::{NewUser, Role, User};

/// 로그인/회원가입 응답
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: User,
}

pub struct IdentityService {
    repo: Arc<dyn Repository>,
    tokens: Arc<TokenService>,
}

impl IdentityService {
    pub fn new(repo: Arc<dyn Repository>, tokens: Arc<TokenService>) -> Self {
        Self { repo, tokens }
    }

    /// 회원가입
    ///
    /// 역할은 seller/buyer만 허용, 이메일은 소문자로 정규화
    pub async fn register(
        &self,
        email: &str,
        password: &str,
        name: &str,
        role: &str,
    ) -> Result<AuthResponse, ApiError> {
        let email = normalize_email(email);
        let name = name.trim();

        if email.is_empty() || password.is_empty() || name.is_empty() {
            return Err(ApiError::ValidationError(
                "Email, password, and name are required".to_string(),
            ));
        }
        if !email.contains('@') {
            return Err(ApiError::ValidationError("Invalid email address".to_string()));
        }
        let role: Role = role.parse().map_err(|_| {
            ApiError::ValidationError("Role must be either 'seller' or 'buyer'".to_string())
        })?;

        if self.repo.find_user_by_email(&email).await?.is_some() {
            return Err(ApiError::Conflict("User with this email already exists".to_string()));
        }

        let plain = password.to_string();
        let password_hash = tokio::task::spawn_blocking(move || hash_password(&plain))
            .await
            .map_err(|e| {
                tracing::error!("Password hashing task failed: {}", e);
                ApiError::InternalError
            })??;

        // 동시 가입 경합은 UNIQUE 제약이 Conflict로 보고함
        let user = self
            .repo
            .create_user(&NewUser {
                name: name.to_string(),
                email,
                password_hash,
                role,
            })
            .await
            .map_err(|e| match ApiError::from(e) {
                ApiError::Conflict(_) => {
                    ApiError::Conflict("User with this email already exists".to_string())
                }
                other => other,
            })?;

        tracing::info!(user_id = user.id, role = %user.role, "User registered");

        let token = self.tokens.issue(user.id)?;
        Ok(AuthResponse { token, user })
    }

    /// 로그인 (계정 유무와 비밀번호 오류를 구분하지 않음)
    pub async fn login(&self, email: &str, password: &str) -> Result<AuthResponse, ApiError> {
        let invalid = || ApiError::Unauthorized("Invalid email or password".to_string());

        let credentials = self
            .repo
            .find_user_by_email(&normalize_email(email))
            .await?
            .ok_or_else(invalid)?;

        let plain = password.to_string();
        let stored = credentials.password_hash.clone();
        let verified = tokio::task::spawn_blocking(move || verify_password(&plain, &stored))
            .await
            .map_err(|e| {
                tracing::error!("Password verification task failed: {}", e);
                ApiError::InternalError
            })?;

        if !verified {
            tracing::warn!(user_id = credentials.user.id, "Login rejected");
            return Err(invalid());
        }

        let token = self.tokens.issue(credentials.user.id)?;
        Ok(AuthResponse {
            token,
            user: credentials.user,
        })
    }

    /// GET /me
    pub async fn me(&self, caller_id: i64) -> Result<User, ApiError> {
        access::load_caller(self.repo.as_ref(), caller_id).await
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}
