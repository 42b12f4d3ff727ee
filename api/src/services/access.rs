//! Caller authorization helpers shared by the catalog and the request lifecycle.
//!
//! Every operation receives the caller id explicitly (resolved once from the
//! bearer token at the HTTP boundary) and checks role or ownership here.

use crate::db::Repository;
use crate::error::ApiError;
use crate::types::{Role, User};

/// 호출자 조회 (토큰은 유효하지만 사용자가 삭제된 경우 404)
pub async fn load_caller(repo: &dyn Repository, caller_id: i64) -> Result<User, ApiError> {
    repo.find_user(caller_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("User".to_string()))
}

/// 호출자가 특정 역할인지 확인
pub async fn require_role(
    repo: &dyn Repository,
    caller_id: i64,
    role: Role,
    action: &str,
) -> Result<User, ApiError> {
    let caller = load_caller(repo, caller_id).await?;
    if caller.role != role {
        tracing::warn!(
            caller_id,
            role = %caller.role,
            required = %role,
            "Role check failed"
        );
        return Err(ApiError::Forbidden(format!("Only {}s can {}", role, action)));
    }
    Ok(caller)
}

/// 리소스 소유자인지 확인
pub fn require_owner(owner_id: i64, caller_id: i64, message: &str) -> Result<(), ApiError> {
    if owner_id != caller_id {
        tracing::warn!(caller_id, owner_id, "Ownership check failed");
        return Err(ApiError::Forbidden(message.to_string()));
    }
    Ok(())
}
