//! Database Models
//!
//! Row types as stored in PostgreSQL. Role and status columns are TEXT and are
//! converted into the shared enums when a row becomes a domain entity.

use chrono::{DateTime, Utc};
use sqlx::FromRow;

use crate::error::StoreError;
use crate::types::{BorrowRequest, Item, User};

/// users 테이블
#[derive(Debug, Clone, FromRow)]
pub struct UserRow {
    pub id: i64,
    pub name: String,
    /// 소문자로 정규화된 이메일
    pub email: String,
    /// Argon2 PHC 문자열
    pub password_hash: String,
    pub role: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// items 테이블
#[derive(Debug, Clone, FromRow)]
pub struct ItemRow {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub category: String,
    pub image_url: String,
    pub status: String,
    pub location: String,
    pub duration: i32,
    pub seller_id: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// borrow_requests 테이블
#[derive(Debug, Clone, FromRow)]
pub struct BorrowRequestRow {
    pub id: i64,
    pub item_id: i64,
    pub buyer_id: i64,
    pub status: String,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub message: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// 인증에 필요한 사용자 + 비밀번호 해시
#[derive(Debug, Clone)]
pub struct Credentials {
    pub user: User,
    pub password_hash: String,
}

impl TryFrom<UserRow> for Credentials {
    type Error = StoreError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        Ok(Credentials {
            user: User {
                id: row.id,
                name: row.name,
                email: row.email,
                role: row.role.parse()?,
                created_at: row.created_at,
                updated_at: row.updated_at,
            },
            password_hash: row.password_hash,
        })
    }
}

impl TryFrom<UserRow> for User {
    type Error = StoreError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        Credentials::try_from(row).map(|c| c.user)
    }
}

impl TryFrom<ItemRow> for Item {
    type Error = StoreError;

    fn try_from(row: ItemRow) -> Result<Self, Self::Error> {
        Ok(Item {
            id: row.id,
            title: row.title,
            description: row.description,
            category: row.category,
            image_url: row.image_url,
            status: row.status.parse()?,
            location: row.location,
            duration: row.duration,
            seller_id: row.seller_id,
            seller: None,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

impl TryFrom<BorrowRequestRow> for BorrowRequest {
    type Error = StoreError;

    fn try_from(row: BorrowRequestRow) -> Result<Self, Self::Error> {
        Ok(BorrowRequest {
            id: row.id,
            item_id: row.item_id,
            item: None,
            buyer_id: row.buyer_id,
            buyer: None,
            status: row.status.parse()?,
            start_date: row.start_date,
            end_date: row.end_date,
            message: row.message,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Row 목록을 도메인 타입 목록으로 변환
pub(crate) fn convert_all<R, T>(rows: Vec<R>) -> Result<Vec<T>, StoreError>
where
    T: TryFrom<R, Error = StoreError>,
{
    rows.into_iter().map(T::try_from).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{RequestStatus, Role};

    fn user_row(role: &str) -> UserRow {
        let now = Utc::now();
        UserRow {
            id: 7,
            name: "Dana".to_string(),
            email: "dana@example.com".to_string(),
            password_hash: "$argon2id$v=19$...".to_string(),
            role: role.to_string(),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_user_row_conversion() {
        let creds = Credentials::try_from(user_row("seller")).unwrap();
        assert_eq!(creds.user.role, Role::Seller);
        assert!(creds.password_hash.starts_with("$argon2id$"));
    }

    #[test]
    fn test_corrupt_role_rejected() {
        let err = User::try_from(user_row("admin")).unwrap_err();
        assert!(matches!(err, StoreError::Corrupt(_)));
    }

    #[test]
    fn test_request_row_conversion() {
        let now = Utc::now();
        let row = BorrowRequestRow {
            id: 1,
            item_id: 2,
            buyer_id: 3,
            status: "denied".to_string(),
            start_date: now,
            end_date: now,
            message: String::new(),
            created_at: now,
            updated_at: now,
        };

        let requests: Vec<BorrowRequest> = convert_all(vec![row]).unwrap();
        assert_eq!(requests[0].status, RequestStatus::Denied);
        assert!(requests[0].item.is_none());
    }
}
