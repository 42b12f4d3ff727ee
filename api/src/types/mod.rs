//! Common Types Module
//!
//! 애플리케이션 전반에서 사용되는 공통 타입 정의
//!
//! 역할/상태 어휘는 여기 한 곳에만 정의하고 DB, 서비스, 라우트가 모두 공유한다.
//! DB 컬럼에는 `as_str()` 문자열 형태로 저장된다.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 사용자 역할 (생성 후 변경 불가)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Seller,
    Buyer,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Seller => "seller",
            Role::Buyer => "buyer",
        }
    }
}

/// 아이템 대여 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemStatus {
    Available,
    Borrowed,
}

impl ItemStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemStatus::Available => "available",
            ItemStatus::Borrowed => "borrowed",
        }
    }
}

/// 대여 요청 상태
///
/// ```text
/// pending ──approve──▶ approved ──return──▶ returned
///    │
///    └──────deny─────▶ denied
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    Pending,
    Approved,
    Denied,
    Returned,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Pending => "pending",
            RequestStatus::Approved => "approved",
            RequestStatus::Denied => "denied",
            RequestStatus::Returned => "returned",
        }
    }
}

/// 문자열 파싱 실패 (알 수 없는 enum 값)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

impl fmt::Display for UnknownVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown {} '{}'", self.kind, self.value)
    }
}

impl std::error::Error for UnknownVariant {}

macro_rules! impl_str_enum {
    ($ty:ty, $kind:literal, [$($variant:expr),+ $(,)?]) => {
        impl FromStr for $ty {
            type Err = UnknownVariant;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                [$($variant),+]
                    .into_iter()
                    .find(|v| v.as_str() == s)
                    .ok_or_else(|| UnknownVariant { kind: $kind, value: s.to_string() })
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

impl_str_enum!(Role, "role", [Role::Seller, Role::Buyer]);
impl_str_enum!(ItemStatus, "item status", [ItemStatus::Available, ItemStatus::Borrowed]);
impl_str_enum!(
    RequestStatus,
    "request status",
    [
        RequestStatus::Pending,
        RequestStatus::Approved,
        RequestStatus::Denied,
        RequestStatus::Returned,
    ]
);

// ============ Entities ============

/// 사용자 (비밀번호 해시는 직렬화하지 않음)
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// 대여 가능한 아이템
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub category: String,
    pub image_url: String,
    pub status: ItemStatus,
    pub location: String,
    /// 대여 기간 (일)
    pub duration: i32,
    pub seller_id: i64,
    /// 읽기 편의를 위한 판매자 정보 (조인 결과)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seller: Option<User>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// 대여 요청
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BorrowRequest {
    pub id: i64,
    pub item_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item: Option<Item>,
    pub buyer_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub buyer: Option<User>,
    pub status: RequestStatus,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub message: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ============ Write Models ============

/// 사용자 생성 입력 (해시는 서비스에서 계산됨)
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
}

/// 아이템 편집 가능한 필드 (생성/수정 공통)
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ItemFields {
    pub title: String,
    pub description: String,
    pub category: String,
    pub image_url: String,
    pub location: String,
    pub duration: i32,
}

/// 아이템 목록 필터 (모두 선택, AND 조건)
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ItemFilter {
    pub category: Option<String>,
    pub status: Option<ItemStatus>,
    /// 부분 문자열 매칭
    pub location: Option<String>,
}

impl ItemFilter {
    pub fn matches(&self, item: &Item) -> bool {
        self.category.as_deref().map_or(true, |c| item.category == c)
            && self.status.map_or(true, |s| item.status == s)
            && self
                .location
                .as_deref()
                .map_or(true, |l| item.location.contains(l))
    }
}

/// 대여 요청 생성 입력 (검증 완료 상태)
#[derive(Debug, Clone)]
pub struct NewBorrowRequest {
    pub item_id: i64,
    pub buyer_id: i64,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub message: String,
}
