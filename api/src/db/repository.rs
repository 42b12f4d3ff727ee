//! Repository Pattern Implementation
//!
//! # Interview Q&A
//!
//! Q: Repository 패턴이란?
//! A: 데이터 접근 로직을 추상화하는 패턴
//!
//!    장점:
//!    - 비즈니스 로직(상태 머신, 권한 검사)과 데이터 접근 분리
//!    - 테스트 시 in-memory 구현으로 교체 가능
//!    - DB 교체 시 영향 최소화
//!
//! Q: 상태 전이 규칙은 어디에 있는가?
//! A: 서비스 계층(`services::lifecycle`)에만 있다.
//!    저장소는 `StatusChange`를 받아 "from 상태일 때만 to로 바꾸고,
//!    아이템 효과를 같은 트랜잭션에서 적용"하는 실행만 담당한다.
//!
//!    ```text
//!    UPDATE borrow_requests SET status = to WHERE id = $1 AND status = from
//!      → 0 rows: 다른 호출이 먼저 전이함 → None
//!      → 1 row : item 효과 적용 → COMMIT
//!    ```

use async_trait::async_trait;

use super::models::Credentials;
use crate::error::StoreError;
use crate::types::{
    BorrowRequest, Item, ItemFields, ItemFilter, ItemStatus, NewBorrowRequest, NewUser,
    RequestStatus, User,
};

pub type StoreResult<T> = Result<T, StoreError>;

/// 요청 상태 전이가 아이템에 미치는 효과
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemEffect {
    /// 아이템 변경 없음 (deny)
    Unchanged,
    /// available → borrowed (approve)
    MarkBorrowed,
    /// 다른 approved 요청이 없을 때만 available로 복귀 (return)
    ReleaseIfUnclaimed,
}

/// 조건부 상태 변경 명령
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusChange {
    pub from: RequestStatus,
    pub to: RequestStatus,
    pub item: ItemEffect,
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    /// 이메일로 조회 (로그인용, 해시 포함)
    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<Credentials>>;
    async fn find_user(&self, id: i64) -> StoreResult<Option<User>>;
    async fn find_users(&self, ids: &[i64]) -> StoreResult<Vec<User>>;
    /// 이메일 중복 시 `StoreError::UniqueViolation`
    async fn create_user(&self, new_user: &NewUser) -> StoreResult<User>;
}

#[async_trait]
pub trait ItemRepository: Send + Sync {
    async fn find_item(&self, id: i64) -> StoreResult<Option<Item>>;
    async fn find_items(&self, ids: &[i64]) -> StoreResult<Vec<Item>>;
    async fn list_items(&self, filter: &ItemFilter) -> StoreResult<Vec<Item>>;
    async fn list_items_by_seller(&self, seller_id: i64) -> StoreResult<Vec<Item>>;
    /// 새 아이템은 항상 available
    async fn create_item(&self, seller_id: i64, fields: &ItemFields) -> StoreResult<Item>;
    async fn update_item(&self, id: i64, fields: &ItemFields) -> StoreResult<Option<Item>>;
    /// 삭제 여부 반환 (관련 대여 요청도 함께 삭제됨)
    async fn delete_item(&self, id: i64) -> StoreResult<bool>;
}

#[async_trait]
pub trait BorrowRequestRepository: Send + Sync {
    async fn find_request(&self, id: i64) -> StoreResult<Option<BorrowRequest>>;
    /// 새 요청은 항상 pending
    async fn create_request(&self, new_request: &NewBorrowRequest) -> StoreResult<BorrowRequest>;
    async fn list_requests_by_buyer(&self, buyer_id: i64) -> StoreResult<Vec<BorrowRequest>>;
    /// 판매자가 소유한 아이템들에 대한 요청
    async fn list_requests_for_seller(&self, seller_id: i64) -> StoreResult<Vec<BorrowRequest>>;
    /// 단일 트랜잭션으로 요청 상태 + 아이템 효과 적용
    ///
    /// 요청이 `change.from` 상태가 아니면 아무것도 바꾸지 않고 `None`.
    async fn transition_request(
        &self,
        id: i64,
        change: StatusChange,
    ) -> StoreResult<Option<(BorrowRequest, Item)>>;
}

/// 애플리케이션이 사용하는 전체 저장소
#[async_trait]
pub trait Repository: UserRepository + ItemRepository + BorrowRequestRepository {
    async fn health_check(&self) -> StoreResult<()>;
}

// PostgreSQL 구현은 db/mod.rs의 Database 구조체에 있음
// 테스트용 in-memory 구현:
