//! Borrow Request Lifecycle
//!
//! # Interview Q&A
//!
//! Q: 대여 요청의 상태는 어떻게 바뀌는가?
//! A: pending에서 출발하는 단방향 상태 머신
//!
//!    ```text
//!    submit ──► pending ──approve──► approved ──return──► returned
//!                  │
//!                  └──────deny─────► denied
//!    ```
//!
//!    - approve: 요청 approved + 아이템 borrowed (한 트랜잭션)
//!    - deny: 요청만 denied, 아이템은 그대로
//!    - return: 요청 returned + 다른 approved 요청이 없으면 아이템 available
//!    - denied/returned는 종료 상태, 더 이상 전이 없음
//!
//! Q: 같은 요청을 두 판매자 탭에서 동시에 승인하면?
//! A: 저장소의 조건부 UPDATE(`WHERE status = 'pending'`)가 하나만 통과시킨다.
//!    나머지는 0건 갱신 → `InvalidState`로 보고.
//!
//! Q: 승인할 때 아이템 상태를 다시 확인하지 않는 이유는?
//! A: 아이템 가용성은 제출(submit) 시점에만 검사한다.
//!    같은 아이템에 pending 요청이 여러 개 쌓일 수 있고,
//!    판매자는 그중 여러 건을 승인할 수 있다. 형제 요청을 자동 거절하지 않음.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Deserialize;

use super::access;
use super::catalog::{load_users, with_sellers};
use crate::db::{ItemEffect, Repository, StatusChange};
use crate::error::ApiError;
use crate::types::{BorrowRequest, Item, ItemStatus, NewBorrowRequest, RequestStatus, Role};

/// POST /borrow-requests 입력
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SubmitRequest {
    pub item_id: Option<i64>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub message: String,
}

/// 요청에 가할 수 있는 전이
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Approve,
    Deny,
    Return,
}

impl Transition {
    fn change(self) -> StatusChange {
        match self {
            Transition::Approve => StatusChange {
                from: RequestStatus::Pending,
                to: RequestStatus::Approved,
                item: ItemEffect::MarkBorrowed,
            },
            Transition::Deny => StatusChange {
                from: RequestStatus::Pending,
                to: RequestStatus::Denied,
                item: ItemEffect::Unchanged,
            },
            Transition::Return => StatusChange {
                from: RequestStatus::Approved,
                to: RequestStatus::Returned,
                item: ItemEffect::ReleaseIfUnclaimed,
            },
        }
    }

    fn verb(self) -> &'static str {
        match self {
            Transition::Approve => "approve",
            Transition::Deny => "deny",
            Transition::Return => "return",
        }
    }

    fn invalid_state(self) -> ApiError {
        let message = match self {
            Transition::Approve => "Only pending requests can be approved",
            Transition::Deny => "Only pending requests can be denied",
            Transition::Return => "Only approved requests can be returned",
        };
        ApiError::InvalidState(message.to_string())
    }
}

pub struct RequestLifecycle {
    repo: Arc<dyn Repository>,
}

impl RequestLifecycle {
    pub fn new(repo: Arc<dyn Repository>) -> Self {
        Self { repo }
    }

    /// 대여 요청 제출 (구매자 전용)
    ///
    /// 검사 순서: 호출자 → 역할 → 입력 → 아이템 존재 → 아이템 가용
    pub async fn submit(
        &self,
        caller_id: i64,
        input: SubmitRequest,
    ) -> Result<BorrowRequest, ApiError> {
        let buyer = access::require_role(
            self.repo.as_ref(),
            caller_id,
            Role::Buyer,
            "create borrow requests",
        )
        .await?;
        let new_request = validate_submission(buyer.id, input)?;

        let item = self.find_item(new_request.item_id).await?;
        if item.status != ItemStatus::Available {
            return Err(ApiError::Conflict(
                "Item is not available for borrowing".to_string(),
            ));
        }

        let mut request = self.repo.create_request(&new_request).await?;
        tracing::info!(
            request_id = request.id,
            item_id = item.id,
            buyer_id = buyer.id,
            "Borrow request submitted"
        );

        let mut items = self.with_sellers(vec![item]).await?;
        request.item = items.pop();
        request.buyer = Some(buyer);
        Ok(request)
    }

    /// PUT /borrow-requests/:id/approve (아이템 판매자 전용)
    pub async fn approve(&self, caller_id: i64, id: i64) -> Result<BorrowRequest, ApiError> {
        self.apply(caller_id, id, Transition::Approve).await
    }

    /// PUT /borrow-requests/:id/deny (아이템 판매자 전용)
    pub async fn deny(&self, caller_id: i64, id: i64) -> Result<BorrowRequest, ApiError> {
        self.apply(caller_id, id, Transition::Deny).await
    }

    /// PUT /borrow-requests/:id/return (판매자 또는 해당 구매자)
    pub async fn return_item(&self, caller_id: i64, id: i64) -> Result<BorrowRequest, ApiError> {
        self.apply(caller_id, id, Transition::Return).await
    }

    /// GET /my-requests: 호출자가 구매자로 제출한 요청 (아이템 + 판매자 포함)
    pub async fn list_mine(&self, caller_id: i64) -> Result<Vec<BorrowRequest>, ApiError> {
        let caller = access::load_caller(self.repo.as_ref(), caller_id).await?;
        let requests = self.repo.list_requests_by_buyer(caller.id).await?;
        tracing::debug!(buyer_id = caller.id, count = requests.len(), "Buyer requests listed");

        let items = self.items_for(&requests).await?;
        Ok(requests
            .into_iter()
            .map(|mut request| {
                request.item = items.iter().find(|i| i.id == request.item_id).cloned();
                request
            })
            .collect())
    }

    /// GET /my-items/requests: 호출자 소유 아이템에 들어온 요청 (아이템 + 구매자 포함)
    pub async fn list_for_my_items(&self, caller_id: i64) -> Result<Vec<BorrowRequest>, ApiError> {
        let caller = access::load_caller(self.repo.as_ref(), caller_id).await?;
        let requests = self.repo.list_requests_for_seller(caller.id).await?;
        tracing::debug!(seller_id = caller.id, count = requests.len(), "Seller requests listed");

        let items = self.items_for(&requests).await?;
        let buyers = load_users(self.repo.as_ref(), requests.iter().map(|r| r.buyer_id)).await?;
        Ok(requests
            .into_iter()
            .map(|mut request| {
                request.item = items.iter().find(|i| i.id == request.item_id).cloned();
                request.buyer = buyers.get(&request.buyer_id).cloned();
                request
            })
            .collect())
    }

    // ============ Transitions ============

    async fn apply(
        &self,
        caller_id: i64,
        id: i64,
        transition: Transition,
    ) -> Result<BorrowRequest, ApiError> {
        let request = self
            .repo
            .find_request(id)
            .await?
            .ok_or_else(|| ApiError::NotFound("Borrow request".to_string()))?;
        let item = self.find_item(request.item_id).await?;

        authorize(transition, &request, &item, caller_id)?;
        if request.status != transition.change().from {
            return Err(transition.invalid_state());
        }

        // 검사와 갱신 사이에 다른 호출이 먼저 전이했으면 None
        let (mut updated, item) = self
            .repo
            .transition_request(id, transition.change())
            .await?
            .ok_or_else(|| transition.invalid_state())?;

        tracing::info!(
            request_id = id,
            item_id = item.id,
            caller_id,
            status = %updated.status,
            item_status = %item.status,
            transition = transition.verb(),
            "Borrow request transitioned"
        );

        let buyer = self.repo.find_user(updated.buyer_id).await?;
        let mut items = self.with_sellers(vec![item]).await?;
        updated.item = items.pop();
        updated.buyer = buyer;
        Ok(updated)
    }

    // ============ Helpers ============

    async fn find_item(&self, id: i64) -> Result<Item, ApiError> {
        self.repo
            .find_item(id)
            .await?
            .ok_or_else(|| ApiError::NotFound("Item".to_string()))
    }

    /// 요청들이 가리키는 아이템을 판매자와 함께 조회
    async fn items_for(&self, requests: &[BorrowRequest]) -> Result<Vec<Item>, ApiError> {
        let mut ids: Vec<i64> = requests.iter().map(|r| r.item_id).collect();
        ids.sort_unstable();
        ids.dedup();
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let items = self.repo.find_items(&ids).await?;
        self.with_sellers(items).await
    }

    async fn with_sellers(&self, items: Vec<Item>) -> Result<Vec<Item>, ApiError> {
        with_sellers(self.repo.as_ref(), items).await
    }
}

/// approve/deny는 아이템 판매자만, return은 판매자 또는 요청한 구매자
fn authorize(
    transition: Transition,
    request: &BorrowRequest,
    item: &Item,
    caller_id: i64,
) -> Result<(), ApiError> {
    match transition {
        Transition::Approve => access::require_owner(
            item.seller_id,
            caller_id,
            "You can only approve borrow requests for your own items",
        ),
        Transition::Deny => access::require_owner(
            item.seller_id,
            caller_id,
            "You can only deny borrow requests for your own items",
        ),
        Transition::Return if caller_id == request.buyer_id => Ok(()),
        Transition::Return => access::require_owner(
            item.seller_id,
            caller_id,
            "Only the item's seller or the borrower can mark it returned",
        ),
    }
}

fn validate_submission(buyer_id: i64, input: SubmitRequest) -> Result<NewBorrowRequest, ApiError> {
    let item_id = input
        .item_id
        .filter(|id| *id > 0)
        .ok_or_else(|| ApiError::ValidationError("Item ID is required".to_string()))?;
    let start_date = input
        .start_date
        .ok_or_else(|| ApiError::ValidationError("Start date is required".to_string()))?;
    let end_date = input
        .end_date
        .ok_or_else(|| ApiError::ValidationError("End date is required".to_string()))?;

    if start_date >= end_date {
        return Err(ApiError::ValidationError(
            "Start date must be before end date".to_string(),
        ));
    }

    Ok(NewBorrowRequest {
        item_id,
        buyer_id,
        start_date,
        end_date,
        message: input.message,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::mock::MockRepository;
    use crate::db::{ItemRepository, UserRepository};
    use crate::types::{ItemFields, NewUser, User};
    use chrono::Duration;

    struct Fixture {
        repo: Arc<MockRepository>,
        lifecycle: RequestLifecycle,
        seller: User,
        buyer: User,
        item: Item,
    }

    async fn user(repo: &MockRepository, email: &str, role: Role) -> User {
        repo.create_user(&NewUser {
            name: email.split('@').next().unwrap().to_string(),
            email: email.to_string(),
            password_hash: "x".to_string(),
            role,
        })
        .await
        .unwrap()
    }

    async fn item(repo: &MockRepository, seller: &User, title: &str) -> Item {
        repo.create_item(
            seller.id,
            &ItemFields {
                title: title.to_string(),
                description: String::new(),
                category: "tools".to_string(),
                image_url: String::new(),
                location: "Seattle".to_string(),
                duration: 7,
            },
        )
        .await
        .unwrap()
    }

    async fn fixture() -> Fixture {
        let repo = Arc::new(MockRepository::new());
        let seller = user(&repo, "seller@example.com", Role::Seller).await;
        let buyer = user(&repo, "buyer@example.com", Role::Buyer).await;
        let item = item(&repo, &seller, "Drill").await;
        Fixture {
            lifecycle: RequestLifecycle::new(repo.clone()),
            repo,
            seller,
            buyer,
            item,
        }
    }

    fn submission(item_id: i64) -> SubmitRequest {
        let start = Utc::now() + Duration::days(1);
        SubmitRequest {
            item_id: Some(item_id),
            start_date: Some(start),
            end_date: Some(start + Duration::days(3)),
            message: "Need it for the weekend".to_string(),
        }
    }

    /// 아이템이 borrowed ⇔ 그 아이템에 approved 요청 존재
    fn assert_consistent(repo: &MockRepository) {
        let requests = repo.all_requests();
        for item in repo.all_items() {
            let approved = requests
                .iter()
                .any(|r| r.item_id == item.id && r.status == RequestStatus::Approved);
            assert_eq!(item.status == ItemStatus::Borrowed, approved, "item {}", item.id);
        }
    }

    #[tokio::test]
    async fn test_submit_approve_flow() {
        let f = fixture().await;

        let request = f.lifecycle.submit(f.buyer.id, submission(f.item.id)).await.unwrap();
        assert_eq!(request.status, RequestStatus::Pending);
        assert_eq!(request.buyer.as_ref(), Some(&f.buyer));
        let embedded = request.item.as_ref().unwrap();
        assert_eq!(embedded.id, f.item.id);
        assert_eq!(embedded.seller.as_ref(), Some(&f.seller));
        assert_eq!(f.repo.item(f.item.id).unwrap().status, ItemStatus::Available);
        assert_consistent(&f.repo);

        let approved = f.lifecycle.approve(f.seller.id, request.id).await.unwrap();
        assert_eq!(approved.status, RequestStatus::Approved);
        assert_eq!(approved.item.as_ref().unwrap().status, ItemStatus::Borrowed);
        assert_eq!(approved.buyer.as_ref(), Some(&f.buyer));
        assert_eq!(f.repo.item(f.item.id).unwrap().status, ItemStatus::Borrowed);
        assert_consistent(&f.repo);

        // 빌려간 아이템에는 새 요청 불가
        let other = user(&f.repo, "late@example.com", Role::Buyer).await;
        let err = f.lifecycle.submit(other.id, submission(f.item.id)).await.unwrap_err();
        assert!(matches!(err, ApiError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_deny_leaves_item_available() {
        let f = fixture().await;
        let request = f.lifecycle.submit(f.buyer.id, submission(f.item.id)).await.unwrap();

        let denied = f.lifecycle.deny(f.seller.id, request.id).await.unwrap();
        assert_eq!(denied.status, RequestStatus::Denied);
        assert_eq!(f.repo.item(f.item.id).unwrap().status, ItemStatus::Available);

        let err = f.lifecycle.approve(f.seller.id, request.id).await.unwrap_err();
        assert!(matches!(err, ApiError::InvalidState(_)));
        assert_consistent(&f.repo);
    }

    #[tokio::test]
    async fn test_submit_checks() {
        let f = fixture().await;

        let err = f.lifecycle.submit(f.seller.id, submission(f.item.id)).await.unwrap_err();
        let expected = "Only buyers can create borrow requests";
        assert!(matches!(err, ApiError::Forbidden(ref m) if m == expected));

        let err = f.lifecycle.submit(9999, submission(f.item.id)).await.unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));

        let err = f.lifecycle.submit(f.buyer.id, submission(9999)).await.unwrap_err();
        assert!(matches!(err, ApiError::NotFound(ref m) if m == "Item"));

        let mut missing = submission(f.item.id);
        missing.item_id = None;
        let err = f.lifecycle.submit(f.buyer.id, missing).await.unwrap_err();
        assert!(matches!(err, ApiError::ValidationError(ref m) if m == "Item ID is required"));

        let mut missing = submission(f.item.id);
        missing.start_date = None;
        let err = f.lifecycle.submit(f.buyer.id, missing).await.unwrap_err();
        assert!(matches!(err, ApiError::ValidationError(ref m) if m == "Start date is required"));

        let mut missing = submission(f.item.id);
        missing.end_date = None;
        let err = f.lifecycle.submit(f.buyer.id, missing).await.unwrap_err();
        assert!(matches!(err, ApiError::ValidationError(ref m) if m == "End date is required"));

        assert!(f.repo.all_requests().is_empty());
    }

    #[tokio::test]
    async fn test_start_must_precede_end() {
        let f = fixture().await;
        let start = Utc::now() + Duration::days(2);

        for end in [start, start - Duration::hours(1)] {
            let input = SubmitRequest {
                item_id: Some(f.item.id),
                start_date: Some(start),
                end_date: Some(end),
                message: String::new(),
            };
            let err = f.lifecycle.submit(f.buyer.id, input).await.unwrap_err();
            assert!(matches!(err, ApiError::ValidationError(_)));
        }
        assert!(f.repo.all_requests().is_empty());
    }

    #[tokio::test]
    async fn test_only_owner_can_decide() {
        let f = fixture().await;
        let stranger = user(&f.repo, "other-seller@example.com", Role::Seller).await;
        let request = f.lifecycle.submit(f.buyer.id, submission(f.item.id)).await.unwrap();

        for caller in [stranger.id, f.buyer.id] {
            assert!(matches!(
                f.lifecycle.approve(caller, request.id).await,
                Err(ApiError::Forbidden(_))
            ));
            assert!(matches!(
                f.lifecycle.deny(caller, request.id).await,
                Err(ApiError::Forbidden(_))
            ));
        }

        assert_eq!(f.repo.all_requests()[0].status, RequestStatus::Pending);
        assert_eq!(f.repo.item(f.item.id).unwrap().status, ItemStatus::Available);
    }

    #[tokio::test]
    async fn test_double_approve_rejected() {
        let f = fixture().await;
        let request = f.lifecycle.submit(f.buyer.id, submission(f.item.id)).await.unwrap();

        f.lifecycle.approve(f.seller.id, request.id).await.unwrap();
        let err = f.lifecycle.approve(f.seller.id, request.id).await.unwrap_err();
        let expected = "Only pending requests can be approved";
        assert!(matches!(err, ApiError::InvalidState(ref m) if m == expected));
        assert!(matches!(
            f.lifecycle.deny(f.seller.id, request.id).await,
            Err(ApiError::InvalidState(_))
        ));
    }

    #[tokio::test]
    async fn test_unknown_request() {
        let f = fixture().await;
        let err = f.lifecycle.approve(f.seller.id, 4242).await.unwrap_err();
        assert!(matches!(err, ApiError::NotFound(ref m) if m == "Borrow request"));
    }

    #[tokio::test]
    async fn test_concurrent_approvals_single_winner() {
        let f = fixture().await;
        let request = f.lifecycle.submit(f.buyer.id, submission(f.item.id)).await.unwrap();
        let lifecycle = Arc::new(f.lifecycle);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let lifecycle = lifecycle.clone();
                let seller_id = f.seller.id;
                let id = request.id;
                tokio::spawn(async move { lifecycle.approve(seller_id, id).await })
            })
            .collect();

        let mut wins = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => wins += 1,
                Err(err) => assert!(matches!(err, ApiError::InvalidState(_))),
            }
        }
        assert_eq!(wins, 1);
        assert_consistent(&f.repo);
    }

    #[tokio::test]
    async fn test_store_failure_keeps_state() {
        let f = fixture().await;
        let request = f.lifecycle.submit(f.buyer.id, submission(f.item.id)).await.unwrap();

        f.repo.fail_writes(true);
        let err = f.lifecycle.approve(f.seller.id, request.id).await.unwrap_err();
        assert!(matches!(err, ApiError::DatabaseError(_)));
        f.repo.fail_writes(false);

        assert_eq!(f.repo.all_requests()[0].status, RequestStatus::Pending);
        assert_eq!(f.repo.item(f.item.id).unwrap().status, ItemStatus::Available);

        // 장애 해소 후 같은 요청을 다시 승인할 수 있어야 함
        f.lifecycle.approve(f.seller.id, request.id).await.unwrap();
        assert_consistent(&f.repo);
    }

    #[tokio::test]
    async fn test_return_releases_item() {
        let f = fixture().await;
        let request = f.lifecycle.submit(f.buyer.id, submission(f.item.id)).await.unwrap();

        let err = f.lifecycle.return_item(f.buyer.id, request.id).await.unwrap_err();
        let expected = "Only approved requests can be returned";
        assert!(matches!(err, ApiError::InvalidState(ref m) if m == expected));

        f.lifecycle.approve(f.seller.id, request.id).await.unwrap();
        let stranger = user(&f.repo, "nosy@example.com", Role::Buyer).await;
        assert!(matches!(
            f.lifecycle.return_item(stranger.id, request.id).await,
            Err(ApiError::Forbidden(_))
        ));

        let returned = f.lifecycle.return_item(f.buyer.id, request.id).await.unwrap();
        assert_eq!(returned.status, RequestStatus::Returned);
        assert_eq!(returned.item.as_ref().unwrap().status, ItemStatus::Available);
        assert_consistent(&f.repo);

        // 다시 빌릴 수 있음
        let again = f.lifecycle.submit(f.buyer.id, submission(f.item.id)).await.unwrap();
        f.lifecycle.approve(f.seller.id, again.id).await.unwrap();
        f.lifecycle.return_item(f.seller.id, again.id).await.unwrap();
        assert_consistent(&f.repo);
    }

    #[tokio::test]
    async fn test_return_keeps_item_while_other_approval_remains() {
        let f = fixture().await;
        let second_buyer = user(&f.repo, "second@example.com", Role::Buyer).await;

        let first = f.lifecycle.submit(f.buyer.id, submission(f.item.id)).await.unwrap();
        let second = f.lifecycle.submit(second_buyer.id, submission(f.item.id)).await.unwrap();
        f.lifecycle.approve(f.seller.id, first.id).await.unwrap();
        f.lifecycle.approve(f.seller.id, second.id).await.unwrap();
        assert_consistent(&f.repo);

        let returned = f.lifecycle.return_item(f.buyer.id, first.id).await.unwrap();
        assert_eq!(returned.item.as_ref().unwrap().status, ItemStatus::Borrowed);
        assert_consistent(&f.repo);

        f.lifecycle.return_item(second_buyer.id, second.id).await.unwrap();
        assert_eq!(f.repo.item(f.item.id).unwrap().status, ItemStatus::Available);
        assert_consistent(&f.repo);
    }

    #[tokio::test]
    async fn test_listings_are_scoped_to_caller() {
        let f = fixture().await;
        let other_buyer = user(&f.repo, "other@example.com", Role::Buyer).await;
        let other_seller = user(&f.repo, "shop@example.com", Role::Seller).await;
        let tent = item(&f.repo, &other_seller, "Tent").await;

        let mine = f.lifecycle.submit(f.buyer.id, submission(f.item.id)).await.unwrap();
        f.lifecycle.submit(other_buyer.id, submission(tent.id)).await.unwrap();

        let listed = f.lifecycle.list_mine(f.buyer.id).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, mine.id);
        let embedded = listed[0].item.as_ref().unwrap();
        assert_eq!(embedded.seller.as_ref(), Some(&f.seller));

        let incoming = f.lifecycle.list_for_my_items(f.seller.id).await.unwrap();
        assert_eq!(incoming.len(), 1);
        assert_eq!(incoming[0].buyer.as_ref(), Some(&f.buyer));
        assert_eq!(incoming[0].item.as_ref().unwrap().id, f.item.id);

        // 역할이 맞지 않으면 빈 목록
        assert!(f.lifecycle.list_for_my_items(f.buyer.id).await.unwrap().is_empty());
        assert!(f.lifecycle.list_mine(f.seller.id).await.unwrap().is_empty());
    }

    #[test]
    fn test_submit_request_wire_form() {
        let input: SubmitRequest = serde_json::from_str(
            r#"{
                "itemId": 3,
                "startDate": "2024-06-01T00:00:00Z",
                "endDate": "2024-06-04T00:00:00Z"
            }"#,
        )
        .unwrap();
        assert_eq!(input.item_id, Some(3));
        assert!(input.message.is_empty());
        assert!(input.start_date.unwrap() < input.end_date.unwrap());
    }
}
