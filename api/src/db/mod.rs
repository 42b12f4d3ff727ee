//! Database Module
//!
//! # Interview Q&A
//!
//! Q: 왜 PostgreSQL을 선택했는가?
//! A: 대여 마켓플레이스에 적합한 이유
//!
//!    1. ACID 트랜잭션: 요청 승인 + 아이템 상태 변경을 한 단위로 처리
//!    2. SERIALIZABLE 격리 수준: 같은 아이템에 대한 동시 승인이 섞이지 않음
//!    3. UNIQUE 제약: 이메일 중복을 DB 수준에서 차단
//!    4. 외래 키: 아이템 삭제 시 대여 요청도 함께 정리 (ON DELETE CASCADE)
//!
//! Q: 승인(approve)의 원자성은 어떻게 보장하는가?
//! A: 하나의 트랜잭션 안에서
//!
//!    ```sql
//!    SET TRANSACTION ISOLATION LEVEL SERIALIZABLE;
//!    UPDATE borrow_requests SET status = 'approved' WHERE id = $1 AND status = 'pending';
//!    UPDATE items SET status = 'borrowed' WHERE id = $2;
//!    COMMIT;
//!    ```
//!
//!    - 조건부 UPDATE가 0건이면 ROLLBACK → 이미 처리된 요청
//!    - 어느 쪽이든 실패하면 ROLLBACK → 호출 전 상태 유지
//!    - 직렬화 충돌(40001): 요청이 이미 from 상태가 아니면 None → InvalidState
//!      아직 from 상태면 재시도 없이 500으로 보고
//!
//! Q: 커넥션 풀은 어떻게 관리하는가?
//! A: SQLx의 PgPool 사용
//!    - 최소/최대 커넥션 수 설정
//!    - 커넥션 재사용 (오버헤드 감소)
//!    - 타임아웃 처리

mod models;
mod repository;

pub use models::*;
pub use repository::{
    BorrowRequestRepository, ItemEffect, ItemRepository, Repository, StatusChange, StoreResult,
    UserRepository,
};
#[cfg(test)]
pub use repository::mock;

use anyhow::Result;
use async_trait::async_trait;
use sqlx::{postgres::PgPoolOptions, PgPool, Postgres, QueryBuilder};

use crate::error::StoreError;
use crate::types::{
    BorrowRequest, Item, ItemFields, ItemFilter, ItemStatus, NewBorrowRequest, NewUser, User,
};

/// 데이터베이스 연결 및 쿼리 담당
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// 데이터베이스 연결
    ///
    /// # Connection Pool Settings
    ///
    /// - max_connections: 10 (트래픽에 따라 조정)
    /// - min_connections: 1 (idle 시 최소 유지)
    /// - acquire_timeout: 3초 (커넥션 획득 대기)
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .min_connections(1)
            .acquire_timeout(std::time::Duration::from_secs(3))
            .connect(database_url)
            .await?;

        Ok(Self { pool })
    }

    /// 마이그레이션 실행
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await?;
        Ok(())
    }
}

/// LIKE 패턴의 와일드카드 이스케이프 (부분 문자열 매칭을 그대로 유지)
fn escape_like(raw: &str) -> String {
    raw.replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

#[async_trait]
impl UserRepository for Database {
    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<Credentials>> {
        let row = sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE email = $1")
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;

        row.map(Credentials::try_from).transpose()
    }

    async fn find_user(&self, id: i64) -> StoreResult<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(User::try_from).transpose()
    }

    async fn find_users(&self, ids: &[i64]) -> StoreResult<Vec<User>> {
        let rows = sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE id = ANY($1)")
            .bind(ids)
            .fetch_all(&self.pool)
            .await?;

        convert_all(rows)
    }

    async fn create_user(&self, new_user: &NewUser) -> StoreResult<User> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            INSERT INTO users (name, email, password_hash, role, created_at, updated_at)
            VALUES ($1, $2, $3, $4, NOW(), NOW())
            RETURNING *
            "#
        )
        .bind(&new_user.name)
        .bind(&new_user.email)
        .bind(&new_user.password_hash)
        .bind(new_user.role.as_str())
        .fetch_one(&self.pool)
        .await?;

        User::try_from(row)
    }
}

#[async_trait]
impl ItemRepository for Database {
    async fn find_item(&self, id: i64) -> StoreResult<Option<Item>> {
        let row = sqlx::query_as::<_, ItemRow>("SELECT * FROM items WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(Item::try_from).transpose()
    }

    async fn find_items(&self, ids: &[i64]) -> StoreResult<Vec<Item>> {
        let rows = sqlx::query_as::<_, ItemRow>("SELECT * FROM items WHERE id = ANY($1)")
            .bind(ids)
            .fetch_all(&self.pool)
            .await?;

        convert_all(rows)
    }

    async fn list_items(&self, filter: &ItemFilter) -> StoreResult<Vec<Item>> {
        let mut query = QueryBuilder::<Postgres>::new("SELECT * FROM items WHERE TRUE");

        if let Some(category) = &filter.category {
            query.push(" AND category = ").push_bind(category.clone());
        }
        if let Some(status) = filter.status {
            query.push(" AND status = ").push_bind(status.as_str());
        }
        if let Some(location) = &filter.location {
            query
                .push(" AND location LIKE ")
                .push_bind(format!("%{}%", escape_like(location)));
        }
        query.push(" ORDER BY id");

        let rows = query
            .build_query_as::<ItemRow>()
            .fetch_all(&self.pool)
            .await?;

        convert_all(rows)
    }

    async fn list_items_by_seller(&self, seller_id: i64) -> StoreResult<Vec<Item>> {
        let rows = sqlx::query_as::<_, ItemRow>(
            "SELECT * FROM items WHERE seller_id = $1 ORDER BY id"
        )
        .bind(seller_id)
        .fetch_all(&self.pool)
        .await?;

        convert_all(rows)
    }

    async fn create_item(&self, seller_id: i64, fields: &ItemFields) -> StoreResult<Item> {
        let row = sqlx::query_as::<_, ItemRow>(
            r#"
            INSERT INTO items (
                title, description, category, image_url, status, location, duration,
                seller_id, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, NOW(), NOW())
            RETURNING *
            "#
        )
        .bind(&fields.title)
        .bind(&fields.description)
        .bind(&fields.category)
        .bind(&fields.image_url)
        .bind(ItemStatus::Available.as_str())
        .bind(&fields.location)
        .bind(fields.duration)
        .bind(seller_id)
        .fetch_one(&self.pool)
        .await?;

        Item::try_from(row)
    }

    async fn update_item(&self, id: i64, fields: &ItemFields) -> StoreResult<Option<Item>> {
        let row = sqlx::query_as::<_, ItemRow>(
            r#"
            UPDATE items SET
                title = $2,
                description = $3,
                category = $4,
                image_url = $5,
                location = $6,
                duration = $7,
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#
        )
        .bind(id)
        .bind(&fields.title)
        .bind(&fields.description)
        .bind(&fields.category)
        .bind(&fields.image_url)
        .bind(&fields.location)
        .bind(fields.duration)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Item::try_from).transpose()
    }

    async fn delete_item(&self, id: i64) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM items WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl BorrowRequestRepository for Database {
    async fn find_request(&self, id: i64) -> StoreResult<Option<BorrowRequest>> {
        let row = sqlx::query_as::<_, BorrowRequestRow>(
            "SELECT * FROM borrow_requests WHERE id = $1"
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(BorrowRequest::try_from).transpose()
    }

    async fn create_request(&self, new_request: &NewBorrowRequest) -> StoreResult<BorrowRequest> {
        let row = sqlx::query_as::<_, BorrowRequestRow>(
            r#"
            INSERT INTO borrow_requests (
                item_id, buyer_id, status, start_date, end_date, message, created_at, updated_at
            )
            VALUES ($1, $2, 'pending', $3, $4, $5, NOW(), NOW())
            RETURNING *
            "#
        )
        .bind(new_request.item_id)
        .bind(new_request.buyer_id)
        .bind(new_request.start_date)
        .bind(new_request.end_date)
        .bind(&new_request.message)
        .fetch_one(&self.pool)
        .await?;

        BorrowRequest::try_from(row)
    }

    async fn list_requests_by_buyer(&self, buyer_id: i64) -> StoreResult<Vec<BorrowRequest>> {
        let rows = sqlx::query_as::<_, BorrowRequestRow>(
            "SELECT * FROM borrow_requests WHERE buyer_id = $1 ORDER BY id"
        )
        .bind(buyer_id)
        .fetch_all(&self.pool)
        .await?;

        convert_all(rows)
    }

    async fn list_requests_for_seller(&self, seller_id: i64) -> StoreResult<Vec<BorrowRequest>> {
        let rows = sqlx::query_as::<_, BorrowRequestRow>(
            r#"
            SELECT br.*
            FROM borrow_requests br
            JOIN items i ON br.item_id = i.id
            WHERE i.seller_id = $1
            ORDER BY br.id
            "#
        )
        .bind(seller_id)
        .fetch_all(&self.pool)
        .await?;

        convert_all(rows)
    }

    async fn transition_request(
        &self,
        id: i64,
        change: StatusChange,
    ) -> StoreResult<Option<(BorrowRequest, Item)>> {
        match self.transition_in_tx(id, change).await {
            // 같은 행을 먼저 커밋한 동시 전이가 있으면 40001로 실패함
            Err(StoreError::SerializationFailure(msg)) => match self.find_request(id).await? {
                Some(current) if current.status == change.from => {
                    Err(StoreError::SerializationFailure(msg))
                }
                _ => {
                    tracing::debug!(request_id = id, "Transition lost to a concurrent update");
                    Ok(None)
                }
            },
            result => result,
        }
    }
}

impl Database {
    /// 조건부 요청 UPDATE + 아이템 효과를 하나의 SERIALIZABLE 트랜잭션으로 실행
    ///
    /// 실패 시 트랜잭션은 drop되며 ROLLBACK 된다.
    async fn transition_in_tx(
        &self,
        id: i64,
        change: StatusChange,
    ) -> StoreResult<Option<(BorrowRequest, Item)>> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("SET TRANSACTION ISOLATION LEVEL SERIALIZABLE")
            .execute(&mut *tx)
            .await?;

        let request_row = sqlx::query_as::<_, BorrowRequestRow>(
            r#"
            UPDATE borrow_requests
            SET status = $2, updated_at = NOW()
            WHERE id = $1 AND status = $3
            RETURNING *
            "#
        )
        .bind(id)
        .bind(change.to.as_str())
        .bind(change.from.as_str())
        .fetch_optional(&mut *tx)
        .await?;

        let Some(request_row) = request_row else {
            tx.rollback().await?;
            return Ok(None);
        };
        let item_id = request_row.item_id;

        let updated_item = match change.item {
            ItemEffect::Unchanged => None,
            ItemEffect::MarkBorrowed => {
                sqlx::query_as::<_, ItemRow>(
                    "UPDATE items SET status = $2, updated_at = NOW() WHERE id = $1 RETURNING *"
                )
                .bind(item_id)
                .bind(ItemStatus::Borrowed.as_str())
                .fetch_optional(&mut *tx)
                .await?
            }
            ItemEffect::ReleaseIfUnclaimed => {
                // 같은 아이템에 approved 요청이 남아 있으면 borrowed 유지
                sqlx::query_as::<_, ItemRow>(
                    r#"
                    UPDATE items SET status = $2, updated_at = NOW()
                    WHERE id = $1
                      AND NOT EXISTS (
                          SELECT 1 FROM borrow_requests
                          WHERE item_id = $1 AND status = $3
                      )
                    RETURNING *
                    "#
                )
                .bind(item_id)
                .bind(ItemStatus::Available.as_str())
                .bind(crate::types::RequestStatus::Approved.as_str())
                .fetch_optional(&mut *tx)
                .await?
            }
        };

        let item_row = match updated_item {
            Some(row) => row,
            None => {
                sqlx::query_as::<_, ItemRow>("SELECT * FROM items WHERE id = $1")
                    .bind(item_id)
                    .fetch_one(&mut *tx)
                    .await?
            }
        };

        tx.commit().await?;

        Ok(Some((BorrowRequest::try_from(request_row)?, Item::try_from(item_row)?)))
    }
}

#[async_trait]
impl Repository for Database {
    /// Health check
    async fn health_check(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
