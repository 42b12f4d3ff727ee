//! BorrowHub API Library
//!
//! # Overview
//!
//! 판매자가 물건을 등록하고 구매자가 기간을 정해 빌려 달라고 요청하는
//! P2P 대여 마켓플레이스의 백엔드 API.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                          API                              │
//! │                                                           │
//! │  ┌─────────┐   ┌──────────────────────────┐   ┌────────┐ │
//! │  │ Routes  │──►│ Services                 │──►│   DB   │ │
//! │  │ +Auth   │   │ Identity Catalog         │   │(trait) │ │
//! │  └─────────┘   │ RequestLifecycle         │   └───┬────┘ │
//! │                └──────────────────────────┘       │      │
//! └───────────────────────────────────────────────────┼──────┘
//!                                                     ▼
//!                                            ┌────────────────┐
//!                                            │   PostgreSQL   │
//!                                            └────────────────┘
//! ```
//!
//! ## Modules
//!
//! - `config`: 환경 설정 관리
//! - `error`: 에러 타입 및 처리
//! - `auth`: Bearer 토큰 extractor
//! - `routes`: HTTP 엔드포인트 핸들러
//! - `services`: 비즈니스 로직 (회원, 아이템, 대여 요청 상태 머신)
//! - `db`: 저장소 트레이트와 PostgreSQL 구현
//! - `types`: 공통 도메인 타입
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use borrowhub_api::{config::Config, db::Database, routes, AppState};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::from_env()?;
//!     let db = Database::connect(&config.database_url).await?;
//!     let state = AppState::new(Arc::new(db), config)?;
//!     let app = routes::create_router(state);
//!
//!     // ... 서버 시작
//!     Ok(())
//! }
//! ```

use std::sync::Arc;

pub mod auth;
pub mod config;
pub mod error;
pub mod routes;
pub mod services;
pub mod db;
pub mod types;

// Re-exports for convenience
pub use config::Config;
pub use error::ApiError;
pub use db::Database;
pub use services::{IdentityService, ItemCatalog, RequestLifecycle, TokenService};

use db::Repository;

/// 애플리케이션 전역 상태
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<dyn Repository>,
    pub tokens: Arc<TokenService>,
    pub identity: Arc<IdentityService>,
    pub catalog: Arc<ItemCatalog>,
    pub lifecycle: Arc<RequestLifecycle>,
    pub config: Arc<Config>,
}

impl AppState {
    /// 저장소 하나를 모든 서비스가 공유
    pub fn new(db: Arc<dyn Repository>, config: Config) -> anyhow::Result<Self> {
        let tokens = Arc::new(TokenService::new(&config.jwt_secret, config.token_ttl_hours)?);

        Ok(Self {
            identity: Arc::new(IdentityService::new(db.clone(), tokens.clone())),
            catalog: Arc::new(ItemCatalog::new(db.clone())),
            lifecycle: Arc::new(RequestLifecycle::new(db.clone())),
            tokens,
            db,
            config: Arc::new(config),
        })
    }
}
