//! API Routes Module
//!
//! 모든 HTTP 엔드포인트 정의
//!
//! # Routes
//! - `/health` - 헬스 체크
//! - `/api/register`, `/api/login`, `/api/me` - 회원
//! - `/api/items/*`, `/api/my-items` - 아이템
//! - `/api/borrow-requests/*`, `/api/my-requests`, `/api/my-items/requests` - 대여 요청

pub mod auth;
pub mod borrow_requests;
pub mod health;
pub mod items;

use axum::{
    http::{header, HeaderValue, Method},
    routing::{get, post, put},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::AppState;

/// 개발 환경 프론트엔드 origin
const DEV_ORIGINS: &[&str] = &["http://localhost:3000", "http://127.0.0.1:3000"];

/// 라우터 생성
///
/// # Route Structure
///
/// ```text
/// GET    /health                          - 서버 상태 확인
///
/// POST   /api/register                    - 회원가입
/// POST   /api/login                       - 로그인
/// GET    /api/me                          - 현재 사용자        (auth)
///
/// GET    /api/items                       - 아이템 목록 (category, status, location)
/// GET    /api/items/:id                   - 아이템 상세
/// POST   /api/items                       - 아이템 등록        (seller)
/// PUT    /api/items/:id                   - 아이템 수정        (owner)
/// DELETE /api/items/:id                   - 아이템 삭제        (owner)
/// GET    /api/my-items                    - 내 아이템          (seller)
///
/// POST   /api/borrow-requests             - 대여 요청          (buyer)
/// PUT    /api/borrow-requests/:id/approve - 승인               (owner)
/// PUT    /api/borrow-requests/:id/deny    - 거절               (owner)
/// PUT    /api/borrow-requests/:id/return  - 반납               (owner or buyer)
/// GET    /api/my-requests                 - 내가 보낸 요청     (auth)
/// GET    /api/my-items/requests           - 내 아이템에 온 요청 (auth)
/// ```
pub fn create_router(state: AppState) -> Router {
    let cors = cors_layer(&state);

    let api = Router::new()
        // 회원
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/me", get(auth::me))

        // 아이템
        .route("/items", get(items::list_items).post(items::create_item))
        .route(
            "/items/:id",
            get(items::get_item)
                .put(items::update_item)
                .delete(items::delete_item),
        )
        .route("/my-items", get(items::my_items))

        // 대여 요청
        .route("/borrow-requests", post(borrow_requests::create_request))
        .route("/borrow-requests/:id/approve", put(borrow_requests::approve_request))
        .route("/borrow-requests/:id/deny", put(borrow_requests::deny_request))
        .route("/borrow-requests/:id/return", put(borrow_requests::return_request))
        .route("/my-requests", get(borrow_requests::my_requests))
        .route("/my-items/requests", get(borrow_requests::my_item_requests));

    Router::new()
        .route("/health", get(health::health_check))
        .nest("/api", api)

        // 미들웨어
        .layer(TraceLayer::new_for_http())
        .layer(cors)

        // 상태 주입
        .with_state(state)
}

/// CORS 설정
///
/// 프로덕션에서는 ALLOWED_ORIGINS만, 개발 환경에서는 로컬 프론트엔드만 허용
fn cors_layer(state: &AppState) -> CorsLayer {
    let origins: Vec<HeaderValue> = if state.config.is_production() {
        state
            .config
            .allowed_origins
            .iter()
            .filter_map(|origin| origin.parse().ok())
            .collect()
    } else {
        DEV_ORIGINS
            .iter()
            .filter_map(|origin| origin.parse().ok())
            .collect()
    };

    if origins.is_empty() {
        tracing::warn!("No valid CORS origins configured; cross-origin requests will be refused");
    }

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
}
