//! Services Module
//!
//! 비즈니스 로직을 담당하는 서비스 레이어
//!
//! # Services
//! - `IdentityService`: 회원가입, 로그인, 현재 사용자
//! - `TokenService`: 접근 토큰 발급/검증
//! - `ItemCatalog`: 아이템 조회 및 소유자 CRUD
//! - `RequestLifecycle`: 대여 요청 상태 머신

mod access;
mod catalog;
mod identity;
mod lifecycle;
mod password;
mod token;

pub use catalog::ItemCatalog;
pub use identity::{AuthResponse, IdentityService};
pub use lifecycle::{RequestLifecycle, SubmitRequest};
pub use token::TokenService;
