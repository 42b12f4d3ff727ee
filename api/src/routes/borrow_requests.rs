//! Borrow Request Endpoints
//!
//! Every route here requires a bearer token. Role and ownership checks live in
//! `RequestLifecycle`; handlers only unpack the request and pass the caller id.

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        Path, State,
    },
    Json,
};

use crate::{
    auth::AuthUser,
    error::ApiError,
    services::SubmitRequest,
    types::BorrowRequest,
    AppState,
};

/// POST /api/borrow-requests
pub async fn create_request(
    State(state): State<AppState>,
    caller: AuthUser,
    payload: Result<Json<SubmitRequest>, JsonRejection>,
) -> Result<Json<BorrowRequest>, ApiError> {
    let Json(input) = payload?;
    let request = state.lifecycle.submit(caller.user_id, input).await?;
    Ok(Json(request))
}

/// PUT /api/borrow-requests/:id/approve
pub async fn approve_request(
    State(state): State<AppState>,
    caller: AuthUser,
    id: Result<Path<i64>, PathRejection>,
) -> Result<Json<BorrowRequest>, ApiError> {
    let Path(id) = id?;
    let request = state.lifecycle.approve(caller.user_id, id).await?;
    Ok(Json(request))
}

/// PUT /api/borrow-requests/:id/deny
pub async fn deny_request(
    State(state): State<AppState>,
    caller: AuthUser,
    id: Result<Path<i64>, PathRejection>,
) -> Result<Json<BorrowRequest>, ApiError> {
    let Path(id) = id?;
    let request = state.lifecycle.deny(caller.user_id, id).await?;
    Ok(Json(request))
}

/// PUT /api/borrow-requests/:id/return
pub async fn return_request(
    State(state): State<AppState>,
    caller: AuthUser,
    id: Result<Path<i64>, PathRejection>,
) -> Result<Json<BorrowRequest>, ApiError> {
    let Path(id) = id?;
    let request = state.lifecycle.return_item(caller.user_id, id).await?;
    Ok(Json(request))
}

/// GET /api/my-requests
pub async fn my_requests(
    State(state): State<AppState>,
    caller: AuthUser,
) -> Result<Json<Vec<BorrowRequest>>, ApiError> {
    let requests = state.lifecycle.list_mine(caller.user_id).await?;
    Ok(Json(requests))
}

/// GET /api/my-items/requests
pub async fn my_item_requests(
    State(state): State<AppState>,
    caller: AuthUser,
) -> Result<Json<Vec<BorrowRequest>>, ApiError> {
    let requests = state.lifecycle.list_for_my_items(caller.user_id).await?;
    Ok(Json(requests))
}
