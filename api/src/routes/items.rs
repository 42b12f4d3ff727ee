//! Item Endpoints
//!
//! Public listing/lookup plus seller-only create, update, delete.

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    Json,
};
use serde::Deserialize;

use crate::{
    auth::AuthUser,
    error::ApiError,
    types::{Item, ItemFields, ItemFilter, ItemStatus},
    AppState,
};

// ============ Request Types ============

/// GET /items 쿼리 파라미터 (빈 값은 필터 없음으로 취급)
#[derive(Debug, Default, Deserialize)]
pub struct ItemQuery {
    pub category: Option<String>,
    pub status: Option<String>,
    pub location: Option<String>,
}

impl ItemQuery {
    fn into_filter(self) -> Result<ItemFilter, ApiError> {
        let status = non_empty(self.status)
            .map(|raw| {
                raw.parse::<ItemStatus>().map_err(|_| {
                    ApiError::ValidationError(
                        "Status must be either 'available' or 'borrowed'".to_string(),
                    )
                })
            })
            .transpose()?;

        Ok(ItemFilter {
            category: non_empty(self.category),
            status,
            location: non_empty(self.location),
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

// ============ Handlers ============

/// GET /api/items
pub async fn list_items(
    State(state): State<AppState>,
    query: Result<Query<ItemQuery>, QueryRejection>,
) -> Result<Json<Vec<Item>>, ApiError> {
    let Query(query) = query?;
    let items = state.catalog.list(&query.into_filter()?).await?;
    Ok(Json(items))
}

/// GET /api/items/:id
pub async fn get_item(
    State(state): State<AppState>,
    id: Result<Path<i64>, PathRejection>,
) -> Result<Json<Item>, ApiError> {
    let Path(id) = id?;
    let item = state.catalog.get(id).await?;
    Ok(Json(item))
}

/// POST /api/items
pub async fn create_item(
    State(state): State<AppState>,
    caller: AuthUser,
    payload: Result<Json<ItemFields>, JsonRejection>,
) -> Result<Json<Item>, ApiError> {
    let Json(fields) = payload?;
    let item = state.catalog.create(caller.user_id, fields).await?;
    Ok(Json(item))
}

/// PUT /api/items/:id
pub async fn update_item(
    State(state): State<AppState>,
    caller: AuthUser,
    id: Result<Path<i64>, PathRejection>,
    payload: Result<Json<ItemFields>, JsonRejection>,
) -> Result<Json<Item>, ApiError> {
    let Path(id) = id?;
    let Json(fields) = payload?;
    let item = state.catalog.update(caller.user_id, id, fields).await?;
    Ok(Json(item))
}

/// DELETE /api/items/:id
pub async fn delete_item(
    State(state): State<AppState>,
    caller: AuthUser,
    id: Result<Path<i64>, PathRejection>,
) -> Result<StatusCode, ApiError> {
    let Path(id) = id?;
    state.catalog.delete(caller.user_id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/my-items
pub async fn my_items(
    State(state): State<AppState>,
    caller: AuthUser,
) -> Result<Json<Vec<Item>>, ApiError> {
    let items = state.catalog.list_mine(caller.user_id).await?;
    Ok(Json(items))
}
