//! Item Catalog Service
//!
//! Listing, lookup and owner-restricted CRUD for items. Reads embed the
//! item's seller; writes check the caller's role or ownership first.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use super::access;
use crate::db::Repository;
use crate::error::ApiError;
use crate::types::{Item, ItemFields, ItemFilter, Role, User};

pub struct ItemCatalog {
    repo: Arc<dyn Repository>,
}

impl ItemCatalog {
    pub fn new(repo: Arc<dyn Repository>) -> Self {
        Self { repo }
    }

    /// GET /items (필터는 모두 선택, AND 조건)
    pub async fn list(&self, filter: &ItemFilter) -> Result<Vec<Item>, ApiError> {
        let items = self.repo.list_items(filter).await?;
        tracing::debug!(count = items.len(), "Items listed");
        self.with_sellers(items).await
    }

    /// GET /items/:id
    pub async fn get(&self, id: i64) -> Result<Item, ApiError> {
        let item = self.find(id).await?;
        let mut items = self.with_sellers(vec![item]).await?;
        items.pop().ok_or(ApiError::InternalError)
    }

    /// POST /items (판매자 전용)
    pub async fn create(&self, caller_id: i64, fields: ItemFields) -> Result<Item, ApiError> {
        let seller = access::require_role(
            self.repo.as_ref(),
            caller_id,
            Role::Seller,
            "create items",
        )
        .await?;
        let fields = validate_fields(fields)?;

        let mut item = self.repo.create_item(seller.id, &fields).await?;
        tracing::info!(item_id = item.id, seller_id = seller.id, "Item created");

        item.seller = Some(seller);
        Ok(item)
    }

    /// PUT /items/:id (소유자 전용)
    pub async fn update(
        &self,
        caller_id: i64,
        id: i64,
        fields: ItemFields,
    ) -> Result<Item, ApiError> {
        let item = self.find(id).await?;
        access::require_owner(item.seller_id, caller_id, "You can only update your own items")?;
        let fields = validate_fields(fields)?;

        let updated = self
            .repo
            .update_item(id, &fields)
            .await?
            .ok_or_else(|| ApiError::NotFound("Item".to_string()))?;
        tracing::info!(item_id = id, "Item updated");

        let mut items = self.with_sellers(vec![updated]).await?;
        items.pop().ok_or(ApiError::InternalError)
    }

    /// DELETE /items/:id (소유자 전용)
    pub async fn delete(&self, caller_id: i64, id: i64) -> Result<(), ApiError> {
        let item = self.find(id).await?;
        access::require_owner(item.seller_id, caller_id, "You can only delete your own items")?;

        if !self.repo.delete_item(id).await? {
            return Err(ApiError::NotFound("Item".to_string()));
        }
        tracing::info!(item_id = id, "Item deleted");
        Ok(())
    }

    /// GET /my-items (판매자 전용)
    pub async fn list_mine(&self, caller_id: i64) -> Result<Vec<Item>, ApiError> {
        let seller = access::require_role(
            self.repo.as_ref(),
            caller_id,
            Role::Seller,
            "view their items",
        )
        .await?;

        let items = self.repo.list_items_by_seller(seller.id).await?;
        tracing::debug!(seller_id = seller.id, count = items.len(), "Seller items listed");

        Ok(items
            .into_iter()
            .map(|mut item| {
                item.seller = Some(seller.clone());
                item
            })
            .collect())
    }

    async fn find(&self, id: i64) -> Result<Item, ApiError> {
        self.repo
            .find_item(id)
            .await?
            .ok_or_else(|| ApiError::NotFound("Item".to_string()))
    }

    async fn with_sellers(&self, items: Vec<Item>) -> Result<Vec<Item>, ApiError> {
        with_sellers(self.repo.as_ref(), items).await
    }
}

/// 각 아이템에 판매자 정보 채우기
pub(crate) async fn with_sellers(
    repo: &dyn Repository,
    items: Vec<Item>,
) -> Result<Vec<Item>, ApiError> {
    let sellers = load_users(repo, items.iter().map(|i| i.seller_id)).await?;
    Ok(items
        .into_iter()
        .map(|mut item| {
            item.seller = sellers.get(&item.seller_id).cloned();
            item
        })
        .collect())
}

/// 사용자 일괄 조회 (중복 id 제거)
pub(crate) async fn load_users(
    repo: &dyn Repository,
    ids: impl Iterator<Item = i64>,
) -> Result<HashMap<i64, User>, ApiError> {
    let ids: Vec<i64> = ids.collect::<BTreeSet<_>>().into_iter().collect();
    if ids.is_empty() {
        return Ok(HashMap::new());
    }
    let users = repo.find_users(&ids).await?;
    Ok(users.into_iter().map(|u| (u.id, u)).collect())
}

/// 생성/수정 공통 검증
fn validate_fields(mut fields: ItemFields) -> Result<ItemFields, ApiError> {
    fields.title = fields.title.trim().to_string();
    fields.category = fields.category.trim().to_string();

    if fields.title.is_empty() || fields.category.is_empty() || fields.duration <= 0 {
        return Err(ApiError::ValidationError(
            "Title, category, and duration are required".to_string(),
        ));
    }
    Ok(fields)
}
