use std::sync::Arc;

use thiserror::Error;
use tracing::warn;

use crate::{
    error::RepositoryError,
    models::{
        ConflictBody, CreateItemRequest, CreateListRequest, GroceryItem, ShoppingList,
        ToggleItemRequest, UpdateItemRequest,
    },
    repository::ShoppingListRepository,
};

const MAX_NAME_LEN: usize = 200;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("resource not found: {0}")]
    NotFound(String),
    #[error("stale client state: current version {}", .0.current_version)]
    Conflict(ConflictBody),
    #[error(transparent)]
    Infrastructure(RepositoryError),
}

impl ServiceError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }
}

impl From<RepositoryError> for ServiceError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound { .. } => Self::NotFound(err.to_string()),
            RepositoryError::VersionConflict {
                current_version, ..
            } => {
                warn!(error = %err, "stale client state");
                Self::Conflict(ConflictBody::stale(current_version))
            }
            RepositoryError::Infrastructure { .. } => Self::Infrastructure(err),
        }
    }
}

/// Translates transport requests into repository calls and repository
/// failures into outcomes the transport can render.
#[derive(Clone)]
pub struct ShoppingListService {
    repository: Arc<dyn ShoppingListRepository>,
}

impl ShoppingListService {
    pub fn new(repository: Arc<dyn ShoppingListRepository>) -> Self {
        Self { repository }
    }

    pub async fn get_shopping_lists(&self) -> Result<Vec<ShoppingList>, ServiceError> {
        Ok(self.repository.list_all().await?)
    }

    pub async fn create_shopping_list(
        &self,
        request: CreateListRequest,
    ) -> Result<ShoppingList, ServiceError> {
        let name = normalize_name(&request.name)?;
        Ok(self.repository.create_list(name).await?)
    }

    pub async fn delete_shopping_list(&self, list_id: i64) -> Result<(), ServiceError> {
        Ok(self.repository.delete_list(list_id).await?)
    }

    pub async fn add_grocery_item(
        &self,
        list_id: i64,
        request: CreateItemRequest,
    ) -> Result<GroceryItem, ServiceError> {
        let name = normalize_name(&request.name)?;
        ensure_positive_quantity(request.quantity)?;

        Ok(self
            .repository
            .create_item(list_id, name, request.quantity)
            .await?)
    }

    pub async fn update_grocery_item(
        &self,
        list_id: i64,
        item_id: i64,
        request: UpdateItemRequest,
    ) -> Result<GroceryItem, ServiceError> {
        let name = normalize_name(&request.name)?;
        ensure_positive_quantity(request.quantity)?;
        ensure_valid_version(request.version)?;

        Ok(self
            .repository
            .update_item(item_id, list_id, name, request.quantity, request.version)
            .await?)
    }

    pub async fn toggle_grocery_item(
        &self,
        list_id: i64,
        item_id: i64,
        request: ToggleItemRequest,
    ) -> Result<GroceryItem, ServiceError> {
        ensure_valid_version(request.version)?;

        Ok(self
            .repository
            .toggle_item(item_id, list_id, request.version)
            .await?)
    }
}

fn normalize_name(name: &str) -> Result<&str, ServiceError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(ServiceError::validation("name must not be blank"));
    }
    if trimmed.chars().count() > MAX_NAME_LEN {
        return Err(ServiceError::validation(format!(
            "name must be at most {MAX_NAME_LEN} characters"
        )));
    }
    Ok(trimmed)
}

fn ensure_positive_quantity(quantity: i32) -> Result<(), ServiceError> {
    if quantity < 1 {
        return Err(ServiceError::validation("quantity must be at least 1"));
    }
    Ok(())
}

fn ensure_valid_version(version: i64) -> Result<(), ServiceError> {
    if version < 1 {
        return Err(ServiceError::validation("version must be a positive integer"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        error::ResourceKind,
        models::{STALE_CLIENT_STATE, STALE_CLIENT_STATE_MESSAGE},
        repository::InMemoryShoppingListRepository,
    };

    fn service() -> ShoppingListService {
        ShoppingListService::new(Arc::new(InMemoryShoppingListRepository::new()))
    }

    #[test]
    fn conflict_maps_to_stable_payload() {
        let err = ServiceError::from(RepositoryError::version_conflict(
            ResourceKind::GroceryItem,
            1,
            4,
            3,
        ));

        match err {
            ServiceError::Conflict(body) => {
                assert_eq!(body.current_version, 4);
                assert_eq!(body.error, STALE_CLIENT_STATE);
                assert_eq!(body.message, STALE_CLIENT_STATE_MESSAGE);
            }
            other => panic!("expected conflict, got {other:?}"),
        }
    }

    #[test]
    fn infrastructure_is_passed_through() {
        let err = ServiceError::from(RepositoryError::infrastructure("list_all", "boom"));
        assert!(matches!(err, ServiceError::Infrastructure(_)));
    }

    #[tokio::test]
    async fn names_are_trimmed_before_storage() {
        let service = service();
        let list = service
            .create_shopping_list(CreateListRequest {
                name: "  Groceries ".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(list.name, "Groceries");
    }

    #[tokio::test]
    async fn invalid_input_never_reaches_storage() {
        let service = service();

        let blank = service
            .create_shopping_list(CreateListRequest {
                name: "   ".to_string(),
            })
            .await;
        assert!(matches!(blank, Err(ServiceError::Validation(_))));

        let list = service
            .create_shopping_list(CreateListRequest {
                name: "Groceries".to_string(),
            })
            .await
            .unwrap();

        let zero = service
            .add_grocery_item(
                list.id,
                CreateItemRequest {
                    name: "Milk".to_string(),
                    quantity: 0,
                },
            )
            .await;
        assert!(matches!(zero, Err(ServiceError::Validation(_))));

        let lists = service.get_shopping_lists().await.unwrap();
        assert!(lists[0].shopping_items.is_empty());

        let stale = service
            .toggle_grocery_item(list.id, 1, ToggleItemRequest { version: 0 })
            .await;
        assert!(matches!(stale, Err(ServiceError::Validation(_))));
    }

    #[tokio::test]
    async fn missing_item_maps_to_not_found() {
        let service = service();
        let list = service
            .create_shopping_list(CreateListRequest {
                name: "Groceries".to_string(),
            })
            .await
            .unwrap();

        let err = service
            .toggle_grocery_item(list.id, 42, ToggleItemRequest { version: 1 })
            .await
            .unwrap_err();
        match err {
            ServiceError::NotFound(message) => {
                assert_eq!(message, "grocery item with id 42 not found")
            }
            other => panic!("expected not found, got {other:?}"),
        }
    }
}
