use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Aggregate root. `shopping_items` is only populated by bulk reads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ShoppingList {
    pub id: i64,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub version: i64,
    #[sqlx(skip)]
    pub shopping_items: Vec<GroceryItem>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct GroceryItem {
    pub id: i64,
    pub list_id: i64,
    pub name: String,
    pub quantity: i32,
    pub completed: bool,
    pub created_at: DateTime<Utc>,
    pub version: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateListRequest {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateItemRequest {
    pub name: String,
    pub quantity: i32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateItemRequest {
    pub name: String,
    pub quantity: i32,
    pub version: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ToggleItemRequest {
    pub version: i64,
}

pub const STALE_CLIENT_STATE: &str = "STALE_CLIENT_STATE";
pub const STALE_CLIENT_STATE_MESSAGE: &str = "Client state is stale";

/// Body of a `409 Conflict` answer to a stale version token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConflictBody {
    pub current_version: i64,
    pub error: String,
    pub message: String,
}

impl ConflictBody {
    pub fn stale(current_version: i64) -> Self {
        Self {
            current_version,
            error: STALE_CLIENT_STATE.to_string(),
            message: STALE_CLIENT_STATE_MESSAGE.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}
