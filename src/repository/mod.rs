use async_trait::async_trait;

use crate::{
    error::RepoResult,
    models::{GroceryItem, ShoppingList},
};

pub mod aggregate;
pub mod memory;
pub mod postgres;
pub mod protocol;

pub use memory::{FailurePoint, InMemoryShoppingListRepository};
pub use postgres::PgShoppingListRepository;

/// Data access for shopping lists and their grocery items.
///
/// Implementations hold no per-caller state: the version passed to
/// `update_item` / `toggle_item` is the only concurrency token, and every
/// versioned write is a single conditional write followed, on a miss, by one
/// lookup (see [`protocol`]). Conflicts are never retried here.
#[async_trait]
pub trait ShoppingListRepository: Send + Sync {
    /// Prepares the schema.
    async fn init(&self) -> RepoResult<()>;

    async fn create_list(&self, name: &str) -> RepoResult<ShoppingList>;

    /// Every list with its items, lists in creation order and items in
    /// insertion order.
    async fn list_all(&self) -> RepoResult<Vec<ShoppingList>>;

    /// Removes the list and all of its items, or nothing at all.
    async fn delete_list(&self, list_id: i64) -> RepoResult<()>;

    async fn create_item(&self, list_id: i64, name: &str, quantity: i32)
    -> RepoResult<GroceryItem>;

    async fn update_item(
        &self,
        item_id: i64,
        list_id: i64,
        name: &str,
        quantity: i32,
        expected_version: i64,
    ) -> RepoResult<GroceryItem>;

    /// Negates the stored `completed` flag.
    async fn toggle_item(
        &self,
        item_id: i64,
        list_id: i64,
        expected_version: i64,
    ) -> RepoResult<GroceryItem>;
}
