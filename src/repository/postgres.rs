use async_trait::async_trait;
use sqlx::PgPool;
use tracing::{debug, instrument};

use crate::{
    error::{RepoResult, RepositoryError, ResourceKind},
    models::{GroceryItem, ShoppingList},
    repository::{
        ShoppingListRepository,
        aggregate::{ListItemRow, assemble_lists},
        protocol::{self, ConditionalTarget, CurrentVersion},
    },
};

const FOREIGN_KEY_VIOLATION: &str = "23503";

const CREATE_LIST_SQL: &str = r#"
    INSERT INTO shopping_lists (name, created_at, version)
    VALUES ($1, NOW(), 1)
    RETURNING id, name, created_at, version
"#;

const LIST_ALL_SQL: &str = r#"
    SELECT
        sl.id AS list_id,
        sl.name AS list_name,
        sl.created_at AS list_created_at,
        sl.version AS list_version,
        gi.id AS item_id,
        gi.name AS item_name,
        gi.quantity AS item_quantity,
        gi.completed AS item_completed,
        gi.created_at AS item_created_at,
        gi.version AS item_version
    FROM shopping_lists sl
    LEFT JOIN grocery_items gi ON gi.list_id = sl.id
    ORDER BY sl.id, gi.id
"#;

const LOCK_LIST_SQL: &str = "SELECT id FROM shopping_lists WHERE id = $1 FOR UPDATE";
const DELETE_LIST_ITEMS_SQL: &str = "DELETE FROM grocery_items WHERE list_id = $1";
const DELETE_LIST_SQL: &str = "DELETE FROM shopping_lists WHERE id = $1";

const LIST_EXISTS_SQL: &str = "SELECT EXISTS (SELECT 1 FROM shopping_lists WHERE id = $1)";

const CREATE_ITEM_SQL: &str = r#"
    INSERT INTO grocery_items (list_id, name, quantity, completed, created_at, version)
    VALUES ($1, $2, $3, FALSE, NOW(), 1)
    RETURNING id, list_id, name, quantity, completed, created_at, version
"#;

const UPDATE_ITEM_SQL: &str = r#"
    UPDATE grocery_items
    SET name = $1, quantity = $2, version = version + 1
    WHERE id = $3 AND list_id = $4 AND version = $5
      AND EXISTS (SELECT 1 FROM shopping_lists WHERE id = $4)
    RETURNING id, list_id, name, quantity, completed, created_at, version
"#;

const TOGGLE_ITEM_SQL: &str = r#"
    UPDATE grocery_items
    SET completed = NOT completed, version = version + 1
    WHERE id = $1 AND list_id = $2 AND version = $3
      AND EXISTS (SELECT 1 FROM shopping_lists WHERE id = $2)
    RETURNING id, list_id, name, quantity, completed, created_at, version
"#;

/// Anchored on the list so a missing list and a missing item read differently.
const CURRENT_ITEM_VERSION_SQL: &str = r#"
    SELECT gi.version
    FROM shopping_lists sl
    LEFT JOIN grocery_items gi ON gi.list_id = sl.id AND gi.id = $1
    WHERE sl.id = $2
"#;

#[derive(Clone)]
pub struct PgShoppingListRepository {
    pool: PgPool,
}

impl PgShoppingListRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn current_item_version(
        &self,
        operation: &'static str,
        target: &ConditionalTarget,
    ) -> RepoResult<CurrentVersion> {
        let row = sqlx::query_as::<_, (Option<i64>,)>(CURRENT_ITEM_VERSION_SQL)
            .bind(target.item_id)
            .bind(target.list_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|err| {
                RepositoryError::storage(
                    operation,
                    format!("failed to check version of grocery item {}", target.item_id),
                    err,
                )
            })?;

        Ok(match row {
            None => CurrentVersion::ListMissing,
            Some((None,)) => CurrentVersion::ItemMissing,
            Some((Some(version),)) => CurrentVersion::Found(version),
        })
    }
}

fn is_foreign_key_violation(err: &sqlx::Error) -> bool {
    matches!(
        err,
        sqlx::Error::Database(db_err) if db_err.code().as_deref() == Some(FOREIGN_KEY_VIOLATION)
    )
}

#[async_trait]
impl ShoppingListRepository for PgShoppingListRepository {
    async fn init(&self) -> RepoResult<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|err| RepositoryError::storage("init", "failed to run migrations", err))
    }

    #[instrument(skip(self))]
    async fn create_list(&self, name: &str) -> RepoResult<ShoppingList> {
        let list = sqlx::query_as::<_, ShoppingList>(CREATE_LIST_SQL)
            .bind(name)
            .fetch_one(&self.pool)
            .await
            .map_err(|err| {
                RepositoryError::storage("create_list", "failed to create shopping list", err)
            })?;

        debug!(list_id = list.id, "shopping list created");
        Ok(list)
    }

    #[instrument(skip(self))]
    async fn list_all(&self) -> RepoResult<Vec<ShoppingList>> {
        let rows = sqlx::query_as::<_, ListItemRow>(LIST_ALL_SQL)
            .fetch_all(&self.pool)
            .await
            .map_err(|err| {
                RepositoryError::storage("list_all", "failed to get shopping lists", err)
            })?;

        assemble_lists(rows)
    }

    #[instrument(skip(self))]
    async fn delete_list(&self, list_id: i64) -> RepoResult<()> {
        let storage = |detail: &str| {
            let detail = format!("{detail} (shopping list {list_id})");
            move |err: sqlx::Error| RepositoryError::storage("delete_list", detail, err)
        };

        // Dropping `tx` on any early return rolls the whole unit back.
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(storage("failed to begin transaction"))?;

        let locked = sqlx::query_scalar::<_, i64>(LOCK_LIST_SQL)
            .bind(list_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(storage("failed to lock shopping list"))?;
        if locked.is_none() {
            return Err(RepositoryError::not_found(ResourceKind::ShoppingList, list_id));
        }

        let items = sqlx::query(DELETE_LIST_ITEMS_SQL)
            .bind(list_id)
            .execute(&mut *tx)
            .await
            .map_err(storage("failed to delete grocery items"))?;

        let deleted = sqlx::query(DELETE_LIST_SQL)
            .bind(list_id)
            .execute(&mut *tx)
            .await
            .map_err(storage("failed to delete shopping list"))?;
        if deleted.rows_affected() == 0 {
            return Err(RepositoryError::not_found(ResourceKind::ShoppingList, list_id));
        }

        tx.commit()
            .await
            .map_err(storage("failed to commit transaction"))?;

        debug!(items = items.rows_affected(), "shopping list deleted");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn create_item(
        &self,
        list_id: i64,
        name: &str,
        quantity: i32,
    ) -> RepoResult<GroceryItem> {
        let exists = sqlx::query_scalar::<_, bool>(LIST_EXISTS_SQL)
            .bind(list_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|err| {
                RepositoryError::storage(
                    "create_item",
                    format!("failed to get shopping list {list_id}"),
                    err,
                )
            })?;
        if !exists {
            return Err(RepositoryError::not_found(ResourceKind::ShoppingList, list_id));
        }

        // The foreign key still rejects the insert if the list went away
        // after the check above.
        let item = sqlx::query_as::<_, GroceryItem>(CREATE_ITEM_SQL)
            .bind(list_id)
            .bind(name)
            .bind(quantity)
            .fetch_one(&self.pool)
            .await
            .map_err(|err| {
                if is_foreign_key_violation(&err) {
                    RepositoryError::not_found(ResourceKind::ShoppingList, list_id)
                } else {
                    RepositoryError::storage("create_item", "failed to create grocery item", err)
                }
            })?;

        debug!(item_id = item.id, "grocery item created");
        Ok(item)
    }

    #[instrument(skip(self))]
    async fn update_item(
        &self,
        item_id: i64,
        list_id: i64,
        name: &str,
        quantity: i32,
        expected_version: i64,
    ) -> RepoResult<GroceryItem> {
        const OPERATION: &str = "update_item";
        let target = ConditionalTarget::new(item_id, list_id, expected_version);

        let write = async {
            sqlx::query_as::<_, GroceryItem>(UPDATE_ITEM_SQL)
                .bind(name)
                .bind(quantity)
                .bind(item_id)
                .bind(list_id)
                .bind(expected_version)
                .fetch_all(&self.pool)
                .await
                .map_err(|err| {
                    RepositoryError::storage(
                        OPERATION,
                        format!("failed to update grocery item {item_id}"),
                        err,
                    )
                })
        };

        let item = protocol::conditional_write(OPERATION, &target, write, || {
            self.current_item_version(OPERATION, &target)
        })
        .await?
        .into_result(&target)?;

        debug!(version = item.version, "grocery item updated");
        Ok(item)
    }

    #[instrument(skip(self))]
    async fn toggle_item(
        &self,
        item_id: i64,
        list_id: i64,
        expected_version: i64,
    ) -> RepoResult<GroceryItem> {
        const OPERATION: &str = "toggle_item";
        let target = ConditionalTarget::new(item_id, list_id, expected_version);

        let write = async {
            sqlx::query_as::<_, GroceryItem>(TOGGLE_ITEM_SQL)
                .bind(item_id)
                .bind(list_id)
                .bind(expected_version)
                .fetch_all(&self.pool)
                .await
                .map_err(|err| {
                    RepositoryError::storage(
                        OPERATION,
                        format!("failed to toggle grocery item {item_id}"),
                        err,
                    )
                })
        };

        let item = protocol::conditional_write(OPERATION, &target, write, || {
            self.current_item_version(OPERATION, &target)
        })
        .await?
        .into_result(&target)?;

        debug!(
            version = item.version,
            completed = item.completed,
            "grocery item toggled"
        );
        Ok(item)
    }
}
