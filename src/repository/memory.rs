use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
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

/// Places where the in-memory engine can be told to fail once, to exercise
/// rollback paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePoint {
    /// After the list's items are staged for removal, before the list row is.
    BeforeListDelete,
    BeforeItemInsert,
}

#[derive(Debug, Clone)]
struct ListRecord {
    id: i64,
    name: String,
    created_at: DateTime<Utc>,
    version: i64,
}

#[derive(Debug, Default)]
struct Tables {
    lists: BTreeMap<i64, ListRecord>,
    items: BTreeMap<i64, GroceryItem>,
    last_list_id: i64,
    last_item_id: i64,
}

impl Tables {
    /// `lists LEFT JOIN items`, ordered by list id then item id.
    fn joined_rows(&self) -> Vec<ListItemRow> {
        let mut items_by_list: HashMap<i64, Vec<&GroceryItem>> = HashMap::new();
        for item in self.items.values() {
            items_by_list.entry(item.list_id).or_default().push(item);
        }

        let mut rows = Vec::with_capacity(self.lists.len() + self.items.len());
        for list in self.lists.values() {
            match items_by_list.remove(&list.id) {
                Some(items) => {
                    rows.extend(items.into_iter().map(|item| list_row(list, Some(item))));
                }
                None => rows.push(list_row(list, None)),
            }
        }

        rows
    }

    fn current_item_version(&self, target: &ConditionalTarget) -> CurrentVersion {
        if !self.lists.contains_key(&target.list_id) {
            return CurrentVersion::ListMissing;
        }

        match self.items.get(&target.item_id) {
            Some(item) if item.list_id == target.list_id => CurrentVersion::Found(item.version),
            _ => CurrentVersion::ItemMissing,
        }
    }

    /// Applies `change` to every item matching the target at the expected
    /// version and bumps its version, as a conditional `UPDATE` would.
    fn write_item_if_current(
        &mut self,
        target: &ConditionalTarget,
        change: impl Fn(&mut GroceryItem),
    ) -> Vec<GroceryItem> {
        if !self.lists.contains_key(&target.list_id) {
            return Vec::new();
        }

        self.items
            .values_mut()
            .filter(|item| {
                item.id == target.item_id
                    && item.list_id == target.list_id
                    && item.version == target.expected_version
            })
            .map(|item| {
                change(item);
                item.version += 1;
                item.clone()
            })
            .collect()
    }
}

fn list_row(list: &ListRecord, item: Option<&GroceryItem>) -> ListItemRow {
    ListItemRow {
        list_id: list.id,
        list_name: list.name.clone(),
        list_created_at: list.created_at,
        list_version: list.version,
        item_id: item.map(|item| item.id),
        item_name: item.map(|item| item.name.clone()),
        item_quantity: item.map(|item| item.quantity),
        item_completed: item.map(|item| item.completed),
        item_created_at: item.map(|item| item.created_at),
        item_version: item.map(|item| item.version),
    }
}

/// Rows a cascading delete will remove. The tables are untouched until
/// [`StagedDelete::commit`], so dropping it discards the delete.
#[derive(Debug)]
struct StagedDelete {
    list_id: i64,
    item_ids: Vec<i64>,
}

impl StagedDelete {
    fn begin(tables: &Tables, list_id: i64) -> Self {
        let item_ids = tables
            .items
            .values()
            .filter(|item| item.list_id == list_id)
            .map(|item| item.id)
            .collect();
        Self { list_id, item_ids }
    }

    /// Returns how many items went with the list.
    fn commit(self, tables: &mut Tables) -> usize {
        for item_id in &self.item_ids {
            tables.items.remove(item_id);
        }
        tables.lists.remove(&self.list_id);
        self.item_ids.len()
    }
}

#[derive(Debug, Default)]
struct EngineState {
    tables: Tables,
    armed_failure: Option<FailurePoint>,
}

impl EngineState {
    fn trip(
        armed_failure: &mut Option<FailurePoint>,
        point: FailurePoint,
        operation: &'static str,
    ) -> RepoResult<()> {
        if *armed_failure == Some(point) {
            *armed_failure = None;
            return Err(RepositoryError::infrastructure(
                operation,
                format!("injected storage failure at {point:?}"),
            ));
        }
        Ok(())
    }
}

/// Storage engine kept in process memory.
///
/// A single write guard covers each conditional write and each cascading
/// delete, which gives the same atomicity the relational engine gets from
/// `UPDATE ... WHERE version = $n` and transactions.
#[derive(Debug, Default)]
pub struct InMemoryShoppingListRepository {
    state: RwLock<EngineState>,
}

impl InMemoryShoppingListRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next operation that reaches `point` fail with an
    /// infrastructure error.
    pub async fn fail_next(&self, point: FailurePoint) {
        self.state.write().await.armed_failure = Some(point);
    }

    async fn conditional_item_write(
        &self,
        operation: &'static str,
        target: ConditionalTarget,
        change: impl Fn(&mut GroceryItem),
    ) -> RepoResult<GroceryItem> {
        let mut state = self.state.write().await;

        let rows = state.tables.write_item_if_current(&target, change);
        let outcome = match protocol::written(operation, &target, rows)? {
            Some(outcome) => outcome,
            None => protocol::disambiguate(
                operation,
                &target,
                state.tables.current_item_version(&target),
            )?,
        };

        outcome.into_result(&target)
    }
}

#[async_trait]
impl ShoppingListRepository for InMemoryShoppingListRepository {
    async fn init(&self) -> RepoResult<()> {
        Ok(())
    }

    #[instrument(skip(self))]
    async fn create_list(&self, name: &str) -> RepoResult<ShoppingList> {
        let mut state = self.state.write().await;
        let tables = &mut state.tables;

        tables.last_list_id += 1;
        let record = ListRecord {
            id: tables.last_list_id,
            name: name.to_string(),
            created_at: Utc::now(),
            version: 1,
        };
        tables.lists.insert(record.id, record.clone());

        debug!(list_id = record.id, "shopping list created");
        Ok(ShoppingList {
            id: record.id,
            name: record.name,
            created_at: record.created_at,
            version: record.version,
            shopping_items: Vec::new(),
        })
    }

    #[instrument(skip(self))]
    async fn list_all(&self) -> RepoResult<Vec<ShoppingList>> {
        let rows = self.state.read().await.tables.joined_rows();
        assemble_lists(rows)
    }

    #[instrument(skip(self))]
    async fn delete_list(&self, list_id: i64) -> RepoResult<()> {
        let mut state = self.state.write().await;
        let EngineState {
            tables,
            armed_failure,
        } = &mut *state;

        if !tables.lists.contains_key(&list_id) {
            return Err(RepositoryError::not_found(ResourceKind::ShoppingList, list_id));
        }

        let staged = StagedDelete::begin(tables, list_id);

        if let Err(err) =
            EngineState::trip(armed_failure, FailurePoint::BeforeListDelete, "delete_list")
        {
            debug!("rolling back cascading delete");
            return Err(err);
        }

        let removed_items = staged.commit(tables);
        debug!(items = removed_items, "shopping list deleted");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn create_item(
        &self,
        list_id: i64,
        name: &str,
        quantity: i32,
    ) -> RepoResult<GroceryItem> {
        let mut state = self.state.write().await;
        let EngineState {
            tables,
            armed_failure,
        } = &mut *state;

        if !tables.lists.contains_key(&list_id) {
            return Err(RepositoryError::not_found(ResourceKind::ShoppingList, list_id));
        }

        EngineState::trip(armed_failure, FailurePoint::BeforeItemInsert, "create_item")?;

        tables.last_item_id += 1;
        let item = GroceryItem {
            id: tables.last_item_id,
            list_id,
            name: name.to_string(),
            quantity,
            completed: false,
            created_at: Utc::now(),
            version: 1,
        };
        tables.items.insert(item.id, item.clone());

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
        let target = ConditionalTarget::new(item_id, list_id, expected_version);
        let item = self
            .conditional_item_write("update_item", target, |item| {
                item.name = name.to_string();
                item.quantity = quantity;
            })
            .await?;

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
        let target = ConditionalTarget::new(item_id, list_id, expected_version);
        let item = self
            .conditional_item_write("toggle_item", target, |item| {
                item.completed = !item.completed;
            })
            .await?;

        debug!(
            version = item.version,
            completed = item.completed,
            "grocery item toggled"
        );
        Ok(item)
    }
}
