use std::collections::HashMap;

use chrono::{DateTime, Utc};
use sqlx::FromRow;

use crate::{
    error::{RepoResult, RepositoryError},
    models::{GroceryItem, ShoppingList},
};

const OPERATION: &str = "list_all";

/// One row of `lists LEFT JOIN items`. Item columns are all null for a list
/// without items.
#[derive(Debug, Clone, FromRow)]
pub struct ListItemRow {
    pub list_id: i64,
    pub list_name: String,
    pub list_created_at: DateTime<Utc>,
    pub list_version: i64,
    pub item_id: Option<i64>,
    pub item_name: Option<String>,
    pub item_quantity: Option<i32>,
    pub item_completed: Option<bool>,
    pub item_created_at: Option<DateTime<Utc>>,
    pub item_version: Option<i64>,
}

impl ListItemRow {
    fn header(&self) -> ShoppingList {
        ShoppingList {
            id: self.list_id,
            name: self.list_name.clone(),
            created_at: self.list_created_at,
            version: self.list_version,
            shopping_items: Vec::new(),
        }
    }

    fn into_item(self) -> RepoResult<Option<GroceryItem>> {
        let Some(id) = self.item_id else {
            return Ok(None);
        };

        Ok(Some(GroceryItem {
            id,
            list_id: self.list_id,
            name: required(self.item_name, id, "name")?,
            quantity: required(self.item_quantity, id, "quantity")?,
            completed: required(self.item_completed, id, "completed")?,
            created_at: required(self.item_created_at, id, "created_at")?,
            version: required(self.item_version, id, "version")?,
        }))
    }
}

fn required<T>(value: Option<T>, item_id: i64, column: &str) -> RepoResult<T> {
    value.ok_or_else(|| {
        RepositoryError::infrastructure(
            OPERATION,
            format!("grocery item {item_id} has a null {column} column"),
        )
    })
}

/// Groups flat join rows into lists, keeping first-seen list order and scan
/// order of items within each list.
#[derive(Debug, Default)]
pub struct ListAssembler {
    lists: HashMap<i64, ShoppingList>,
    order: Vec<i64>,
}

impl ListAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, row: ListItemRow) -> RepoResult<()> {
        if !self.lists.contains_key(&row.list_id) {
            self.lists.insert(row.list_id, row.header());
            self.order.push(row.list_id);
        }

        let list_id = row.list_id;
        if let Some(item) = row.into_item()?
            && let Some(list) = self.lists.get_mut(&list_id)
        {
            list.shopping_items.push(item);
        }

        Ok(())
    }

    pub fn finish(mut self) -> Vec<ShoppingList> {
        self.order
            .iter()
            .filter_map(|id| self.lists.remove(id))
            .collect()
    }
}

pub fn assemble_lists<I>(rows: I) -> RepoResult<Vec<ShoppingList>>
where
    I: IntoIterator<Item = ListItemRow>,
{
    rows.into_iter()
        .try_fold(ListAssembler::new(), |mut assembler, row| {
            assembler.push(row)?;
            Ok(assembler)
        })
        .map(ListAssembler::finish)
}
