//! Version-stamped conditional mutation.
//!
//! Every versioned write goes through the same three steps:
//!
//! 1. a single conditional write that matches the row by primary key, owning
//!    list and the caller's version, and bumps the version in the same
//!    statement;
//! 2. if exactly one row came back, the write won;
//! 3. if nothing came back, one unconditional lookup of the current version
//!    decides between "the row is gone" and "the row moved on".
//!
//! The storage engines own steps 1 and the lookup; this module owns the
//! classification so both engines agree on every outcome.

use std::future::Future;

use tracing::error;

use crate::{
    error::{RepoResult, RepositoryError, ResourceKind},
    models::GroceryItem,
};

/// Rows that carry an optimistic concurrency token.
pub trait Versioned {
    fn version(&self) -> i64;
}

impl Versioned for GroceryItem {
    fn version(&self) -> i64 {
        self.version
    }
}

/// Identity of the row a conditional write is aimed at, plus the version the
/// caller last observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConditionalTarget {
    pub item_id: i64,
    pub list_id: i64,
    pub expected_version: i64,
}

impl ConditionalTarget {
    pub fn new(item_id: i64, list_id: i64, expected_version: i64) -> Self {
        Self {
            item_id,
            list_id,
            expected_version,
        }
    }
}

/// What the disambiguation lookup found at the target's address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CurrentVersion {
    ListMissing,
    ItemMissing,
    Found(i64),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationOutcome<T> {
    Updated(T),
    NotFound { resource: ResourceKind, id: i64 },
    Conflict { current_version: i64 },
}

impl<T> MutationOutcome<T> {
    pub fn into_result(self, target: &ConditionalTarget) -> RepoResult<T> {
        match self {
            Self::Updated(row) => Ok(row),
            Self::NotFound { resource, id } => Err(RepositoryError::not_found(resource, id)),
            Self::Conflict { current_version } => Err(RepositoryError::version_conflict(
                ResourceKind::GroceryItem,
                target.item_id,
                current_version,
                target.expected_version,
            )),
        }
    }
}

/// Classifies the rows returned by the conditional write.
///
/// `Ok(None)` means nothing matched and the caller has to run the lookup.
pub fn written<T: Versioned>(
    operation: &'static str,
    target: &ConditionalTarget,
    mut rows: Vec<T>,
) -> RepoResult<Option<MutationOutcome<T>>> {
    match rows.len() {
        0 => Ok(None),
        1 => {
            let row = rows.remove(0);
            if row.version() != target.expected_version + 1 {
                error!(
                    operation,
                    item_id = target.item_id,
                    expected_version = target.expected_version,
                    written_version = row.version(),
                    "conditional write produced an unexpected version"
                );
                return Err(RepositoryError::infrastructure(
                    operation,
                    format!(
                        "grocery item {} written at version {} instead of {}",
                        target.item_id,
                        row.version(),
                        target.expected_version + 1
                    ),
                ));
            }
            Ok(Some(MutationOutcome::Updated(row)))
        }
        count => {
            error!(
                operation,
                item_id = target.item_id,
                list_id = target.list_id,
                rows = count,
                "conditional write touched more than one row"
            );
            Err(RepositoryError::infrastructure(
                operation,
                format!(
                    "invariant breach: {count} rows matched grocery item {} in list {}",
                    target.item_id, target.list_id
                ),
            ))
        }
    }
}

/// Explains a conditional write that matched nothing.
pub fn disambiguate<T>(
    operation: &'static str,
    target: &ConditionalTarget,
    current: CurrentVersion,
) -> RepoResult<MutationOutcome<T>> {
    match current {
        CurrentVersion::ListMissing => Ok(MutationOutcome::NotFound {
            resource: ResourceKind::ShoppingList,
            id: target.list_id,
        }),
        CurrentVersion::ItemMissing => Ok(MutationOutcome::NotFound {
            resource: ResourceKind::GroceryItem,
            id: target.item_id,
        }),
        CurrentVersion::Found(version) if version != target.expected_version => {
            Ok(MutationOutcome::Conflict {
                current_version: version,
            })
        }
        CurrentVersion::Found(version) => Err(RepositoryError::infrastructure(
            operation,
            format!(
                "write to grocery item {} matched no row although it is at version {version}",
                target.item_id
            ),
        )),
    }
}

/// Runs the whole protocol for engines whose write and lookup are separate
/// round trips. The lookup only runs when the write matched nothing.
pub async fn conditional_write<T, W, L, LF>(
    operation: &'static str,
    target: &ConditionalTarget,
    write: W,
    lookup: L,
) -> RepoResult<MutationOutcome<T>>
where
    T: Versioned,
    W: Future<Output = RepoResult<Vec<T>>>,
    L: FnOnce() -> LF,
    LF: Future<Output = RepoResult<CurrentVersion>>,
{
    let rows = write.await?;
    match written(operation, target, rows)? {
        Some(outcome) => Ok(outcome),
        None => disambiguate(operation, target, lookup().await?),
    }
}
