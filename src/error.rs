use std::fmt;

use thiserror::Error;

pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

pub type RepoResult<T> = Result<T, RepositoryError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    ShoppingList,
    GroceryItem,
}

impl ResourceKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ShoppingList => "shopping list",
            Self::GroceryItem => "grocery item",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failures surfaced by a [`ShoppingListRepository`](crate::repository::ShoppingListRepository).
///
/// `NotFound` and `VersionConflict` are expected outcomes that callers are
/// meant to branch on. `Infrastructure` covers everything the storage engine
/// could not explain and is always fatal to the current call.
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("{resource} with id {id} not found")]
    NotFound { resource: ResourceKind, id: i64 },

    #[error(
        "optimistic lock failed for {resource} {id}: current version {current_version}, provided version {provided_version}"
    )]
    VersionConflict {
        resource: ResourceKind,
        id: i64,
        current_version: i64,
        provided_version: i64,
    },

    #[error("{operation} failed: {detail}")]
    Infrastructure {
        operation: &'static str,
        detail: String,
        #[source]
        source: Option<BoxError>,
    },
}

impl RepositoryError {
    pub fn not_found(resource: ResourceKind, id: i64) -> Self {
        Self::NotFound { resource, id }
    }

    pub fn version_conflict(
        resource: ResourceKind,
        id: i64,
        current_version: i64,
        provided_version: i64,
    ) -> Self {
        Self::VersionConflict {
            resource,
            id,
            current_version,
            provided_version,
        }
    }

    pub fn infrastructure(operation: &'static str, detail: impl Into<String>) -> Self {
        Self::Infrastructure {
            operation,
            detail: detail.into(),
            source: None,
        }
    }

    pub fn storage(
        operation: &'static str,
        detail: impl Into<String>,
        source: impl Into<BoxError>,
    ) -> Self {
        Self::Infrastructure {
            operation,
            detail: detail.into(),
            source: Some(source.into()),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    pub fn is_version_conflict(&self) -> bool {
        matches!(self, Self::VersionConflict { .. })
    }
}
