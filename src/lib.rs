pub mod app;
pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod models;
pub mod problem;
pub mod repository;
pub mod service;
pub mod state;

pub use app::build_router;
pub use error::{RepoResult, RepositoryError, ResourceKind};
pub use repository::{
    InMemoryShoppingListRepository, PgShoppingListRepository, ShoppingListRepository,
};
pub use service::{ServiceError, ShoppingListService};
