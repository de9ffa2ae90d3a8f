use std::sync::Arc;

use crate::service::ShoppingListService;

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<ShoppingListService>,
    pub api_key: Arc<str>,
}

impl AppState {
    pub fn new(service: Arc<ShoppingListService>, api_key: impl Into<Arc<str>>) -> Self {
        Self {
            service,
            api_key: api_key.into(),
        }
    }
}
