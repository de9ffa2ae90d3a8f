use axum::{
    Router,
    http::Method,
    middleware,
    routing::{delete, get, post, put},
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::{
    auth::require_api_key,
    handlers::{
        add_grocery_item, create_shopping_list, delete_shopping_list, get_shopping_lists,
        healthcheck, toggle_grocery_item, update_grocery_item,
    },
    state::AppState,
};

pub fn build_router(state: AppState) -> Router {
    let api = Router::new()
        .route(
            "/shopping-lists",
            get(get_shopping_lists).post(create_shopping_list),
        )
        .route("/shopping-lists/{list_id}", delete(delete_shopping_list))
        .route("/shopping-lists/{list_id}/items", post(add_grocery_item))
        .route(
            "/shopping-lists/{list_id}/items/{item_id}",
            put(update_grocery_item),
        )
        .route(
            "/shopping-lists/{list_id}/items/{item_id}/toggle",
            post(toggle_grocery_item),
        )
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_api_key,
        ));

    Router::new()
        .route("/health", get(healthcheck))
        .merge(api)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_headers(Any)
                .allow_methods([
                    Method::GET,
                    Method::POST,
                    Method::PUT,
                    Method::DELETE,
                    Method::OPTIONS,
                ]),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
