use std::sync::Arc;

use axum::{
    body::{Body, to_bytes},
    http::{Method, Request, StatusCode},
};
use serde_json::{Value, json};
use shopping_list::{
    build_router,
    repository::{FailurePoint, InMemoryShoppingListRepository},
    service::ShoppingListService,
    state::AppState,
};
use tower::ServiceExt;

const API_KEY: &str = "test-key";

fn app_with_repo() -> (axum::Router, Arc<InMemoryShoppingListRepository>) {
    let repo = Arc::new(InMemoryShoppingListRepository::new());
    let service = Arc::new(ShoppingListService::new(repo.clone()));
    (build_router(AppState::new(service, API_KEY)), repo)
}

fn app() -> axum::Router {
    app_with_repo().0
}

async fn send(
    app: &axum::Router,
    method: Method,
    uri: &str,
    api_key: Option<&str>,
    payload: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(api_key) = api_key {
        builder = builder.header("x-api-key", api_key);
    }

    let body = match payload {
        Some(payload) => {
            builder = builder.header("content-type", "application/json");
            Body::from(payload.to_string())
        }
        None => Body::empty(),
    };

    let request = builder.body(body).expect("request should build");
    let response = app
        .clone()
        .oneshot(request)
        .await
        .expect("response expected");
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("response body should be readable");

    if body.is_empty() {
        return (status, Value::Null);
    }

    let json = serde_json::from_slice::<Value>(&body)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&body).into_owned()));
    (status, json)
}

async fn authed(
    app: &axum::Router,
    method: Method,
    uri: &str,
    payload: Option<Value>,
) -> (StatusCode, Value) {
    send(app, method, uri, Some(API_KEY), payload).await
}

#[tokio::test]
async fn health_needs_no_key() {
    let (status, body) = send(&app(), Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn missing_or_wrong_key_is_unauthorized() {
    let app = app();

    let (status, body) = send(&app, Method::GET, "/shopping-lists", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body, "UNAUTHORIZED");

    let (status, _) = send(&app, Method::GET, "/shopping-lists", Some("nope"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn list_item_lifecycle_over_http() {
    let app = app();

    let (status, list) = authed(
        &app,
        Method::POST,
        "/shopping-lists",
        Some(json!({ "name": "Groceries" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(list["version"], 1);
    assert_eq!(list["shoppingItems"], json!([]));
    let list_id = list["id"].as_i64().expect("list id");

    let (status, item) = authed(
        &app,
        Method::POST,
        &format!("/shopping-lists/{list_id}/items"),
        Some(json!({ "name": "Milk", "quantity": 2 })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(item["completed"], false);
    assert_eq!(item["listId"], list_id);
    let item_id = item["id"].as_i64().expect("item id");
    let item_uri = format!("/shopping-lists/{list_id}/items/{item_id}");

    let (status, updated) = authed(
        &app,
        Method::PUT,
        &item_uri,
        Some(json!({ "name": "Milk", "quantity": 4, "version": 1 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["quantity"], 4);
    assert_eq!(updated["version"], 2);

    let (status, conflict) = authed(
        &app,
        Method::POST,
        &format!("{item_uri}/toggle"),
        Some(json!({ "version": 1 })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(
        conflict,
        json!({
            "currentVersion": 2,
            "error": "STALE_CLIENT_STATE",
            "message": "Client state is stale"
        })
    );

    let (status, toggled) = authed(
        &app,
        Method::POST,
        &format!("{item_uri}/toggle"),
        Some(json!({ "version": 2 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(toggled["completed"], true);
    assert_eq!(toggled["version"], 3);

    let (status, lists) = authed(&app, Method::GET, "/shopping-lists", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(lists[0]["shoppingItems"][0]["version"], 3);

    let (status, _) = authed(
        &app,
        Method::DELETE,
        &format!("/shopping-lists/{list_id}"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, lists) = authed(&app, Method::GET, "/shopping-lists", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(lists, json!([]));
}

#[tokio::test]
async fn absent_resources_are_not_found() {
    let app = app();

    let (status, body) = authed(&app, Method::DELETE, "/shopping-lists/77", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "shopping list with id 77 not found");

    let (status, _) = authed(
        &app,
        Method::POST,
        "/shopping-lists/77/items",
        Some(json!({ "name": "Milk", "quantity": 1 })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, list) = authed(
        &app,
        Method::POST,
        "/shopping-lists",
        Some(json!({ "name": "Groceries" })),
    )
    .await;
    let list_id = list["id"].as_i64().expect("list id");

    let (status, body) = authed(
        &app,
        Method::POST,
        &format!("/shopping-lists/{list_id}/items/5/toggle"),
        Some(json!({ "version": 1 })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "grocery item with id 5 not found");
}

#[tokio::test]
async fn invalid_payloads_are_rejected() {
    let app = app();

    let (status, _) = authed(
        &app,
        Method::POST,
        "/shopping-lists",
        Some(json!({ "name": "  " })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, list) = authed(
        &app,
        Method::POST,
        "/shopping-lists",
        Some(json!({ "name": "Groceries" })),
    )
    .await;
    let list_id = list["id"].as_i64().expect("list id");

    let (status, body) = authed(
        &app,
        Method::POST,
        &format!("/shopping-lists/{list_id}/items"),
        Some(json!({ "name": "Milk", "quantity": 0 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "quantity must be at least 1");
}

#[tokio::test]
async fn storage_failures_are_opaque() {
    let (app, repo) = app_with_repo();

    let (_, list) = authed(
        &app,
        Method::POST,
        "/shopping-lists",
        Some(json!({ "name": "Groceries" })),
    )
    .await;
    let list_id = list["id"].as_i64().expect("list id");

    repo.fail_next(FailurePoint::BeforeItemInsert).await;
    let (status, body) = authed(
        &app,
        Method::POST,
        &format!("/shopping-lists/{list_id}/items"),
        Some(json!({ "name": "Milk", "quantity": 1 })),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "internal server error");
}
