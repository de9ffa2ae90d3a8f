use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};

use crate::{
    models::{
        CreateItemRequest, CreateListRequest, GroceryItem, HealthResponse, ShoppingList,
        ToggleItemRequest, UpdateItemRequest,
    },
    problem::ApiResult,
    state::AppState,
};

pub async fn healthcheck() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

pub async fn get_shopping_lists(
    State(state): State<AppState>,
) -> ApiResult<Json<Vec<ShoppingList>>> {
    let lists = state.service.get_shopping_lists().await?;
    Ok(Json(lists))
}

pub async fn create_shopping_list(
    State(state): State<AppState>,
    Json(request): Json<CreateListRequest>,
) -> ApiResult<(StatusCode, Json<ShoppingList>)> {
    let list = state.service.create_shopping_list(request).await?;
    Ok((StatusCode::CREATED, Json(list)))
}

pub async fn delete_shopping_list(
    State(state): State<AppState>,
    Path(list_id): Path<i64>,
) -> ApiResult<StatusCode> {
    state.service.delete_shopping_list(list_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn add_grocery_item(
    State(state): State<AppState>,
    Path(list_id): Path<i64>,
    Json(request): Json<CreateItemRequest>,
) -> ApiResult<(StatusCode, Json<GroceryItem>)> {
    let item = state.service.add_grocery_item(list_id, request).await?;
    Ok((StatusCode::CREATED, Json(item)))
}

pub async fn update_grocery_item(
    State(state): State<AppState>,
    Path((list_id, item_id)): Path<(i64, i64)>,
    Json(request): Json<UpdateItemRequest>,
) -> ApiResult<Json<GroceryItem>> {
    let item = state
        .service
        .update_grocery_item(list_id, item_id, request)
        .await?;
    Ok(Json(item))
}

pub async fn toggle_grocery_item(
    State(state): State<AppState>,
    Path((list_id, item_id)): Path<(i64, i64)>,
    Json(request): Json<ToggleItemRequest>,
) -> ApiResult<Json<GroceryItem>> {
    let item = state
        .service
        .toggle_grocery_item(list_id, item_id, request)
        .await?;
    Ok(Json(item))
}
