use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, patch, post};
use axum::Json;
use axum::Router;
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::models::order::{ListQuery, Order, OrderId, OrderItem, OrderPage, SortField};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/orders", post(create_orders))
        .route("/orders/:id", get(get_order))
        .route("/orders/:id/status", patch(update_order_status))
        .route("/users/:user_id/orders", get(list_orders))
}

#[derive(Deserialize)]
pub struct CreateOrdersRequest {
    pub user_id: i64,
    pub items: Vec<OrderItem>,
}

#[derive(Serialize)]
pub struct CreateOrdersResponse {
    pub order_ids: Vec<OrderId>,
}

#[derive(Deserialize)]
pub struct UpdateStatusRequest {
    pub status: String,
}

#[derive(Deserialize, Default)]
pub struct ListOrdersParams {
    pub sort_field: Option<String>,
    pub sort_order: Option<String>,
    pub page_size: Option<i64>,
    pub offset: Option<i64>,
}

async fn create_orders(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateOrdersRequest>,
) -> Result<(StatusCode, Json<CreateOrdersResponse>), AppError> {
    let order_ids = state
        .planner
        .create_orders(payload.user_id, &payload.items)
        .await?;

    Ok((StatusCode::CREATED, Json(CreateOrdersResponse { order_ids })))
}

async fn get_order(
    State(state): State<Arc<AppState>>,
    Path(id): Path<OrderId>,
) -> Result<Json<Order>, AppError> {
    Ok(Json(state.planner.get_order(id).await?))
}

async fn update_order_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<OrderId>,
    Json(payload): Json<UpdateStatusRequest>,
) -> Result<StatusCode, AppError> {
    state.planner.update_order_status(id, &payload.status).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn list_orders(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<i64>,
    Query(params): Query<ListOrdersParams>,
) -> Result<Json<OrderPage>, AppError> {
    let defaults = ListQuery::new(user_id);
    let query = ListQuery {
        sort_field: params
            .sort_field
            .as_deref()
            .map(SortField::parse)
            .unwrap_or_default(),
        descending: params
            .sort_order
            .is_some_and(|order| order.eq_ignore_ascii_case("desc")),
        page_size: params.page_size.unwrap_or(defaults.page_size),
        offset: params.offset.unwrap_or(defaults.offset),
        ..defaults
    };

    Ok(Json(state.planner.list_orders(query).await?))
}
