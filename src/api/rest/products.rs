use std::sync::Arc;

use axum::extract::State;
use axum::routing::post;
use axum::Json;
use axum::Router;

use crate::error::AppError;
use crate::models::product::Product;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/products", post(upsert_product))
}

async fn upsert_product(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<Product>,
) -> Result<Json<Product>, AppError> {
    Ok(Json(state.catalog.upsert(payload).await?))
}
