use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::post;
use axum::Json;
use axum::Router;
use serde::Deserialize;

use crate::error::AppError;
use crate::models::plan::DeliveryPlan;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/robots/:robot_id/plan", post(generate_plan))
}

#[derive(Deserialize)]
pub struct GeneratePlanRequest {
    pub capacity: i64,
}

async fn generate_plan(
    State(state): State<Arc<AppState>>,
    Path(robot_id): Path<String>,
    Json(payload): Json<GeneratePlanRequest>,
) -> Result<Json<DeliveryPlan>, AppError> {
    let plan = state
        .planner
        .generate_plan(&robot_id, payload.capacity)
        .await?;
    Ok(Json(plan))
}
