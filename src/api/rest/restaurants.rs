use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::{Path, State};
use axum::routing::{get, post};
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::restaurant::Restaurant;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/restaurants", post(create_restaurant))
        .route("/restaurants/:id", get(get_restaurant))
}

#[derive(Deserialize)]
pub struct CreateRestaurantRequest {
    pub name: String,
    pub address: String,
}

async fn create_restaurant(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateRestaurantRequest>,
) -> Result<Json<Restaurant>, AppError> {
    if payload.name.trim().is_empty() {
        return Err(AppError::BadRequest("name cannot be empty".to_string()));
    }

    if payload.address.trim().is_empty() {
        return Err(AppError::BadRequest("address cannot be empty".to_string()));
    }

    let restaurant = Restaurant {
        id: Uuid::new_v4(),
        name: payload.name,
        address: payload.address,
        created_at: Utc::now(),
    };

    Ok(Json(state.backend.insert_restaurant(restaurant)))
}

async fn get_restaurant(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Restaurant>, AppError> {
    state
        .backend
        .get_restaurant(id)
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("restaurant {} not found", id)))
}
