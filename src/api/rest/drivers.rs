use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::{Path, State};
use axum::routing::{patch, post};
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::driver::Driver;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/drivers", post(create_driver).get(list_drivers))
        .route("/drivers/:id/status", patch(update_driver_status))
        .route("/drivers/:id/location", patch(update_driver_location))
}

#[derive(Deserialize)]
pub struct CreateDriverRequest {
    pub user_id: Uuid,
    pub rating: f64,
}

#[derive(Deserialize)]
pub struct UpdateDriverStatusRequest {
    pub is_online: bool,
}

#[derive(Deserialize)]
pub struct UpdateDriverLocationRequest {
    pub lat: f64,
    pub lng: f64,
}

async fn create_driver(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateDriverRequest>,
) -> Json<Driver> {
    let driver = Driver {
        id: Uuid::new_v4(),
        user_id: payload.user_id,
        is_online: false,
        current_latitude: None,
        current_longitude: None,
        rating: payload.rating.clamp(0.0, 5.0),
        total_deliveries: 0,
        total_earnings: 0.0,
        updated_at: Utc::now(),
    };

    Json(state.backend.insert_driver(driver))
}

async fn list_drivers(State(state): State<Arc<AppState>>) -> Json<Vec<Driver>> {
    Json(state.backend.list_drivers())
}

async fn update_driver_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateDriverStatusRequest>,
) -> Result<Json<Driver>, AppError> {
    Ok(Json(
        state.backend.set_driver_online(id, payload.is_online)?,
    ))
}

async fn update_driver_location(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateDriverLocationRequest>,
) -> Result<Json<Driver>, AppError> {
    if !(-90.0..=90.0).contains(&payload.lat) {
        return Err(AppError::BadRequest(
            "lat must be within [-90, 90]".to_string(),
        ));
    }

    if !(-180.0..=180.0).contains(&payload.lng) {
        return Err(AppError::BadRequest(
            "lng must be within [-180, 180]".to_string(),
        ));
    }

    Ok(Json(
        state
            .backend
            .set_driver_location(id, payload.lat, payload.lng)?,
    ))
}
