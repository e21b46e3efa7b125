use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::{Path, Query, State};
use axum::routing::{get, patch, post};
use serde::Deserialize;
use serde_json::{Value, json};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::delivery::{Delivery, DeliveryStatus};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/deliveries", get(list_driver_deliveries))
        .route("/deliveries/available", get(list_available_deliveries))
        .route("/deliveries/:id", get(get_delivery))
        .route("/deliveries/:id/accept", post(accept_delivery))
        .route("/deliveries/:id/status", patch(update_delivery_status))
}

#[derive(Deserialize)]
pub struct ListDeliveriesQuery {
    pub driver_id: Uuid,
}

async fn list_driver_deliveries(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListDeliveriesQuery>,
) -> Json<Vec<Delivery>> {
    Json(state.backend.select_driver_deliveries(query.driver_id))
}

async fn list_available_deliveries(State(state): State<Arc<AppState>>) -> Json<Vec<Delivery>> {
    Json(state.backend.select_available_deliveries())
}

async fn get_delivery(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Delivery>, AppError> {
    Ok(Json(state.backend.get_delivery(id)?))
}

#[derive(Deserialize)]
pub struct AcceptDeliveryRequest {
    pub driver_id: Uuid,
}

async fn accept_delivery(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<AcceptDeliveryRequest>,
) -> Result<Json<Value>, AppError> {
    if state.gateway.accept_delivery(id, payload.driver_id).await {
        Ok(Json(json!({ "accepted": true })))
    } else {
        Err(AppError::Conflict(format!(
            "delivery {id} could not be accepted"
        )))
    }
}

#[derive(Deserialize)]
pub struct UpdateDeliveryStatusRequest {
    pub status: DeliveryStatus,
}

async fn update_delivery_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateDeliveryStatusRequest>,
) -> Result<Json<Value>, AppError> {
    if state
        .gateway
        .update_delivery_status(id, payload.status)
        .await
    {
        Ok(Json(json!({ "accepted": true })))
    } else {
        Err(AppError::Conflict(format!(
            "status update rejected for delivery {id}"
        )))
    }
}
