use std::collections::HashSet;
use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::{Path, Query, State};
use axum::routing::{get, patch, post};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{Value, json};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::order::{Order, OrderItem, OrderStatus};
use crate::state::AppState;
use crate::sync::scope::OrderScope;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/orders", post(create_order).get(list_orders))
        .route("/orders/:id", get(get_order))
        .route("/orders/:id/status", patch(update_order_status))
}

#[derive(Deserialize)]
pub struct CreateOrderItem {
    pub menu_item_id: Uuid,
    pub quantity: u32,
    pub price: f64,
}

#[derive(Deserialize)]
pub struct CreateOrderRequest {
    pub user_id: Uuid,
    pub restaurant_id: Uuid,
    pub delivery_address: String,
    pub items: Vec<CreateOrderItem>,
}

async fn create_order(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateOrderRequest>,
) -> Result<Json<Order>, AppError> {
    if payload.delivery_address.trim().is_empty() {
        return Err(AppError::BadRequest(
            "delivery_address cannot be empty".to_string(),
        ));
    }

    if payload.items.is_empty() {
        return Err(AppError::BadRequest(
            "order must contain at least one item".to_string(),
        ));
    }

    if payload.items.iter().any(|item| item.quantity == 0) {
        return Err(AppError::BadRequest(
            "item quantity must be > 0".to_string(),
        ));
    }

    if state.backend.get_restaurant(payload.restaurant_id).is_none() {
        return Err(AppError::BadRequest(format!(
            "unknown restaurant {}",
            payload.restaurant_id
        )));
    }

    let items: Vec<OrderItem> = payload
        .items
        .into_iter()
        .map(|item| OrderItem {
            id: Uuid::new_v4(),
            menu_item_id: item.menu_item_id,
            quantity: item.quantity,
            price: item.price,
        })
        .collect();

    let total = items
        .iter()
        .map(|item| item.price * item.quantity as f64)
        .sum();

    let now = Utc::now();
    let order = Order {
        id: Uuid::new_v4(),
        user_id: payload.user_id,
        restaurant_id: payload.restaurant_id,
        total,
        status: OrderStatus::Pending,
        delivery_address: payload.delivery_address,
        items,
        restaurant: None,
        delivery: None,
        created_at: now,
        updated_at: now,
    };

    Ok(Json(state.backend.insert_order(order)))
}

#[derive(Deserialize)]
pub struct ListOrdersQuery {
    pub user_id: Option<Uuid>,
    pub restaurant_id: Option<Uuid>,
    pub ids: Option<String>,
}

async fn list_orders(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListOrdersQuery>,
) -> Result<Json<Vec<Order>>, AppError> {
    let scope = match (query.user_id, query.restaurant_id, query.ids) {
        (Some(user_id), None, None) => OrderScope::Customer(user_id),
        (None, Some(restaurant_id), None) => OrderScope::Restaurant(restaurant_id),
        (None, None, Some(raw)) => {
            let ids = raw
                .split(',')
                .map(|id| Uuid::parse_str(id.trim()))
                .collect::<Result<HashSet<Uuid>, _>>()
                .map_err(|err| AppError::BadRequest(format!("invalid order id: {err}")))?;
            OrderScope::Orders(ids)
        }
        _ => {
            return Err(AppError::BadRequest(
                "provide exactly one of user_id, restaurant_id or ids".to_string(),
            ));
        }
    };

    Ok(Json(state.backend.select_orders(&scope)))
}

async fn get_order(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Order>, AppError> {
    Ok(Json(state.backend.get_order(id)?))
}

#[derive(Deserialize)]
pub struct UpdateOrderStatusRequest {
    pub status: OrderStatus,
}

async fn update_order_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateOrderStatusRequest>,
) -> Result<Json<Value>, AppError> {
    if state.gateway.update_order_status(id, payload.status).await {
        Ok(Json(json!({ "accepted": true })))
    } else {
        Err(AppError::Conflict(format!(
            "status update rejected for order {id}"
        )))
    }
}
