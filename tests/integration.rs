use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use delivery_sync::api::rest::router;
use delivery_sync::state::AppState;
use serde_json::{Value, json};
use tower::ServiceExt;

fn setup() -> (axum::Router, Arc<AppState>) {
    let state = Arc::new(AppState::new(1024));
    (router(state.clone()), state)
}

fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_string(&body).unwrap()))
        .unwrap()
}

fn get_request(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

fn patch_request(uri: &str, body: Value) -> Request<Body> {
    json_request("PATCH", uri, body)
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn body_string(response: axum::response::Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

async fn create_restaurant(app: &axum::Router) -> Value {
    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/restaurants",
            json!({ "name": "Pasta Place", "address": "1 Noodle St" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    body_json(response).await
}

async fn create_driver(app: &axum::Router) -> Value {
    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/drivers",
            json!({ "user_id": uuid::Uuid::new_v4(), "rating": 4.5 }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    body_json(response).await
}

async fn create_order(app: &axum::Router, restaurant_id: &str) -> Value {
    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/orders",
            json!({
                "user_id": uuid::Uuid::new_v4(),
                "restaurant_id": restaurant_id,
                "delivery_address": "2 Hungry Ave",
                "items": [
                    { "menu_item_id": uuid::Uuid::new_v4(), "quantity": 2, "price": 9.5 },
                    { "menu_item_id": uuid::Uuid::new_v4(), "quantity": 1, "price": 4.0 }
                ]
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    body_json(response).await
}

#[tokio::test]
async fn health_returns_ok() {
    let (app, _state) = setup();
    let response = app.oneshot(get_request("/health")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["orders"], 0);
    assert_eq!(body["deliveries"], 0);
    assert_eq!(body["drivers"], 0);
}

#[tokio::test]
async fn metrics_returns_prometheus_format() {
    let (app, _state) = setup();
    let response = app.oneshot(get_request("/metrics")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let content_type = response
        .headers()
        .get("content-type")
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(content_type.contains("text/plain"));

    let body = body_string(response).await;
    assert!(body.contains("active_feeds"));
}

#[tokio::test]
async fn create_restaurant_empty_name_returns_400() {
    let (app, _state) = setup();
    let response = app
        .oneshot(json_request(
            "POST",
            "/restaurants",
            json!({ "name": "  ", "address": "1 Noodle St" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn create_driver_rating_clamped_to_5() {
    let (app, _state) = setup();
    let response = app
        .oneshot(json_request(
            "POST",
            "/drivers",
            json!({ "user_id": uuid::Uuid::new_v4(), "rating": 9.9 }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["rating"], 5.0);
    assert_eq!(body["is_online"], false);
    assert_eq!(body["total_deliveries"], 0);
}

#[tokio::test]
async fn driver_location_out_of_range_returns_400() {
    let (app, _state) = setup();
    let driver = create_driver(&app).await;
    let id = driver["id"].as_str().unwrap();

    let response = app
        .oneshot(patch_request(
            &format!("/drivers/{id}/location"),
            json!({ "lat": 120.0, "lng": 13.4 }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn driver_online_toggle_round_trips() {
    let (app, _state) = setup();
    let driver = create_driver(&app).await;
    let id = driver["id"].as_str().unwrap();

    let response = app
        .oneshot(patch_request(
            &format!("/drivers/{id}/status"),
            json!({ "is_online": true }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["is_online"], true);
}

#[tokio::test]
async fn create_order_returns_pending_with_computed_total() {
    let (app, _state) = setup();
    let restaurant = create_restaurant(&app).await;
    let order = create_order(&app, restaurant["id"].as_str().unwrap()).await;

    assert_eq!(order["status"], "pending");
    assert_eq!(order["total"], 23.0);
    assert!(order["delivery"].is_null());
    assert_eq!(order["items"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn create_order_without_items_returns_400() {
    let (app, _state) = setup();
    let restaurant = create_restaurant(&app).await;

    let response = app
        .oneshot(json_request(
            "POST",
            "/orders",
            json!({
                "user_id": uuid::Uuid::new_v4(),
                "restaurant_id": restaurant["id"],
                "delivery_address": "2 Hungry Ave",
                "items": []
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn create_order_unknown_restaurant_returns_400() {
    let (app, _state) = setup();
    let response = app
        .oneshot(json_request(
            "POST",
            "/orders",
            json!({
                "user_id": uuid::Uuid::new_v4(),
                "restaurant_id": uuid::Uuid::new_v4(),
                "delivery_address": "2 Hungry Ave",
                "items": [{ "menu_item_id": uuid::Uuid::new_v4(), "quantity": 1, "price": 5.0 }]
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn get_nonexistent_order_returns_404() {
    let (app, _state) = setup();
    let fake_id = "00000000-0000-0000-0000-000000000000";
    let response = app
        .oneshot(get_request(&format!("/orders/{fake_id}")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn order_status_cannot_move_backwards() {
    let (app, _state) = setup();
    let restaurant = create_restaurant(&app).await;
    let order = create_order(&app, restaurant["id"].as_str().unwrap()).await;
    let id = order["id"].as_str().unwrap();

    let response = app
        .clone()
        .oneshot(patch_request(
            &format!("/orders/{id}/status"),
            json!({ "status": "confirmed" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .oneshot(patch_request(
            &format!("/orders/{id}/status"),
            json!({ "status": "pending" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn customer_scope_lists_only_their_orders() {
    let (app, _state) = setup();
    let restaurant = create_restaurant(&app).await;
    let restaurant_id = restaurant["id"].as_str().unwrap();

    let mine = create_order(&app, restaurant_id).await;
    let _other = create_order(&app, restaurant_id).await;
    let user_id = mine["user_id"].as_str().unwrap();

    let response = app
        .oneshot(get_request(&format!("/orders?user_id={user_id}")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    let orders = body.as_array().unwrap();
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0]["id"], mine["id"]);
}

#[tokio::test]
async fn list_orders_requires_exactly_one_filter() {
    let (app, _state) = setup();
    let response = app.oneshot(get_request("/orders")).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn preparing_order_spawns_available_delivery() {
    let (app, _state) = setup();
    let restaurant = create_restaurant(&app).await;
    let order = create_order(&app, restaurant["id"].as_str().unwrap()).await;
    let id = order["id"].as_str().unwrap();

    let response = app
        .clone()
        .oneshot(patch_request(
            &format!("/orders/{id}/status"),
            json!({ "status": "preparing" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .oneshot(get_request("/deliveries/available"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    let deliveries = body.as_array().unwrap();
    assert_eq!(deliveries.len(), 1);
    assert_eq!(deliveries[0]["order_id"], order["id"]);
    assert_eq!(deliveries[0]["status"], "available");
    assert!(deliveries[0]["driver_id"].is_null());
    assert_eq!(deliveries[0]["pickup_address"], restaurant["address"]);
}

#[tokio::test]
async fn second_accept_returns_conflict() {
    let (app, _state) = setup();
    let restaurant = create_restaurant(&app).await;
    let order = create_order(&app, restaurant["id"].as_str().unwrap()).await;
    let order_id = order["id"].as_str().unwrap();

    app.clone()
        .oneshot(patch_request(
            &format!("/orders/{order_id}/status"),
            json!({ "status": "preparing" }),
        ))
        .await
        .unwrap();

    let available = body_json(
        app.clone()
            .oneshot(get_request("/deliveries/available"))
            .await
            .unwrap(),
    )
    .await;
    let delivery_id = available[0]["id"].as_str().unwrap().to_string();

    let winner = create_driver(&app).await;
    let loser = create_driver(&app).await;

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            &format!("/deliveries/{delivery_id}/accept"),
            json!({ "driver_id": winner["id"] }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["accepted"], true);

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            &format!("/deliveries/{delivery_id}/accept"),
            json!({ "driver_id": loser["id"] }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let delivery = body_json(
        app.oneshot(get_request(&format!("/deliveries/{delivery_id}")))
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(delivery["driver_id"], winner["id"]);
    assert_eq!(delivery["status"], "assigned");
    assert!(!delivery["assigned_at"].is_null());
}

#[tokio::test]
async fn delivered_sets_timestamp_and_credits_driver() {
    let (app, _state) = setup();
    let restaurant = create_restaurant(&app).await;
    let order = create_order(&app, restaurant["id"].as_str().unwrap()).await;
    let order_id = order["id"].as_str().unwrap();

    app.clone()
        .oneshot(patch_request(
            &format!("/orders/{order_id}/status"),
            json!({ "status": "preparing" }),
        ))
        .await
        .unwrap();

    let available = body_json(
        app.clone()
            .oneshot(get_request("/deliveries/available"))
            .await
            .unwrap(),
    )
    .await;
    let delivery_id = available[0]["id"].as_str().unwrap().to_string();

    let driver = create_driver(&app).await;
    app.clone()
        .oneshot(json_request(
            "POST",
            &format!("/deliveries/{delivery_id}/accept"),
            json!({ "driver_id": driver["id"] }),
        ))
        .await
        .unwrap();

    for status in ["picked_up", "delivered"] {
        let response = app
            .clone()
            .oneshot(patch_request(
                &format!("/deliveries/{delivery_id}/status"),
                json!({ "status": status }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    let delivery = body_json(
        app.clone()
            .oneshot(get_request(&format!("/deliveries/{delivery_id}")))
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(delivery["status"], "delivered");
    assert!(!delivery["delivered_at"].is_null());

    let drivers = body_json(app.oneshot(get_request("/drivers")).await.unwrap()).await;
    let updated = &drivers.as_array().unwrap()[0];
    assert_eq!(updated["total_deliveries"], 1);
    assert!(updated["total_earnings"].as_f64().unwrap() > 0.0);
}

#[tokio::test]
async fn delivery_status_without_driver_returns_conflict() {
    let (app, _state) = setup();
    let restaurant = create_restaurant(&app).await;
    let order = create_order(&app, restaurant["id"].as_str().unwrap()).await;
    let order_id = order["id"].as_str().unwrap();

    app.clone()
        .oneshot(patch_request(
            &format!("/orders/{order_id}/status"),
            json!({ "status": "preparing" }),
        ))
        .await
        .unwrap();

    let available = body_json(
        app.clone()
            .oneshot(get_request("/deliveries/available"))
            .await
            .unwrap(),
    )
    .await;
    let delivery_id = available[0]["id"].as_str().unwrap();

    let response = app
        .oneshot(patch_request(
            &format!("/deliveries/{delivery_id}/status"),
            json!({ "status": "picked_up" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CONFLICT);
}
