use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::models::delivery::Delivery;
use crate::models::order::Order;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Table {
    Orders,
    Deliveries,
}

impl Table {
    pub fn as_str(self) -> &'static str {
        match self {
            Table::Orders => "orders",
            Table::Deliveries => "deliveries",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EventType {
    Insert,
    Update,
    Delete,
}

impl EventType {
    pub fn as_str(self) -> &'static str {
        match self {
            EventType::Insert => "INSERT",
            EventType::Update => "UPDATE",
            EventType::Delete => "DELETE",
        }
    }
}

/// One row-level change notification. `new` and `old` are row snapshots in
/// wire shape; either may be partial or absent depending on the event type.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeEvent {
    pub event_type: EventType,
    pub new: Option<Value>,
    pub old: Option<Value>,
}

pub fn row_uuid(row: &Value, field: &str) -> Option<Uuid> {
    row.get(field)?.as_str().and_then(|raw| Uuid::parse_str(raw).ok())
}

pub fn row_id(row: &Value) -> Option<Uuid> {
    row_uuid(row, "id")
}

/// Wire shape of an order row: table columns only. The joined `restaurant`
/// and `delivery` sub-objects never travel on the feed; emitting them as null
/// would clobber the client-side join on merge.
pub fn order_row(order: &Order) -> Value {
    let mut row = serde_json::to_value(order).expect("order row serializes");
    if let Value::Object(map) = &mut row {
        map.remove("restaurant");
        map.remove("delivery");
    }
    row
}

pub fn delivery_row(delivery: &Delivery) -> Value {
    let mut row = serde_json::to_value(delivery).expect("delivery row serializes");
    if let Value::Object(map) = &mut row {
        map.remove("order");
        map.remove("driver");
    }
    row
}
