//! Applies change-feed events to in-memory collections without re-fetching.
//! Correctness leans on the feed delivering events in commit order per table;
//! no reordering or buffering happens here.

use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use crate::error::SyncError;
use crate::models::delivery::{Delivery, DeliveryStatus};
use crate::models::order::Order;
use crate::store::feed::{ChangeEvent, EventType, row_id, row_uuid};
use crate::sync::scope::{DeliveryScope, OrderScope};

/// Shallow merge of a wire patch over a base row: fields present in the patch
/// win (including explicit nulls), fields absent stay untouched.
pub fn merge_row(base: &Value, patch: &Value) -> Value {
    match (base, patch) {
        (Value::Object(base), Value::Object(patch)) => {
            let mut merged = base.clone();
            for (key, value) in patch {
                merged.insert(key.clone(), value.clone());
            }
            Value::Object(merged)
        }
        _ => patch.clone(),
    }
}

pub fn apply_order_event(
    orders: &mut Vec<Order>,
    scope: &OrderScope,
    event: &ChangeEvent,
) -> Result<(), SyncError> {
    match event.event_type {
        EventType::Insert => {
            let row = event.new.as_ref().ok_or(SyncError::MissingField("new"))?;
            let order: Order = serde_json::from_value(row.clone())?;
            if !scope.admits(&order) {
                return Ok(());
            }
            if orders.iter().any(|existing| existing.id == order.id) {
                return Ok(());
            }
            orders.insert(0, order);
        }
        EventType::Update => {
            let patch = event.new.as_ref().ok_or(SyncError::MissingField("new"))?;
            let id = row_id(patch).ok_or(SyncError::MissingField("id"))?;
            // An order never changes owner or restaurant, so a record that was
            // in scope stays in scope; no eviction on update.
            if let Some(existing) = orders.iter_mut().find(|order| order.id == id) {
                let base = serde_json::to_value(&*existing)?;
                *existing = serde_json::from_value(merge_row(&base, patch))?;
            }
        }
        EventType::Delete => {
            let row = event
                .old
                .as_ref()
                .or(event.new.as_ref())
                .ok_or(SyncError::MissingField("old"))?;
            let id = row_id(row).ok_or(SyncError::MissingField("id"))?;
            orders.retain(|order| order.id != id);
        }
    }

    Ok(())
}

/// Side channel from the deliveries table into the orders collection: keeps
/// each order's nested `delivery` sub-object fresh without touching top-level
/// order fields.
pub fn patch_order_delivery(orders: &mut Vec<Order>, event: &ChangeEvent) -> Result<(), SyncError> {
    let row = match event.event_type {
        EventType::Delete => event.old.as_ref().or(event.new.as_ref()),
        _ => event.new.as_ref(),
    }
    .ok_or(SyncError::MissingField("new"))?;

    let order_id = row_uuid(row, "order_id").ok_or(SyncError::MissingField("order_id"))?;
    let Some(order) = orders.iter_mut().find(|order| order.id == order_id) else {
        return Ok(());
    };

    match event.event_type {
        EventType::Delete => order.delivery = None,
        _ => {
            let base = match &order.delivery {
                Some(delivery) => serde_json::to_value(delivery)?,
                None => Value::Object(Default::default()),
            };
            order.delivery = Some(serde_json::from_value(merge_row(&base, row))?);
        }
    }

    Ok(())
}

/// The two parallel lists a driver's view maintains.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DeliveryPools {
    pub assigned: Vec<Delivery>,
    pub available: Vec<Delivery>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pool {
    Assigned,
    Available,
}

impl DeliveryPools {
    pub fn contains(&self, id: Uuid) -> bool {
        self.locate(id).is_some()
    }

    fn locate(&self, id: Uuid) -> Option<(Pool, usize)> {
        if let Some(index) = self.assigned.iter().position(|d| d.id == id) {
            return Some((Pool::Assigned, index));
        }
        if let Some(index) = self.available.iter().position(|d| d.id == id) {
            return Some((Pool::Available, index));
        }
        None
    }

    fn list(&mut self, pool: Pool) -> &mut Vec<Delivery> {
        match pool {
            Pool::Assigned => &mut self.assigned,
            Pool::Available => &mut self.available,
        }
    }
}

pub fn apply_delivery_event(
    pools: &mut DeliveryPools,
    scope: &DeliveryScope,
    event: &ChangeEvent,
) -> Result<(), SyncError> {
    match event.event_type {
        EventType::Insert => {
            let row = event.new.as_ref().ok_or(SyncError::MissingField("new"))?;
            let delivery: Delivery = serde_json::from_value(row.clone())?;
            if pools.contains(delivery.id) {
                return Ok(());
            }
            if delivery.driver_id == Some(scope.driver_id) {
                pools.assigned.insert(0, delivery);
            } else if delivery.status == DeliveryStatus::Available && scope.include_available {
                pools.available.insert(0, delivery);
            }
        }
        EventType::Update => {
            let patch = event.new.as_ref().ok_or(SyncError::MissingField("new"))?;
            let id = row_id(patch).ok_or(SyncError::MissingField("id"))?;

            let slot = pools.locate(id);
            let merged: Delivery = match slot {
                Some((pool, index)) => {
                    let base = serde_json::to_value(&pools.list(pool)[index])?;
                    serde_json::from_value(merge_row(&base, patch))?
                }
                // Not currently held; the event may still pull the delivery
                // into scope, so decode it as a full row.
                None => serde_json::from_value(patch.clone())?,
            };

            let target = if merged.driver_id == Some(scope.driver_id) {
                Some(Pool::Assigned)
            } else if merged.status == DeliveryStatus::Available && scope.include_available {
                Some(Pool::Available)
            } else {
                None
            };

            match (slot, target) {
                (Some((pool, index)), Some(into)) if pool == into => {
                    pools.list(pool)[index] = merged;
                }
                (slot, target) => {
                    if let Some((pool, index)) = slot {
                        pools.list(pool).remove(index);
                    }
                    if let Some(into) = target {
                        pools.list(into).insert(0, merged);
                    }
                }
            }
        }
        EventType::Delete => {
            let row = event
                .old
                .as_ref()
                .or(event.new.as_ref())
                .ok_or(SyncError::MissingField("old"))?;
            let id = row_id(row).ok_or(SyncError::MissingField("id"))?;
            pools.assigned.retain(|delivery| delivery.id != id);
            pools.available.retain(|delivery| delivery.id != id);
        }
    }

    Ok(())
}
