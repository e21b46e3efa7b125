pub mod feed;

use chrono::Utc;
use dashmap::{DashMap, Entry};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::error::StoreError;
use crate::models::delivery::{Delivery, DeliveryStatus};
use crate::models::driver::Driver;
use crate::models::order::{Order, OrderStatus};
use crate::models::restaurant::Restaurant;
use crate::observability::metrics::Metrics;
use crate::store::feed::{ChangeEvent, EventType, Table, delivery_row, order_row};
use crate::sync::scope::OrderScope;

const DELIVERY_BASE_EARNINGS: f64 = 2.5;
const DELIVERY_EARNINGS_RATE: f64 = 0.1;

/// In-process stand-in for the managed backend: relational tables plus one
/// change feed per synchronized table. Every write is committed to the table
/// and then emitted on the feed; readers reconcile from the feed rather than
/// from write responses.
pub struct Backend {
    orders: DashMap<Uuid, Order>,
    deliveries: DashMap<Uuid, Delivery>,
    // order id -> delivery id; guards the 1:1 order/delivery relation.
    deliveries_by_order: DashMap<Uuid, Uuid>,
    drivers: DashMap<Uuid, Driver>,
    restaurants: DashMap<Uuid, Restaurant>,
    orders_feed: broadcast::Sender<ChangeEvent>,
    deliveries_feed: broadcast::Sender<ChangeEvent>,
    metrics: Metrics,
}

impl Backend {
    pub fn new(event_buffer_size: usize, metrics: Metrics) -> Self {
        let (orders_feed, _unused_rx) = broadcast::channel(event_buffer_size);
        let (deliveries_feed, _unused_rx) = broadcast::channel(event_buffer_size);

        Self {
            orders: DashMap::new(),
            deliveries: DashMap::new(),
            deliveries_by_order: DashMap::new(),
            drivers: DashMap::new(),
            restaurants: DashMap::new(),
            orders_feed,
            deliveries_feed,
            metrics,
        }
    }

    pub fn subscribe(&self, table: Table) -> broadcast::Receiver<ChangeEvent> {
        match table {
            Table::Orders => self.orders_feed.subscribe(),
            Table::Deliveries => self.deliveries_feed.subscribe(),
        }
    }

    pub fn order_count(&self) -> usize {
        self.orders.len()
    }

    pub fn delivery_count(&self) -> usize {
        self.deliveries.len()
    }

    pub fn driver_count(&self) -> usize {
        self.drivers.len()
    }

    // -- restaurants ---------------------------------------------------------

    pub fn insert_restaurant(&self, restaurant: Restaurant) -> Restaurant {
        self.restaurants.insert(restaurant.id, restaurant.clone());
        restaurant
    }

    pub fn get_restaurant(&self, id: Uuid) -> Option<Restaurant> {
        self.restaurants.get(&id).map(|entry| entry.clone())
    }

    // -- drivers -------------------------------------------------------------

    pub fn insert_driver(&self, driver: Driver) -> Driver {
        self.drivers.insert(driver.id, driver.clone());
        driver
    }

    pub fn get_driver(&self, id: Uuid) -> Option<Driver> {
        self.drivers.get(&id).map(|entry| entry.clone())
    }

    pub fn list_drivers(&self) -> Vec<Driver> {
        self.drivers.iter().map(|entry| entry.clone()).collect()
    }

    pub fn set_driver_online(&self, id: Uuid, is_online: bool) -> Result<Driver, StoreError> {
        let mut driver = self
            .drivers
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("driver {} not found", id)))?;

        driver.is_online = is_online;
        driver.updated_at = Utc::now();
        Ok(driver.clone())
    }

    pub fn set_driver_location(&self, id: Uuid, lat: f64, lng: f64) -> Result<Driver, StoreError> {
        let mut driver = self
            .drivers
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("driver {} not found", id)))?;

        driver.current_latitude = Some(lat);
        driver.current_longitude = Some(lng);
        driver.updated_at = Utc::now();
        Ok(driver.clone())
    }

    // -- orders --------------------------------------------------------------

    pub fn insert_order(&self, order: Order) -> Order {
        self.orders.insert(order.id, order.clone());
        self.emit_order(EventType::Insert, Some(&order), None);
        order
    }

    pub fn get_order(&self, id: Uuid) -> Result<Order, StoreError> {
        let order = self
            .orders
            .get(&id)
            .map(|entry| entry.clone())
            .ok_or_else(|| StoreError::NotFound(format!("order {} not found", id)))?;

        Ok(self.joined_order(order))
    }

    pub fn select_orders(&self, scope: &OrderScope) -> Vec<Order> {
        let mut orders: Vec<Order> = self
            .orders
            .iter()
            .filter(|entry| scope.admits(entry.value()))
            .map(|entry| entry.clone())
            .collect();

        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        orders.into_iter().map(|order| self.joined_order(order)).collect()
    }

    pub fn update_order_status(&self, id: Uuid, next: OrderStatus) -> Result<Order, StoreError> {
        let (old, updated) = {
            let mut order = self
                .orders
                .get_mut(&id)
                .ok_or_else(|| StoreError::NotFound(format!("order {} not found", id)))?;

            if !order.status.can_transition_to(next) {
                return Err(StoreError::InvalidTransition(format!(
                    "order {}: {:?} -> {:?} is not a valid transition",
                    id, order.status, next
                )));
            }

            let old = order.clone();
            order.status = next;
            order.updated_at = Utc::now();
            (old, order.clone())
        };

        self.emit_order(EventType::Update, Some(&updated), Some(&old));

        // The fulfillment leg exists from the moment the kitchen is working on
        // the order.
        if matches!(next, OrderStatus::Preparing | OrderStatus::Ready) {
            self.create_delivery(&updated);
        }

        if next == OrderStatus::Cancelled {
            self.cancel_order_delivery(id);
        }

        Ok(updated)
    }

    // -- deliveries ----------------------------------------------------------

    pub fn get_delivery(&self, id: Uuid) -> Result<Delivery, StoreError> {
        let delivery = self
            .deliveries
            .get(&id)
            .map(|entry| entry.clone())
            .ok_or_else(|| StoreError::NotFound(format!("delivery {} not found", id)))?;

        Ok(self.joined_delivery(delivery))
    }

    pub fn select_driver_deliveries(&self, driver_id: Uuid) -> Vec<Delivery> {
        let mut deliveries: Vec<Delivery> = self
            .deliveries
            .iter()
            .filter(|entry| entry.driver_id == Some(driver_id))
            .map(|entry| entry.clone())
            .collect();

        deliveries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        deliveries
            .into_iter()
            .map(|delivery| self.joined_delivery(delivery))
            .collect()
    }

    pub fn select_available_deliveries(&self) -> Vec<Delivery> {
        let mut deliveries: Vec<Delivery> = self
            .deliveries
            .iter()
            .filter(|entry| entry.status == DeliveryStatus::Available)
            .map(|entry| entry.clone())
            .collect();

        deliveries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        deliveries
            .into_iter()
            .map(|delivery| self.joined_delivery(delivery))
            .collect()
    }

    /// Conditional write: assign the delivery to `driver_id` only if it is
    /// still `available`. This compare-and-swap is the sole admission control
    /// between racing drivers; the loser gets `PreconditionFailed`.
    pub fn accept_delivery(&self, delivery_id: Uuid, driver_id: Uuid) -> Result<Delivery, StoreError> {
        if !self.drivers.contains_key(&driver_id) {
            return Err(StoreError::NotFound(format!("driver {} not found", driver_id)));
        }

        let (old, updated) = {
            let mut delivery = self
                .deliveries
                .get_mut(&delivery_id)
                .ok_or_else(|| StoreError::NotFound(format!("delivery {} not found", delivery_id)))?;

            if delivery.status != DeliveryStatus::Available {
                return Err(StoreError::PreconditionFailed(format!(
                    "delivery {} is no longer available",
                    delivery_id
                )));
            }

            let old = delivery.clone();
            delivery.driver_id = Some(driver_id);
            delivery.status = DeliveryStatus::Assigned;
            delivery.assigned_at = Some(Utc::now());
            (old, delivery.clone())
        };

        self.emit_delivery(EventType::Update, Some(&updated), Some(&old));
        Ok(updated)
    }

    pub fn update_delivery_status(
        &self,
        id: Uuid,
        next: DeliveryStatus,
    ) -> Result<Delivery, StoreError> {
        let (old, updated) = {
            let mut delivery = self
                .deliveries
                .get_mut(&id)
                .ok_or_else(|| StoreError::NotFound(format!("delivery {} not found", id)))?;

            if delivery.driver_id.is_none() && next != DeliveryStatus::Cancelled {
                return Err(StoreError::PreconditionFailed(format!(
                    "delivery {} has no driver; accept it first",
                    id
                )));
            }

            if !delivery.status.can_transition_to(next) {
                return Err(StoreError::InvalidTransition(format!(
                    "delivery {}: {:?} -> {:?} is not a valid transition",
                    id, delivery.status, next
                )));
            }

            let old = delivery.clone();
            let now = Utc::now();
            delivery.status = next;
            match next {
                DeliveryStatus::Assigned => delivery.assigned_at = Some(now),
                DeliveryStatus::PickedUp => delivery.picked_up_at = Some(now),
                DeliveryStatus::Delivered => delivery.delivered_at = Some(now),
                DeliveryStatus::Cancelled => delivery.cancelled_at = Some(now),
                DeliveryStatus::Available => {}
            }
            (old, delivery.clone())
        };

        if next == DeliveryStatus::Delivered {
            if let Some(driver_id) = updated.driver_id {
                if let Some(mut driver) = self.drivers.get_mut(&driver_id) {
                    driver.total_deliveries += 1;
                    driver.total_earnings += updated.driver_earnings;
                    driver.updated_at = Utc::now();
                }
            }
        }

        self.emit_delivery(EventType::Update, Some(&updated), Some(&old));
        Ok(updated)
    }

    // -- internals -----------------------------------------------------------

    fn create_delivery(&self, order: &Order) {
        // The vacant-entry guard on the per-order index makes the existence
        // check and the insert one atomic step; racing transitions on the same
        // order spawn exactly one leg.
        let Entry::Vacant(slot) = self.deliveries_by_order.entry(order.id) else {
            return;
        };

        let pickup_address = self
            .restaurants
            .get(&order.restaurant_id)
            .map(|restaurant| restaurant.address.clone())
            .unwrap_or_default();

        let delivery = Delivery {
            id: Uuid::new_v4(),
            order_id: order.id,
            driver_id: None,
            pickup_address,
            delivery_address: order.delivery_address.clone(),
            status: DeliveryStatus::Available,
            assigned_at: None,
            picked_up_at: None,
            delivered_at: None,
            cancelled_at: None,
            driver_earnings: DELIVERY_BASE_EARNINGS + order.total * DELIVERY_EARNINGS_RATE,
            order: None,
            driver: None,
            created_at: Utc::now(),
        };

        slot.insert(delivery.id);
        self.deliveries.insert(delivery.id, delivery.clone());
        self.emit_delivery(EventType::Insert, Some(&delivery), None);
    }

    /// Cancelling an order releases its fulfillment leg. A delivery that is
    /// already picked up runs to completion; the food is with the driver.
    fn cancel_order_delivery(&self, order_id: Uuid) {
        let Some(delivery_id) = self.deliveries_by_order.get(&order_id).map(|entry| *entry)
        else {
            return;
        };

        let Some((old, updated)) = self.deliveries.get_mut(&delivery_id).and_then(|mut delivery| {
            if !matches!(
                delivery.status,
                DeliveryStatus::Available | DeliveryStatus::Assigned
            ) {
                return None;
            }

            let old = delivery.clone();
            delivery.status = DeliveryStatus::Cancelled;
            delivery.cancelled_at = Some(Utc::now());
            Some((old, delivery.clone()))
        }) else {
            return;
        };

        self.emit_delivery(EventType::Update, Some(&updated), Some(&old));
    }

    fn joined_order(&self, mut order: Order) -> Order {
        order.restaurant = self.get_restaurant(order.restaurant_id);
        order.delivery = self.delivery_for_order(order.id);
        order
    }

    fn delivery_for_order(&self, order_id: Uuid) -> Option<Delivery> {
        let delivery_id = *self.deliveries_by_order.get(&order_id)?;
        let mut delivery = self.deliveries.get(&delivery_id)?.clone();
        delivery.driver = delivery.driver_id.and_then(|id| self.get_driver(id));
        Some(delivery)
    }

    fn joined_delivery(&self, mut delivery: Delivery) -> Delivery {
        delivery.driver = delivery.driver_id.and_then(|id| self.get_driver(id));
        delivery.order = self.orders.get(&delivery.order_id).map(|entry| {
            let mut order = entry.clone();
            order.restaurant = self.get_restaurant(order.restaurant_id);
            Box::new(order)
        });
        delivery
    }

    fn emit_order(&self, event_type: EventType, new: Option<&Order>, old: Option<&Order>) {
        self.metrics
            .feed_events_total
            .with_label_values(&[Table::Orders.as_str(), event_type.as_str()])
            .inc();

        let _ = self.orders_feed.send(ChangeEvent {
            event_type,
            new: new.map(order_row),
            old: old.map(order_row),
        });
    }

    fn emit_delivery(&self, event_type: EventType, new: Option<&Delivery>, old: Option<&Delivery>) {
        self.metrics
            .feed_events_total
            .with_label_values(&[Table::Deliveries.as_str(), event_type.as_str()])
            .inc();

        let _ = self.deliveries_feed.send(ChangeEvent {
            event_type,
            new: new.map(delivery_row),
            old: old.map(delivery_row),
        });
    }
}
