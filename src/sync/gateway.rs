use std::sync::Arc;

use tracing::{info, warn};
use uuid::Uuid;

use crate::models::delivery::DeliveryStatus;
use crate::models::order::OrderStatus;
use crate::observability::metrics::Metrics;
use crate::store::Backend;

/// The narrow write surface of the sync core. Mutations report only whether
/// the write was accepted; the resulting state change reaches every view
/// through the change feed, never through the return value.
#[derive(Clone)]
pub struct Gateway {
    backend: Arc<Backend>,
    metrics: Metrics,
}

impl Gateway {
    pub fn new(backend: Arc<Backend>, metrics: Metrics) -> Self {
        Self { backend, metrics }
    }

    /// Claim an available delivery for a driver. Conditional on the delivery
    /// still being available at write time; when another driver won the race
    /// this returns false and local state is left to the feed.
    pub async fn accept_delivery(&self, delivery_id: Uuid, driver_id: Uuid) -> bool {
        match self.backend.accept_delivery(delivery_id, driver_id) {
            Ok(_) => {
                info!(%delivery_id, %driver_id, "delivery accepted");
                self.record("accept_delivery", "success");
                true
            }
            Err(err) => {
                warn!(%delivery_id, %driver_id, error = %err, "accept delivery rejected");
                self.record("accept_delivery", "error");
                false
            }
        }
    }

    pub async fn update_order_status(&self, order_id: Uuid, status: OrderStatus) -> bool {
        match self.backend.update_order_status(order_id, status) {
            Ok(_) => {
                info!(%order_id, status = ?status, "order status updated");
                self.record("update_order_status", "success");
                true
            }
            Err(err) => {
                warn!(%order_id, error = %err, "order status update rejected");
                self.record("update_order_status", "error");
                false
            }
        }
    }

    pub async fn update_delivery_status(&self, delivery_id: Uuid, status: DeliveryStatus) -> bool {
        match self.backend.update_delivery_status(delivery_id, status) {
            Ok(_) => {
                info!(%delivery_id, status = ?status, "delivery status updated");
                self.record("update_delivery_status", "success");
                true
            }
            Err(err) => {
                warn!(%delivery_id, error = %err, "delivery status update rejected");
                self.record("update_delivery_status", "error");
                false
            }
        }
    }

    fn record(&self, operation: &str, outcome: &str) {
        self.metrics
            .mutations_total
            .with_label_values(&[operation, outcome])
            .inc();
    }
}
