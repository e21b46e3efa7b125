use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::driver::Driver;
use crate::models::order::Order;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    Available,
    Assigned,
    PickedUp,
    Delivered,
    Cancelled,
}

impl DeliveryStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, DeliveryStatus::Delivered | DeliveryStatus::Cancelled)
    }

    pub fn can_transition_to(self, next: DeliveryStatus) -> bool {
        if self == next {
            return false;
        }

        match next {
            DeliveryStatus::Cancelled => !self.is_terminal(),
            _ => !self.is_terminal() && next.rank() > self.rank(),
        }
    }

    fn rank(self) -> u8 {
        match self {
            DeliveryStatus::Available => 0,
            DeliveryStatus::Assigned => 1,
            DeliveryStatus::PickedUp => 2,
            DeliveryStatus::Delivered => 3,
            DeliveryStatus::Cancelled => 4,
        }
    }
}

/// The fulfillment leg of one order, 1:1 with it. `driver_id` is null exactly
/// while the delivery sits in the available pool. `order` and `driver` are join
/// products, stripped from feed rows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Delivery {
    pub id: Uuid,
    pub order_id: Uuid,
    pub driver_id: Option<Uuid>,
    pub pickup_address: String,
    pub delivery_address: String,
    pub status: DeliveryStatus,
    pub assigned_at: Option<DateTime<Utc>>,
    pub picked_up_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub driver_earnings: f64,
    pub order: Option<Box<Order>>,
    pub driver: Option<Driver>,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::DeliveryStatus;

    #[test]
    fn lifecycle_moves_forward() {
        assert!(DeliveryStatus::Available.can_transition_to(DeliveryStatus::Assigned));
        assert!(DeliveryStatus::Assigned.can_transition_to(DeliveryStatus::PickedUp));
        assert!(DeliveryStatus::PickedUp.can_transition_to(DeliveryStatus::Delivered));
        assert!(!DeliveryStatus::Assigned.can_transition_to(DeliveryStatus::Available));
    }

    #[test]
    fn terminal_states_are_final() {
        assert!(!DeliveryStatus::Delivered.can_transition_to(DeliveryStatus::Cancelled));
        assert!(!DeliveryStatus::Cancelled.can_transition_to(DeliveryStatus::Assigned));
        assert!(DeliveryStatus::PickedUp.can_transition_to(DeliveryStatus::Cancelled));
    }
}
