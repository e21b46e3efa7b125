use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::delivery::Delivery;
use crate::models::restaurant::Restaurant;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Confirmed,
    Preparing,
    Ready,
    PickedUp,
    OnTheWay,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, OrderStatus::Delivered | OrderStatus::Cancelled)
    }

    /// Forward moves along the lifecycle only; cancellation from any
    /// non-terminal state.
    pub fn can_transition_to(self, next: OrderStatus) -> bool {
        if self == next {
            return false;
        }

        match next {
            OrderStatus::Cancelled => !self.is_terminal(),
            _ => !self.is_terminal() && next.rank() > self.rank(),
        }
    }

    fn rank(self) -> u8 {
        match self {
            OrderStatus::Pending => 0,
            OrderStatus::Confirmed => 1,
            OrderStatus::Preparing => 2,
            OrderStatus::Ready => 3,
            OrderStatus::PickedUp => 4,
            OrderStatus::OnTheWay => 5,
            OrderStatus::Delivered => 6,
            OrderStatus::Cancelled => 7,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: Uuid,
    pub menu_item_id: Uuid,
    pub quantity: u32,
    pub price: f64,
}

/// A customer's purchase from one restaurant. `restaurant` and `delivery` are
/// join products: filled by snapshot reads and by the deliveries side channel,
/// never part of the row as it travels on the change feed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    pub user_id: Uuid,
    pub restaurant_id: Uuid,
    pub total: f64,
    pub status: OrderStatus,
    pub delivery_address: String,
    pub items: Vec<OrderItem>,
    pub restaurant: Option<Restaurant>,
    pub delivery: Option<Delivery>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::OrderStatus;

    #[test]
    fn happy_path_moves_forward() {
        assert!(OrderStatus::Pending.can_transition_to(OrderStatus::Confirmed));
        assert!(OrderStatus::Confirmed.can_transition_to(OrderStatus::Preparing));
        assert!(OrderStatus::Ready.can_transition_to(OrderStatus::PickedUp));
        assert!(OrderStatus::OnTheWay.can_transition_to(OrderStatus::Delivered));
    }

    #[test]
    fn skipping_intermediate_states_is_allowed() {
        assert!(OrderStatus::Pending.can_transition_to(OrderStatus::Preparing));
        assert!(OrderStatus::Preparing.can_transition_to(OrderStatus::Delivered));
    }

    #[test]
    fn backwards_moves_are_rejected() {
        assert!(!OrderStatus::Preparing.can_transition_to(OrderStatus::Pending));
        assert!(!OrderStatus::Delivered.can_transition_to(OrderStatus::OnTheWay));
    }

    #[test]
    fn cancel_allowed_from_any_non_terminal_state() {
        assert!(OrderStatus::Pending.can_transition_to(OrderStatus::Cancelled));
        assert!(OrderStatus::OnTheWay.can_transition_to(OrderStatus::Cancelled));
        assert!(!OrderStatus::Delivered.can_transition_to(OrderStatus::Cancelled));
        assert!(!OrderStatus::Cancelled.can_transition_to(OrderStatus::Cancelled));
    }

    #[test]
    fn same_status_is_not_a_transition() {
        assert!(!OrderStatus::Preparing.can_transition_to(OrderStatus::Preparing));
    }
}
