use std::collections::HashSet;

use uuid::Uuid;

use crate::models::order::Order;

/// Role-scope predicate for the orders collection: which records belong in a
/// given subscriber's view.
#[derive(Debug, Clone)]
pub enum OrderScope {
    /// A customer watching their own orders.
    Customer(Uuid),
    /// Restaurant staff watching orders placed with their restaurant.
    Restaurant(Uuid),
    /// An explicit set of order ids, e.g. an order-tracking screen.
    Orders(HashSet<Uuid>),
}

impl OrderScope {
    pub fn admits(&self, order: &Order) -> bool {
        match self {
            OrderScope::Customer(user_id) => order.user_id == *user_id,
            OrderScope::Restaurant(restaurant_id) => order.restaurant_id == *restaurant_id,
            OrderScope::Orders(ids) => ids.contains(&order.id),
        }
    }
}

/// Scope for the deliveries collection: the driver's own work plus, when the
/// flag is set, the unassigned pool.
#[derive(Debug, Clone, Copy)]
pub struct DeliveryScope {
    pub driver_id: Uuid,
    pub include_available: bool,
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use chrono::Utc;
    use uuid::Uuid;

    use super::OrderScope;
    use crate::models::order::{Order, OrderStatus};

    fn order(user_id: Uuid, restaurant_id: Uuid) -> Order {
        let now = Utc::now();
        Order {
            id: Uuid::new_v4(),
            user_id,
            restaurant_id,
            total: 12.0,
            status: OrderStatus::Pending,
            delivery_address: "3 Test Ln".to_string(),
            items: Vec::new(),
            restaurant: None,
            delivery: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn customer_scope_matches_on_user_id() {
        let user = Uuid::new_v4();
        let scope = OrderScope::Customer(user);

        assert!(scope.admits(&order(user, Uuid::new_v4())));
        assert!(!scope.admits(&order(Uuid::new_v4(), Uuid::new_v4())));
    }

    #[test]
    fn restaurant_scope_matches_on_restaurant_id() {
        let restaurant = Uuid::new_v4();
        let scope = OrderScope::Restaurant(restaurant);

        assert!(scope.admits(&order(Uuid::new_v4(), restaurant)));
        assert!(!scope.admits(&order(Uuid::new_v4(), Uuid::new_v4())));
    }

    #[test]
    fn id_set_scope_matches_on_order_id() {
        let tracked = order(Uuid::new_v4(), Uuid::new_v4());
        let scope = OrderScope::Orders(HashSet::from([tracked.id]));

        assert!(scope.admits(&tracked));
        assert!(!scope.admits(&order(tracked.user_id, tracked.restaurant_id)));
    }
}
