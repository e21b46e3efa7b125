pub mod deliveries;
pub mod gateway;
pub mod orders;
pub mod reconcile;
pub mod scope;

use std::future::Future;

use tokio::sync::broadcast;
use uuid::Uuid;

use crate::error::StoreError;
use crate::models::delivery::Delivery;
use crate::models::order::Order;
use crate::store::Backend;
use crate::store::feed::{ChangeEvent, Table};
use crate::sync::scope::OrderScope;

/// The backend surface the sync core depends on: role-scoped snapshot reads
/// plus a change-feed subscription per table. Feeds take this as an injected
/// collaborator so tests can substitute slow or failing backends.
pub trait SyncBackend: Send + Sync + 'static {
    fn load_orders(
        &self,
        scope: OrderScope,
    ) -> impl Future<Output = Result<Vec<Order>, StoreError>> + Send;

    fn load_driver_deliveries(
        &self,
        driver_id: Uuid,
    ) -> impl Future<Output = Result<Vec<Delivery>, StoreError>> + Send;

    fn load_available_deliveries(
        &self,
    ) -> impl Future<Output = Result<Vec<Delivery>, StoreError>> + Send;

    fn subscribe(&self, table: Table) -> broadcast::Receiver<ChangeEvent>;
}

impl SyncBackend for Backend {
    fn load_orders(
        &self,
        scope: OrderScope,
    ) -> impl Future<Output = Result<Vec<Order>, StoreError>> + Send {
        let orders = self.select_orders(&scope);
        async move { Ok(orders) }
    }

    fn load_driver_deliveries(
        &self,
        driver_id: Uuid,
    ) -> impl Future<Output = Result<Vec<Delivery>, StoreError>> + Send {
        let deliveries = self.select_driver_deliveries(driver_id);
        async move { Ok(deliveries) }
    }

    fn load_available_deliveries(
        &self,
    ) -> impl Future<Output = Result<Vec<Delivery>, StoreError>> + Send {
        let deliveries = self.select_available_deliveries();
        async move { Ok(deliveries) }
    }

    fn subscribe(&self, table: Table) -> broadcast::Receiver<ChangeEvent> {
        Backend::subscribe(self, table)
    }
}
