use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::models::order::Order;
use crate::observability::metrics::Metrics;
use crate::store::feed::Table;
use crate::sync::SyncBackend;
use crate::sync::reconcile::{apply_order_event, patch_order_delivery};
use crate::sync::scope::OrderScope;

/// What a subscribed screen sees: the role-scoped collection plus load state.
/// On snapshot failure the collection keeps its last-known value.
#[derive(Debug, Clone, Default, Serialize)]
pub struct OrderView {
    pub orders: Vec<Order>,
    pub loading: bool,
    pub error: Option<String>,
}

/// Live role-scoped view over the orders table. Subscribes to the change feed,
/// seeds itself from a snapshot read, then reconciles every event in arrival
/// order. Dropping the feed tears the subscription down; nothing is applied to
/// a detached view.
pub struct OrderFeed {
    view_rx: watch::Receiver<OrderView>,
    task: JoinHandle<()>,
    metrics: Metrics,
}

impl OrderFeed {
    pub fn spawn<B: SyncBackend>(backend: Arc<B>, scope: OrderScope, metrics: Metrics) -> Self {
        let (view_tx, view_rx) = watch::channel(OrderView {
            orders: Vec::new(),
            loading: true,
            error: None,
        });

        metrics.active_feeds.inc();
        let task = tokio::spawn(run(backend, scope, view_tx, metrics.clone()));

        Self {
            view_rx,
            task,
            metrics,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<OrderView> {
        self.view_rx.clone()
    }
}

impl Drop for OrderFeed {
    fn drop(&mut self) {
        self.task.abort();
        self.metrics.active_feeds.dec();
    }
}

async fn run<B: SyncBackend>(
    backend: Arc<B>,
    scope: OrderScope,
    view_tx: watch::Sender<OrderView>,
    metrics: Metrics,
) {
    // Subscribe before the snapshot so events committed while the bulk read is
    // in flight queue up and win over the snapshot they postdate.
    let mut orders_rx = backend.subscribe(Table::Orders);
    let mut deliveries_rx = backend.subscribe(Table::Deliveries);

    let start = Instant::now();
    match backend.load_orders(scope.clone()).await {
        Ok(orders) => {
            metrics
                .snapshot_load_seconds
                .with_label_values(&["orders", "success"])
                .observe(start.elapsed().as_secs_f64());
            view_tx.send_modify(|view| {
                view.orders = orders;
                view.loading = false;
                view.error = None;
            });
        }
        Err(err) => {
            metrics
                .snapshot_load_seconds
                .with_label_values(&["orders", "error"])
                .observe(start.elapsed().as_secs_f64());
            warn!(error = %err, "order snapshot failed");
            view_tx.send_modify(|view| {
                view.loading = false;
                view.error = Some(err.to_string());
            });
        }
    }

    loop {
        tokio::select! {
            event = orders_rx.recv() => match event {
                Ok(event) => view_tx.send_modify(|view| {
                    match apply_order_event(&mut view.orders, &scope, &event) {
                        Ok(()) => metrics
                            .events_applied_total
                            .with_label_values(&["orders", "success"])
                            .inc(),
                        Err(err) => {
                            metrics
                                .events_applied_total
                                .with_label_values(&["orders", "error"])
                                .inc();
                            warn!(error = %err, "skipped malformed order event");
                        }
                    }
                }),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "order feed lagged; events dropped");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
            event = deliveries_rx.recv() => match event {
                Ok(event) => view_tx.send_modify(|view| {
                    match patch_order_delivery(&mut view.orders, &event) {
                        Ok(()) => metrics
                            .events_applied_total
                            .with_label_values(&["orders", "success"])
                            .inc(),
                        Err(err) => {
                            metrics
                                .events_applied_total
                                .with_label_values(&["orders", "error"])
                                .inc();
                            warn!(error = %err, "skipped malformed delivery event");
                        }
                    }
                }),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "delivery feed lagged; events dropped");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
        }
    }

    debug!("order feed stopped: change feed closed");
}
