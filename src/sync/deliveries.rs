use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::observability::metrics::Metrics;
use crate::store::feed::Table;
use crate::sync::SyncBackend;
use crate::sync::reconcile::{DeliveryPools, apply_delivery_event};
use crate::sync::scope::DeliveryScope;

#[derive(Debug, Clone, Default, Serialize)]
pub struct DeliveryView {
    #[serde(flatten)]
    pub pools: DeliveryPools,
    pub loading: bool,
    pub error: Option<String>,
}

/// A driver's live view: their assigned deliveries plus, when configured, the
/// available pool. The snapshot runs both bulk reads in parallel and fails as
/// a unit if either does.
pub struct DeliveryFeed {
    view_rx: watch::Receiver<DeliveryView>,
    task: JoinHandle<()>,
    metrics: Metrics,
}

impl DeliveryFeed {
    pub fn spawn<B: SyncBackend>(backend: Arc<B>, scope: DeliveryScope, metrics: Metrics) -> Self {
        let (view_tx, view_rx) = watch::channel(DeliveryView {
            pools: DeliveryPools::default(),
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

    pub fn subscribe(&self) -> watch::Receiver<DeliveryView> {
        self.view_rx.clone()
    }
}

impl Drop for DeliveryFeed {
    fn drop(&mut self) {
        self.task.abort();
        self.metrics.active_feeds.dec();
    }
}

async fn run<B: SyncBackend>(
    backend: Arc<B>,
    scope: DeliveryScope,
    view_tx: watch::Sender<DeliveryView>,
    metrics: Metrics,
) {
    let mut deliveries_rx = backend.subscribe(Table::Deliveries);

    let start = Instant::now();
    let assigned = backend.load_driver_deliveries(scope.driver_id);
    let available = async {
        if scope.include_available {
            backend.load_available_deliveries().await
        } else {
            Ok(Vec::new())
        }
    };
    let (assigned, available) = tokio::join!(assigned, available);

    match assigned.and_then(|assigned| available.map(|available| (assigned, available))) {
        Ok((assigned, available)) => {
            metrics
                .snapshot_load_seconds
                .with_label_values(&["deliveries", "success"])
                .observe(start.elapsed().as_secs_f64());
            view_tx.send_modify(|view| {
                view.pools.assigned = assigned;
                view.pools.available = available;
                view.loading = false;
                view.error = None;
            });
        }
        Err(err) => {
            metrics
                .snapshot_load_seconds
                .with_label_values(&["deliveries", "error"])
                .observe(start.elapsed().as_secs_f64());
            warn!(error = %err, "delivery snapshot failed");
            view_tx.send_modify(|view| {
                view.loading = false;
                view.error = Some(err.to_string());
            });
        }
    }

    loop {
        match deliveries_rx.recv().await {
            Ok(event) => view_tx.send_modify(|view| {
                match apply_delivery_event(&mut view.pools, &scope, &event) {
                    Ok(()) => metrics
                        .events_applied_total
                        .with_label_values(&["deliveries", "success"])
                        .inc(),
                    Err(err) => {
                        metrics
                            .events_applied_total
                            .with_label_values(&["deliveries", "error"])
                            .inc();
                        warn!(error = %err, "skipped malformed delivery event");
                    }
                }
            }),
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(skipped, "delivery feed lagged; events dropped");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }

    debug!("delivery feed stopped: change feed closed");
}
