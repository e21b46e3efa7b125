use std::sync::Arc;

use crate::observability::metrics::Metrics;
use crate::store::Backend;
use crate::sync::gateway::Gateway;

pub struct AppState {
    pub backend: Arc<Backend>,
    pub gateway: Gateway,
    pub metrics: Metrics,
}

impl AppState {
    pub fn new(event_buffer_size: usize) -> Self {
        let metrics = Metrics::new();
        let backend = Arc::new(Backend::new(event_buffer_size, metrics.clone()));
        let gateway = Gateway::new(backend.clone(), metrics.clone());

        Self {
            backend,
            gateway,
            metrics,
        }
    }
}
