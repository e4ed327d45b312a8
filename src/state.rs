use std::sync::Arc;

use tokio::sync::broadcast;

use crate::catalog::{MemoryCatalog, ProductCatalog};
use crate::config::Config;
use crate::engine::planner::{DeliveryPlanner, PlannerOptions};
use crate::models::plan::DeliveryPlan;
use crate::observability::metrics::Metrics;
use crate::store::memory::MemoryStore;
use crate::store::OrderStore;

pub struct AppState {
    pub planner: DeliveryPlanner,
    pub catalog: Arc<dyn ProductCatalog>,
    pub plan_events_tx: broadcast::Sender<DeliveryPlan>,
    pub metrics: Metrics,
}

impl AppState {
    pub fn new(
        store: Arc<dyn OrderStore>,
        catalog: Arc<dyn ProductCatalog>,
        config: &Config,
    ) -> Self {
        let (plan_events_tx, _unused_rx) = broadcast::channel(config.event_buffer_size);
        let metrics = Metrics::new();

        let planner = DeliveryPlanner::new(
            store,
            catalog.clone(),
            PlannerOptions::from_config(config),
            metrics.clone(),
            plan_events_tx.clone(),
        );

        Self {
            planner,
            catalog,
            plan_events_tx,
            metrics,
        }
    }

    pub fn in_memory(config: &Config) -> Self {
        Self::new(
            Arc::new(MemoryStore::new()),
            Arc::new(MemoryCatalog::new()),
            config,
        )
    }
}
