//! Business logic services

pub mod inventory;
pub mod reconciler;
pub mod requests;
pub mod reviews;
pub mod stats;

use std::sync::Arc;

use crate::{gateway::BackendClient, store::CacheStore};

/// Container for all services
#[derive(Clone)]
pub struct Services {
    pub requests: requests::RequestsService,
    pub reconciler: reconciler::ReconcilerService,
    pub inventory: inventory::InventoryService,
    pub reviews: reviews::ReviewsService,
    pub stats: stats::StatsService,
}

impl Services {
    /// Create all services sharing the given gateway and cache store
    pub fn new(gateway: Arc<dyn BackendClient>, store: CacheStore) -> Self {
        let requests = requests::RequestsService::new(gateway.clone(), store.clone());
        Self {
            reconciler: reconciler::ReconcilerService::new(
                gateway.clone(),
                store.clone(),
                requests.clone(),
            ),
            inventory: inventory::InventoryService::new(gateway.clone(), store.clone()),
            reviews: reviews::ReviewsService::new(gateway, store),
            stats: stats::StatsService::new(requests.clone()),
            requests,
        }
    }
}
