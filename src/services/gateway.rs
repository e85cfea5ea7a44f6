use std::sync::Arc;

use crate::db::store::GatewayStore;
use crate::models::gateway::{GatewayInstance, GatewayStatus};

/// Pick the single instance a studio sends through: the first connected
/// one, else the first created one, else the most recently created.
pub fn select_active(instances: &[GatewayInstance]) -> Option<&GatewayInstance> {
    instances
        .iter()
        .find(|i| i.status() == Some(GatewayStatus::Connected))
        .or_else(|| instances.iter().find(|i| i.status() == Some(GatewayStatus::Created)))
        .or_else(|| instances.iter().max_by_key(|i| i.created_at))
}

#[derive(Clone)]
pub struct GatewayResolver {
    store: Arc<dyn GatewayStore>,
}

impl GatewayResolver {
    pub fn new(store: Arc<dyn GatewayStore>) -> Self {
        Self { store }
    }

    pub async fn active_gateway(&self, tenant: &str) -> anyhow::Result<Option<GatewayInstance>> {
        let instances = self.store.instances(tenant).await?;
        Ok(select_active(&instances).cloned())
    }
}
