//! Backend services the console consumes. `HttpClient` is the production
//! implementation; tests swap in an in-memory backend.

#![allow(async_fn_in_trait)]

use crate::error::ConsoleResult;
use crate::model::{Farm, NodeConfiguration, Zone};

/// Farm/zone hierarchy service.
pub trait ManagementApi {
    async fn list_farms(&self) -> ConsoleResult<Vec<Farm>>;

    async fn list_zones(&self, farm_id: &str) -> ConsoleResult<Vec<Zone>>;

    /// Returns the farm as stored by the backend.
    async fn create_farm(&self, farm: &Farm) -> ConsoleResult<Farm>;

    /// Returns the zone as stored by the backend.
    async fn create_zone(&self, farm_id: &str, zone: &Zone) -> ConsoleResult<Zone>;
}

/// Node configuration service.
pub trait NodeApi {
    async fn list_nodes(&self) -> ConsoleResult<Vec<NodeConfiguration>>;

    async fn create_node(&self, doc: &NodeConfiguration) -> ConsoleResult<NodeConfiguration>;

    async fn update_node(
        &self,
        node_id: &str,
        doc: &NodeConfiguration,
    ) -> ConsoleResult<NodeConfiguration>;

    async fn delete_node(&self, node_id: &str) -> ConsoleResult<()>;
}
