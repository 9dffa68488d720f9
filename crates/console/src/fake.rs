//! In-memory backend for unit tests. Mirrors the real service's duplicate
//! and not-found rejections and counts calls per operation.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::api::{ManagementApi, NodeApi};
use crate::error::{ConsoleError, ConsoleResult};
use crate::model::{Farm, NodeConfiguration, Zone};

#[derive(Default)]
struct FakeState {
    farms: Vec<Farm>,
    zones: Vec<Zone>,
    nodes: Vec<NodeConfiguration>,
    calls: HashMap<&'static str, usize>,
    fail_next: Option<ConsoleError>,
    updated_keys: Vec<String>,
}

#[derive(Default)]
pub(crate) struct FakeBackend {
    state: Mutex<FakeState>,
}

impl FakeBackend {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_farm(self, farm_id: &str, name: &str) -> Self {
        self.state.lock().unwrap().farms.push(Farm {
            farm_id: farm_id.into(),
            name: name.into(),
        });
        self
    }

    pub(crate) fn with_zone(self, farm_id: &str, zone_id: &str) -> Self {
        self.insert_zone(farm_id, zone_id);
        self
    }

    pub(crate) fn with_node(self, doc: NodeConfiguration) -> Self {
        self.state.lock().unwrap().nodes.push(doc);
        self
    }

    /// Simulates another client writing behind our back.
    pub(crate) fn insert_zone(&self, farm_id: &str, zone_id: &str) {
        self.state.lock().unwrap().zones.push(Zone {
            zone_id: zone_id.into(),
            name: zone_id.into(),
            farm_id: Some(farm_id.into()),
        });
    }

    /// The next call, whatever it is, fails with `err`.
    pub(crate) fn fail_next(&self, err: ConsoleError) {
        self.state.lock().unwrap().fail_next = Some(err);
    }

    pub(crate) fn calls(&self, op: &str) -> usize {
        self.state.lock().unwrap().calls.get(op).copied().unwrap_or(0)
    }

    pub(crate) fn total_calls(&self) -> usize {
        self.state.lock().unwrap().calls.values().sum()
    }

    pub(crate) fn nodes(&self) -> Vec<NodeConfiguration> {
        self.state.lock().unwrap().nodes.clone()
    }

    pub(crate) fn updated_keys(&self) -> Vec<String> {
        self.state.lock().unwrap().updated_keys.clone()
    }

    fn enter(&self, op: &'static str) -> ConsoleResult<std::sync::MutexGuard<'_, FakeState>> {
        let mut st = self.state.lock().unwrap();
        *st.calls.entry(op).or_insert(0) += 1;
        let failure = st.fail_next.take();
        match failure {
            Some(err) => Err(err),
            None => Ok(st),
        }
    }
}

impl ManagementApi for FakeBackend {
    async fn list_farms(&self) -> ConsoleResult<Vec<Farm>> {
        Ok(self.enter("list_farms")?.farms.clone())
    }

    async fn list_zones(&self, farm_id: &str) -> ConsoleResult<Vec<Zone>> {
        let st = self.enter("list_zones")?;
        Ok(st
            .zones
            .iter()
            .filter(|z| z.farm_id.as_deref() == Some(farm_id))
            .cloned()
            .collect())
    }

    async fn create_farm(&self, farm: &Farm) -> ConsoleResult<Farm> {
        let mut st = self.enter("create_farm")?;
        if st.farms.iter().any(|f| f.farm_id == farm.farm_id) {
            return Err(ConsoleError::Rejected(format!(
                "Farm {} already exists",
                farm.farm_id
            )));
        }
        st.farms.push(farm.clone());
        Ok(farm.clone())
    }

    async fn create_zone(&self, farm_id: &str, zone: &Zone) -> ConsoleResult<Zone> {
        let mut st = self.enter("create_zone")?;
        let exists = st
            .zones
            .iter()
            .any(|z| z.zone_id == zone.zone_id && z.farm_id.as_deref() == Some(farm_id));
        if exists {
            return Err(ConsoleError::Rejected(format!(
                "Zone {} already exists in {farm_id}",
                zone.zone_id
            )));
        }
        let stored = Zone {
            farm_id: Some(farm_id.to_string()),
            ..zone.clone()
        };
        st.zones.push(stored.clone());
        Ok(stored)
    }
}

impl NodeApi for FakeBackend {
    async fn list_nodes(&self) -> ConsoleResult<Vec<NodeConfiguration>> {
        Ok(self.enter("list_nodes")?.nodes.clone())
    }

    async fn create_node(&self, doc: &NodeConfiguration) -> ConsoleResult<NodeConfiguration> {
        let mut st = self.enter("create_node")?;
        let id = &doc.identity.node_id;
        if st.nodes.iter().any(|n| &n.identity.node_id == id) {
            return Err(ConsoleError::Rejected(format!("Node {id} already exists")));
        }
        st.nodes.push(doc.clone());
        Ok(doc.clone())
    }

    async fn update_node(
        &self,
        node_id: &str,
        doc: &NodeConfiguration,
    ) -> ConsoleResult<NodeConfiguration> {
        let mut st = self.enter("update_node")?;
        st.updated_keys.push(node_id.to_string());
        let Some(slot) = st.nodes.iter_mut().find(|n| n.identity.node_id == node_id) else {
            return Err(ConsoleError::Rejected(format!("Node {node_id} not found")));
        };
        *slot = doc.clone();
        Ok(doc.clone())
    }

    async fn delete_node(&self, node_id: &str) -> ConsoleResult<()> {
        let mut st = self.enter("delete_node")?;
        let before = st.nodes.len();
        st.nodes.retain(|n| n.identity.node_id != node_id);
        if st.nodes.len() == before {
            return Err(ConsoleError::Rejected(format!("Node {node_id} not found")));
        }
        Ok(())
    }
}
