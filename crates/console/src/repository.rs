//! The operator's node list: an ordered collection keyed by node id.

use std::fmt;

use tracing::info;

use crate::api::NodeApi;
use crate::error::ConsoleResult;
use crate::model::NodeConfiguration;
use crate::wizard::WizardOutcome;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upsert {
    Inserted,
    Replaced,
}

#[derive(Debug, Clone, Default)]
pub struct NodeRepository {
    nodes: Vec<NodeConfiguration>,
}

impl NodeRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch every node from the backend, replacing the local list.
    pub async fn load<A: NodeApi>(api: &A) -> ConsoleResult<Self> {
        let nodes = api.list_nodes().await?;
        info!(nodes = nodes.len(), "nodes loaded");
        Ok(Self { nodes })
    }

    /// Replace the node with the same id in place, or append it.
    pub fn upsert(&mut self, doc: NodeConfiguration) -> Upsert {
        let key = &doc.identity.node_id;
        match self.nodes.iter_mut().find(|n| &n.identity.node_id == key) {
            Some(slot) => {
                *slot = doc;
                Upsert::Replaced
            }
            None => {
                self.nodes.push(doc);
                Upsert::Inserted
            }
        }
    }

    pub fn remove(&mut self, node_id: &str) -> Option<NodeConfiguration> {
        let idx = self.nodes.iter().position(|n| n.identity.node_id == node_id)?;
        Some(self.nodes.remove(idx))
    }

    pub fn get(&self, node_id: &str) -> Option<&NodeConfiguration> {
        self.nodes.iter().find(|n| n.identity.node_id == node_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &NodeConfiguration> {
        self.nodes.iter()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Delete on the backend first; the local entry goes only on success.
    pub async fn delete<A: NodeApi>(&mut self, api: &A, node_id: &str) -> ConsoleResult<()> {
        api.delete_node(node_id).await?;
        self.remove(node_id);
        info!(node_id, "node deleted");
        Ok(())
    }

    pub fn apply(&mut self, outcome: WizardOutcome) -> Option<Upsert> {
        match outcome {
            WizardOutcome::Saved(doc) => Some(self.upsert(doc)),
            WizardOutcome::Cancelled => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Listing summary
// ---------------------------------------------------------------------------

/// One node as shown in the list view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeSummary {
    pub node_id: String,
    pub farm_id: String,
    pub zone_id: String,
    pub is_master: bool,
    pub mac_address: String,
    pub master_mac_address: Option<String>,
    pub pin_count: usize,
    pub wifi_ssid: String,
    pub thresholds: String,
}

impl From<&NodeConfiguration> for NodeSummary {
    fn from(doc: &NodeConfiguration) -> Self {
        Self {
            node_id: doc.identity.node_id.clone(),
            farm_id: doc.identity.farm_id.clone(),
            zone_id: doc.identity.zone_id.clone(),
            is_master: doc.identity.is_master,
            mac_address: doc.mac_address.clone(),
            master_mac_address: if doc.identity.is_master {
                None
            } else {
                Some(doc.master_mac_address.clone().unwrap_or_default())
            },
            pin_count: doc.pins.len(),
            wifi_ssid: doc.network.wifi_ssid.clone().unwrap_or_default(),
            thresholds: doc.logic.threshold_summary(),
        }
    }
}

impl fmt::Display for NodeSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let role = if self.is_master { "master" } else { "follower" };
        write!(
            f,
            "{} [{}/{}] {role} mac={}",
            self.node_id, self.farm_id, self.zone_id, self.mac_address
        )?;
        if let Some(master) = &self.master_mac_address {
            write!(f, " master={master}")?;
        }
        let ssid = if self.wifi_ssid.is_empty() { "-" } else { &self.wifi_ssid };
        write!(
            f,
            " pins={} wifi={ssid} humidity={}",
            self.pin_count, self.thresholds
        )
    }
}
