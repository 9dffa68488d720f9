//! TOML draft files: what the command line fills into the wizard.
//!
//! Every key is optional. Keys that are present overwrite the draft; the
//! rest keep the template (create) or the stored node's values (edit).
//! Blocks are JSON text, exactly as typed into the editor.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::assembler::NodeDraft;
use crate::document::Block;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DraftFile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub farm: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_master: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mac_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub master_mac_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wifi_ssid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wifi_password: Option<String>,
    #[serde(default)]
    pub blocks: DraftBlocks,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DraftBlocks {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pins: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sensors: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logic: Option<String>,
}

impl DraftBlocks {
    fn get(&self, block: Block) -> Option<&str> {
        match block {
            Block::Pins => self.pins.as_deref(),
            Block::Sensors => self.sensors.as_deref(),
            Block::Network => self.network.as_deref(),
            Block::Logic => self.logic.as_deref(),
        }
    }
}

impl DraftFile {
    pub fn load(path: &str) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read draft: {path}"))?;
        Self::parse(&contents).with_context(|| format!("invalid draft: {path}"))
    }

    pub fn parse(contents: &str) -> Result<Self> {
        toml::from_str(contents).context("failed to parse draft")
    }

    /// A complete draft file for a new node, blocks pre-filled.
    pub fn template(draft: &NodeDraft) -> Result<String> {
        let f = &draft.fields;
        let file = DraftFile {
            farm: Some("FARM001".into()),
            zone: Some("ZONE01".into()),
            node_id: Some("NODE01".into()),
            is_master: Some(f.is_master),
            mac_address: Some(String::new()),
            master_mac_address: Some(String::new()),
            wifi_ssid: Some(f.wifi_ssid.clone()),
            wifi_password: Some(f.wifi_password.clone()),
            blocks: DraftBlocks {
                pins: Some(draft.blocks.pins.clone()),
                sensors: Some(draft.blocks.sensors.clone()),
                network: Some(draft.blocks.network.clone()),
                logic: Some(draft.blocks.logic.clone()),
            },
        };
        toml::to_string(&file).context("failed to render draft template")
    }

    /// Overwrite the draft with every key present in the file. Farm and
    /// zone are not touched; the wizard owns them.
    pub fn apply_to(&self, draft: &mut NodeDraft) {
        let fields = &mut draft.fields;
        let set = |slot: &mut String, value: &Option<String>| {
            if let Some(v) = value {
                slot.clone_from(v);
            }
        };
        set(&mut fields.node_id, &self.node_id);
        set(&mut fields.mac_address, &self.mac_address);
        set(&mut fields.master_mac_address, &self.master_mac_address);
        set(&mut fields.wifi_ssid, &self.wifi_ssid);
        set(&mut fields.wifi_password, &self.wifi_password);
        if let Some(is_master) = self.is_master {
            fields.is_master = is_master;
        }

        for block in Block::ALL {
            if let Some(text) = self.blocks.get(block) {
                draft.blocks.set(block, text);
            }
        }
    }
}
