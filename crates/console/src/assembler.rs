//! Draft state for one node and the merge that turns it into the canonical
//! `NodeConfiguration`.
//!
//! Merge rules:
//! - `network.master_mac` is the node's own MAC for a master (unset when
//!   empty) and the master's MAC for a follower (even when empty).
//! - WiFi credentials come from their own fields, never from the network
//!   block.
//! - `calibration` is always the default.
//! - `master_mac_address` exists only on followers.

use thiserror::Error;

use crate::config::DraftDefaults;
use crate::document::{self, BlockErrors, BlockTexts, ParsedBlocks};
use crate::model::{
    default_pins, Calibration, LogicConfig, NetworkConfig, NodeConfiguration, NodeIdentity,
    SensorsConfig,
};

/// Trim and upper-case an identifier or MAC address.
pub fn normalize_id(raw: &str) -> String {
    raw.trim().to_uppercase()
}

// ---------------------------------------------------------------------------
// Draft
// ---------------------------------------------------------------------------

/// Discrete form fields edited outside the JSON blocks.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NodeFields {
    pub farm_id: String,
    pub zone_id: String,
    pub node_id: String,
    pub is_master: bool,
    pub mac_address: String,
    pub master_mac_address: String,
    pub wifi_ssid: String,
    pub wifi_password: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeDraft {
    pub fields: NodeFields,
    pub blocks: BlockTexts,
}

impl NodeDraft {
    /// A blank follower draft pre-filled with the reference templates.
    pub fn from_defaults(defaults: &DraftDefaults) -> Self {
        Self {
            fields: NodeFields {
                wifi_ssid: defaults.wifi_ssid.clone(),
                wifi_password: defaults.wifi_password.clone(),
                ..NodeFields::default()
            },
            blocks: BlockTexts {
                pins: document::render_block(&default_pins()),
                sensors: document::render_block(&SensorsConfig::template()),
                network: document::render_block(&NetworkConfig::template(
                    &defaults.mqtt_broker,
                    defaults.mqtt_port,
                )),
                logic: document::render_block(&LogicConfig::template()),
            },
        }
    }

    /// Decompose an existing document for editing. The network block is
    /// shown without WiFi credentials; those fall back to `defaults` when
    /// the document has none.
    pub fn from_existing(doc: &NodeConfiguration, defaults: &DraftDefaults) -> Self {
        let fields = NodeFields {
            farm_id: doc.identity.farm_id.clone(),
            zone_id: doc.identity.zone_id.clone(),
            node_id: doc.identity.node_id.clone(),
            is_master: doc.identity.is_master,
            mac_address: doc.mac_address.clone(),
            master_mac_address: doc.master_mac_address.clone().unwrap_or_default(),
            wifi_ssid: non_empty(&doc.network.wifi_ssid)
                .unwrap_or(defaults.wifi_ssid.as_str())
                .to_string(),
            wifi_password: non_empty(&doc.network.wifi_password)
                .unwrap_or(defaults.wifi_password.as_str())
                .to_string(),
        };

        Self {
            fields,
            blocks: BlockTexts {
                pins: document::render_block(&doc.pins),
                sensors: document::render_block(&doc.sensors_config),
                network: document::render_block(&doc.network.without_wifi()),
                logic: document::render_block(&doc.logic),
            },
        }
    }

    /// Validate and merge into a fresh document.
    pub fn assemble(&self) -> Result<NodeConfiguration, AssemblyError> {
        let parsed = document::parse_all(&self.blocks).map_err(AssemblyError::Blocks)?;

        if self.fields.mac_address.trim().is_empty() {
            return Err(AssemblyError::MissingMacAddress);
        }
        if !self.fields.is_master && self.fields.master_mac_address.trim().is_empty() {
            return Err(AssemblyError::MissingMasterMac);
        }

        Ok(merge(&self.fields, parsed))
    }
}

fn non_empty(v: &Option<String>) -> Option<&str> {
    v.as_deref().filter(|s| !s.is_empty())
}

/// The pure merge step; inputs are assumed valid.
pub fn merge(fields: &NodeFields, parsed: ParsedBlocks) -> NodeConfiguration {
    let mac_address = normalize_id(&fields.mac_address);
    let master_mac_address = normalize_id(&fields.master_mac_address);

    let master_mac = if fields.is_master {
        Some(mac_address.clone()).filter(|m| !m.is_empty())
    } else {
        Some(master_mac_address.clone())
    };

    let network = NetworkConfig {
        wifi_ssid: Some(fields.wifi_ssid.clone()),
        wifi_password: Some(fields.wifi_password.clone()),
        master_mac,
        ..parsed.network
    };

    NodeConfiguration {
        identity: NodeIdentity {
            farm_id: fields.farm_id.clone(),
            zone_id: fields.zone_id.clone(),
            node_id: normalize_id(&fields.node_id),
            is_master: fields.is_master,
        },
        pins: parsed.pins,
        sensors_config: parsed.sensors,
        calibration: Calibration::default(),
        network,
        logic: parsed.logic,
        mac_address,
        master_mac_address: (!fields.is_master).then_some(master_mac_address),
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AssemblyError {
    /// One or more JSON blocks failed; every failing block is listed.
    #[error("{0}")]
    Blocks(BlockErrors),
    #[error("the node MAC address is required")]
    MissingMacAddress,
    #[error("a follower node requires its master's MAC address")]
    MissingMasterMac,
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Block;

    fn follower_draft() -> NodeDraft {
        let mut draft = NodeDraft::from_defaults(&DraftDefaults {
            wifi_ssid: "greenhouse".into(),
            wifi_password: "longenough".into(),
            ..DraftDefaults::default()
        });
        draft.fields.farm_id = "FARM001".into();
        draft.fields.zone_id = "ZONE01".into();
        draft.fields.node_id = " node_01 ".into();
        draft.fields.mac_address = "11:22:33:44:55:66".into();
        draft.fields.master_mac_address = " 80:b5:4e:c3:23:d4 ".into();
        draft
    }

    fn master_draft() -> NodeDraft {
        let mut draft = follower_draft();
        draft.fields.is_master = true;
        draft.fields.mac_address = "80:b5:4e:c3:23:d4".into();
        draft.fields.master_mac_address = String::new();
        draft
    }

    #[test]
    fn master_mac_derived_from_own_mac() {
        let doc = master_draft().assemble().unwrap();
        assert_eq!(doc.network.master_mac.as_deref(), Some("80:B5:4E:C3:23:D4"));
        assert_eq!(doc.master_mac_address, None);

        let json = serde_json::to_value(&doc).unwrap();
        assert!(json.get("master_mac_address").is_none());
    }

    #[test]
    fn follower_references_master() {
        let doc = follower_draft().assemble().unwrap();
        assert_eq!(doc.network.master_mac.as_deref(), Some("80:B5:4E:C3:23:D4"));
        assert_eq!(doc.master_mac_address.as_deref(), Some("80:B5:4E:C3:23:D4"));
        assert_eq!(doc.mac_address, "11:22:33:44:55:66");
        assert_eq!(doc.identity.node_id, "NODE_01");
        assert!(!doc.identity.is_master);
    }

    #[test]
    fn master_mac_unset_when_merged_with_empty_mac() {
        let mut fields = master_draft().fields;
        fields.mac_address = "  ".into();
        let parsed = document::parse_all(&master_draft().blocks).unwrap();
        let doc = merge(&fields, parsed);
        assert_eq!(doc.network.master_mac, None);
    }

    #[test]
    fn follower_master_mac_set_even_when_empty() {
        let mut fields = follower_draft().fields;
        fields.master_mac_address = String::new();
        let parsed = document::parse_all(&follower_draft().blocks).unwrap();
        let doc = merge(&fields, parsed);
        assert_eq!(doc.network.master_mac.as_deref(), Some(""));
        assert_eq!(doc.master_mac_address.as_deref(), Some(""));
    }

    #[test]
    fn wifi_fields_override_network_block() {
        let mut draft = follower_draft();
        draft.blocks.network =
            r#"{"enableMqtt": false, "wifi_ssid": "stale", "wifi_password": "stale-pass"}"#.into();
        let doc = draft.assemble().unwrap();
        assert_eq!(doc.network.wifi_ssid.as_deref(), Some("greenhouse"));
        assert_eq!(doc.network.wifi_password.as_deref(), Some("longenough"));
    }

    #[test]
    fn calibration_is_always_default() {
        let doc = follower_draft().assemble().unwrap();
        assert_eq!(doc.calibration, Calibration::default());
    }

    #[test]
    fn missing_mac_rejected() {
        let mut draft = follower_draft();
        draft.fields.mac_address = "   ".into();
        assert_eq!(draft.assemble().unwrap_err(), AssemblyError::MissingMacAddress);
    }

    #[test]
    fn follower_without_master_mac_rejected() {
        let mut draft = follower_draft();
        draft.fields.master_mac_address = " ".into();
        assert_eq!(draft.assemble().unwrap_err(), AssemblyError::MissingMasterMac);
    }

    #[test]
    fn assembly_errors_read_as_operator_messages() {
        let mut draft = follower_draft();
        draft.blocks.pins = "{".into();
        draft.blocks.logic = "[]".into();
        assert_eq!(
            draft.assemble().unwrap_err().to_string(),
            "fix the JSON errors in: pins, logic"
        );
        assert_eq!(
            AssemblyError::MissingMasterMac.to_string(),
            "a follower node requires its master's MAC address"
        );
    }

    #[test]
    fn master_never_requires_master_mac() {
        let mut draft = master_draft();
        draft.fields.master_mac_address = String::new();
        draft.assemble().unwrap();
    }

    #[test]
    fn block_errors_take_precedence_over_field_errors() {
        let mut draft = follower_draft();
        draft.fields.mac_address = String::new();
        draft.blocks.sensors = "{".into();
        draft.blocks.logic = "[]".into();
        match draft.assemble().unwrap_err() {
            AssemblyError::Blocks(errors) => {
                assert_eq!(errors.blocks(), vec![Block::Sensors, Block::Logic])
            }
            other => panic!("expected block errors, got {other:?}"),
        }
    }

    #[test]
    fn master_mac_round_trip_is_stable() {
        let defaults = DraftDefaults::default();
        let first = master_draft().assemble().unwrap();

        let redrafted = NodeDraft::from_existing(&first, &defaults);
        let second = redrafted.assemble().unwrap();

        assert_eq!(second.network.master_mac, first.network.master_mac);
        assert_eq!(second, first);
    }

    #[test]
    fn follower_round_trip_is_stable() {
        let first = follower_draft().assemble().unwrap();
        let second = NodeDraft::from_existing(&first, &DraftDefaults::default())
            .assemble()
            .unwrap();
        assert_eq!(second, first);
    }

    #[test]
    fn fractional_lora_frequency_round_trips() {
        let mut draft = follower_draft();
        draft.blocks.network = r#"{"enableLora": true, "lora_freq_mhz": 868.1}"#.into();
        let first = draft.assemble().unwrap();
        assert_eq!(first.network.lora_freq_mhz, Some(868.1));

        let second = NodeDraft::from_existing(&first, &DraftDefaults::default())
            .assemble()
            .unwrap();
        assert_eq!(second.network.lora_freq_mhz, Some(868.1));
        assert_eq!(second, first);
    }

    #[test]
    fn edit_draft_hides_wifi_from_network_block() {
        let doc = follower_draft().assemble().unwrap();
        let draft = NodeDraft::from_existing(&doc, &DraftDefaults::default());
        assert!(!draft.blocks.network.contains("wifi_ssid"));
        assert!(!draft.blocks.network.contains("wifi_password"));
        assert_eq!(draft.fields.wifi_ssid, "greenhouse");
        assert_eq!(draft.fields.master_mac_address, "80:B5:4E:C3:23:D4");
    }

    #[test]
    fn edit_draft_falls_back_to_default_wifi() {
        let mut doc = follower_draft().assemble().unwrap();
        doc.network.wifi_ssid = None;
        doc.network.wifi_password = Some(String::new());
        let defaults = DraftDefaults {
            wifi_ssid: "fallback".into(),
            wifi_password: "fallback-pass".into(),
            ..DraftDefaults::default()
        };
        let draft = NodeDraft::from_existing(&doc, &defaults);
        assert_eq!(draft.fields.wifi_ssid, "fallback");
        assert_eq!(draft.fields.wifi_password, "fallback-pass");
    }

    #[test]
    fn unknown_block_keys_preserved() {
        let mut draft = follower_draft();
        draft.blocks.logic = r#"{"send_times": [], "rain_delay_h": 12}"#.into();
        let doc = draft.assemble().unwrap();
        assert_eq!(
            doc.logic.extra.get("rain_delay_h"),
            Some(&serde_json::json!(12))
        );
    }
}
