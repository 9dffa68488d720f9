//! Wire types shared with the backend: the farm/zone hierarchy and the
//! canonical node configuration document.
//!
//! Sub-document records name the keys the firmware understands and keep
//! anything else in a flattened `extra` map, so unknown keys written by
//! newer firmware survive an edit round-trip.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Unknown keys carried through untouched.
pub type Extra = BTreeMap<String, Value>;

/// Logical pin name -> GPIO number.
pub type Pins = BTreeMap<String, i64>;

// ---------------------------------------------------------------------------
// Hierarchy
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Farm {
    pub farm_id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Zone {
    pub zone_id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub farm_id: Option<String>,
}

// ---------------------------------------------------------------------------
// Node configuration document
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeConfiguration {
    pub identity: NodeIdentity,
    #[serde(default)]
    pub pins: Pins,
    #[serde(default)]
    pub sensors_config: SensorsConfig,
    #[serde(default)]
    pub calibration: Calibration,
    #[serde(default)]
    pub network: NetworkConfig,
    #[serde(default)]
    pub logic: LogicConfig,
    #[serde(default)]
    pub mac_address: String,
    /// Only followers carry this; masters omit the key entirely.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub master_mac_address: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeIdentity {
    pub farm_id: String,
    pub zone_id: String,
    pub node_id: String,
    #[serde(default)]
    pub is_master: bool,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SensorsConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature_sensor: Option<TemperatureSensor>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub soil_humidity_sensors: Vec<SoilHumiditySensor>,
    #[serde(flatten)]
    pub extra: Extra,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TemperatureSensor {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pin: Option<i64>,
    #[serde(flatten)]
    pub extra: Extra,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SoilHumiditySensor {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sensor_pin: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub power_pin: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dry_value: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wet_value: Option<i64>,
    #[serde(flatten)]
    pub extra: Extra,
}

/// Soil probe calibration. Not operator-editable yet: every assembled
/// document carries the default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Calibration {
    pub soil_dry: i64,
    pub soil_wet: i64,
}

impl Default for Calibration {
    fn default() -> Self {
        Self {
            soil_dry: 3100,
            soil_wet: 1200,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct NetworkConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub master_mac: Option<String>,
    #[serde(rename = "enableESPNow", default)]
    pub enable_esp_now: bool,
    #[serde(rename = "enableLora", default)]
    pub enable_lora: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lora_freq_mhz: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lora_node_addr: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lora_peer_addr: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lora_channel: Option<i64>,
    #[serde(rename = "enableMqtt", default)]
    pub enable_mqtt: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mqtt_broker: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mqtt_port: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mqtt_user: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mqtt_pass: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic_telemetry_up: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic_commands_down: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wifi_ssid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wifi_password: Option<String>,
    #[serde(flatten)]
    pub extra: Extra,
}

impl NetworkConfig {
    /// The block as the operator edits it: WiFi credentials live in their
    /// own fields and are stripped here.
    pub fn without_wifi(&self) -> NetworkConfig {
        NetworkConfig {
            wifi_ssid: None,
            wifi_password: None,
            ..self.clone()
        }
    }

    /// Ranges the firmware accepts, and concrete MQTT publish topics.
    pub fn check(&self) -> Result<(), String> {
        if let Some(freq) = self.lora_freq_mhz {
            if !(freq.is_finite() && freq > 0.0) {
                return Err(format!("lora_freq_mhz {freq} must be a positive frequency"));
            }
        }
        let ranged = [
            ("lora_node_addr", self.lora_node_addr, 0..=0xFFFF),
            ("lora_peer_addr", self.lora_peer_addr, 0..=0xFFFF),
            ("lora_channel", self.lora_channel, 0..=0xFF),
            ("mqtt_port", self.mqtt_port, 0..=0xFFFF),
        ];
        for (key, value, range) in ranged {
            if let Some(v) = value {
                if !range.contains(&v) {
                    return Err(format!(
                        "{key} {v} out of range [{}, {}]",
                        range.start(),
                        range.end()
                    ));
                }
            }
        }

        if !self.enable_mqtt {
            return Ok(());
        }
        let topics = [
            ("topic_telemetry_up", &self.topic_telemetry_up),
            ("topic_commands_down", &self.topic_commands_down),
        ];
        for (key, topic) in topics {
            if let Some(t) = topic {
                if t.contains('+') || t.contains('#') {
                    return Err(format!("{key} '{t}' must not contain MQTT wildcards"));
                }
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct LogicConfig {
    #[serde(
        rename = "humidity_thresholdMin",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub humidity_threshold_min: Option<f64>,
    #[serde(
        rename = "humidity_thresholdMax",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub humidity_threshold_max: Option<f64>,
    /// Older firmware used a single threshold.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub humidity_threshold: Option<f64>,
    #[serde(
        rename = "defaultIrrigationDurationMs",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub default_irrigation_duration_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub send_times: Vec<SendTime>,
    #[serde(flatten)]
    pub extra: Extra,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendTime {
    pub hour: i64,
    pub minute: i64,
}

impl LogicConfig {
    pub fn check(&self) -> Result<(), String> {
        for (i, t) in self.send_times.iter().enumerate() {
            if !(0..=23).contains(&t.hour) {
                return Err(format!("send_times[{i}]: hour {} out of range [0, 23]", t.hour));
            }
            if !(0..=59).contains(&t.minute) {
                return Err(format!(
                    "send_times[{i}]: minute {} out of range [0, 59]",
                    t.minute
                ));
            }
        }
        Ok(())
    }

    /// "45%" for the legacy single threshold, otherwise "20% / 80%".
    pub fn threshold_summary(&self) -> String {
        if let Some(t) = self.humidity_threshold {
            return format!("{t}%");
        }
        let part = |v: Option<f64>| v.map_or_else(|| "N/A".to_string(), |v| v.to_string());
        format!(
            "{}% / {}%",
            part(self.humidity_threshold_min),
            part(self.humidity_threshold_max)
        )
    }
}

// ---------------------------------------------------------------------------
// Draft templates (what a brand-new node starts from)
// ---------------------------------------------------------------------------

pub fn default_pins() -> Pins {
    [
        ("led", 48),
        ("led_brightness", 30),
        ("lora_m0", 10),
        ("lora_m1", 9),
        ("lora_aux", 11),
        ("lora_rx", 17),
        ("lora_tx", 18),
        ("valve", 0),
        ("pump", 0),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v))
    .collect()
}

impl SensorsConfig {
    pub fn template() -> Self {
        Self {
            temperature_sensor: Some(TemperatureSensor {
                enabled: false,
                pin: Some(12),
                extra: Extra::new(),
            }),
            soil_humidity_sensors: vec![SoilHumiditySensor {
                enabled: true,
                sensor_pin: Some(4),
                power_pin: Some(5),
                dry_value: Some(3100),
                wet_value: Some(1200),
                extra: Extra::new(),
            }],
            extra: Extra::new(),
        }
    }
}

impl NetworkConfig {
    pub fn template(mqtt_broker: &str, mqtt_port: u16) -> Self {
        Self {
            master_mac: Some(String::new()),
            enable_esp_now: false,
            enable_lora: true,
            lora_freq_mhz: Some(868.0),
            lora_node_addr: Some(2),
            lora_peer_addr: Some(1),
            lora_channel: Some(24),
            enable_mqtt: true,
            mqtt_broker: Some(mqtt_broker.to_string()),
            mqtt_port: Some(i64::from(mqtt_port)),
            mqtt_user: Some(String::new()),
            mqtt_pass: Some(String::new()),
            topic_telemetry_up: Some("farm/telemetry".to_string()),
            topic_commands_down: Some("farm/commands/master/set".to_string()),
            wifi_ssid: None,
            wifi_password: None,
            extra: Extra::new(),
        }
    }
}

impl LogicConfig {
    pub fn template() -> Self {
        Self {
            humidity_threshold_min: Some(20.0),
            humidity_threshold_max: Some(80.0),
            humidity_threshold: None,
            default_irrigation_duration_ms: Some(45_000),
            send_times: vec![
                SendTime { hour: 8, minute: 0 },
                SendTime { hour: 8, minute: 5 },
            ],
            extra: Extra::new(),
        }
    }
}

// ===========================================================================
// Tests
// ===========================================================================
