//! TOML config file loading and validation for the backend connection and
//! the defaults new node drafts start from.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::Path;

// ---------------------------------------------------------------------------
// Config file structures
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub defaults: DraftDefaults,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

/// Values a new node draft is pre-filled with.
#[derive(Debug, Clone, Deserialize)]
pub struct DraftDefaults {
    #[serde(default)]
    pub wifi_ssid: String,
    #[serde(default)]
    pub wifi_password: String,
    #[serde(default = "default_mqtt_broker")]
    pub mqtt_broker: String,
    #[serde(default = "default_mqtt_port")]
    pub mqtt_port: u16,
}

fn default_base_url() -> String {
    "http://localhost:5000".to_string()
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_mqtt_broker() -> String {
    "192.168.1.71".to_string()
}

fn default_mqtt_port() -> u16 {
    1883
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for DraftDefaults {
    fn default() -> Self {
        Self {
            wifi_ssid: String::new(),
            wifi_password: String::new(),
            mqtt_broker: default_mqtt_broker(),
            mqtt_port: default_mqtt_port(),
        }
    }
}

// ---------------------------------------------------------------------------
// WiFi limits (802.11 / WPA2-PSK)
// ---------------------------------------------------------------------------

const MAX_SSID_BYTES: usize = 32;
const MIN_PSK_BYTES: usize = 8;
const MAX_PSK_BYTES: usize = 63;

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

impl Config {
    /// Validate every section. Returns `Ok(())` or an error describing
    /// every violation found (not just the first one).
    pub fn validate(&self) -> Result<()> {
        let mut errors: Vec<String> = Vec::new();

        self.validate_api(&mut errors);
        self.validate_defaults(&mut errors);

        if errors.is_empty() {
            Ok(())
        } else {
            bail!(
                "config validation failed ({} error{}):\n  - {}",
                errors.len(),
                if errors.len() == 1 { "" } else { "s" },
                errors.join("\n  - ")
            );
        }
    }

    fn validate_api(&self, errors: &mut Vec<String>) {
        let url = self.api.base_url.trim();
        if url.is_empty() {
            errors.push("api.base_url is empty".to_string());
        } else if !(url.starts_with("http://") || url.starts_with("https://")) {
            errors.push(format!(
                "api.base_url '{url}' must start with http:// or https://"
            ));
        }

        if self.api.timeout_secs == 0 {
            errors.push("api.timeout_secs must be positive".to_string());
        }
    }

    fn validate_defaults(&self, errors: &mut Vec<String>) {
        let d = &self.defaults;

        if d.wifi_ssid.len() > MAX_SSID_BYTES {
            errors.push(format!(
                "defaults.wifi_ssid is {} bytes, at most {MAX_SSID_BYTES} allowed",
                d.wifi_ssid.len()
            ));
        }

        // Empty means an open network.
        let psk = d.wifi_password.len();
        if psk != 0 && !(MIN_PSK_BYTES..=MAX_PSK_BYTES).contains(&psk) {
            errors.push(format!(
                "defaults.wifi_password is {psk} bytes, \
                 must be empty or {MIN_PSK_BYTES}-{MAX_PSK_BYTES}"
            ));
        }

        if d.mqtt_broker.trim().is_empty() {
            errors.push("defaults.mqtt_broker is empty".to_string());
        }
        if d.mqtt_port == 0 {
            errors.push("defaults.mqtt_port must be non-zero".to_string());
        }
    }

    /// Apply `API_URL` on top of the file.
    pub fn apply_env(&mut self) {
        if let Ok(url) = std::env::var("API_URL") {
            if !url.trim().is_empty() {
                self.api.base_url = url;
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Load
// ---------------------------------------------------------------------------

/// Read, parse, and validate a TOML config file.
pub fn load(path: &str) -> Result<Config> {
    let contents =
        std::fs::read_to_string(path).with_context(|| format!("failed to read config: {path}"))?;
    parse(&contents).with_context(|| format!("invalid config: {path}"))
}

/// Like [`load`], but a missing file yields the built-in defaults.
pub fn load_or_default(path: &str) -> Result<Config> {
    if Path::new(path).exists() {
        load(path)
    } else {
        tracing::info!(path, "no config file, using defaults");
        Ok(Config::default())
    }
}

fn parse(contents: &str) -> Result<Config> {
    let config: Config = toml::from_str(contents).context("failed to parse config")?;
    config.validate()?;
    Ok(config)
}

// ===========================================================================
// Tests
// ===========================================================================
