//! Parsing and validation of the four hand-edited JSON blocks (pins,
//! sensors, network, logic).
//!
//! Each block parses independently into `Result<T, String>`. Errors are
//! collected per block so the operator sees every malformed block at once.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

use crate::model::{LogicConfig, NetworkConfig, Pins, SensorsConfig};

// ---------------------------------------------------------------------------
// Block identity
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Block {
    Pins,
    Sensors,
    Network,
    Logic,
}

impl Block {
    pub const ALL: [Block; 4] = [Block::Pins, Block::Sensors, Block::Network, Block::Logic];

    pub fn label(self) -> &'static str {
        match self {
            Block::Pins => "pins",
            Block::Sensors => "sensors",
            Block::Network => "network",
            Block::Logic => "logic",
        }
    }
}

impl fmt::Display for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// ---------------------------------------------------------------------------
// Raw block texts (what the operator edits)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BlockTexts {
    pub pins: String,
    pub sensors: String,
    pub network: String,
    pub logic: String,
}

impl BlockTexts {
    pub fn get(&self, block: Block) -> &str {
        match block {
            Block::Pins => &self.pins,
            Block::Sensors => &self.sensors,
            Block::Network => &self.network,
            Block::Logic => &self.logic,
        }
    }

    pub fn set(&mut self, block: Block, text: impl Into<String>) {
        let slot = match block {
            Block::Pins => &mut self.pins,
            Block::Sensors => &mut self.sensors,
            Block::Network => &mut self.network,
            Block::Logic => &mut self.logic,
        };
        *slot = text.into();
    }
}

/// Per-block error messages, ordered pins, sensors, network, logic.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BlockErrors(BTreeMap<Block, String>);

impl BlockErrors {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn get(&self, block: Block) -> Option<&str> {
        self.0.get(&block).map(String::as_str)
    }

    pub fn blocks(&self) -> Vec<Block> {
        self.0.keys().copied().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Block, &str)> {
        self.0.iter().map(|(b, m)| (*b, m.as_str()))
    }

    pub fn remove(&mut self, block: Block) {
        self.0.remove(&block);
    }

    fn insert(&mut self, block: Block, msg: String) {
        self.0.insert(block, msg);
    }
}

impl fmt::Display for BlockErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let labels: Vec<&str> = self.0.keys().map(|b| b.label()).collect();
        write!(f, "fix the JSON errors in: {}", labels.join(", "))
    }
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

/// All four blocks, parsed.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedBlocks {
    pub pins: Pins,
    pub sensors: SensorsConfig,
    pub network: NetworkConfig,
    pub logic: LogicConfig,
}

/// Parse one block: well-formed JSON, an object at the top level, and the
/// shape of `T`.
pub fn parse_block<T: DeserializeOwned>(block: Block, text: &str) -> Result<T, String> {
    let value: Value =
        serde_json::from_str(text).map_err(|e| format!("invalid {block} JSON: {e}"))?;
    if !value.is_object() {
        return Err(format!("{block} must be a JSON object"));
    }
    serde_json::from_value(value).map_err(|e| format!("{block}: {e}"))
}

/// Parse every block, accumulating one error per failing block.
pub fn parse_all(texts: &BlockTexts) -> Result<ParsedBlocks, BlockErrors> {
    let mut errors = BlockErrors::default();

    let pins = keep(&mut errors, Block::Pins, parse_block::<Pins>(Block::Pins, &texts.pins));
    let sensors = keep(
        &mut errors,
        Block::Sensors,
        parse_block::<SensorsConfig>(Block::Sensors, &texts.sensors),
    );
    let network = keep(
        &mut errors,
        Block::Network,
        parse_block::<NetworkConfig>(Block::Network, &texts.network)
            .and_then(|n| n.check().map(|()| n).map_err(|e| format!("network: {e}"))),
    );
    let logic = keep(
        &mut errors,
        Block::Logic,
        parse_block::<LogicConfig>(Block::Logic, &texts.logic)
            .and_then(|l| l.check().map(|()| l).map_err(|e| format!("logic: {e}"))),
    );

    match (pins, sensors, network, logic) {
        (Some(pins), Some(sensors), Some(network), Some(logic)) if errors.is_empty() => {
            Ok(ParsedBlocks {
                pins,
                sensors,
                network,
                logic,
            })
        }
        _ => Err(errors),
    }
}

fn keep<T>(errors: &mut BlockErrors, block: Block, parsed: Result<T, String>) -> Option<T> {
    match parsed {
        Ok(v) => Some(v),
        Err(msg) => {
            errors.insert(block, msg);
            None
        }
    }
}

/// Pretty-print a block the way the editor shows it (two-space indent).
pub fn render_block<T: Serialize>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| "{}".to_string())
}

// ===========================================================================
// Tests
// ===========================================================================
