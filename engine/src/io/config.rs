//! Schema files and preference overrides, both TOML.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::core::action::ActionSpec;
use crate::core::preferences::Condition;
use crate::core::timers::{MAX_INTERVAL, MIN_INTERVAL, interval_from_secs};
use crate::core::value::{Value, ValueType};

/// Engine settings under `[engine]`. Missing fields take defaults.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    /// Interval for timed actions that do not declare their own.
    pub default_timer_interval_secs: f64,

    /// Longest single sleep of the `stroll` command between timer checks.
    pub poll_interval_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_timer_interval_secs: 1.0,
            poll_interval_ms: 50,
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<()> {
        if interval_from_secs(self.default_timer_interval_secs).is_none() {
            return Err(anyhow!(
                "engine.default_timer_interval_secs must be between {:?} and {:?}",
                MIN_INTERVAL,
                MAX_INTERVAL
            ));
        }
        if self.poll_interval_ms == 0 {
            return Err(anyhow!("engine.poll_interval_ms must be > 0"));
        }
        Ok(())
    }

    pub fn default_timer_interval(&self) -> Duration {
        interval_from_secs(self.default_timer_interval_secs).unwrap_or(Duration::from_secs(1))
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// `[hot.<tag>]` entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VarDecl {
    #[serde(rename = "type")]
    pub declared: ValueType,
    pub value: Value,
    #[serde(default)]
    pub bulk: bool,
    /// Commit-time check, evaluated like a preference condition.
    #[serde(default)]
    pub check: Option<Condition>,
}

/// `[pref.<tag>]` entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PrefDecl {
    #[serde(rename = "type")]
    pub declared: ValueType,
    pub value: Value,
    #[serde(default)]
    pub condition: Option<Condition>,
    #[serde(default)]
    pub tip: String,
}

/// A complete engine schema.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Schema {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub hot: BTreeMap<String, VarDecl>,
    #[serde(default)]
    pub pref: BTreeMap<String, PrefDecl>,
    #[serde(default)]
    pub action: Vec<ActionSpec>,
    /// Global ordering of passive actions; declaration order when absent.
    #[serde(default)]
    pub passive_order: Option<Vec<String>>,
}

pub fn parse_schema(contents: &str) -> Result<Schema> {
    let schema: Schema = toml::from_str(contents).context("parse schema toml")?;
    schema.engine.validate()?;
    Ok(schema)
}

/// Load a schema from a TOML file. Cross-reference checks happen when the
/// engine is built.
pub fn load_schema(path: &Path) -> Result<Schema> {
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    parse_schema(&contents).with_context(|| format!("load schema {}", path.display()))
}

/// Load preference overrides (`tag = value` pairs).
///
/// If the file is missing, returns no overrides.
pub fn load_preference_overrides(path: &Path) -> Result<BTreeMap<String, Value>> {
    if !path.exists() {
        return Ok(BTreeMap::new());
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))
}
