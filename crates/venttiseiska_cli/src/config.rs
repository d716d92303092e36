//! Scenario files for the `vsk` runner.
//!
//! A scenario is a TOML document with an optional `[emitter]` table, a list of
//! `[[bind]]` entries and a list of `[[step]]` entries replayed in order:
//!
//! ```toml
//! [emitter]
//! warn_on_unhandled = true
//!
//! [[bind]]
//! label = "saver"
//! events = "save:ui save:sync"
//! context = "editor"
//! cycles = 2
//!
//! [[step]]
//! action = "emit"
//! events = "save:ui"
//! args = [1, "two"]
//!
//! [[step]]
//! action = "off"
//! events = "save"
//! label = "saver"
//! ```

use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::path::Path;
use tracing::info;
use venttiseiska::EmitterConfig;

/// A complete scenario loaded from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Scenario {
    /// Emitter settings
    #[serde(default)]
    pub emitter: EmitterConfig,
    /// Listeners bound before the first step runs
    #[serde(default)]
    pub bind: Vec<BindSpec>,
    /// Steps replayed in order
    #[serde(default)]
    pub step: Vec<Step>,
}

/// One `[[bind]]` entry. Every entry gets its own callback, so `label` can be
/// used later to unbind by callback.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BindSpec {
    /// Name reported with every invocation of this callback
    pub label: String,
    /// Event query, e.g. `"a:tag b"`
    pub events: String,
    /// Stored receiver
    #[serde(default)]
    pub context: Option<Value>,
    /// Number of invocations before the listener retires (0 = unlimited)
    #[serde(default)]
    pub cycles: u32,
    /// Shorthand for `cycles = 1`
    #[serde(default)]
    pub once: bool,
}

impl BindSpec {
    /// Cycle count after applying `once`.
    pub fn effective_cycles(&self) -> u32 {
        if self.once {
            1
        } else {
            self.cycles
        }
    }
}

/// One `[[step]]` entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Step {
    /// Emit an event query
    Emit {
        events: String,
        #[serde(default)]
        args: Vec<Value>,
        /// Forces this receiver for every invoked listener
        #[serde(default)]
        context: Option<Value>,
        /// Forces an absent receiver; ignored when `context` is set
        #[serde(default)]
        clear_context: bool,
    },
    /// Unbind listeners; without `events` every listener is removed
    Off {
        #[serde(default)]
        events: Option<String>,
        /// Only listeners whose callback belongs to this bind label
        #[serde(default)]
        label: Option<String>,
        /// Only the listener with this id
        #[serde(default)]
        id: Option<u64>,
    },
    /// Deactivate listeners; without `events` every listener is affected
    Disable {
        #[serde(default)]
        events: Option<String>,
    },
    /// Reactivate listeners; without `events` every listener is affected
    Enable {
        #[serde(default)]
        events: Option<String>,
    },
}

impl Scenario {
    /// Parses a scenario from TOML text and validates it.
    pub fn from_toml_str(source: &str) -> anyhow::Result<Self> {
        let scenario: Scenario = toml::from_str(source).context("Failed to parse scenario")?;
        scenario.validate()?;
        Ok(scenario)
    }

    /// Reads a scenario file from disk.
    pub fn load_from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read scenario {}", path.display()))?;
        let scenario = Self::from_toml_str(&content)?;
        info!(
            "📝 Loaded scenario {} ({} bindings, {} steps)",
            path.display(),
            scenario.bind.len(),
            scenario.step.len()
        );
        Ok(scenario)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        self.emitter.validate()?;

        let mut labels = HashSet::new();
        for bind in &self.bind {
            if bind.label.is_empty() {
                bail!("Bind label cannot be empty");
            }
            if !labels.insert(bind.label.as_str()) {
                bail!("Duplicate bind label: {}", bind.label);
            }
        }

        for (index, step) in self.step.iter().enumerate() {
            if let Step::Off {
                label: Some(label),
                id,
                ..
            } = step
            {
                if id.is_some() {
                    bail!("Step {index}: off takes either a label or an id, not both");
                }
                if !labels.contains(label.as_str()) {
                    bail!("Step {index}: unknown bind label '{label}'");
                }
            }
        }

        Ok(())
    }
}
