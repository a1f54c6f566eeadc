//! Domain types and validators for the sprout configuration file.
//!
//! Pure functions only, no I/O.

use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Deserializer};

use crate::domain::error::ConfigError;
use crate::domain::provisioning::DEFAULT_TOOL;

// ── Config schema ────────────────────────────────────────────────────────────

/// Top-level configuration, loaded from the file given with `--config`.
#[derive(Debug, Clone, Deserialize)]
pub struct SproutConfig {
    /// Provisioning binary, `terraform` unless overridden.
    #[serde(default = "default_tool")]
    pub tool: String,

    /// Timeout for each provisioning attempt.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Per-step polling budgets for the swap workflow.
    #[serde(default)]
    pub poll: PollConfig,

    /// Deployment units, processed in declaration order.
    pub terraform_sets: Vec<TerraformSet>,
}

/// One `terraform_sets` entry.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct TerraformSet {
    pub name: String,

    /// Working directory; relative paths resolve against the config file.
    #[serde(default)]
    pub root: Option<PathBuf>,

    pub state_file: PathBuf,

    #[serde(default, alias = "var-file", deserialize_with = "one_or_many")]
    pub var_files: Vec<PathBuf>,

    #[serde(default)]
    pub load_balanced: bool,
}

/// Timeout and interval for one kind of control-plane wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct WaitSettings {
    pub timeout_secs: u64,
    pub interval_secs: u64,
}

impl WaitSettings {
    #[must_use]
    pub const fn new(timeout_secs: u64, interval_secs: u64) -> Self {
        Self {
            timeout_secs,
            interval_secs,
        }
    }
}

/// Polling budgets for each swap step that waits on an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PollConfig {
    pub stop_instance: WaitSettings,
    pub delete_image: WaitSettings,
    pub create_image: WaitSettings,
    pub delete_instance: WaitSettings,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            stop_instance: WaitSettings::new(300, 5),
            delete_image: WaitSettings::new(300, 5),
            create_image: WaitSettings::new(900, 10),
            delete_instance: WaitSettings::new(300, 5),
        }
    }
}

impl SproutConfig {
    /// Per-attempt provisioning timeout.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Check structural invariants that serde cannot express.
    ///
    /// # Errors
    ///
    /// Returns the first violated invariant.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.terraform_sets.is_empty() {
            return Err(ConfigError::NoUnits);
        }
        let mut seen = HashSet::new();
        for set in &self.terraform_sets {
            if !seen.insert(set.name.as_str()) {
                return Err(ConfigError::DuplicateUnit(set.name.clone()));
            }
        }
        let waits = [
            self.poll.stop_instance,
            self.poll.delete_image,
            self.poll.create_image,
            self.poll.delete_instance,
        ];
        if waits.iter().any(|w| w.interval_secs == 0) {
            return Err(ConfigError::ZeroInterval);
        }
        Ok(())
    }

    /// Keep only the named sets, preserving declaration order.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::UnknownUnit` for a name with no matching set.
    pub fn select(&mut self, only: &[String]) -> Result<(), ConfigError> {
        if only.is_empty() {
            return Ok(());
        }
        if let Some(missing) = only
            .iter()
            .find(|name| !self.terraform_sets.iter().any(|s| &s.name == *name))
        {
            return Err(ConfigError::UnknownUnit(missing.clone()));
        }
        self.terraform_sets.retain(|s| only.contains(&s.name));
        Ok(())
    }
}

fn default_tool() -> String {
    DEFAULT_TOOL.to_string()
}

fn default_timeout_secs() -> u64 {
    1800
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(PathBuf),
    Many(Vec<PathBuf>),
}

fn one_or_many<'de, D>(deserializer: D) -> Result<Vec<PathBuf>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(path) => vec![path],
        OneOrMany::Many(paths) => paths,
    })
}
