//! Deployment units: the independently pipelined targets of a run.

use std::path::PathBuf;

use crate::domain::swap::SwapTarget;

/// One named infrastructure target with its own state artifact and var files.
///
/// Built from configuration at startup and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentUnit {
    pub name: String,
    /// Working directory for the provisioning tool.
    pub root: PathBuf,
    /// State artifact, as passed to `-state=`.
    pub state_file: PathBuf,
    /// Variable files in precedence order, as passed to `-var-file=`.
    pub var_files: Vec<PathBuf>,
    /// Present iff the unit is load-balanced.
    pub swap: Option<SwapTarget>,
}

impl DeploymentUnit {
    #[must_use]
    pub fn is_load_balanced(&self) -> bool {
        self.swap.is_some()
    }
}
