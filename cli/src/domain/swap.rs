//! Swap workflow data: the target of an image refresh and its ordered steps.

use std::fmt;

use crate::domain::error::ConfigError;
use crate::domain::vars::VarMap;

/// Variables a load-balanced unit must define.
pub const REQUIRED_SWAP_KEYS: &[&str] = &[
    "project",
    "zone",
    "instance_name",
    "template_image",
    "instance_group",
];

/// Everything the swap workflow needs to refresh one instance group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwapTarget {
    pub project: String,
    pub zone: String,
    /// Freshly provisioned instance whose disk becomes the new image.
    pub instance_name: String,
    /// Image name rewritten on every run.
    pub image_name: String,
    /// `zones/{zone}/disks/{instance_name}`.
    pub source_disk: String,
    pub instance_group: String,
}

impl SwapTarget {
    /// Derive the swap target from a unit's merged variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingVariable` for the first required key that
    /// is absent or empty.
    pub fn from_vars(unit: &str, files: &[String], vars: &VarMap) -> Result<Self, ConfigError> {
        let get = |key: &'static str| {
            vars.get(key)
                .filter(|v| !v.is_empty())
                .cloned()
                .ok_or_else(|| ConfigError::MissingVariable {
                    unit: unit.to_string(),
                    key,
                    files: if files.is_empty() {
                        "no var files".to_string()
                    } else {
                        files.join(", ")
                    },
                })
        };

        let project = get(REQUIRED_SWAP_KEYS[0])?;
        let zone = get(REQUIRED_SWAP_KEYS[1])?;
        let instance_name = get(REQUIRED_SWAP_KEYS[2])?;
        let image_name = get(REQUIRED_SWAP_KEYS[3])?;
        let instance_group = get(REQUIRED_SWAP_KEYS[4])?;
        let source_disk = format!("zones/{zone}/disks/{instance_name}");

        Ok(Self {
            project,
            zone,
            instance_name,
            image_name,
            source_disk,
            instance_group,
        })
    }
}

/// Ordered steps of the swap workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwapStep {
    StopInstance,
    DeleteStaleImage,
    CreateImage,
    EnumerateGroupMembers,
    DeleteGroupMembers,
}

impl fmt::Display for SwapStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::StopInstance => "stop-instance",
            Self::DeleteStaleImage => "delete-stale-image",
            Self::CreateImage => "create-image",
            Self::EnumerateGroupMembers => "enumerate-group-members",
            Self::DeleteGroupMembers => "delete-group-members",
        })
    }
}
