//! Asynchronous control-plane operations.

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

use crate::domain::error::ConfigError;

/// Lifecycle status of an asynchronous operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OperationStatus {
    Pending,
    Running,
    Done,
}

impl OperationStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Running => "RUNNING",
            Self::Done => "DONE",
        }
    }
}

impl fmt::Display for OperationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OperationStatus {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(Self::Pending),
            "RUNNING" => Ok(Self::Running),
            "DONE" => Ok(Self::Done),
            other => Err(ConfigError::InvalidStatus(other.to_string())),
        }
    }
}

/// Handle for an in-flight mutating control-plane request.
///
/// Refreshed by polling until terminal, then discarded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AsyncOperation {
    /// Control-plane operation name.
    pub name: String,
    /// Resource kind, e.g. `compute#operation`.
    pub kind: String,
    /// Operation type, e.g. `stop`, `insert`, `delete`.
    pub operation_type: String,
    pub status: OperationStatus,
    /// URL used to refresh the operation.
    pub self_link: String,
    /// Error detail attached by the control plane once the operation is done.
    pub error: Option<String>,
}

impl AsyncOperation {
    #[must_use]
    pub fn is_done(&self) -> bool {
        self.status == OperationStatus::Done
    }
}

/// A member of an instance group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceRef {
    pub name: String,
    pub self_link: String,
}

impl InstanceRef {
    /// Build a reference from an instance URL; the name is the last path segment.
    #[must_use]
    pub fn from_url(url: &str) -> Self {
        let name = url.rsplit('/').next().unwrap_or(url).to_string();
        Self {
            name,
            self_link: url.to_string(),
        }
    }
}
