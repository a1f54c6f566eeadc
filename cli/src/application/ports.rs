//! Port trait definitions for the Application layer.
//!
//! Ports are the interfaces (contracts) that infrastructure must fulfill.
//! This file imports only from `crate::domain`, never from `crate::infra`,
//! `crate::commands`, or `crate::output`.

use std::path::Path;
use std::process::Output;
use std::time::Duration;

use anyhow::Result;
use thiserror::Error;

use crate::domain::{AsyncOperation, ControlPlaneError, InstanceRef, SproutConfig};

// ── Command Runner Port ───────────────────────────────────────────────────────

/// Why a subprocess did not produce an `Output`.
#[derive(Debug, Error)]
pub enum CommandError {
    /// The process exceeded its timeout and was killed.
    #[error("{program} timed out after {}s", .timeout.as_secs())]
    TimedOut { program: String, timeout: Duration },

    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("waiting for {program}: {source}")]
    Wait {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

/// Abstracts process execution so infrastructure can be swapped or mocked.
#[allow(async_fn_in_trait)]
pub trait CommandRunner {
    /// Run `program` in `work_dir`, capturing its output.
    ///
    /// # Errors
    ///
    /// Returns `CommandError::TimedOut` if the process exceeds `timeout`; the
    /// child must be killed, not left orphaned.
    async fn run_in_dir(
        &self,
        program: &str,
        args: &[String],
        work_dir: &Path,
        timeout: Duration,
    ) -> Result<Output, CommandError>;
}

// ── Control Plane Port ────────────────────────────────────────────────────────

/// Compute control-plane capability consumed by the swap workflow.
///
/// Every mutating call returns an `AsyncOperation` to be polled; absent
/// targets are reported as `ControlPlaneError::NotFound`.
#[allow(async_fn_in_trait)]
pub trait ControlPlane {
    async fn stop_instance(
        &self,
        project: &str,
        zone: &str,
        name: &str,
    ) -> Result<AsyncOperation, ControlPlaneError>;

    async fn delete_instance(
        &self,
        project: &str,
        zone: &str,
        name: &str,
    ) -> Result<AsyncOperation, ControlPlaneError>;

    async fn create_image(
        &self,
        project: &str,
        name: &str,
        source_disk: &str,
        force: bool,
    ) -> Result<AsyncOperation, ControlPlaneError>;

    async fn delete_image(
        &self,
        project: &str,
        name: &str,
    ) -> Result<AsyncOperation, ControlPlaneError>;

    /// List members of an instance group, optionally only running ones.
    async fn list_group_instances(
        &self,
        project: &str,
        zone: &str,
        group: &str,
        running_only: bool,
    ) -> Result<Vec<InstanceRef>, ControlPlaneError>;

    /// Re-fetch an operation to observe its current status.
    async fn operation_status(
        &self,
        operation: &AsyncOperation,
    ) -> Result<AsyncOperation, ControlPlaneError>;
}

// ── Progress Reporting Port ───────────────────────────────────────────────────

/// Abstracts progress reporting so services can emit events without
/// depending on the Presentation layer. Sync trait.
pub trait ProgressReporter {
    /// Emit an in-progress step message.
    fn step(&self, message: &str);
    /// Emit a success message.
    fn success(&self, message: &str);
    /// Emit a warning message.
    fn warn(&self, message: &str);
}

// ── Configuration Port ────────────────────────────────────────────────────────

/// Abstracts reading the configuration file and variable files.
pub trait ConfigSource {
    /// Load and parse the configuration file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    fn load_config(&self, path: &Path) -> Result<SproutConfig>;

    /// Read a variable file's raw contents.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read.
    fn read_var_file(&self, path: &Path) -> Result<String>;
}
