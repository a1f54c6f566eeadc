//! Typed domain error enums.
//!
//! This module has zero imports from `crate::infra`, `crate::commands`,
//! `crate::application`, `tokio`, `std::fs`, `std::process`, or `std::net`.
//! All error types implement `thiserror::Error` and convert to `anyhow::Error`
//! via the `?` operator.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

use crate::domain::provisioning::Verb;
use crate::domain::swap::SwapStep;

// ── Configuration errors ──────────────────────────────────────────────────────

/// Invalid or incomplete configuration. Always fatal, never retried.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("unit '{unit}' is missing required variable '{key}' (checked: {files})")]
    MissingVariable {
        unit: String,
        key: &'static str,
        files: String,
    },

    #[error("invalid expected status '{0}': must be one of PENDING, RUNNING, DONE")]
    InvalidStatus(String),

    #[error("poll interval must be greater than zero")]
    ZeroInterval,

    #[error("{file}:{line}: cannot parse variable definition: {text}")]
    InvalidVarLine {
        file: String,
        line: usize,
        text: String,
    },

    #[error("invalid --var '{0}': expected KEY=VALUE")]
    InvalidVarOverride(String),

    #[error("no terraform set named '{0}' in configuration")]
    UnknownUnit(String),

    #[error("configuration declares no terraform sets")]
    NoUnits,

    #[error("terraform set name '{0}' is declared more than once")]
    DuplicateUnit(String),
}

// ── Provisioning errors ───────────────────────────────────────────────────────

/// One timed-out attempt of a provisioning command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimedOutAttempt {
    /// 1-based attempt number.
    pub attempt: u32,
    /// Timeout the attempt ran under.
    pub timeout: Duration,
}

impl fmt::Display for TimedOutAttempt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "attempt {} timed out after {}s",
            self.attempt,
            self.timeout.as_secs()
        )
    }
}

fn join_attempts(attempts: &[TimedOutAttempt]) -> String {
    attempts
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Failures of a single provisioning-tool invocation.
#[derive(Debug, Error)]
pub enum ProvisionError {
    /// Every attempt exceeded its timeout.
    #[error("{tool} {verb} for '{unit}' timed out {} times: {}", .attempts.len(), join_attempts(.attempts))]
    TimedOut {
        tool: String,
        unit: String,
        verb: Verb,
        attempts: Vec<TimedOutAttempt>,
    },

    /// The tool ran to completion and reported failure.
    #[error("{tool} {verb} for '{unit}' failed ({status}):\n{stderr}")]
    Failed {
        tool: String,
        unit: String,
        verb: Verb,
        status: String,
        stderr: String,
    },

    /// The tool could not be started at all.
    #[error("cannot run {tool} {verb} for '{unit}': {reason}")]
    Spawn {
        tool: String,
        unit: String,
        verb: Verb,
        reason: String,
    },
}

// ── Control-plane errors ──────────────────────────────────────────────────────

/// Errors surfaced by the compute control plane.
#[derive(Debug, Error)]
pub enum ControlPlaneError {
    /// The targeted resource does not exist.
    #[error("{0} not found")]
    NotFound(String),

    /// The operation finished but the control plane attached an error to it.
    #[error("operation {operation} failed: {message}")]
    OperationFailed { operation: String, message: String },

    /// Any other failure talking to the control plane.
    #[error("{0}")]
    Transport(String),
}

impl ControlPlaneError {
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

// ── Poll errors ───────────────────────────────────────────────────────────────

/// Errors from waiting on an asynchronous operation.
#[derive(Debug, Error)]
pub enum PollError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("operation exceeded timeout period of {}s. {kind}: {operation_type}", .waited.as_secs())]
    Timeout {
        kind: String,
        operation_type: String,
        waited: Duration,
    },

    #[error(transparent)]
    ControlPlane(#[from] ControlPlaneError),
}

// ── Swap errors ───────────────────────────────────────────────────────────────

/// A swap workflow step failed; earlier steps are not rolled back.
#[derive(Debug, Error)]
#[error("swap step {step} failed for {target}: {source}")]
pub struct SwapError {
    pub step: SwapStep,
    pub target: String,
    #[source]
    pub source: PollError,
}
