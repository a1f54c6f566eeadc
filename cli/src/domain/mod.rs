//! Domain layer: pure business logic, types, and validation.
//!
//! This module has zero imports from `crate::infra`, `crate::commands`,
//! `crate::application`, `tokio`, `std::fs`, `std::process`, or `std::net`.
//! All functions are synchronous and take data in, returning data out.

pub mod config;
pub mod error;
pub mod operation;
pub mod provisioning;
pub mod swap;
pub mod unit;
pub mod vars;

pub use config::{PollConfig, SproutConfig, TerraformSet, WaitSettings};
pub use error::{
    ConfigError, ControlPlaneError, PollError, ProvisionError, SwapError, TimedOutAttempt,
};
pub use operation::{AsyncOperation, InstanceRef, OperationStatus};
pub use provisioning::{ProvisioningCommand, Verb};
pub use swap::{SwapStep, SwapTarget};
pub use unit::DeploymentUnit;
pub use vars::{VarMap, VarOverride};
