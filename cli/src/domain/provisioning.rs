//! Provisioning-tool invocations.
//!
//! Pure argv construction; execution lives in the application layer.

use std::fmt;
use std::time::Duration;

use crate::domain::unit::DeploymentUnit;
use crate::domain::vars::VarOverride;

/// Default provisioning binary.
pub const DEFAULT_TOOL: &str = "terraform";

/// Flag that makes `destroy` non-interactive.
pub const FORCE_FLAG: &str = "-auto-approve";

/// Provisioning-tool verb.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verb {
    Plan,
    Apply,
    Destroy,
}

impl Verb {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Plan => "plan",
            Self::Apply => "apply",
            Self::Destroy => "destroy",
        }
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single provisioning-tool invocation against one unit.
#[derive(Debug, Clone)]
pub struct ProvisioningCommand<'a> {
    pub tool: &'a str,
    pub verb: Verb,
    pub unit: &'a DeploymentUnit,
    pub vars: &'a [VarOverride],
    pub timeout: Duration,
}

impl ProvisioningCommand<'_> {
    /// Arguments after the program name:
    /// `<verb> [-auto-approve] [-var-file=..]* [-var=..]* -state=<path>`.
    #[must_use]
    pub fn args(&self) -> Vec<String> {
        let mut args = vec![self.verb.as_str().to_string()];
        if self.verb == Verb::Destroy {
            args.push(FORCE_FLAG.to_string());
        }
        args.extend(
            self.unit
                .var_files
                .iter()
                .map(|f| format!("-var-file={}", f.display())),
        );
        args.extend(self.vars.iter().map(VarOverride::to_arg));
        args.push(format!("-state={}", self.unit.state_file.display()));
        args
    }

    /// Full argument vector including the program name.
    #[must_use]
    pub fn argv(&self) -> Vec<String> {
        let mut argv = vec![self.tool.to_string()];
        argv.extend(self.args());
        argv
    }
}

impl fmt::Display for ProvisioningCommand<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.argv().join(" "))
    }
}
