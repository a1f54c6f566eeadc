//! Application service: provisioning-tool runner.
//!
//! Imports only from `crate::domain` and `crate::application::ports`.
//! The subprocess itself is run through the injected `CommandRunner`.

use std::path::Path;
use std::process::Output;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::application::ports::{CommandError, CommandRunner};
use crate::domain::{
    DeploymentUnit, ProvisionError, ProvisioningCommand, TimedOutAttempt, VarOverride, Verb,
};

/// Attempts per invocation; only timeouts consume a retry.
pub const MAX_ATTEMPTS: u32 = 3;

/// Lines of stderr kept in a failure report.
const STDERR_TAIL_LINES: usize = 20;

/// Result of a provisioning invocation that did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProvisionOutcome {
    /// The tool exited zero on the given (1-based) attempt.
    Completed { attempts: u32 },
    /// Dry-run: nothing was executed. The caller must stop the whole run.
    DryRun { command: String },
}

/// Runs the provisioning tool against deployment units with bounded retries.
pub struct ProvisioningRunner<R: CommandRunner> {
    runner: R,
    tool: String,
    vars: Vec<VarOverride>,
    dry_run: bool,
}

impl<R: CommandRunner> ProvisioningRunner<R> {
    pub fn new(runner: R, tool: impl Into<String>) -> Self {
        Self {
            runner,
            tool: tool.into(),
            vars: Vec::new(),
            dry_run: false,
        }
    }

    /// Command-line variables appended to every invocation.
    #[must_use]
    pub fn with_vars(mut self, vars: Vec<VarOverride>) -> Self {
        self.vars = vars;
        self
    }

    #[must_use]
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    #[must_use]
    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    /// Name of the provisioning binary, as shown in messages.
    #[must_use]
    pub fn tool(&self) -> &str {
        &self.tool
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    /// # Errors
    ///
    /// See [`ProvisioningRunner::invoke`].
    pub async fn plan(
        &self,
        unit: &DeploymentUnit,
        timeout: Duration,
    ) -> Result<ProvisionOutcome, ProvisionError> {
        self.invoke(Verb::Plan, unit, timeout).await
    }

    /// # Errors
    ///
    /// See [`ProvisioningRunner::invoke`].
    pub async fn apply(
        &self,
        unit: &DeploymentUnit,
        timeout: Duration,
    ) -> Result<ProvisionOutcome, ProvisionError> {
        self.invoke(Verb::Apply, unit, timeout).await
    }

    /// # Errors
    ///
    /// See [`ProvisioningRunner::invoke`].
    pub async fn destroy(
        &self,
        unit: &DeploymentUnit,
        timeout: Duration,
    ) -> Result<ProvisionOutcome, ProvisionError> {
        self.invoke(Verb::Destroy, unit, timeout).await
    }

    /// Run `verb` against `unit`, retrying only on timeout.
    ///
    /// Before each attempt the process working directory is put back to
    /// what it was when the invocation started.
    ///
    /// # Errors
    ///
    /// - `ProvisionError::Failed` on the first non-zero exit (no retry).
    /// - `ProvisionError::TimedOut` after `MAX_ATTEMPTS` timeouts.
    /// - `ProvisionError::Spawn` if the tool cannot be started or awaited.
    pub async fn invoke(
        &self,
        verb: Verb,
        unit: &DeploymentUnit,
        timeout: Duration,
    ) -> Result<ProvisionOutcome, ProvisionError> {
        let command = ProvisioningCommand {
            tool: &self.tool,
            verb,
            unit,
            vars: &self.vars,
            timeout,
        };

        if self.dry_run {
            info!(unit = %unit.name, %verb, "dry run, not executing");
            return Ok(ProvisionOutcome::DryRun {
                command: command.to_string(),
            });
        }

        let args = command.args();
        let origin = std::env::current_dir().ok();
        let mut timeouts = Vec::new();

        for attempt in 1..=MAX_ATTEMPTS {
            if let Some(dir) = &origin {
                restore_cwd(dir);
            }
            debug!(unit = %unit.name, %verb, attempt, command = %command, "running provisioning tool");

            match self
                .runner
                .run_in_dir(command.tool, &args, &unit.root, command.timeout)
                .await
            {
                Ok(output) if output.status.success() => {
                    info!(unit = %unit.name, %verb, attempt, "provisioning succeeded");
                    return Ok(ProvisionOutcome::Completed { attempts: attempt });
                }
                Ok(output) => {
                    return Err(ProvisionError::Failed {
                        tool: self.tool.clone(),
                        unit: unit.name.clone(),
                        verb,
                        status: describe_status(&output),
                        stderr: stderr_tail(&output),
                    });
                }
                Err(CommandError::TimedOut { .. }) => {
                    warn!(unit = %unit.name, %verb, attempt, timeout_secs = command.timeout.as_secs(), "provisioning timed out");
                    timeouts.push(TimedOutAttempt {
                        attempt,
                        timeout: command.timeout,
                    });
                }
                Err(e) => {
                    return Err(ProvisionError::Spawn {
                        tool: self.tool.clone(),
                        unit: unit.name.clone(),
                        verb,
                        reason: e.to_string(),
                    });
                }
            }
        }

        if let Some(dir) = &origin {
            restore_cwd(dir);
        }
        Err(ProvisionError::TimedOut {
            tool: self.tool.clone(),
            unit: unit.name.clone(),
            verb,
            attempts: timeouts,
        })
    }
}

fn restore_cwd(dir: &Path) {
    if std::env::current_dir().ok().as_deref() == Some(dir) {
        return;
    }
    if let Err(e) = std::env::set_current_dir(dir) {
        warn!(dir = %dir.display(), error = %e, "cannot restore working directory");
    } else {
        debug!(dir = %dir.display(), "restored working directory");
    }
}

fn describe_status(output: &Output) -> String {
    match output.status.code() {
        Some(code) => format!("exit code {code}"),
        None => "terminated by signal".to_string(),
    }
}

fn stderr_tail(output: &Output) -> String {
    let stream = if output.stderr.is_empty() {
        &output.stdout
    } else {
        &output.stderr
    };
    let text = String::from_utf8_lossy(stream);
    let lines: Vec<&str> = text.lines().collect();
    let start = lines.len().saturating_sub(STDERR_TAIL_LINES);
    lines[start..].join("\n")
}
