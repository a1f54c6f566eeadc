//! Application service: the per-unit deployment pipeline.
//!
//! For each unit: destroy, then apply (each independently retried), then the
//! swap workflow when the unit is load-balanced. A failure aborts only the
//! current unit; the run moves on to the next one. Dry-run stops everything
//! at the first command.

use std::time::Duration;

use thiserror::Error;
use tracing::{error, info};

use crate::application::ports::{CommandRunner, ControlPlane, ProgressReporter};
use crate::application::services::provisioning::{ProvisionOutcome, ProvisioningRunner};
use crate::application::services::swap::{FleetSwap, SwapReport};
use crate::domain::{DeploymentUnit, PollConfig, ProvisionError, SwapError, Verb};

/// Options for one pipeline run.
#[derive(Debug, Clone, Copy)]
pub struct RunOptions {
    /// Per-attempt provisioning timeout.
    pub timeout: Duration,
    /// Run `plan` instead of destroy/apply and skip swaps.
    pub plan_only: bool,
    pub poll: PollConfig,
}

/// What a unit's pipeline achieved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnitOutcome {
    Planned,
    Provisioned,
    Swapped(SwapReport),
}

/// Why a unit's pipeline stopped.
#[derive(Debug, Error)]
pub enum UnitError {
    #[error(transparent)]
    Provision(#[from] ProvisionError),
    #[error(transparent)]
    Swap(#[from] SwapError),
}

#[derive(Debug)]
pub struct UnitReport {
    pub unit: String,
    pub result: Result<UnitOutcome, UnitError>,
}

/// Outcome of a whole run.
#[derive(Debug)]
pub enum RunReport {
    /// Dry-run: the first command that would have run.
    DryRun { unit: String, command: String },
    Completed { units: Vec<UnitReport> },
}

impl RunReport {
    /// Units whose pipeline failed.
    #[must_use]
    pub fn failures(&self) -> Vec<&UnitReport> {
        match self {
            Self::DryRun { .. } => Vec::new(),
            Self::Completed { units } => units.iter().filter(|u| u.result.is_err()).collect(),
        }
    }
}

enum Flow {
    Finished(UnitOutcome),
    DryRun(String),
}

/// Run every unit's pipeline in order.
pub async fn run_pipeline<R, C, P>(
    units: &[DeploymentUnit],
    provisioner: &ProvisioningRunner<R>,
    control: &C,
    reporter: &P,
    options: &RunOptions,
) -> RunReport
where
    R: CommandRunner,
    C: ControlPlane,
    P: ProgressReporter,
{
    let mut reports = Vec::with_capacity(units.len());

    for unit in units {
        info!(unit = %unit.name, load_balanced = unit.is_load_balanced(), "starting unit");
        let result = run_unit(unit, provisioner, control, reporter, options).await;
        let result = match result {
            Ok(Flow::DryRun(command)) => {
                return RunReport::DryRun {
                    unit: unit.name.clone(),
                    command,
                };
            }
            Ok(Flow::Finished(outcome)) => Ok(outcome),
            Err(e) => {
                error!(unit = %unit.name, error = %e, "unit failed");
                reporter.warn(&format!("{}: {e}", unit.name));
                Err(e)
            }
        };
        reports.push(UnitReport {
            unit: unit.name.clone(),
            result,
        });
    }

    RunReport::Completed { units: reports }
}

async fn run_unit<R, C, P>(
    unit: &DeploymentUnit,
    provisioner: &ProvisioningRunner<R>,
    control: &C,
    reporter: &P,
    options: &RunOptions,
) -> Result<Flow, UnitError>
where
    R: CommandRunner,
    C: ControlPlane,
    P: ProgressReporter,
{
    let verbs: &[Verb] = if options.plan_only {
        &[Verb::Plan]
    } else {
        &[Verb::Destroy, Verb::Apply]
    };

    for &verb in verbs {
        if !provisioner.is_dry_run() {
            reporter.step(&format!("{}: {} {verb}...", unit.name, provisioner.tool()));
        }
        match provisioner.invoke(verb, unit, options.timeout).await? {
            ProvisionOutcome::DryRun { command } => {
                return Ok(Flow::DryRun(command));
            }
            ProvisionOutcome::Completed { attempts } => {
                let retried = if attempts > 1 {
                    format!(" after {attempts} attempts")
                } else {
                    String::new()
                };
                reporter.success(&format!(
                    "{}: {} {verb} complete{retried}",
                    unit.name,
                    provisioner.tool()
                ));
            }
        }
    }

    if options.plan_only {
        return Ok(Flow::Finished(UnitOutcome::Planned));
    }

    match &unit.swap {
        Some(target) => {
            let report = FleetSwap::new(control, options.poll, reporter)
                .run(target)
                .await?;
            Ok(Flow::Finished(UnitOutcome::Swapped(report)))
        }
        None => Ok(Flow::Finished(UnitOutcome::Provisioned)),
    }
}
