//! Run command: resolves the configured units and drives the pipeline.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use owo_colors::OwoColorize as _;
use tracing::info;

use crate::application::ports::ConfigSource;
use crate::application::services::pipeline::{RunOptions, RunReport, UnitOutcome, run_pipeline};
use crate::application::services::provisioning::ProvisioningRunner;
use crate::application::services::units::resolve_units;
use crate::domain::VarOverride;
use crate::infra::command_runner::TokioCommandRunner;
use crate::infra::compute::GceCompute;
use crate::infra::config::YamlConfigSource;
use crate::output::{OutputContext, TerminalReporter};

/// Arguments for a run.
pub struct RunArgs {
    pub config: PathBuf,
    pub dry_run: bool,
    pub plan: bool,
    pub vars: Vec<VarOverride>,
    pub only: Vec<String>,
}

/// Entry point for `sprout --config <path>`.
///
/// # Errors
///
/// Returns an error if the configuration is invalid or any unit fails.
pub async fn run(ctx: &OutputContext, args: &RunArgs) -> Result<()> {
    let source = YamlConfigSource;
    let mut config = source.load_config(&args.config)?;
    config
        .select(&args.only)
        .with_context(|| format!("invalid --only for {}", args.config.display()))?;

    let config_dir = config_dir(&args.config);
    let units = resolve_units(&config, &config_dir, &args.vars, &source)?;
    info!(units = units.len(), dry_run = args.dry_run, plan = args.plan, "configuration resolved");

    let provisioner = ProvisioningRunner::new(TokioCommandRunner, config.tool.clone())
        .with_vars(args.vars.clone())
        .dry_run(args.dry_run);
    let control = GceCompute::new(TokioCommandRunner).context("cannot build compute client")?;
    let reporter = TerminalReporter::new(ctx);
    let options = RunOptions {
        timeout: config.timeout(),
        plan_only: args.plan,
        poll: config.poll,
    };

    let report = run_pipeline(&units, &provisioner, &control, &reporter, &options).await;
    summarize(ctx, &report)
}

fn config_dir(config: &Path) -> PathBuf {
    match config.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

fn summarize(ctx: &OutputContext, report: &RunReport) -> Result<()> {
    let units = match report {
        RunReport::DryRun { command, .. } => {
            println!("{command}");
            return Ok(());
        }
        RunReport::Completed { units } => units,
    };

    ctx.header("Summary");
    for unit in units {
        match &unit.result {
            Ok(UnitOutcome::Planned) => ctx.success(&format!("{}: planned", unit.unit)),
            Ok(UnitOutcome::Provisioned) => ctx.success(&format!("{}: provisioned", unit.unit)),
            Ok(UnitOutcome::Swapped(swap)) => {
                let detail = format!(
                    "({} members replaced)",
                    swap.members_deleted.len() + swap.members_already_absent.len()
                );
                ctx.success(&format!(
                    "{}: provisioned and swapped {}",
                    unit.unit,
                    detail.style(ctx.styles.dim)
                ));
            }
            Err(e) => ctx.error(&format!("{}: {e}", unit.unit)),
        }
    }

    let failed = report.failures().len();
    if failed > 0 {
        anyhow::bail!("{failed} of {} units failed", units.len());
    }
    Ok(())
}
