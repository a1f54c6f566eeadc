//! CLI argument parsing with clap derive

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;

use crate::commands;
use crate::domain::VarOverride;

/// Terraform-driven blue/green refresh of load-balanced compute fleets
#[derive(Parser)]
#[command(name = "sprout", version)]
pub struct Cli {
    /// Path to the YAML configuration file
    #[arg(long, value_name = "PATH")]
    pub config: PathBuf,

    /// Print the first command that would run, then stop
    #[arg(long)]
    pub dry_run: bool,

    /// Run `plan` instead of destroy/apply and skip swaps
    #[arg(long)]
    pub plan: bool,

    /// Override a variable for every unit (repeatable)
    #[arg(long = "var", value_name = "KEY=VALUE")]
    pub vars: Vec<VarOverride>,

    /// Only run the named units (repeatable)
    #[arg(long, value_name = "NAME")]
    pub only: Vec<String>,

    /// Suppress non-error output
    #[arg(short, long)]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, env = "NO_COLOR")]
    pub no_color: bool,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

impl Cli {
    /// Execute the run described by the flags.
    ///
    /// # Errors
    ///
    /// Returns an error on a configuration problem or when any unit fails.
    pub async fn run(self) -> Result<()> {
        let ctx = crate::output::OutputContext::new(self.no_color, self.quiet);
        let args = commands::run::RunArgs {
            config: self.config,
            dry_run: self.dry_run,
            plan: self.plan,
            vars: self.vars,
            only: self.only,
        };
        commands::run::run(&ctx, &args).await
    }
}
