//! Application service: turns configuration into deployment units.
//!
//! Every unit is resolved (and every load-balanced unit's variables checked)
//! before any unit runs, so configuration mistakes abort the run up front.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::debug;

use crate::application::ports::ConfigSource;
use crate::domain::vars::{self, VarMap, VarOverride};
use crate::domain::{DeploymentUnit, SproutConfig, SwapTarget, TerraformSet};

/// Resolve every configured set into a `DeploymentUnit`.
///
/// # Errors
///
/// Returns an error if a variable file of a load-balanced unit cannot be read
/// or parsed, or lacks a required key.
pub fn resolve_units(
    config: &SproutConfig,
    config_dir: &Path,
    overrides: &[VarOverride],
    source: &impl ConfigSource,
) -> Result<Vec<DeploymentUnit>> {
    config
        .terraform_sets
        .iter()
        .map(|set| resolve_unit(set, config_dir, overrides, source))
        .collect()
}

fn resolve_unit(
    set: &TerraformSet,
    config_dir: &Path,
    overrides: &[VarOverride],
    source: &impl ConfigSource,
) -> Result<DeploymentUnit> {
    let root = match &set.root {
        Some(root) => config_dir.join(root),
        None => config_dir.to_path_buf(),
    };

    let swap = if set.load_balanced {
        let vars = load_vars(&root, &set.var_files, overrides, source)?;
        let files: Vec<String> = set
            .var_files
            .iter()
            .map(|f| f.display().to_string())
            .collect();
        Some(SwapTarget::from_vars(&set.name, &files, &vars)?)
    } else {
        None
    };

    debug!(unit = %set.name, root = %root.display(), load_balanced = set.load_balanced, "resolved unit");
    Ok(DeploymentUnit {
        name: set.name.clone(),
        root,
        state_file: set.state_file.clone(),
        var_files: set.var_files.clone(),
        swap,
    })
}

/// Merge a unit's variable files in order, then apply overrides.
///
/// # Errors
///
/// Returns an error if any file cannot be read or parsed.
pub fn load_vars(
    root: &Path,
    files: &[PathBuf],
    overrides: &[VarOverride],
    source: &impl ConfigSource,
) -> Result<VarMap> {
    let mut maps = Vec::with_capacity(files.len());
    for file in files {
        let path = root.join(file);
        let text = source
            .read_var_file(&path)
            .with_context(|| format!("cannot read variable file {}", path.display()))?;
        maps.push(vars::parse_tfvars(&file.display().to_string(), &text)?);
    }
    let mut merged = vars::merge(maps);
    vars::apply_overrides(&mut merged, overrides);
    Ok(merged)
}
