//! Infrastructure implementation of the `ConfigSource` port.

use std::path::Path;

use anyhow::{Context, Result};

use crate::application::ports::ConfigSource;
use crate::domain::config::SproutConfig;

/// Production implementation of `ConfigSource` that reads YAML and tfvars
/// files from disk.
pub struct YamlConfigSource;

impl ConfigSource for YamlConfigSource {
    fn load_config(&self, path: &Path) -> Result<SproutConfig> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("cannot read {}", path.display()))?;
        let config: SproutConfig = serde_yaml::from_str(&content)
            .with_context(|| format!("cannot parse {}", path.display()))?;
        config
            .validate()
            .with_context(|| format!("invalid configuration in {}", path.display()))?;
        Ok(config)
    }

    fn read_var_file(&self, path: &Path) -> Result<String> {
        std::fs::read_to_string(path).with_context(|| format!("cannot read {}", path.display()))
    }
}
