//! Resolution of the container a run operates on.
//!
//! Account/container choice happens before the optimizer starts and never
//! changes during a run; the resolved value is passed down explicitly.

use crate::config::Config;
use crate::error::{OptimizeError, Result};
use crate::storage::ContainerRef;

/// Produces the container reference for a run
pub trait TargetResolver {
    fn resolve(&self) -> Result<ContainerRef>;
}

/// Takes the container straight from configuration
pub struct ConfiguredTarget<'a> {
    config: &'a Config,
}

impl<'a> ConfiguredTarget<'a> {
    pub fn new(config: &'a Config) -> Self {
        Self { config }
    }
}

impl TargetResolver for ConfiguredTarget<'_> {
    fn resolve(&self) -> Result<ContainerRef> {
        let name = self
            .config
            .container
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .ok_or_else(|| {
                OptimizeError::Validation("no container configured (use --container or the config file)".to_string())
            })?;
        Ok(ContainerRef::new(self.config.account.clone(), name))
    }
}
