//! Configuration module
//!
//! Resolves the global flags into paths and output settings.

use anyhow::{Context, Result, bail};
use std::ffi::OsStr;
use std::path::PathBuf;

/// CLI configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Kubeconfig that receives new cluster credentials
    pub kubeconfig_path: PathBuf,
    /// Root of the persisted cluster state
    pub state_dir: PathBuf,
    pub verbose: bool,
    /// Log steps through tracing instead of rendering them
    pub non_interactive: bool,
}

impl Config {
    /// Builds the configuration, falling back to paths in the home directory
    pub fn from_flags(
        kubeconfig: Option<PathBuf>,
        state_dir: Option<PathBuf>,
        verbose: bool,
        non_interactive: bool,
    ) -> Result<Self> {
        let kubeconfig_path = match kubeconfig {
            Some(path) => path,
            None => home_dir()?.join(".kube").join("config"),
        };
        let state_dir = match state_dir {
            Some(path) => path,
            None => home_dir()?.join(".kyma"),
        };

        let config = Self {
            kubeconfig_path,
            state_dir,
            verbose,
            non_interactive,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.kubeconfig_path.as_os_str().is_empty() {
            bail!("kubeconfig path cannot be empty");
        }
        if self.state_dir.as_os_str().is_empty() {
            bail!("state directory cannot be empty");
        }
        Ok(())
    }
}

/// First usable entry of a `KUBECONFIG` list
///
/// New contexts go to the first file of the list, the same one kubectl writes to.
pub fn kubeconfig_from_list(list: &OsStr) -> Option<PathBuf> {
    std::env::split_paths(list).find(|path| !path.as_os_str().is_empty())
}

fn home_dir() -> Result<PathBuf> {
    dirs::home_dir().context("Could not determine the home directory")
}
