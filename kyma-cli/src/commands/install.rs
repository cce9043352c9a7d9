//! Install command handler

use anyhow::{Context, Result};
use clap::Args;
use colored::*;
use kyma_core::{PipelineError, StepFactory, StepPipeline};
use kyma_platform::workflow::{InstallCollaborators, InstallOptions, install};
use kyma_platform::{CommandRunner, Kubectl, KubectlCertifier, SystemTrustStore, ToolOutput, TrustStore};
use std::path::PathBuf;
use std::time::Duration;

use crate::commands::{Workflow, run_workflow};
use crate::config::Config;

#[derive(Args)]
pub struct InstallArgs {
    /// Installer manifest (Deployment and supporting resources)
    #[arg(long = "installer", value_name = "FILE")]
    installer_manifest: PathBuf,

    /// Installation custom resource manifest
    #[arg(long = "cr", value_name = "FILE")]
    installation_cr: PathBuf,

    /// Installer image to deploy instead of the one in the manifest
    #[arg(long, value_name = "IMAGE")]
    custom_image: Option<String>,

    /// Do not wait for the installation to finish
    #[arg(long)]
    no_wait: bool,

    /// Minutes to wait for the installation
    #[arg(long, value_name = "MINUTES", default_value_t = 30)]
    timeout: u64,
}

impl InstallArgs {
    pub fn into_options(self) -> InstallOptions {
        InstallOptions {
            installer_manifest: self.installer_manifest,
            installation_cr: self.installation_cr,
            custom_image: self.custom_image,
            no_wait: self.no_wait,
            timeout: Duration::from_secs(self.timeout.saturating_mul(60)),
        }
    }
}

struct KymaInstallation<'a> {
    options: InstallOptions,
    kubectl: Kubectl,
    trust_store: &'a SystemTrustStore,
}

impl Workflow for KymaInstallation<'_> {
    type Output = ();

    fn run<F: StepFactory>(&self, pipeline: &mut StepPipeline<F>) -> Result<(), PipelineError> {
        let certifier = KubectlCertifier::new(self.kubectl.clone());

        install(
            pipeline,
            &self.options,
            &InstallCollaborators {
                applier: &self.kubectl,
                monitor: &self.kubectl,
                certifier: &certifier,
                trust_store: self.trust_store,
            },
        )
    }
}

/// Handle the install command
///
/// # Arguments
/// * `args` - Parsed install flags
/// * `config` - The CLI configuration
pub fn handle_install_command(args: InstallArgs, config: &Config) -> Result<()> {
    let runner = CommandRunner::new(ToolOutput::from_verbose(config.verbose));
    let trust_store = SystemTrustStore::new(runner);
    let workflow = KymaInstallation {
        options: args.into_options(),
        kubectl: Kubectl::new(runner).with_kubeconfig(&config.kubeconfig_path),
        trust_store: &trust_store,
    };

    run_workflow(&workflow, config).context("Failed to install Kyma")?;

    println!();
    if workflow.options.no_wait {
        println!("{}", "Kyma installation requested".green().bold());
        println!();
        println!("{}", trust_store.instructions());
    } else {
        println!("{}", "Kyma installed".green().bold());
    }
    Ok(())
}
