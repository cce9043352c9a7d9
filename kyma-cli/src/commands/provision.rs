//! Provision command handlers

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use colored::*;
use kyma_core::domain::cluster::ClusterDescriptor;
use kyma_core::{PipelineError, StepFactory, StepPipeline};
use kyma_platform::workflow::{GcpOptions, ProvisionCollaborators, provision_gcp};
use kyma_platform::{CommandRunner, FileKubeconfig, FileStateStore, GcloudProvisioner, ToolOutput};
use std::path::PathBuf;

use crate::commands::{Workflow, run_workflow};
use crate::config::Config;

/// Provision subcommands
#[derive(Subcommand)]
pub enum ProvisionCommands {
    /// Provision a GKE cluster on Google Cloud Platform
    Gcp(GcpArgs),
}

#[derive(Args)]
pub struct GcpArgs {
    /// Name of the cluster to provision (required)
    #[arg(short, long)]
    name: Option<String>,

    /// Name of the GCP project to provision the cluster in (required)
    #[arg(short, long)]
    project: Option<String>,

    /// Path to the GCP service account key file (required)
    #[arg(short, long)]
    credentials: Option<PathBuf>,

    /// Kubernetes version of the cluster
    #[arg(short = 'k', long, default_value = "1.14")]
    kube_version: String,

    /// Location of the cluster
    #[arg(short, long, default_value = "europe-west3-a")]
    location: String,

    /// Machine type of the cluster nodes
    #[arg(short = 't', long = "type", default_value = "n1-standard-4")]
    machine_type: String,

    /// Disk size of the cluster nodes in GB
    #[arg(long, default_value_t = 30)]
    disk_size: u32,

    /// Number of nodes of the cluster
    #[arg(long, default_value_t = 3)]
    nodes: u32,

    /// Extra configuration of the form NAME=VALUE, repeatable
    #[arg(short, long, value_name = "NAME=VALUE")]
    extra: Vec<String>,
}

impl GcpArgs {
    pub fn into_options(self) -> GcpOptions {
        GcpOptions {
            name: self.name,
            project: self.project,
            credentials: self.credentials,
            kubernetes_version: self.kube_version,
            location: self.location,
            machine_type: self.machine_type,
            disk_size_gb: self.disk_size,
            node_count: self.nodes,
            extras: self.extra,
        }
    }
}

/// Handle provision commands
///
/// # Arguments
/// * `command` - The provision command to execute
/// * `config` - The CLI configuration
pub fn handle_provision_command(command: ProvisionCommands, config: &Config) -> Result<()> {
    match command {
        ProvisionCommands::Gcp(args) => provision_on_gcp(args.into_options(), config),
    }
}

struct GcpProvisioning<'a> {
    options: GcpOptions,
    config: &'a Config,
}

impl Workflow for GcpProvisioning<'_> {
    type Output = ClusterDescriptor;

    fn run<F: StepFactory>(&self, pipeline: &mut StepPipeline<F>) -> Result<ClusterDescriptor, PipelineError> {
        let runner = CommandRunner::new(ToolOutput::from_verbose(self.config.verbose));
        let provisioner = GcloudProvisioner::new(runner);
        let state_store = FileStateStore::new(&self.config.state_dir);
        let kubeconfig = FileKubeconfig::new(&self.config.kubeconfig_path);

        provision_gcp(
            pipeline,
            &self.options,
            &ProvisionCollaborators {
                provisioner: &provisioner,
                state_store: &state_store,
                kubeconfig: &kubeconfig,
            },
        )
    }
}

fn provision_on_gcp(options: GcpOptions, config: &Config) -> Result<()> {
    let cluster = run_workflow(&GcpProvisioning { options, config }, config)
        .context("Failed to provision GCP cluster")?;

    println!();
    println!("{}", "GCP cluster installed".green().bold());
    println!(
        "Kubectl correctly configured: pointing to {}",
        cluster.name.cyan()
    );
    println!();
    println!("Happy GCP-ing! :)");
    Ok(())
}
