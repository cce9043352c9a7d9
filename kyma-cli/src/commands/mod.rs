//! Commands module
//!
//! Defines all CLI commands and their handlers.

mod install;
mod provision;

pub use install::InstallArgs;
pub use provision::ProvisionCommands;

use anyhow::Result;
use clap::Subcommand;
use kyma_core::PipelineError;
use kyma_core::step::TracingFactory;
use kyma_core::{StepFactory, StepPipeline};

use crate::config::Config;
use crate::output::TerminalFactory;

/// Top-level CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Provision a cluster
    Provision {
        #[command(subcommand)]
        command: ProvisionCommands,
    },
    /// Install Kyma on the current cluster
    Install(InstallArgs),
}

/// Handle a CLI command
///
/// Routes the command to the appropriate handler module.
///
/// # Arguments
/// * `command` - The command to execute
/// * `config` - The CLI configuration
///
/// # Returns
/// Result indicating success or failure
pub fn handle_command(command: Commands, config: &Config) -> Result<()> {
    match command {
        Commands::Provision { command } => provision::handle_provision_command(command, config),
        Commands::Install(args) => install::handle_install_command(args, config),
    }
}

/// A workflow that can run on any step backend
pub trait Workflow {
    type Output;

    fn run<F: StepFactory>(&self, pipeline: &mut StepPipeline<F>) -> Result<Self::Output, PipelineError>;
}

/// Runs a workflow with the step backend selected by the configuration
pub fn run_workflow<W: Workflow>(workflow: &W, config: &Config) -> Result<W::Output, PipelineError> {
    if config.non_interactive {
        workflow.run(&mut StepPipeline::new(TracingFactory))
    } else {
        workflow.run(&mut StepPipeline::new(TerminalFactory::new(config.verbose)))
    }
}
