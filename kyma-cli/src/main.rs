//! Kyma CLI
//!
//! Command-line interface for provisioning clusters and installing Kyma.

mod commands;
mod config;
mod output;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, handle_command};
use config::Config;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "kyma")]
#[command(about = "Kyma CLI", long_about = None)]
struct Cli {
    /// Kubeconfig to read and update [default: first entry of $KUBECONFIG, then ~/.kube/config]
    #[arg(long, global = true)]
    kubeconfig: Option<PathBuf>,

    /// Directory for cluster state
    #[arg(long, global = true, env = "KYMA_STATE_DIR")]
    state_dir: Option<PathBuf>,

    /// Show details and the output of external tools
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Report progress as log lines instead of interactive steps
    #[arg(long, global = true, env = "KYMA_NON_INTERACTIVE")]
    non_interactive: bool,

    #[command(subcommand)]
    command: Commands,
}

fn init_tracing(verbose: bool) {
    let default = if verbose {
        "kyma=debug,kyma_platform=debug"
    } else {
        "kyma=info,kyma_platform=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let kubeconfig = cli.kubeconfig.or_else(|| {
        std::env::var_os("KUBECONFIG").and_then(|list| config::kubeconfig_from_list(&list))
    });
    let config = Config::from_flags(
        kubeconfig,
        cli.state_dir,
        cli.verbose,
        cli.non_interactive,
    )?;
    tracing::debug!(
        "Using kubeconfig {} and state directory {}",
        config.kubeconfig_path.display(),
        config.state_dir.display()
    );

    handle_command(cli.command, &config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use commands::ProvisionCommands;

    #[test]
    fn test_parses_provision_gcp_with_defaults() {
        let cli = Cli::try_parse_from([
            "kyma",
            "provision",
            "gcp",
            "-n",
            "kyma",
            "-p",
            "my-project",
            "-c",
            "/tmp/key.json",
        ])
        .unwrap();

        let Commands::Provision {
            command: ProvisionCommands::Gcp(args),
        } = cli.command
        else {
            panic!("expected provision gcp");
        };
        let options = args.into_options();
        assert_eq!(options.name.as_deref(), Some("kyma"));
        assert_eq!(options.location, "europe-west3-a");
        assert_eq!(options.machine_type, "n1-standard-4");
        assert_eq!(options.kubernetes_version, "1.14");
        assert_eq!(options.disk_size_gb, 30);
        assert_eq!(options.node_count, 3);
        assert!(options.extras.is_empty());
    }

    #[test]
    fn test_parses_repeated_extras() {
        let cli = Cli::try_parse_from([
            "kyma",
            "provision",
            "gcp",
            "--extra",
            "enable-autoupgrade=true",
            "-e",
            "preemptible=",
        ])
        .unwrap();

        let Commands::Provision {
            command: ProvisionCommands::Gcp(args),
        } = cli.command
        else {
            panic!("expected provision gcp");
        };
        assert_eq!(
            args.into_options().extras,
            ["enable-autoupgrade=true", "preemptible="]
        );
    }

    #[test]
    fn test_missing_flags_are_left_to_validation() {
        let cli = Cli::try_parse_from(["kyma", "provision", "gcp"]).unwrap();
        assert!(matches!(cli.command, Commands::Provision { .. }));
    }

    #[test]
    fn test_parses_install_flags() {
        let cli = Cli::try_parse_from([
            "kyma",
            "--verbose",
            "install",
            "--installer",
            "kyma-installer.yaml",
            "--cr",
            "installer-cr.yaml",
            "--custom-image",
            "my-registry/installer:dev",
            "--no-wait",
            "--timeout",
            "45",
        ])
        .unwrap();

        assert!(cli.verbose);
        let Commands::Install(args) = cli.command else {
            panic!("expected install");
        };
        let options = args.into_options();
        assert!(options.no_wait);
        assert_eq!(options.timeout, std::time::Duration::from_secs(45 * 60));
        assert_eq!(options.custom_image.as_deref(), Some("my-registry/installer:dev"));
    }

    #[test]
    fn test_install_requires_manifests() {
        assert!(Cli::try_parse_from(["kyma", "install", "--cr", "installer-cr.yaml"]).is_err());
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "kyma",
            "provision",
            "gcp",
            "--non-interactive",
            "--state-dir",
            "/tmp/kyma",
        ])
        .unwrap();

        assert!(cli.non_interactive);
        assert_eq!(cli.state_dir, Some(PathBuf::from("/tmp/kyma")));
    }
}
