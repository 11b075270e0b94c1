//! CLI module - command parsing and dispatch
//!
//! All CLI logic lives here. `main.rs` calls `cli::run()`.

pub mod common;
pub mod config;
pub mod install;
pub mod render;

use std::path::PathBuf;

use anyhow::Result;
use clap::builder::NonEmptyStringValueParser;
use clap::{Args, CommandFactory, Parser, Subcommand};

use meshctl::config::{Config, MAX_TIMEOUT_SECS};
use meshctl::{DependencyDeclaration, DependencyGraph};

#[derive(Parser)]
#[command(name = "meshctl")]
#[command(version)]
#[command(about = "Install service mesh components in dependency order", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply component manifests to the cluster
    Install(InstallArgs),
    /// Write component manifests to a directory instead of applying them
    Render {
        /// Directory holding one manifest per component
        #[arg(short, long)]
        manifests: PathBuf,
        /// Where to write `<Component>/<Component>.yaml`
        #[arg(short, long)]
        output_dir: PathBuf,
        /// Only log what would be written
        #[arg(long)]
        dry_run: bool,
        /// Log manifest sizes
        #[arg(short, long)]
        verbose: bool,
    },
    /// Print the component dependency tree
    Graph,
    /// Show version information
    Version,
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Flags for `meshctl install`. Anything left unset falls back to the
/// `install` section of the config file.
#[derive(Args, Debug)]
pub struct InstallArgs {
    /// Directory holding one manifest per component
    #[arg(short, long)]
    pub manifests: PathBuf,
    /// Value of the version label stamped on every object
    #[arg(long, default_value = env!("CARGO_PKG_VERSION"))]
    pub mesh_version: String,
    /// Log the kubectl commands instead of changing the cluster
    #[arg(long)]
    pub dry_run: bool,
    /// Print each component's kubectl output
    #[arg(short, long)]
    pub verbose: bool,
    /// Wait for every applied resource to become ready
    #[arg(long)]
    pub wait: bool,
    /// Upper bound for readiness waits, in seconds
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..=MAX_TIMEOUT_SECS))]
    pub wait_timeout_secs: Option<u64>,
    /// Kubeconfig file to use
    #[arg(long)]
    pub kubeconfig: Option<PathBuf>,
    /// Kubeconfig context to use
    #[arg(long)]
    pub context: Option<String>,
    /// kubectl binary name or path
    #[arg(long, value_parser = NonEmptyStringValueParser::new())]
    pub kubectl: Option<String>,
    /// Do not install components whose prerequisite failed
    #[arg(long)]
    pub skip_on_failed_dependency: bool,
}

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Validate the configuration file
    Check,
}

/// Entry point for the CLI.
pub async fn run() -> Result<()> {
    let cli = Cli::parse();

    // A broken config file must not stop `config check` from reporting it,
    // so logging falls back to defaults and each command decides.
    let config = Config::load();
    let mut logging_cfg = config
        .as_ref()
        .map(|c| c.logging.clone())
        .unwrap_or_default();
    if matches!(&cli.command, Some(Commands::Install(args)) if args.verbose) {
        logging_cfg.level = "debug".to_string();
    }
    meshctl::utils::logging::init_logging(&logging_cfg)?;

    match cli.command {
        None => {
            let mut cmd = Cli::command();
            cmd.print_help()?;
            println!();
        }
        Some(Commands::Install(args)) => {
            install::cmd_install(config, args).await?;
        }
        Some(Commands::Render {
            manifests,
            output_dir,
            dry_run,
            verbose,
        }) => {
            render::cmd_render(manifests, output_dir, dry_run, verbose)?;
        }
        Some(Commands::Graph) => {
            cmd_graph();
        }
        Some(Commands::Version) => {
            cmd_version();
        }
        Some(Commands::Config { action }) => {
            config::cmd_config(action)?;
        }
    }

    Ok(())
}

fn cmd_graph() {
    let graph = DependencyGraph::build(&DependencyDeclaration::default());
    println!("{}", graph.render());
}

fn cmd_version() {
    println!("meshctl {}", env!("CARGO_PKG_VERSION"));
    println!();
    println!("Dependency-ordered installer for service mesh components");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn install_args(extra: &[&str]) -> Result<InstallArgs, clap::Error> {
        let argv = ["meshctl", "install", "-m", "manifests"]
            .into_iter()
            .chain(extra.iter().copied());
        match Cli::try_parse_from(argv)?.command {
            Some(Commands::Install(args)) => Ok(args),
            _ => panic!("expected the install command"),
        }
    }

    #[test]
    fn test_wait_timeout_flag_bounds() {
        assert!(install_args(&["--wait-timeout-secs", "0"]).is_err());
        let too_long = (MAX_TIMEOUT_SECS + 1).to_string();
        assert!(install_args(&["--wait-timeout-secs", too_long.as_str()]).is_err());
        let overflow = u64::MAX.to_string();
        assert!(install_args(&["--wait-timeout-secs", overflow.as_str()]).is_err());

        let args = install_args(&["--wait-timeout-secs", "30"]).unwrap();
        assert_eq!(args.wait_timeout_secs, Some(30));
    }

    #[test]
    fn test_empty_kubectl_flag_rejected() {
        assert!(install_args(&["--kubectl", ""]).is_err());
        let args = install_args(&["--kubectl", "oc"]).unwrap();
        assert_eq!(args.kubectl.as_deref(), Some("oc"));
    }

    #[test]
    fn test_graph_has_no_arguments() {
        assert!(Cli::try_parse_from(["meshctl", "graph", "extra"]).is_err());
    }
}
