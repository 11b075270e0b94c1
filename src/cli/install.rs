//! Install command handler.

use std::time::Duration;

use anyhow::{Context, Result};

use meshctl::config::Config;
use meshctl::{DependencyFailurePolicy, InstallOptions, MeshError};

use super::common::{load_manifests, print_report};
use super::InstallArgs;

/// Apply every component manifest in dependency order.
pub(crate) async fn cmd_install(
    config: std::result::Result<Config, MeshError>,
    args: InstallArgs,
) -> Result<()> {
    let config = config.with_context(|| format!("Failed to load {}", Config::path().display()))?;
    config.validate().context("Invalid configuration")?;

    let opts = options(&config, &args);
    let manifests = load_manifests(&args.manifests)?;

    let report = meshctl::install(&manifests, &args.mesh_version, &opts)
        .await
        .context("Could not connect to the cluster")?;
    print_report(&report, args.verbose);

    if !report.is_success() {
        let failed = report.failed_components().len();
        anyhow::bail!(
            "install finished with {} failed component(s){}",
            failed,
            if report.error.is_some() {
                " and unready resources"
            } else {
                ""
            }
        );
    }
    Ok(())
}

/// Config defaults overridden by whatever was passed on the command line.
fn options(config: &Config, args: &InstallArgs) -> InstallOptions {
    let mut opts = InstallOptions::from_config(&config.install);
    opts.dry_run = args.dry_run;
    opts.verbose = args.verbose;
    opts.wait |= args.wait;
    if let Some(secs) = args.wait_timeout_secs {
        opts.wait_timeout = Duration::from_secs(secs);
    }
    if let Some(path) = &args.kubeconfig {
        opts.kubeconfig = Some(path.clone());
    }
    if let Some(context) = &args.context {
        opts.context = Some(context.clone());
    }
    if let Some(kubectl) = &args.kubectl {
        opts.kubectl = kubectl.clone();
    }
    if args.skip_on_failed_dependency {
        opts.dependency_failure = DependencyFailurePolicy::Skip;
    }
    opts
}
