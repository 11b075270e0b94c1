//! Render command handler.

use std::path::PathBuf;

use anyhow::{Context, Result};

use meshctl::{render_to_dir, DependencyDeclaration, DependencyGraph};

use super::common::load_manifests;

/// Write each component's manifest under `output_dir`.
pub(crate) fn cmd_render(
    manifests: PathBuf,
    output_dir: PathBuf,
    dry_run: bool,
    verbose: bool,
) -> Result<()> {
    let manifests = load_manifests(&manifests)?;
    let graph = DependencyGraph::build(&DependencyDeclaration::default());
    render_to_dir(&manifests, &graph, &output_dir, dry_run, verbose)
        .with_context(|| format!("Failed to render manifests to {}", output_dir.display()))?;
    if !dry_run {
        println!(
            "Rendered {} component(s) to {}",
            manifests.values().filter(|m| !m.trim().is_empty()).count(),
            output_dir.display()
        );
    }
    Ok(())
}
