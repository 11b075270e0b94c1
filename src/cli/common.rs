//! Helpers shared by the CLI commands.

use std::path::Path;

use anyhow::{Context, Result};

use meshctl::{load_manifest_dir, InstallReport, ManifestMap};

/// Load a manifest directory, refusing one with nothing in it.
pub(crate) fn load_manifests(dir: &Path) -> Result<ManifestMap> {
    let manifests = load_manifest_dir(dir)
        .with_context(|| format!("Failed to load manifests from {}", dir.display()))?;
    if manifests.is_empty() {
        anyhow::bail!(
            "No component manifests found in {} (expected <Component>.yaml or <Component>/<Component>.yaml)",
            dir.display()
        );
    }
    Ok(manifests)
}

/// One line per component, then the overall wait result.
pub(crate) fn print_report(report: &InstallReport, verbose: bool) {
    println!();
    println!("Install Summary");
    println!("===============");
    for (name, outcome) in &report.outcomes {
        let took = outcome.finished_at - outcome.started_at;
        match &outcome.error {
            None => println!("  ✔ {:<20} {}ms", name.as_str(), took.num_milliseconds()),
            Some(e) => println!("  ✘ {:<20} {}", name.as_str(), first_line(&e.to_string())),
        }
        if verbose {
            for line in outcome.stdout.lines() {
                println!("      {}", line);
            }
        }
        if outcome.error.is_some() && !outcome.stderr.is_empty() {
            for line in outcome.stderr.lines() {
                println!("      {}", line);
            }
        }
    }
    if let Some(e) = &report.error {
        println!();
        println!("{}", e);
    }
}

fn first_line(text: &str) -> &str {
    text.lines().next().unwrap_or_default()
}
