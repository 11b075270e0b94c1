//! Writing manifests to disk instead of applying them.

use std::path::Path;

use tracing::info;

use crate::component::{ComponentName, DependencyGraph};
use crate::error::{MeshError, Result};
use crate::manifest::ManifestMap;

/// Write `output_dir/<name>/<name>.yaml` for every non-empty manifest.
///
/// Components in the dependency tree are written in tree order, then any
/// others by name. `verbose` also logs each manifest's size. Under
/// `dry_run` nothing is created.
pub fn render_to_dir(
    manifests: &ManifestMap,
    graph: &DependencyGraph,
    output_dir: &Path,
    dry_run: bool,
    verbose: bool,
) -> Result<()> {
    info!("Component dependency tree:\n{}", graph.render());
    info!("Rendering manifests to output dir {}", output_dir.display());

    let mut order: Vec<&ComponentName> = graph.order();
    order.extend(manifests.keys().filter(|name| !graph.contains(name)));

    for name in order {
        let manifest = match manifests.get(name) {
            Some(m) if !m.trim().is_empty() => m,
            _ => {
                info!("Manifest for {} not found, skip.", name);
                continue;
            }
        };
        let dir = output_dir.join(name.as_str());
        let file = dir.join(format!("{}.yaml", name));
        info!("Writing manifest to {}", file.display());
        if verbose {
            info!(component = %name, bytes = manifest.len(), "rendered manifest");
        }
        if dry_run {
            continue;
        }
        std::fs::create_dir_all(&dir).map_err(|e| {
            MeshError::Config(format!("could not create directory {}: {}", dir.display(), e))
        })?;
        std::fs::write(&file, manifest)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::DependencyDeclaration;

    fn graph() -> DependencyGraph {
        DependencyGraph::build(&DependencyDeclaration::default())
    }

    fn map(entries: &[(&str, &str)]) -> ManifestMap {
        entries
            .iter()
            .map(|(n, m)| (ComponentName::new(*n), m.to_string()))
            .collect()
    }

    #[test]
    fn test_writes_one_file_per_component() {
        let dir = tempfile::tempdir().unwrap();
        let manifests = map(&[
            ("Base", "kind: Namespace\n"),
            ("Pilot", "kind: Deployment\n"),
            ("Custom", "kind: ConfigMap\n"),
        ]);
        render_to_dir(&manifests, &graph(), dir.path(), false, true).unwrap();

        let base = std::fs::read_to_string(dir.path().join("Base/Base.yaml")).unwrap();
        assert_eq!(base, "kind: Namespace\n");
        assert!(dir.path().join("Pilot/Pilot.yaml").is_file());
        // not in the dependency tree, still rendered
        assert!(dir.path().join("Custom/Custom.yaml").is_file());
    }

    #[test]
    fn test_empty_manifest_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let manifests = map(&[("Base", "kind: Namespace\n"), ("Kiali", "")]);
        render_to_dir(&manifests, &graph(), dir.path(), false, false).unwrap();
        assert!(dir.path().join("Base").is_dir());
        assert!(!dir.path().join("Kiali").exists());
    }

    #[test]
    fn test_dry_run_creates_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("rendered");
        let manifests = map(&[("Base", "kind: Namespace\n")]);
        render_to_dir(&manifests, &graph(), &out, true, false).unwrap();
        assert!(!out.exists());
    }

    #[test]
    fn test_output_dir_is_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("taken");
        std::fs::write(&out, "").unwrap();
        let manifests = map(&[("Base", "kind: Namespace\n")]);
        let err = render_to_dir(&manifests, &graph(), &out, false, false).unwrap_err();
        assert!(err.to_string().contains("could not create directory"));
    }
}
