//! Manifests and the objects they contain.
//!
//! - `object`: the [`ResourceObject`] model
//! - `parser`: YAML text to objects
//! - `order`: apply priority and namespace/CRD/other partitioning

pub mod object;
pub mod order;
pub mod parser;

pub use object::{to_yaml_manifest, ResourceObject};
pub use order::{partition, priority, sort_objects, Partition};
pub use parser::{parse_list, parse_manifest};

use std::collections::BTreeMap;
use std::path::Path;

use tracing::debug;

use crate::component::ComponentName;
use crate::error::Result;

/// Label marking objects owned by the installer.
pub const LABEL_MANAGED: &str = "install.operator.mesh.io/managed";
/// Label naming the component an object belongs to.
pub const LABEL_COMPONENT: &str = "install.operator.mesh.io/component";
/// Label carrying the mesh version that applied an object.
pub const LABEL_VERSION: &str = "install.operator.mesh.io/version";
/// Value of [`LABEL_MANAGED`].
pub const MANAGED_RECONCILE: &str = "Reconcile";

/// Manifest text per component. An empty manifest means the component is
/// disabled and its existing objects should be pruned.
pub type ManifestMap = BTreeMap<ComponentName, String>;

/// `install.operator.mesh.io/component=<name>`
pub fn component_selector(name: &ComponentName) -> String {
    format!("{}={}", LABEL_COMPONENT, name)
}

/// Load manifests from a directory.
///
/// Accepts `<dir>/<Name>.yaml` (or `.yml`) and the layout written by
/// `render_to_dir`, `<dir>/<Name>/<Name>.yaml`. Anything else is ignored.
pub fn load_manifest_dir(dir: &Path) -> Result<ManifestMap> {
    let mut manifests = ManifestMap::new();
    let mut entries = std::fs::read_dir(dir)?.collect::<std::io::Result<Vec<_>>>()?;
    entries.sort_by_key(|e| e.file_name());

    for entry in entries {
        let path = entry.path();
        if path.is_dir() {
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            let nested = ["yaml", "yml"]
                .iter()
                .map(|ext| path.join(format!("{}.{}", name, ext)))
                .find(|p| p.is_file());
            if let Some(file) = nested {
                debug!("Loading manifest {}", file.display());
                manifests.insert(ComponentName::new(name), std::fs::read_to_string(file)?);
            }
            continue;
        }

        let is_yaml = matches!(
            path.extension().and_then(|e| e.to_str()),
            Some("yaml") | Some("yml")
        );
        if !is_yaml {
            continue;
        }
        if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
            debug!("Loading manifest {}", path.display());
            manifests.insert(ComponentName::new(stem), std::fs::read_to_string(&path)?);
        }
    }
    Ok(manifests)
}
