//! meshctl - dependency-ordered installer for service mesh components
//!
//! Applies one manifest per mesh component to a Kubernetes cluster. Each
//! component waits for the components it depends on, siblings run in
//! parallel, and every apply is followed by the waits that make the next
//! step safe (namespaces ready, CRDs established).

pub mod cluster;
pub mod component;
pub mod config;
pub mod error;
pub mod install;
pub mod manifest;
pub mod utils;

pub use cluster::{ClusterClient, ClusterConnection, CommandOutput, Kubectl, ManifestExecutor};
pub use component::{ComponentName, DependencyDeclaration, DependencyGraph};
pub use config::{Config, DependencyFailurePolicy};
pub use error::{MeshError, Result};
pub use install::{
    install, render_to_dir, ApplyOutcome, CompositeOutcome, InstallOptions, InstallReport,
    Installer,
};
pub use manifest::{load_manifest_dir, ManifestMap, ResourceObject};
