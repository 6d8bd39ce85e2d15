//! Build orchestration for federated extension packages.
//!
//! This crate turns a package on disk into the artifacts the external bundler
//! consumes: it loads the core and extension descriptors, resolves the
//! shared-module table, builds the federation manifest entry and the bootstrap
//! entry point, and writes them to a freshly cleaned output directory. It also
//! discovers already-built extensions to assemble the page's plugin list.

pub mod config;
pub mod discover;
pub mod engine;
pub mod manifest;

pub use config::{BuildConfig, ConfigFile, Mode};
pub use discover::{discover, manifest_from, DiscoveredExtension};
pub use engine::{BuildResult, Builder};
pub use manifest::{
    bootstrap_source, build_manifest, resolve_entry_point, BuildConfiguration,
    FederationManifest, ManifestBuild, ManifestEntry,
};

use modfed_schema::{ManifestError, ValidationErrors};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("validation error: {0}")]
    Validation(ValidationErrors),
    #[error("manifest error: {0}")]
    Manifest(ManifestError),
    #[error("config file error: {0}")]
    ConfigFile(#[from] toml::de::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<ManifestError> for CoreError {
    fn from(err: ManifestError) -> Self {
        match err {
            ManifestError::Validation(errors) => CoreError::Validation(errors),
            e @ ManifestError::UnresolvedMain { .. } => CoreError::Configuration(e.to_string()),
            other => CoreError::Manifest(other),
        }
    }
}
