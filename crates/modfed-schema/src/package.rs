use crate::types::ModuleName;
use crate::validate::{validate_package_json, ValidationErrors};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Standard metadata file at the root of every package.
pub const PACKAGE_FILE: &str = "package.json";

/// Key of the extension metadata block inside `package.json`.
pub const METADATA_KEY: &str = "jupyterlab";

/// Main module used when `package.json` declares no `main` field.
pub const DEFAULT_MAIN: &str = "index.js";

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error(transparent)]
    Validation(#[from] ValidationErrors),
    #[error("cannot resolve main module '{main}' of package '{package}'")]
    UnresolvedMain { package: String, main: String },
}

/// Value of an `extension` / `mimeExtension` field.
///
/// `true` means "the package's main module is the extension", a string is a
/// path relative to the package root, and `false` declares no entry point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EntryPoint {
    Flag(bool),
    Path(String),
}

/// Extension metadata block: how a package opts into or out of module sharing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtensionMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extension: Option<EntryPoint>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_extension: Option<EntryPoint>,
    #[serde(default)]
    pub singleton_packages: BTreeSet<ModuleName>,
    #[serde(default)]
    pub non_singleton_packages: BTreeSet<ModuleName>,
    #[serde(default)]
    pub non_shared_packages: BTreeSet<ModuleName>,
    #[serde(default = "default_output_dir")]
    pub output_dir: String,
}

impl Default for ExtensionMetadata {
    fn default() -> Self {
        Self {
            extension: None,
            mime_extension: None,
            singleton_packages: BTreeSet::new(),
            non_singleton_packages: BTreeSet::new(),
            non_shared_packages: BTreeSet::new(),
            output_dir: default_output_dir(),
        }
    }
}

impl ExtensionMetadata {
    /// The primary entry point: `extension` first, then `mimeExtension`.
    /// `false` is treated the same as an absent field.
    pub fn primary_entry(&self) -> Option<&EntryPoint> {
        let declared = |e: &&EntryPoint| !matches!(e, EntryPoint::Flag(false));
        self.extension
            .as_ref()
            .filter(declared)
            .or_else(|| self.mime_extension.as_ref().filter(declared))
    }
}

fn default_output_dir() -> String {
    "build".to_owned()
}

/// Parsed `package.json` of a core or extension package. Immutable once read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageDescriptor {
    pub name: String,
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub main: Option<String>,
    #[serde(default)]
    pub dependencies: BTreeMap<ModuleName, String>,
    #[serde(default, rename = "jupyterlab")]
    pub metadata: ExtensionMetadata,
}

impl PackageDescriptor {
    /// The declared main module, or [`DEFAULT_MAIN`].
    pub fn main_module(&self) -> &str {
        self.main.as_deref().unwrap_or(DEFAULT_MAIN)
    }
}

pub fn parse_package_str(input: &str) -> Result<PackageDescriptor, serde_json::Error> {
    serde_json::from_str(input)
}

/// Loads package descriptors for a package root directory.
///
/// Injected into the build so that metadata discovery never depends on
/// ambient module resolution.
pub trait PackageLoader {
    fn load(&self, root: &Path) -> Result<PackageDescriptor, ManifestError>;

    /// Resolve the package's main module to a path, the way a module resolver
    /// would for `require(<root>)`.
    fn resolve_main(
        &self,
        root: &Path,
        package: &PackageDescriptor,
    ) -> Result<PathBuf, ManifestError>;
}

/// Reads `package.json` from disk, optionally enforcing schema validation.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsPackageLoader {
    validate: bool,
}

impl FsPackageLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// A loader that runs schema validation (with defaults) on every file.
    pub fn validating() -> Self {
        Self { validate: true }
    }

    pub fn validates(&self) -> bool {
        self.validate
    }
}

impl PackageLoader for FsPackageLoader {
    fn load(&self, root: &Path) -> Result<PackageDescriptor, ManifestError> {
        let path = root.join(PACKAGE_FILE);
        let content = fs::read_to_string(&path).map_err(|source| ManifestError::Read {
            path: path.clone(),
            source,
        })?;

        if !self.validate {
            return parse_package_str(&content)
                .map_err(|source| ManifestError::Parse { path, source });
        }

        let value: serde_json::Value = serde_json::from_str(&content)
            .map_err(|source| ManifestError::Parse { path, source })?;
        Ok(validate_package_json(&value)?)
    }

    fn resolve_main(
        &self,
        root: &Path,
        package: &PackageDescriptor,
    ) -> Result<PathBuf, ManifestError> {
        let main = package.main_module();
        let base = root.join(main);
        let candidates = [
            base.clone(),
            PathBuf::from(format!("{}.js", base.display())),
            base.join(DEFAULT_MAIN),
        ];
        candidates
            .into_iter()
            .find(|c| c.is_file())
            .ok_or_else(|| ManifestError::UnresolvedMain {
                package: package.name.clone(),
                main: main.to_owned(),
            })
    }
}
