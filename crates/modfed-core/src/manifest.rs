use crate::config::Mode;
use crate::CoreError;
use modfed_schema::{
    EntryPoint, PackageDescriptor, PackageLoader, PagePayload, PluginData, ScopeName,
    SharedModuleTable,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};

pub const REMOTE_ENTRY_FILE: &str = "remoteEntry.js";
pub const BUNDLE_FILE: &str = "extension.js";
pub const BOOTSTRAP_FILE: &str = "bootstrap.js";
pub const BUILD_LOG_FILE: &str = "build_log.json";
pub const FEDERATION_FILE: &str = "federation.json";

/// Exposed key under which every remote publishes its extension entry point.
pub const EXTENSION_MODULE: &str = "./extension";
/// Exposed key for the package's main module.
pub const INDEX_MODULE: &str = "./index";

/// Global namespace the remote containers register themselves under.
pub const LIBRARY_NAMESPACE: &str = "_JUPYTERLAB";
pub const DEFAULT_PUBLIC_PATH_PREFIX: &str = "example/labextensions";

/// One remotely loadable extension bundle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub scope_name: ScopeName,
    pub remote_url: String,
    pub exposed_path: String,
    #[serde(default = "default_module")]
    pub module: String,
}

fn default_module() -> String {
    EXTENSION_MODULE.to_owned()
}

impl ManifestEntry {
    pub fn to_plugin_data(&self) -> PluginData {
        PluginData {
            path: self.remote_url.clone(),
            name: self.scope_name.to_string(),
            module: self.module.clone(),
        }
    }
}

/// Ordered list of remotes, generated once per build and consumed once per page load.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FederationManifest {
    entries: Vec<ManifestEntry>,
}

impl FederationManifest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, entry: ManifestEntry) {
        self.entries.push(entry);
    }

    pub fn entries(&self) -> &[ManifestEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn to_page_payload(&self) -> PagePayload {
        PagePayload(self.entries.iter().map(ManifestEntry::to_plugin_data).collect())
    }

    pub fn load(path: &Path) -> Result<Self, CoreError> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn save(&self, path: &Path) -> Result<(), CoreError> {
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}

impl FromIterator<ManifestEntry> for FederationManifest {
    fn from_iter<I: IntoIterator<Item = ManifestEntry>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

/// Public URL prefix under which a remote's chunks are served.
pub fn public_path(prefix: &str, package_name: &str) -> String {
    format!("{}/{package_name}/", prefix.trim_end_matches('/'))
}

/// Resolve the file the remote exposes as its extension.
///
/// `extension` is preferred over `mimeExtension`. `true` resolves to the
/// package's main module; a string is joined onto the package root.
pub fn resolve_entry_point(
    loader: &impl PackageLoader,
    root: &Path,
    package: &PackageDescriptor,
) -> Result<PathBuf, CoreError> {
    match package.metadata.primary_entry() {
        Some(EntryPoint::Flag(true)) => Ok(loader.resolve_main(root, package)?),
        Some(EntryPoint::Path(rel)) => match inside_package(rel) {
            Some(inner) => Ok(root.join(inner)),
            None => Err(CoreError::Configuration(format!(
                "entry point '{rel}' of package '{}' is outside the package",
                package.name
            ))),
        },
        Some(EntryPoint::Flag(false)) | None => Err(CoreError::Configuration(format!(
            "package '{}' declares neither an extension nor a mimeExtension entry point",
            package.name
        ))),
    }
}

/// Reduce a declared entry path to a path below the package root. Leading
/// `/` and drive prefixes are dropped; `None` if `..` climbs above the root.
fn inside_package(rel: &str) -> Option<PathBuf> {
    let mut parts: Vec<&std::ffi::OsStr> = Vec::new();
    for component in Path::new(rel).components() {
        match component {
            Component::Normal(part) => parts.push(part),
            Component::ParentDir => {
                parts.pop()?;
            }
            Component::CurDir | Component::RootDir | Component::Prefix(_) => {}
        }
    }
    Some(parts.into_iter().collect())
}

/// Source of the synthetic entry point: a lazy import of the real extension,
/// so the bundler always emits the same chunk name whatever the package layout.
pub fn bootstrap_source(entry: &Path) -> String {
    // JSON string escaping is valid JavaScript string escaping.
    let quoted = serde_json::Value::String(entry.to_string_lossy().into_owned()).to_string();
    format!("import({quoted});\n")
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputSection {
    pub filename: String,
    pub path: String,
    #[serde(rename = "publicPath")]
    pub public_path: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LibrarySection {
    #[serde(rename = "type")]
    pub kind: String,
    pub name: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FederationSection {
    pub name: String,
    pub library: LibrarySection,
    pub filename: String,
    pub exposes: BTreeMap<String, String>,
    pub shared: SharedModuleTable,
}

/// Fully resolved bundler configuration for one buildable target, recorded in
/// `build_log.json` for inspection and diffing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildConfiguration {
    pub entry: String,
    pub mode: Mode,
    pub devtool: String,
    pub bail: bool,
    pub output: OutputSection,
    pub federation: FederationSection,
}

/// Everything the manifest builder produces for one extension.
#[derive(Debug, Clone)]
pub struct ManifestBuild {
    pub entry: ManifestEntry,
    pub bootstrap: String,
    pub configuration: BuildConfiguration,
}

/// Settings the manifest builder needs beyond the package itself.
#[derive(Debug, Clone)]
pub struct ManifestSettings<'a> {
    pub output_path: &'a Path,
    pub mode: Mode,
    pub public_path_prefix: &'a str,
}

/// Build the manifest entry, bootstrap source and bundler configuration for an
/// extension. Performs no writes; a missing entry point fails here before any
/// output exists.
pub fn build_manifest(
    loader: &impl PackageLoader,
    root: &Path,
    package: &PackageDescriptor,
    shared: &SharedModuleTable,
    settings: &ManifestSettings<'_>,
) -> Result<ManifestBuild, CoreError> {
    let extension_path = resolve_entry_point(loader, root, package)?;
    // The index module is optional when the entry point is an explicit path.
    let index_path = loader
        .resolve_main(root, package)
        .unwrap_or_else(|_| extension_path.clone());

    let public_path = public_path(settings.public_path_prefix, &package.name);
    let entry = ManifestEntry {
        scope_name: ScopeName::new(package.name.clone()),
        remote_url: format!("{public_path}{REMOTE_ENTRY_FILE}"),
        exposed_path: extension_path.to_string_lossy().into_owned(),
        module: EXTENSION_MODULE.to_owned(),
    };

    let mut exposes = BTreeMap::new();
    exposes.insert(
        INDEX_MODULE.to_owned(),
        index_path.to_string_lossy().into_owned(),
    );
    exposes.insert(EXTENSION_MODULE.to_owned(), entry.exposed_path.clone());

    let configuration = BuildConfiguration {
        entry: settings
            .output_path
            .join(BOOTSTRAP_FILE)
            .to_string_lossy()
            .into_owned(),
        mode: settings.mode,
        devtool: "source-map".to_owned(),
        bail: true,
        output: OutputSection {
            filename: BUNDLE_FILE.to_owned(),
            path: settings.output_path.to_string_lossy().into_owned(),
            public_path,
        },
        federation: FederationSection {
            name: package.name.clone(),
            library: LibrarySection {
                kind: "var".to_owned(),
                name: vec![LIBRARY_NAMESPACE.to_owned(), package.name.clone()],
            },
            filename: REMOTE_ENTRY_FILE.to_owned(),
            exposes,
            shared: shared.clone(),
        },
    };

    Ok(ManifestBuild {
        bootstrap: bootstrap_source(&extension_path),
        entry,
        configuration,
    })
}
