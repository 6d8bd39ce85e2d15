//! Package metadata, schema validation, shared-module resolution and page payloads for modfed.
//!
//! This crate defines the schema layer: `package.json` parsing (`PackageDescriptor`),
//! the injected metadata loader (`PackageLoader`), schema validation with defaults
//! (`validate_package_json`), the ordered shared-module resolver (`resolve`) and
//! the plugin list embedded into served pages (`PagePayload`).

pub mod package;
pub mod payload;
pub mod shared;
pub mod types;
pub mod validate;

pub use package::{
    parse_package_str, EntryPoint, ExtensionMetadata, FsPackageLoader, ManifestError,
    PackageDescriptor, PackageLoader, DEFAULT_MAIN, METADATA_KEY, PACKAGE_FILE,
};
pub use payload::{PagePayload, PayloadError, PluginData, PLUGIN_DATA_ELEMENT_ID};
pub use shared::{resolve, resolve_host, SharedModuleEntry, SharedModuleTable};
pub use types::{ModuleName, ScopeName};
pub use validate::{validate_package_json, ValidationErrors, ValidationIssue};
