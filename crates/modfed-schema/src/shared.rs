//! Shared-module resolution.
//!
//! [`resolve`] merges the sharing policy of the core application with that of
//! one extension into a [`SharedModuleTable`]. The merge is a fixed sequence of
//! layers; each layer only touches the fields it names, so a later layer always
//! wins over an earlier one:
//!
//! 1. core dependencies seed the table with their version ranges
//! 2. extension dependencies overwrite (or add) version ranges
//! 3. extension `nonSharedPackages` are removed
//! 4. core `singletonPackages` become host-provided singletons
//! 5. extension `singletonPackages` stop importing their own copy
//! 6. extension `nonSingletonPackages` turn singleton treatment off

use crate::package::PackageDescriptor;
use crate::types::ModuleName;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// Sharing policy for one module.
///
/// `import = false` means the host provides the module and the extension must
/// not bundle a fallback copy. `required_version = None` accepts any version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SharedModuleEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required_version: Option<String>,
    #[serde(default)]
    pub singleton: bool,
    #[serde(default = "default_import")]
    pub import: bool,
}

fn default_import() -> bool {
    true
}

impl Default for SharedModuleEntry {
    fn default() -> Self {
        Self {
            required_version: None,
            singleton: false,
            import: true,
        }
    }
}

impl SharedModuleEntry {
    pub fn versioned(range: impl Into<String>) -> Self {
        Self {
            required_version: Some(range.into()),
            ..Self::default()
        }
    }
}

/// Resolved per-module sharing policy, keyed and ordered by module name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SharedModuleTable {
    entries: BTreeMap<ModuleName, SharedModuleEntry>,
}

impl SharedModuleTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, module: &str) -> Option<&SharedModuleEntry> {
        self.entries.get(module)
    }

    pub fn contains(&self, module: &str) -> bool {
        self.entries.contains_key(module)
    }

    /// Insert or replace the entry for `module`.
    pub fn insert(&mut self, module: impl Into<ModuleName>, entry: SharedModuleEntry) {
        self.entries.insert(module.into(), entry);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ModuleName, &SharedModuleEntry)> {
        self.entries.iter()
    }

    /// Modules the host must provide (`import = false`).
    pub fn host_provided(&self) -> impl Iterator<Item = &ModuleName> {
        self.entries
            .iter()
            .filter(|(_, e)| !e.import)
            .map(|(name, _)| name)
    }

    fn ensure(&mut self, module: &ModuleName) -> &mut SharedModuleEntry {
        self.entries.entry(module.clone()).or_default()
    }
}

impl<'a> IntoIterator for &'a SharedModuleTable {
    type Item = (&'a ModuleName, &'a SharedModuleEntry);
    type IntoIter = std::collections::btree_map::Iter<'a, ModuleName, SharedModuleEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

/// Resolve the shared-module table for building `ext` against `core`.
///
/// Pure function of its inputs: the same pair always yields the same table.
pub fn resolve(core: &PackageDescriptor, ext: &PackageDescriptor) -> SharedModuleTable {
    let mut table = SharedModuleTable::new();

    for (module, range) in &core.dependencies {
        table.insert(module.clone(), SharedModuleEntry::versioned(range.clone()));
    }

    for (module, range) in &ext.dependencies {
        table.ensure(module).required_version = Some(range.clone());
    }

    for module in &ext.metadata.non_shared_packages {
        table.entries.remove(module);
    }

    for module in &core.metadata.singleton_packages {
        let entry = table.ensure(module);
        entry.singleton = true;
        entry.import = false;
    }

    // Joining the singleton set only opts out of bundling; the singleton flag
    // keeps whatever value the earlier layers gave it.
    for module in &ext.metadata.singleton_packages {
        table.ensure(module).import = false;
    }

    for module in &ext.metadata.non_singleton_packages {
        if ext.metadata.singleton_packages.contains(module) {
            debug!(
                "{}: '{module}' is listed as both singleton and non-singleton; non-singleton wins",
                ext.name
            );
        }
        table.ensure(module).singleton = false;
    }

    debug!(
        "resolved {} shared modules for {} against {}",
        table.len(),
        ext.name,
        core.name
    );
    table
}

/// Sharing policy of the host application itself: every core dependency is
/// shared at its declared range, core singletons are marked singleton, and the
/// host always provides its own copy.
pub fn resolve_host(core: &PackageDescriptor) -> SharedModuleTable {
    let mut table = SharedModuleTable::new();
    for (module, range) in &core.dependencies {
        table.insert(module.clone(), SharedModuleEntry::versioned(range.clone()));
    }
    for module in &core.metadata.singleton_packages {
        table.ensure(module).singleton = true;
    }
    table
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::package::parse_package_str;

    fn core() -> PackageDescriptor {
        parse_package_str(
            r#"{
  "name": "@example/core",
  "version": "0.1.0",
  "dependencies": {
    "react": "^17",
    "@lumino/widgets": "^1.14",
    "@jupyterlab/application": "^3.0.0"
  },
  "jupyterlab": {
    "singletonPackages": ["react", "@jupyterlab/application", "@lumino/coreutils"]
  }
}"#,
        )
        .unwrap()
    }

    fn ext(json_metadata: &str, deps: &str) -> PackageDescriptor {
        parse_package_str(&format!(
            r#"{{ "name": "ext", "version": "1.0.0", "dependencies": {deps}, "jupyterlab": {json_metadata} }}"#
        ))
        .unwrap()
    }

    #[test]
    fn end_to_end_react_lodash() {
        let core = parse_package_str(
            r#"{ "name": "core", "version": "1", "dependencies": { "react": "^17" },
                 "jupyterlab": { "singletonPackages": ["react"] } }"#,
        )
        .unwrap();
        let ext = ext("{}", r#"{ "react": "^17", "lodash": "^4" }"#);

        let table = resolve(&core, &ext);
        assert_eq!(table.len(), 2);
        assert_eq!(
            table.get("react"),
            Some(&SharedModuleEntry {
                required_version: Some("^17".to_owned()),
                singleton: true,
                import: false,
            })
        );
        assert_eq!(
            table.get("lodash"),
            Some(&SharedModuleEntry {
                required_version: Some("^4".to_owned()),
                singleton: false,
                import: true,
            })
        );
    }

    #[test]
    fn extension_range_overrides_core_range() {
        let table = resolve(&core(), &ext("{}", r#"{ "@lumino/widgets": "^1.16" }"#));
        let widgets = table.get("@lumino/widgets").unwrap();
        assert_eq!(widgets.required_version.as_deref(), Some("^1.16"));
        assert!(!widgets.singleton);
        assert!(widgets.import);
    }

    #[test]
    fn extension_range_keeps_existing_flags() {
        // react is a core singleton; the extension dependency layer runs first,
        // so the singleton layer still applies afterwards.
        let table = resolve(&core(), &ext("{}", r#"{ "react": "^17.0.2" }"#));
        let react = table.get("react").unwrap();
        assert_eq!(react.required_version.as_deref(), Some("^17.0.2"));
        assert!(react.singleton);
        assert!(!react.import);
    }

    #[test]
    fn non_shared_packages_are_excluded() {
        let table = resolve(
            &core(),
            &ext(
                r#"{ "nonSharedPackages": ["@lumino/widgets", "marked"] }"#,
                r#"{ "@lumino/widgets": "^1.14", "marked": "^1.1" }"#,
            ),
        );
        assert!(!table.contains("@lumino/widgets"));
        assert!(!table.contains("marked"));
        assert!(table.contains("react"));
    }

    #[test]
    fn singleton_only_module_has_no_version() {
        let table = resolve(&core(), &ext("{}", "{}"));
        let coreutils = table.get("@lumino/coreutils").unwrap();
        assert!(coreutils.required_version.is_none());
        assert!(coreutils.singleton);
        assert!(!coreutils.import);
    }

    #[test]
    fn extension_singleton_only_disables_import() {
        let table = resolve(
            &core(),
            &ext(
                r#"{ "singletonPackages": ["@lumino/widgets", "my-state"] }"#,
                r#"{ "my-state": "^2" }"#,
            ),
        );
        let widgets = table.get("@lumino/widgets").unwrap();
        assert!(!widgets.import);
        assert!(!widgets.singleton);

        let state = table.get("my-state").unwrap();
        assert_eq!(state.required_version.as_deref(), Some("^2"));
        assert!(!state.import);
        assert!(!state.singleton);
    }

    #[test]
    fn non_singleton_always_wins() {
        let table = resolve(
            &core(),
            &ext(
                r#"{ "singletonPackages": ["react", "extra"], "nonSingletonPackages": ["react", "extra", "fresh"] }"#,
                "{}",
            ),
        );
        for module in ["react", "extra", "fresh"] {
            assert!(
                !table.get(module).unwrap().singleton,
                "{module} must not be a singleton"
            );
        }
        // Opting out of singleton treatment does not re-enable bundling.
        assert!(!table.get("react").unwrap().import);
        assert!(table.get("fresh").unwrap().import);
    }

    #[test]
    fn resolving_twice_is_identical() {
        let e = ext(
            r#"{ "singletonPackages": ["a"], "nonSharedPackages": ["b"] }"#,
            r#"{ "a": "1", "b": "2", "c": "3" }"#,
        );
        assert_eq!(resolve(&core(), &e), resolve(&core(), &e));
    }

    #[test]
    fn serializes_like_a_federation_shared_config() {
        let table = resolve(&core(), &ext("{}", r#"{ "lodash": "^4" }"#));
        let json = serde_json::to_value(&table).unwrap();
        assert_eq!(
            json["lodash"],
            serde_json::json!({ "requiredVersion": "^4", "singleton": false, "import": true })
        );
        assert_eq!(
            json["@lumino/coreutils"],
            serde_json::json!({ "singleton": true, "import": false })
        );
    }

    #[test]
    fn host_provided_lists_non_imported_modules() {
        let table = resolve(&core(), &ext("{}", "{}"));
        let provided: Vec<&str> = table.host_provided().map(ModuleName::as_str).collect();
        assert_eq!(
            provided,
            vec!["@jupyterlab/application", "@lumino/coreutils", "react"]
        );
    }

    #[test]
    fn host_table_imports_everything() {
        let table = resolve_host(&core());
        assert_eq!(table.len(), 4);
        assert!(table.iter().all(|(_, e)| e.import));
        assert!(table.get("react").unwrap().singleton);
        assert_eq!(
            table.get("react").unwrap().required_version.as_deref(),
            Some("^17")
        );
        assert!(!table.get("@lumino/widgets").unwrap().singleton);
    }
}
