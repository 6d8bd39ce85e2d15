//! Discovery of built extensions in a labextensions directory.
//!
//! Every built extension lives in its own directory (`<name>/` or
//! `@scope/<name>/`) holding the copied `package.json`, the `federation.json`
//! written by the build and the `remoteEntry.js` emitted by the bundler.

use crate::manifest::{FederationManifest, ManifestEntry, FEDERATION_FILE, REMOTE_ENTRY_FILE};
use crate::CoreError;
use modfed_schema::{PackageLoader, PACKAGE_FILE};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

#[derive(Debug, Clone, Serialize)]
pub struct DiscoveredExtension {
    pub name: String,
    pub version: String,
    pub dir: PathBuf,
    pub entry: Option<ManifestEntry>,
    pub problems: Vec<String>,
}

impl DiscoveredExtension {
    pub fn is_loadable(&self) -> bool {
        self.entry.is_some() && self.problems.is_empty()
    }
}

/// Scan `dir` for built extensions, sorted by package name.
///
/// A directory whose `package.json` cannot be read is skipped with a warning so
/// one broken install does not hide the others.
pub fn discover(
    dir: &Path,
    loader: &impl PackageLoader,
) -> Result<Vec<DiscoveredExtension>, CoreError> {
    let mut found = Vec::new();
    for candidate in candidate_dirs(dir)? {
        match loader.load(&candidate) {
            Ok(pkg) => found.push(inspect(&candidate, pkg.name, pkg.version)),
            Err(e) => warn!("skipping {}: {e}", candidate.display()),
        }
    }
    found.sort_by(|a, b| a.name.cmp(&b.name));
    debug!("discovered {} extensions in {}", found.len(), dir.display());
    Ok(found)
}

/// Manifest of every loadable extension, in discovery order.
pub fn manifest_from(found: &[DiscoveredExtension]) -> FederationManifest {
    found
        .iter()
        .filter(|ext| ext.is_loadable())
        .filter_map(|ext| ext.entry.clone())
        .collect()
}

fn candidate_dirs(dir: &Path) -> Result<Vec<PathBuf>, CoreError> {
    let mut dirs = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if !path.is_dir() {
            continue;
        }
        if path.join(PACKAGE_FILE).is_file() {
            dirs.push(path);
        } else if path
            .file_name()
            .is_some_and(|n| n.to_string_lossy().starts_with('@'))
        {
            dirs.extend(scoped_dirs(&path));
        }
    }
    Ok(dirs)
}

/// Package directories inside an `@scope` directory; unreadable scopes are skipped.
fn scoped_dirs(scope: &Path) -> Vec<PathBuf> {
    let entries = match fs::read_dir(scope) {
        Ok(entries) => entries,
        Err(e) => {
            warn!("skipping {}: {e}", scope.display());
            return Vec::new();
        }
    };
    entries
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry.path()),
            Err(e) => {
                warn!("skipping entry in {}: {e}", scope.display());
                None
            }
        })
        .filter(|dir| dir.join(PACKAGE_FILE).is_file())
        .collect()
}

fn inspect(dir: &Path, name: String, version: String) -> DiscoveredExtension {
    let mut problems = Vec::new();

    if !dir.join(REMOTE_ENTRY_FILE).is_file() {
        problems.push(format!("missing {REMOTE_ENTRY_FILE}"));
    }

    let entry = match FederationManifest::load(&dir.join(FEDERATION_FILE)) {
        Ok(manifest) => {
            let entry = manifest
                .entries()
                .iter()
                .find(|e| e.scope_name == name)
                .cloned();
            if entry.is_none() {
                problems.push(format!("{FEDERATION_FILE} has no entry for '{name}'"));
            }
            entry
        }
        Err(e) => {
            problems.push(format!("unreadable {FEDERATION_FILE}: {e}"));
            None
        }
    };

    DiscoveredExtension {
        name,
        version,
        dir: dir.to_path_buf(),
        entry,
        problems,
    }
}
