use crate::config::BuildConfig;
use crate::manifest::{
    build_manifest, FederationManifest, ManifestEntry, ManifestSettings, BOOTSTRAP_FILE,
    BUILD_LOG_FILE, FEDERATION_FILE,
};
use crate::CoreError;
use modfed_schema::{
    resolve, FsPackageLoader, PackageDescriptor, PackageLoader, SharedModuleTable, PACKAGE_FILE,
};
use std::fs;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, info};

/// Builds one extension package into a federation-ready output directory.
///
/// Each call is an independent invocation: the only state shared between
/// builds is the read-only core package on disk.
pub struct Builder<L: PackageLoader = FsPackageLoader> {
    loader: L,
}

/// Result of a successful extension build.
#[derive(Debug, Clone)]
pub struct BuildResult {
    pub entry: ManifestEntry,
    pub shared: SharedModuleTable,
    pub output_path: PathBuf,
    pub bootstrap_path: PathBuf,
    pub log_path: PathBuf,
}

impl Builder<FsPackageLoader> {
    /// A filesystem builder, validating metadata if the config asks for it.
    pub fn for_config(config: &BuildConfig) -> Self {
        let loader = if config.validate_schema {
            FsPackageLoader::validating()
        } else {
            FsPackageLoader::new()
        };
        Self::new(loader)
    }
}

impl<L: PackageLoader> Builder<L> {
    pub fn new(loader: L) -> Self {
        Self { loader }
    }

    pub fn loader(&self) -> &L {
        &self.loader
    }

    /// Load the core and extension descriptors and resolve the shared table.
    pub fn resolve_shared(
        &self,
        config: &BuildConfig,
    ) -> Result<(PackageDescriptor, SharedModuleTable), CoreError> {
        let core = self.loader.load(&absolutize(&config.core_package)?)?;
        let ext = self.loader.load(&absolutize(&config.package_path)?)?;
        let shared = resolve(&core, &ext);
        Ok((ext, shared))
    }

    pub fn build(&self, config: &BuildConfig) -> Result<BuildResult, CoreError> {
        let package_root = absolutize(&config.package_path)?;
        info!(
            "building extension from {} ({} mode)",
            package_root.display(),
            config.mode
        );

        let core_root = absolutize(&config.core_package)?;
        let core = self.loader.load(&core_root)?;
        let ext = self.loader.load(&package_root)?;
        debug!(
            "core {}@{}, extension {}@{}",
            core.name, core.version, ext.name, ext.version
        );

        let shared = resolve(&core, &ext);

        let output_path = match config.output_path {
            Some(ref p) => absolutize(p)?,
            None => package_root.join(&ext.metadata.output_dir),
        };
        let cleared = resolved(&output_path);
        for (root, name) in [
            (&package_root, ext.name.as_str()),
            (&core_root, core.name.as_str()),
        ] {
            if resolved(root).starts_with(&cleared) {
                return Err(CoreError::Configuration(format!(
                    "output path {} would remove package '{name}'",
                    output_path.display()
                )));
            }
        }

        let manifest = build_manifest(
            &self.loader,
            &package_root,
            &ext,
            &shared,
            &ManifestSettings {
                output_path: &output_path,
                mode: config.mode,
                public_path_prefix: &config.public_path_prefix,
            },
        )?;

        // Nothing has been written so far; from here on failures leave a
        // partial output directory that the next build replaces.
        prepare_output_dir(&output_path)?;

        let bootstrap_path = output_path.join(BOOTSTRAP_FILE);
        fs::write(&bootstrap_path, &manifest.bootstrap)?;

        let log_path = output_path.join(BUILD_LOG_FILE);
        let log = serde_json::to_string_pretty(&[&manifest.configuration])?;
        fs::write(&log_path, log)?;

        let federation: FederationManifest = std::iter::once(manifest.entry.clone()).collect();
        federation.save(&output_path.join(FEDERATION_FILE))?;

        fs::copy(package_root.join(PACKAGE_FILE), output_path.join(PACKAGE_FILE))?;

        info!(
            "built {} into {} ({} shared modules)",
            ext.name,
            output_path.display(),
            shared.len()
        );

        Ok(BuildResult {
            entry: manifest.entry,
            shared,
            output_path,
            bootstrap_path,
            log_path,
        })
    }
}

/// Remove `path` if present and recreate it empty.
fn prepare_output_dir(path: &Path) -> Result<(), CoreError> {
    if path.exists() {
        debug!("removing previous output {}", path.display());
        fs::remove_dir_all(path)?;
    }
    fs::create_dir_all(path)?;
    Ok(())
}

fn absolutize(path: &Path) -> Result<PathBuf, CoreError> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(std::env::current_dir()?.join(path))
    }
}

/// `path` with symlinks and `..` resolved, for containment checks.
///
/// Paths that do not exist yet are resolved lexically.
fn resolved(path: &Path) -> PathBuf {
    if let Ok(real) = fs::canonicalize(path) {
        return real;
    }
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::ParentDir => {
                out.pop();
            }
            Component::CurDir => {}
            other => out.push(other),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(dir: &Path, rel: &str, content: &str) {
        let path = dir.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn fixture() -> (tempfile::TempDir, BuildConfig) {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "core/package.json",
            r#"{ "name": "core", "version": "1.0.0", "dependencies": { "react": "^17" },
                 "jupyterlab": { "singletonPackages": ["react"] } }"#,
        );
        write(
            dir.path(),
            "ext/package.json",
            r#"{ "name": "ext", "version": "0.1.0", "main": "lib/index.js",
                 "dependencies": { "react": "^17", "lodash": "^4" },
                 "jupyterlab": { "extension": true } }"#,
        );
        write(dir.path(), "ext/lib/index.js", "export default [];");

        let mut config = BuildConfig::new(dir.path().join("ext"));
        config.core_package = dir.path().join("core");
        (dir, config)
    }

    #[test]
    fn build_writes_all_artifacts() {
        let (dir, config) = fixture();
        let result = Builder::for_config(&config).build(&config).unwrap();

        assert_eq!(result.output_path, dir.path().join("ext/build"));
        assert!(result.bootstrap_path.is_file());
        assert!(result.log_path.is_file());
        assert!(result.output_path.join(FEDERATION_FILE).is_file());
        assert!(result.output_path.join(PACKAGE_FILE).is_file());
        assert!(result.shared.get("react").unwrap().singleton);
    }

    #[test]
    fn build_clears_previous_output() {
        let (dir, mut config) = fixture();
        let out = dir.path().join("out");
        write(&out, "stale.js", "old");
        config.output_path = Some(out.clone());

        Builder::for_config(&config).build(&config).unwrap();
        assert!(!out.join("stale.js").exists());
        assert!(out.join(BOOTSTRAP_FILE).exists());
    }

    #[test]
    fn refuses_to_delete_the_package_itself() {
        let (dir, mut config) = fixture();
        config.output_path = Some(dir.path().to_path_buf());
        let err = Builder::for_config(&config).build(&config).unwrap_err();
        assert!(matches!(err, CoreError::Configuration(_)));
        assert!(dir.path().join("ext/package.json").exists());
    }

    #[test]
    fn refuses_output_that_climbs_above_the_package() {
        let (dir, mut config) = fixture();
        config.output_path = Some(dir.path().join("ext").join(".."));
        let err = Builder::for_config(&config).build(&config).unwrap_err();
        assert!(matches!(err, CoreError::Configuration(_)));
        assert!(dir.path().join("ext/lib/index.js").exists());
        assert!(dir.path().join("core/package.json").exists());
    }

    #[test]
    fn refuses_output_containing_the_core_package() {
        let (dir, mut config) = fixture();
        config.output_path = Some(dir.path().join("ext/../core/./"));
        let err = Builder::for_config(&config).build(&config).unwrap_err();
        assert!(err.to_string().contains("'core'"));
        assert!(dir.path().join("core/package.json").exists());
    }

    #[test]
    fn lexical_resolution_of_missing_paths() {
        assert_eq!(
            resolved(Path::new("/no/such/dir/a/../b/./c")),
            PathBuf::from("/no/such/dir/b/c")
        );
    }

    #[test]
    fn resolve_shared_does_not_write() {
        let (dir, config) = fixture();
        let (ext, shared) = Builder::for_config(&config).resolve_shared(&config).unwrap();
        assert_eq!(ext.name, "ext");
        assert_eq!(shared.len(), 2);
        assert!(!dir.path().join("ext/build").exists());
    }
}
