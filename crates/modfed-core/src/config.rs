//! Build configuration.
//!
//! The environment variables below are the canonical contract between the
//! thin CLI and the build: the CLI writes its arguments into them and the build
//! reads them back through [`BuildConfig::from_env`]. An optional TOML config
//! file supplies values the environment leaves unset.

use crate::manifest::DEFAULT_PUBLIC_PATH_PREFIX;
use crate::CoreError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

pub const PACKAGE_PATH_VAR: &str = "PACKAGE_PATH";
pub const OUTPUT_PATH_VAR: &str = "OUTPUT_PATH";
pub const MODE_VAR: &str = "NODE_ENV";
pub const CORE_PACKAGE_VAR: &str = "CORE_PACKAGE_PATH";

/// Default location of the core application package.
pub const DEFAULT_CORE_PACKAGE: &str = "core_package";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Development,
    Production,
}

impl Mode {
    /// Anything other than `production` builds in development mode.
    pub fn from_env_value(value: &str) -> Self {
        if value.trim() == "production" {
            Mode::Production
        } else {
            Mode::Development
        }
    }

    pub fn as_env_value(self) -> &'static str {
        match self {
            Mode::Development => "development",
            Mode::Production => "production",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_env_value())
    }
}

/// Contents of an optional `modfed.toml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    #[serde(default)]
    pub package_path: Option<PathBuf>,
    #[serde(default)]
    pub output_path: Option<PathBuf>,
    #[serde(default)]
    pub mode: Option<Mode>,
    #[serde(default)]
    pub core_package: Option<PathBuf>,
    #[serde(default)]
    pub public_path_prefix: Option<String>,
    #[serde(default)]
    pub validate_schema: Option<bool>,
}

impl ConfigFile {
    pub fn parse(input: &str) -> Result<Self, CoreError> {
        Ok(toml::from_str(input)?)
    }

    pub fn load(path: &Path) -> Result<Self, CoreError> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }
}

/// Fully resolved settings for one extension build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildConfig {
    pub package_path: PathBuf,
    /// `None` builds into `<package>/<outputDir>` from the package metadata.
    pub output_path: Option<PathBuf>,
    pub mode: Mode,
    pub core_package: PathBuf,
    pub public_path_prefix: String,
    pub validate_schema: bool,
}

impl BuildConfig {
    pub fn new(package_path: impl Into<PathBuf>) -> Self {
        Self {
            package_path: package_path.into(),
            output_path: None,
            mode: Mode::default(),
            core_package: PathBuf::from(DEFAULT_CORE_PACKAGE),
            public_path_prefix: DEFAULT_PUBLIC_PATH_PREFIX.to_owned(),
            validate_schema: false,
        }
    }

    /// Read the configuration from the process environment.
    pub fn from_env(file: Option<ConfigFile>) -> Result<Self, CoreError> {
        Self::from_sources(file.unwrap_or_default(), |key| std::env::var(key).ok())
    }

    /// Merge a config file with an environment lookup; the environment wins.
    pub fn from_sources(
        file: ConfigFile,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, CoreError> {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let package_path = var(PACKAGE_PATH_VAR)
            .map(PathBuf::from)
            .or(file.package_path)
            .ok_or_else(|| {
                CoreError::Configuration(format!(
                    "no package path given (set {PACKAGE_PATH_VAR} or package_path)"
                ))
            })?;

        let mut config = Self::new(package_path);
        config.output_path = var(OUTPUT_PATH_VAR).map(PathBuf::from).or(file.output_path);
        config.mode = var(MODE_VAR)
            .map(|v| Mode::from_env_value(&v))
            .or(file.mode)
            .unwrap_or_default();
        if let Some(core) = var(CORE_PACKAGE_VAR).map(PathBuf::from).or(file.core_package) {
            config.core_package = core;
        }
        if let Some(prefix) = file.public_path_prefix {
            config.public_path_prefix = prefix;
        }
        config.validate_schema = file.validate_schema.unwrap_or(false);
        Ok(config)
    }

    /// Environment variables that reproduce this configuration.
    pub fn to_env(&self) -> Vec<(&'static str, String)> {
        let mut vars = vec![
            (
                PACKAGE_PATH_VAR,
                self.package_path.to_string_lossy().into_owned(),
            ),
            (MODE_VAR, self.mode.as_env_value().to_owned()),
            (
                CORE_PACKAGE_VAR,
                self.core_package.to_string_lossy().into_owned(),
            ),
        ];
        if let Some(ref out) = self.output_path {
            vars.push((OUTPUT_PATH_VAR, out.to_string_lossy().into_owned()));
        }
        vars
    }
}
