use super::{json_pretty, spin_fail, spin_ok, spinner, EXIT_SUCCESS};
use modfed_core::config::{CORE_PACKAGE_VAR, MODE_VAR, OUTPUT_PATH_VAR, PACKAGE_PATH_VAR};
use modfed_core::{BuildConfig, Builder, ConfigFile, Mode};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug)]
pub struct BuildArgs {
    pub path: PathBuf,
    pub mode: Option<Mode>,
    pub output: Option<PathBuf>,
    pub core: Option<PathBuf>,
    pub config: Option<PathBuf>,
    pub validate: bool,
}

#[derive(Debug, Serialize)]
struct BuildReport<'a> {
    name: &'a str,
    mode: Mode,
    output_path: &'a Path,
    remote_url: &'a str,
    exposed_path: &'a str,
    shared_modules: usize,
    host_provided: usize,
    status: &'static str,
}

/// `--prod` and `--dev` are mutually exclusive; neither leaves the mode to
/// the environment or config file.
pub fn mode_flag(prod: bool, dev: bool) -> Option<Mode> {
    if prod {
        Some(Mode::Production)
    } else if dev {
        Some(Mode::Development)
    } else {
        None
    }
}

/// Environment variables the flags translate to.
fn flag_env(args: &BuildArgs) -> Result<Vec<(&'static str, String)>, String> {
    let package = std::path::absolute(&args.path)
        .map_err(|e| format!("cannot resolve {}: {e}", args.path.display()))?;
    let mut vars = vec![(PACKAGE_PATH_VAR, package.to_string_lossy().into_owned())];
    if let Some(mode) = args.mode {
        vars.push((MODE_VAR, mode.as_env_value().to_owned()));
    }
    if let Some(ref out) = args.output {
        vars.push((OUTPUT_PATH_VAR, out.to_string_lossy().into_owned()));
    }
    if let Some(ref core) = args.core {
        vars.push((CORE_PACKAGE_VAR, core.to_string_lossy().into_owned()));
    }
    Ok(vars)
}

pub fn run(args: &BuildArgs, json: bool) -> Result<u8, String> {
    let file = args
        .config
        .as_deref()
        .map(ConfigFile::load)
        .transpose()
        .map_err(|e| e.to_string())?;

    // The build reads its settings from the environment, whoever invoked it.
    let vars = flag_env(args)?;
    debug!("build environment: {vars:?}");
    for (key, value) in &vars {
        std::env::set_var(key, value);
    }

    let mut config = BuildConfig::from_env(file).map_err(|e| e.to_string())?;
    config.validate_schema |= args.validate;

    let pb = if json {
        None
    } else {
        Some(spinner("building extension..."))
    };

    let result = match Builder::for_config(&config).build(&config) {
        Ok(r) => {
            if let Some(ref pb) = pb {
                spin_ok(pb, "extension built");
            }
            r
        }
        Err(e) => {
            if let Some(ref pb) = pb {
                spin_fail(pb, "build failed");
            }
            return Err(e.to_string());
        }
    };

    if json {
        let report = BuildReport {
            name: &result.entry.scope_name,
            mode: config.mode,
            output_path: &result.output_path,
            remote_url: &result.entry.remote_url,
            exposed_path: &result.entry.exposed_path,
            shared_modules: result.shared.len(),
            host_provided: result.shared.host_provided().count(),
            status: "built",
        };
        println!("{}", json_pretty(&report)?);
    } else {
        println!(
            "built {} ({} mode) into {}",
            result.entry.scope_name,
            config.mode,
            result.output_path.display()
        );
        println!("remote entry: {}", result.entry.remote_url);
        println!(
            "shared modules: {} ({} provided by the host)",
            result.shared.len(),
            result.shared.host_provided().count()
        );
    }
    Ok(EXIT_SUCCESS)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(mode: Option<Mode>) -> BuildArgs {
        BuildArgs {
            path: PathBuf::from("/src/md_package"),
            mode,
            output: None,
            core: Some(PathBuf::from("/src/core")),
            config: None,
            validate: false,
        }
    }

    #[test]
    fn mode_flag_is_optional() {
        assert_eq!(mode_flag(true, false), Some(Mode::Production));
        assert_eq!(mode_flag(false, true), Some(Mode::Development));
        assert_eq!(mode_flag(false, false), None);
    }

    #[test]
    fn flags_map_onto_the_env_contract() {
        let vars = flag_env(&args(Some(Mode::Production))).unwrap();
        assert!(vars.contains(&(PACKAGE_PATH_VAR, "/src/md_package".to_owned())));
        assert!(vars.contains(&(MODE_VAR, "production".to_owned())));
        assert!(vars.contains(&(CORE_PACKAGE_VAR, "/src/core".to_owned())));
        assert!(!vars.iter().any(|(k, _)| *k == OUTPUT_PATH_VAR));
    }

    #[test]
    fn absent_mode_flag_is_not_exported() {
        let vars = flag_env(&args(None)).unwrap();
        assert!(!vars.iter().any(|(k, _)| *k == MODE_VAR));
    }
}
