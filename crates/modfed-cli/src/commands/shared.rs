use super::{colorize_status, core_package_path, json_pretty, EXIT_SUCCESS};
use modfed_core::{BuildConfig, Builder};
use modfed_schema::{resolve_host, FsPackageLoader, PackageLoader, SharedModuleTable};
use std::path::Path;

pub fn run(path: Option<&Path>, core: Option<&Path>, json: bool) -> Result<u8, String> {
    let core = core_package_path(core);
    let table = match path {
        Some(path) => {
            let mut config = BuildConfig::new(path);
            config.core_package = core;
            let (_, shared) = Builder::for_config(&config)
                .resolve_shared(&config)
                .map_err(|e| e.to_string())?;
            shared
        }
        None => {
            let descriptor = FsPackageLoader::new()
                .load(&core)
                .map_err(|e| e.to_string())?;
            resolve_host(&descriptor)
        }
    };

    if json {
        println!("{}", json_pretty(&table)?);
    } else {
        print_table(&table);
    }
    Ok(EXIT_SUCCESS)
}

fn print_table(table: &SharedModuleTable) {
    if table.is_empty() {
        println!("no shared modules");
        return;
    }
    println!("{:<36} {:<12} {:<10} SOURCE", "MODULE", "VERSION", "SINGLETON");
    for (module, entry) in table {
        let version = entry.required_version.as_deref().unwrap_or("*");
        let singleton = if entry.singleton {
            colorize_status("singleton")
        } else {
            "-".to_owned()
        };
        let source = if entry.import {
            "bundled".to_owned()
        } else {
            colorize_status("host")
        };
        println!("{:<36} {version:<12} {singleton:<10} {source}", module.as_str());
    }
}
