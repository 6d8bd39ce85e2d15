use super::{colorize_status, json_pretty, EXIT_SUCCESS};
use modfed_core::discover;
use modfed_schema::FsPackageLoader;
use std::path::Path;

pub fn run(dir: &Path, json: bool) -> Result<u8, String> {
    let found = discover(dir, &FsPackageLoader::new()).map_err(|e| e.to_string())?;
    if json {
        println!("{}", json_pretty(&found)?);
    } else if found.is_empty() {
        println!("no extensions found in {}", dir.display());
    } else {
        println!("{:<32} {:<12} {:<8} REMOTE", "NAME", "VERSION", "STATUS");
        for ext in &found {
            let status = if ext.is_loadable() { "ok" } else { "broken" };
            let remote = ext.entry.as_ref().map_or("-", |e| e.remote_url.as_str());
            println!(
                "{:<32} {:<12} {:<8} {remote}",
                ext.name,
                ext.version,
                colorize_status(status)
            );
            for problem in &ext.problems {
                println!("  {problem}");
            }
        }
    }
    Ok(EXIT_SUCCESS)
}
