use super::{colorize_status, json_pretty, EXIT_SUCCESS, EXIT_VALIDATION_ERROR};
use modfed_schema::{FsPackageLoader, ManifestError, PackageLoader};
use std::path::Path;

pub fn run(path: &Path, json: bool) -> Result<u8, String> {
    match FsPackageLoader::validating().load(path) {
        Ok(pkg) => {
            if json {
                let payload = serde_json::json!({
                    "name": pkg.name,
                    "version": pkg.version,
                    "valid": true,
                    "issues": [],
                });
                println!("{}", json_pretty(&payload)?);
            } else {
                println!("{} {}@{}", colorize_status("valid"), pkg.name, pkg.version);
            }
            Ok(EXIT_SUCCESS)
        }
        Err(ManifestError::Validation(errors)) => {
            if json {
                let payload = serde_json::json!({
                    "name": errors.package,
                    "valid": false,
                    "issues": errors.issues,
                });
                println!("{}", json_pretty(&payload)?);
            } else {
                let label = errors.package.as_deref().unwrap_or("package");
                eprintln!(
                    "{} {label}: {} schema violation(s)",
                    colorize_status("invalid"),
                    errors.issues.len()
                );
                for issue in &errors.issues {
                    eprintln!("  {issue}");
                }
            }
            Ok(EXIT_VALIDATION_ERROR)
        }
        Err(e) => Err(e.to_string()),
    }
}
