//! Schema validation for `package.json` files.
//!
//! Validation walks the raw JSON document and collects every violation instead
//! of stopping at the first one, so a misconfigured package can be fixed in a
//! single pass. Missing optional fields are filled with their defaults.

use crate::package::{PackageDescriptor, METADATA_KEY};
use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt;
use thiserror::Error;

/// A single schema violation, located by JSON pointer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationIssue {
    pub pointer: String,
    pub message: String,
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let at = if self.pointer.is_empty() {
            "/"
        } else {
            &self.pointer
        };
        write!(f, "{at}: {}", self.message)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("schema validation failed for {}: {}", package_label(.package.as_deref()), join_issues(.issues))]
pub struct ValidationErrors {
    pub package: Option<String>,
    pub issues: Vec<ValidationIssue>,
}

fn package_label(package: Option<&str>) -> String {
    package.map_or_else(|| "package".to_owned(), |p| format!("'{p}'"))
}

fn join_issues(issues: &[ValidationIssue]) -> String {
    issues
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

const ENTRY_FIELDS: [&str; 2] = ["extension", "mimeExtension"];
const PACKAGE_LIST_FIELDS: [&str; 3] = [
    "singletonPackages",
    "nonSingletonPackages",
    "nonSharedPackages",
];

struct Collector {
    issues: Vec<ValidationIssue>,
}

impl Collector {
    fn push(&mut self, pointer: impl Into<String>, message: impl Into<String>) {
        self.issues.push(ValidationIssue {
            pointer: pointer.into(),
            message: message.into(),
        });
    }
}

/// Escape a key for use as a JSON pointer segment (RFC 6901).
fn pointer_segment(key: &str) -> String {
    key.replace('~', "~0").replace('/', "~1")
}

/// Validate a parsed `package.json` document and decode it with defaults applied.
pub fn validate_package_json(value: &Value) -> Result<PackageDescriptor, ValidationErrors> {
    let mut c = Collector { issues: Vec::new() };

    let Some(root) = value.as_object() else {
        return Err(ValidationErrors {
            package: None,
            issues: vec![ValidationIssue {
                pointer: String::new(),
                message: "expected an object".to_owned(),
            }],
        });
    };

    let package = root.get("name").and_then(Value::as_str).map(str::to_owned);

    check_non_empty_string(&mut c, root, "name", true);
    check_non_empty_string(&mut c, root, "version", true);
    check_non_empty_string(&mut c, root, "main", false);

    match root.get("dependencies") {
        None | Some(Value::Null) => {}
        Some(Value::Object(deps)) => {
            for (module, range) in deps {
                if !range.is_string() {
                    c.push(
                        format!("/dependencies/{}", pointer_segment(module)),
                        "version range must be a string",
                    );
                }
            }
        }
        Some(_) => c.push("/dependencies", "expected an object"),
    }

    match root.get(METADATA_KEY) {
        None | Some(Value::Null) => {}
        Some(Value::Object(meta)) => check_metadata(&mut c, meta),
        Some(_) => c.push(format!("/{METADATA_KEY}"), "expected an object"),
    }

    if !c.issues.is_empty() {
        return Err(ValidationErrors {
            package,
            issues: c.issues,
        });
    }

    // Explicit nulls are treated as absent so serde defaults apply.
    let mut cleaned = root.clone();
    cleaned.retain(|_, v| !v.is_null());
    if let Some(Value::Object(meta)) = cleaned.get_mut(METADATA_KEY) {
        meta.retain(|_, v| !v.is_null());
    }

    serde_json::from_value(Value::Object(cleaned)).map_err(|e| ValidationErrors {
        package,
        issues: vec![ValidationIssue {
            pointer: String::new(),
            message: e.to_string(),
        }],
    })
}

fn check_non_empty_string(c: &mut Collector, obj: &Map<String, Value>, key: &str, required: bool) {
    match obj.get(key) {
        None | Some(Value::Null) if required => c.push(format!("/{key}"), "required field missing"),
        None | Some(Value::Null) => {}
        Some(Value::String(s)) if s.trim().is_empty() => {
            c.push(format!("/{key}"), "must not be empty");
        }
        Some(Value::String(_)) => {}
        Some(_) => c.push(format!("/{key}"), "expected a string"),
    }
}

fn check_metadata(c: &mut Collector, meta: &Map<String, Value>) {
    for field in ENTRY_FIELDS {
        let pointer = format!("/{METADATA_KEY}/{field}");
        match meta.get(field) {
            None | Some(Value::Null | Value::Bool(_)) => {}
            Some(Value::String(s)) if s.trim().is_empty() => {
                c.push(pointer, "entry path must not be empty");
            }
            Some(Value::String(_)) => {}
            Some(_) => c.push(pointer, "expected a boolean or a relative path"),
        }
    }

    for field in PACKAGE_LIST_FIELDS {
        let pointer = format!("/{METADATA_KEY}/{field}");
        match meta.get(field) {
            None | Some(Value::Null) => {}
            Some(Value::Array(items)) => {
                for (i, item) in items.iter().enumerate() {
                    match item.as_str() {
                        Some(s) if !s.trim().is_empty() => {}
                        Some(_) => c.push(format!("{pointer}/{i}"), "module name must not be empty"),
                        None => c.push(format!("{pointer}/{i}"), "expected a module name string"),
                    }
                }
            }
            Some(_) => c.push(pointer, "expected an array of module names"),
        }
    }

    match meta.get("outputDir") {
        None | Some(Value::Null | Value::String(_)) => {}
        Some(_) => c.push(format!("/{METADATA_KEY}/outputDir"), "expected a string"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::package::EntryPoint;
    use serde_json::json;

    #[test]
    fn accepts_valid_document_and_applies_defaults() {
        let pkg = validate_package_json(&json!({
            "name": "ext",
            "version": "1.0.0",
            "jupyterlab": { "extension": true }
        }))
        .unwrap();
        assert_eq!(pkg.metadata.extension, Some(EntryPoint::Flag(true)));
        assert_eq!(pkg.metadata.output_dir, "build");
        assert!(pkg.dependencies.is_empty());
    }

    #[test]
    fn collects_every_violation() {
        let err = validate_package_json(&json!({
            "name": "ext",
            "dependencies": { "react": 17, "@lumino/widgets": "^1" },
            "jupyterlab": {
                "extension": 3,
                "singletonPackages": ["react", 4],
                "nonSharedPackages": "lodash",
                "outputDir": false
            }
        }))
        .unwrap_err();

        let pointers: Vec<&str> = err.issues.iter().map(|i| i.pointer.as_str()).collect();
        assert_eq!(
            pointers,
            vec![
                "/version",
                "/dependencies/react",
                "/jupyterlab/extension",
                "/jupyterlab/singletonPackages/1",
                "/jupyterlab/nonSharedPackages",
                "/jupyterlab/outputDir",
            ]
        );
        assert_eq!(err.package.as_deref(), Some("ext"));
    }

    #[test]
    fn escapes_scoped_module_names_in_pointers() {
        let err = validate_package_json(&json!({
            "name": "ext",
            "version": "1",
            "dependencies": { "@lumino/widgets": true }
        }))
        .unwrap_err();
        assert_eq!(err.issues[0].pointer, "/dependencies/@lumino~1widgets");
    }

    #[test]
    fn rejects_non_object_root() {
        let err = validate_package_json(&json!(["not", "a", "package"])).unwrap_err();
        assert_eq!(err.issues.len(), 1);
        assert!(err.package.is_none());
    }

    #[test]
    fn explicit_nulls_fall_back_to_defaults() {
        let pkg = validate_package_json(&json!({
            "name": "ext",
            "version": "1",
            "dependencies": null,
            "jupyterlab": { "outputDir": null, "extension": null }
        }))
        .unwrap();
        assert_eq!(pkg.metadata.output_dir, "build");
        assert!(pkg.metadata.extension.is_none());
    }

    #[test]
    fn error_message_lists_issues() {
        let err = validate_package_json(&json!({ "version": "" })).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("/name: required field missing"), "{msg}");
        assert!(msg.contains("/version: must not be empty"), "{msg}");
    }
}
