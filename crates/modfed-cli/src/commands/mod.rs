pub mod build;
pub mod completions;
pub mod list;
pub mod payload;
pub mod shared;
pub mod validate;

use indicatif::{ProgressBar, ProgressStyle};
use modfed_core::config::{CORE_PACKAGE_VAR, DEFAULT_CORE_PACKAGE};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const EXIT_SUCCESS: u8 = 0;
pub const EXIT_FAILURE: u8 = 1;
pub const EXIT_CONFIG_ERROR: u8 = 2;
pub const EXIT_VALIDATION_ERROR: u8 = 3;

pub fn json_pretty(value: &impl serde::Serialize) -> Result<String, String> {
    serde_json::to_string_pretty(value).map_err(|e| format!("JSON serialization failed: {e}"))
}

pub fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .expect("valid template")
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
    );
    pb.set_message(msg.to_owned());
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

pub fn spin_ok(pb: &ProgressBar, msg: &str) {
    pb.set_style(ProgressStyle::with_template("{msg}").expect("valid template"));
    pb.finish_with_message(format!("✓ {msg}"));
}

pub fn spin_fail(pb: &ProgressBar, msg: &str) {
    pb.set_style(ProgressStyle::with_template("{msg}").expect("valid template"));
    pb.finish_with_message(format!("✗ {msg}"));
}

pub fn colorize_status(status: &str) -> String {
    use console::Style;
    match status {
        "ok" | "valid" => Style::new().green().apply_to(status).to_string(),
        "broken" | "invalid" => Style::new().red().bold().apply_to(status).to_string(),
        "singleton" => Style::new().cyan().apply_to(status).to_string(),
        "host" => Style::new().yellow().apply_to(status).to_string(),
        other => other.to_owned(),
    }
}

/// Core package location: the flag, then the environment, then the default.
pub fn core_package_path(flag: Option<&Path>) -> PathBuf {
    flag.map(Path::to_path_buf)
        .or_else(|| std::env::var_os(CORE_PACKAGE_VAR).map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CORE_PACKAGE))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_pretty_serializes_string() {
        let val = serde_json::json!({"key": "value"});
        let result = json_pretty(&val).unwrap();
        assert!(result.contains("\"key\""));
        assert!(result.contains("\"value\""));
    }

    #[test]
    fn colorize_status_keeps_text() {
        for status in ["ok", "broken", "singleton", "host", "valid", "invalid"] {
            assert!(colorize_status(status).contains(status));
        }
        assert_eq!(colorize_status("unknown"), "unknown");
    }

    #[test]
    fn exit_codes_are_distinct() {
        assert_ne!(EXIT_SUCCESS, EXIT_FAILURE);
        assert_ne!(EXIT_FAILURE, EXIT_CONFIG_ERROR);
        assert_ne!(EXIT_CONFIG_ERROR, EXIT_VALIDATION_ERROR);
    }

    #[test]
    fn core_flag_wins() {
        assert_eq!(
            core_package_path(Some(Path::new("/opt/core"))),
            PathBuf::from("/opt/core")
        );
    }

    #[test]
    fn spinner_creates_progress_bar() {
        let pb = spinner("testing...");
        spin_ok(&pb, "done");
        let pb = spinner("testing...");
        spin_fail(&pb, "failed");
    }
}
