use super::EXIT_SUCCESS;
use modfed_core::{discover, manifest_from};
use modfed_schema::{FsPackageLoader, PLUGIN_DATA_ELEMENT_ID};
use std::path::Path;
use tracing::{info, warn};

/// Script element the page template embeds the payload in.
fn html_element(payload_json: &str) -> String {
    format!(
        "<script id=\"{PLUGIN_DATA_ELEMENT_ID}\" type=\"application/json\">\n{payload_json}\n</script>\n"
    )
}

pub fn run(dir: &Path, out: Option<&Path>, html: bool) -> Result<u8, String> {
    let found = discover(dir, &FsPackageLoader::new()).map_err(|e| e.to_string())?;
    for ext in found.iter().filter(|e| !e.is_loadable()) {
        warn!("leaving out {}: {}", ext.name, ext.problems.join("; "));
    }

    let payload = manifest_from(&found).to_page_payload();
    let mut text = payload.to_json().map_err(|e| e.to_string())?;
    if html {
        text = html_element(&text);
    }

    match out {
        Some(path) => {
            std::fs::write(path, &text)
                .map_err(|e| format!("failed to write {}: {e}", path.display()))?;
            info!("wrote {} plugins to {}", payload.len(), path.display());
        }
        None => println!("{text}"),
    }
    Ok(EXIT_SUCCESS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use modfed_schema::PagePayload;

    #[test]
    fn html_element_round_trips_through_extraction() {
        let json = r#"[{ "path": "a/remoteEntry.js", "name": "a", "module": "./extension" }]"#;
        let page = format!("<html><body>{}</body></html>", html_element(json));
        let payload = PagePayload::extract_from_html(&page, PLUGIN_DATA_ELEMENT_ID).unwrap();
        assert_eq!(payload.plugins()[0].name, "a");
    }
}
