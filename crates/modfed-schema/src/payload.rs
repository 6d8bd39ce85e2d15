use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Element id under which the server embeds the plugin list in the page.
pub const PLUGIN_DATA_ELEMENT_ID: &str = "jupyterlab-plugin-data";

#[derive(Debug, Error)]
pub enum PayloadError {
    #[error("invalid plugin payload: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("page has no element with id '{0}'")]
    MissingElement(String),
}

/// One remote extension to load: script path relative to the base URL,
/// federation scope name and exposed module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginData {
    pub path: String,
    pub name: String,
    pub module: String,
}

/// Ordered list of remote extensions for one page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PagePayload(pub Vec<PluginData>);

impl PagePayload {
    pub fn from_json(input: &str) -> Result<Self, PayloadError> {
        Ok(serde_json::from_str(input)?)
    }

    pub fn to_json(&self) -> Result<String, PayloadError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parse the payload embedded in a served page as the text content of the
    /// element with the given id.
    pub fn extract_from_html(html: &str, element_id: &str) -> Result<Self, PayloadError> {
        let missing = || PayloadError::MissingElement(element_id.to_owned());

        let start = [format!("id=\"{element_id}\""), format!("id='{element_id}'")]
            .iter()
            .find_map(|needle| {
                html.match_indices(needle.as_str())
                    .map(|(at, _)| at)
                    .find(|&at| at > 0 && html.as_bytes()[at - 1].is_ascii_whitespace())
            })
            .ok_or_else(missing)?;
        let open_end = html[start..].find('>').ok_or_else(missing)? + start + 1;
        let close = html[open_end..].find("</script").ok_or_else(missing)? + open_end;

        Self::from_json(html[open_end..close].trim())
    }

    pub fn plugins(&self) -> &[PluginData] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
