use crate::errors::EditorResult;
use serde::{Deserialize, Serialize};

/// Engine settings, usually the `engine` section of `weft.config.json`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineConfig {
    /// Root element name the engine accepts; any root is accepted when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_root: Option<String>,

    /// Maximum number of undo levels (0 = unlimited)
    #[serde(default = "default_undo_levels")]
    pub undo_levels: usize,

    /// Whether whitespace-only text gets a text component
    #[serde(default)]
    pub preserve_whitespace_text: bool,
}

fn default_undo_levels() -> usize {
    100
}

impl EngineConfig {
    pub fn from_json(json: &str) -> EditorResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn with_expected_root(mut self, name: impl Into<String>) -> Self {
        self.expected_root = Some(name.into());
        self
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            expected_root: None,
            undo_levels: default_undo_levels(),
            preserve_whitespace_text: false,
        }
    }
}
