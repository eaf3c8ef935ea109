//! Prompt setup: static item, generative item and template definitions
//!
//! The prompts file is re-read at the start of every maintenance cycle, so
//! edits take effect without a restart. Example:
//!
//! ```json
//! {
//!   "static": [{"id": "welcome", "text": "Hello there!"}],
//!   "genai": [{"id": "joke", "text": "Tell a short joke", "ttsTemplate": "calm"}],
//!   "ttsTemplates": {
//!     "default": {"voice": {"languageCode": "en-US"}, "audioConfig": {"audioEncoding": "MP3"}}
//!   },
//!   "genAiTemplates": {"default": {}}
//! }
//! ```
//!
//! Template references default to `"default"` when omitted. Templates are
//! opaque JSON objects used as upstream request bodies.

use crate::error::{Error, Result};
use crate::store::is_url_safe_segment;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// Template name used when an item does not name one
pub const DEFAULT_TEMPLATE: &str = "default";

fn default_template() -> String {
    DEFAULT_TEMPLATE.to_string()
}

/// Item synthesized once from fixed text
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StaticItem {
    pub id: String,
    pub text: String,
    #[serde(default = "default_template")]
    pub tts_template: String,
}

/// Item whose spoken text is produced by the text generation service
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GenerativeItem {
    pub id: String,
    /// Prompt sent to the text generation service
    pub text: String,
    #[serde(default = "default_template")]
    pub tts_template: String,
    #[serde(default = "default_template")]
    pub gen_ai_template: String,
}

/// Parsed prompts file
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PromptSetup {
    #[serde(rename = "static", default)]
    pub static_items: Vec<StaticItem>,
    #[serde(rename = "genai", default)]
    pub generative_items: Vec<GenerativeItem>,
    #[serde(default)]
    pub tts_templates: HashMap<String, serde_json::Value>,
    #[serde(default)]
    pub gen_ai_templates: HashMap<String, serde_json::Value>,
}

impl PromptSetup {
    /// Read and validate the prompts file.
    pub async fn load(path: &Path) -> Result<Self> {
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            Error::Setup(format!("Failed to read prompts file {}: {}", path.display(), e))
        })?;
        Self::parse(&content)
    }

    /// Parse and validate prompt definitions from JSON text.
    pub fn parse(content: &str) -> Result<Self> {
        let setup: PromptSetup = serde_json::from_str(content)
            .map_err(|e| Error::Setup(format!("Invalid prompts file: {}", e)))?;
        setup.validate()?;
        Ok(setup)
    }

    /// Check ids and that every referenced template exists and is an object.
    pub fn validate(&self) -> Result<()> {
        for item in &self.static_items {
            validate_id(&item.id)?;
            self.tts_template(&item.tts_template)?;
        }
        for item in &self.generative_items {
            validate_id(&item.id)?;
            self.tts_template(&item.tts_template)?;
            self.gen_ai_template(&item.gen_ai_template)?;
        }
        Ok(())
    }

    pub fn tts_template(&self, name: &str) -> Result<&serde_json::Value> {
        lookup_template(&self.tts_templates, "ttsTemplates", name)
    }

    pub fn gen_ai_template(&self, name: &str) -> Result<&serde_json::Value> {
        lookup_template(&self.gen_ai_templates, "genAiTemplates", name)
    }
}

fn lookup_template<'a>(
    templates: &'a HashMap<String, serde_json::Value>,
    section: &str,
    name: &str,
) -> Result<&'a serde_json::Value> {
    match templates.get(name) {
        Some(value) if value.is_object() => Ok(value),
        Some(_) => Err(Error::Setup(format!(
            "Template '{}' in {} must be a JSON object",
            name, section
        ))),
        None => Err(Error::Setup(format!(
            "Template '{}' not found in {}",
            name, section
        ))),
    }
}

/// Ids become file names and URL path segments, so they must stay inside
/// their directory and need no percent-encoding.
fn validate_id(id: &str) -> Result<()> {
    if id.contains("..") || !is_url_safe_segment(id) {
        return Err(Error::Setup(format!("Invalid item id '{}'", id)));
    }
    Ok(())
}
