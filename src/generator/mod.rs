//! Generator adapter
//!
//! Wraps the two upstream calls the pool needs: speech synthesis and text
//! generation. The pool only relies on the [`Generator`] contract, "a call
//! that may fail with a provider error"; [`GoogleGenerator`] is the
//! production implementation.

mod google;

#[cfg(test)]
pub(crate) mod fake;

use crate::error::Result;
use async_trait::async_trait;

pub use google::GoogleGenerator;

/// Upstream media/text generation
#[async_trait]
pub trait Generator: Send + Sync {
    /// Synthesize `text` to audio using a TTS request template.
    async fn synthesize(&self, template: &serde_json::Value, text: &str) -> Result<Vec<u8>>;

    /// Generate text from `prompt` using a generation request template.
    async fn generate_text(&self, template: &serde_json::Value, prompt: &str) -> Result<String>;
}
