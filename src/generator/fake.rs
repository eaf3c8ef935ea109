//! Counting generator for tests

use super::Generator;
use crate::error::{Error, Result};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};

pub(crate) struct FakeGenerator {
    synthesize_calls: AtomicUsize,
    generate_calls: AtomicUsize,
    /// Synthesis succeeds this many times, then fails
    succeed_times: Option<usize>,
}

impl FakeGenerator {
    pub(crate) fn new() -> Self {
        Self {
            synthesize_calls: AtomicUsize::new(0),
            generate_calls: AtomicUsize::new(0),
            succeed_times: None,
        }
    }

    pub(crate) fn failing_after(successes: usize) -> Self {
        Self {
            succeed_times: Some(successes),
            ..Self::new()
        }
    }

    pub(crate) fn synthesize_calls(&self) -> usize {
        self.synthesize_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn generate_calls(&self) -> usize {
        self.generate_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Generator for FakeGenerator {
    async fn synthesize(&self, _template: &serde_json::Value, text: &str) -> Result<Vec<u8>> {
        let call = self.synthesize_calls.fetch_add(1, Ordering::SeqCst);
        if matches!(self.succeed_times, Some(limit) if call >= limit) {
            return Err(Error::Upstream {
                service: "synthesize",
                status: 503,
                body: "{\"error\":\"unavailable\"}".to_string(),
            });
        }
        Ok(format!("audio:{}", text).into_bytes())
    }

    async fn generate_text(&self, _template: &serde_json::Value, prompt: &str) -> Result<String> {
        self.generate_calls.fetch_add(1, Ordering::SeqCst);
        Ok(format!("generated from {}", prompt))
    }
}
