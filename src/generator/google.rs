//! Google Cloud Text-to-Speech and Gemini text generation

use super::Generator;
use crate::config::UpstreamConfig;
use crate::error::{Error, Result};
use async_trait::async_trait;
use base64::Engine;
use serde::Deserialize;

/// Generator backed by Google Text-to-Speech and the Generative Language API.
///
/// Owns one `reqwest::Client` created at startup and reused for the whole
/// process lifetime.
pub struct GoogleGenerator {
    client: reqwest::Client,
    config: UpstreamConfig,
}

impl GoogleGenerator {
    pub fn new(config: UpstreamConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    fn generate_content_url(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.config.genai_endpoint.trim_end_matches('/'),
            self.config.genai_model
        )
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SynthesizeResponse {
    audio_content: String,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Content,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    #[serde(default)]
    text: Option<String>,
}

/// Copy a template object and set one top-level field on it.
fn with_field(
    template: &serde_json::Value,
    key: &str,
    value: serde_json::Value,
) -> Result<serde_json::Value> {
    let mut body = template.clone();
    match body.as_object_mut() {
        Some(map) => {
            map.insert(key.to_string(), value);
            Ok(body)
        }
        None => Err(Error::Setup("Request template must be a JSON object".to_string())),
    }
}

/// Read a response body, turning non-success statuses into upstream errors.
async fn read_success(service: &'static str, response: reqwest::Response) -> Result<String> {
    let status = response.status();
    let body = response.text().await?;
    if !status.is_success() {
        return Err(Error::Upstream {
            service,
            status: status.as_u16(),
            body,
        });
    }
    Ok(body)
}

#[async_trait]
impl Generator for GoogleGenerator {
    async fn synthesize(&self, template: &serde_json::Value, text: &str) -> Result<Vec<u8>> {
        let body = with_field(template, "input", serde_json::json!({ "text": text }))?;
        tracing::debug!(chars = text.len(), "Synthesizing text");

        let mut request = self
            .client
            .post(&self.config.tts_endpoint)
            .query(&[("key", self.config.tts_key())])
            .json(&body);
        if let Some(project) = &self.config.project {
            request = request.header("x-goog-user-project", project);
        }

        let raw = read_success("synthesize", request.send().await?).await?;
        let parsed: SynthesizeResponse = serde_json::from_str(&raw)?;
        base64::engine::general_purpose::STANDARD
            .decode(parsed.audio_content)
            .map_err(|e| Error::Decode(format!("Invalid audioContent: {}", e)))
    }

    async fn generate_text(&self, template: &serde_json::Value, prompt: &str) -> Result<String> {
        let body = with_field(
            template,
            "contents",
            serde_json::json!([{ "parts": [{ "text": prompt }] }]),
        )?;

        let response = self
            .client
            .post(self.generate_content_url())
            .query(&[("key", self.config.api_key.as_str())])
            .json(&body)
            .send()
            .await?;

        let raw = read_success("generateContent", response).await?;
        let parsed: GenerateContentResponse = serde_json::from_str(&raw)?;
        parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content.parts.into_iter().next())
            .and_then(|p| p.text)
            .ok_or_else(|| Error::Decode("generateContent returned no text".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{extract::Query, http::StatusCode, routing::post, Json, Router};
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    type Captured = Arc<Mutex<Vec<(HashMap<String, String>, serde_json::Value)>>>;

    /// Local stand-in for both Google endpoints.
    async fn spawn_upstream(fail: bool) -> (String, Captured) {
        let captured: Captured = Arc::new(Mutex::new(Vec::new()));

        let tts_log = captured.clone();
        let gen_log = captured.clone();
        let app = Router::new()
            .route(
                "/tts",
                post(
                    move |Query(q): Query<HashMap<String, String>>,
                          Json(body): Json<serde_json::Value>| async move {
                        tts_log.lock().unwrap().push((q, body));
                        if fail {
                            return (
                                StatusCode::FORBIDDEN,
                                Json(serde_json::json!({"error": {"message": "denied"}})),
                            );
                        }
                        let audio = base64::engine::general_purpose::STANDARD.encode(b"MP3DATA");
                        (StatusCode::OK, Json(serde_json::json!({ "audioContent": audio })))
                    },
                ),
            )
            .route(
                "/genai/models/*rest",
                post(
                    move |Query(q): Query<HashMap<String, String>>,
                          Json(body): Json<serde_json::Value>| async move {
                        gen_log.lock().unwrap().push((q, body));
                        if fail {
                            return (
                                StatusCode::TOO_MANY_REQUESTS,
                                Json(serde_json::json!({"error": {"message": "quota"}})),
                            );
                        }
                        (
                            StatusCode::OK,
                            Json(serde_json::json!({
                                "candidates": [{"content": {"parts": [{"text": "Why did the crab cross?"}]}}]
                            })),
                        )
                    },
                ),
            );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        (format!("http://{}", addr), captured)
    }

    fn generator_for(base: &str) -> GoogleGenerator {
        GoogleGenerator::new(UpstreamConfig {
            api_key: "gen-key".to_string(),
            tts_api_key: Some("tts-key".to_string()),
            project: Some("demo-project".to_string()),
            tts_endpoint: format!("{}/tts", base),
            genai_endpoint: format!("{}/genai/", base),
            genai_model: "gemini-test".to_string(),
        })
    }

    #[test]
    fn test_generate_content_url() {
        let generator = generator_for("http://localhost:1");
        assert_eq!(
            generator.generate_content_url(),
            "http://localhost:1/genai/models/gemini-test:generateContent"
        );
    }

    #[test]
    fn test_with_field_rejects_non_object() {
        assert!(with_field(&serde_json::json!([]), "input", serde_json::json!({})).is_err());
        let body = with_field(
            &serde_json::json!({"voice": {"name": "en-US-A"}}),
            "input",
            serde_json::json!({"text": "hi"}),
        )
        .unwrap();
        assert_eq!(body["voice"]["name"], "en-US-A");
        assert_eq!(body["input"]["text"], "hi");
    }

    #[tokio::test]
    async fn test_synthesize_decodes_audio() {
        let (base, captured) = spawn_upstream(false).await;
        let generator = generator_for(&base);

        let template = serde_json::json!({"voice": {"languageCode": "en-US"}});
        let audio = generator.synthesize(&template, "Hello").await.unwrap();
        assert_eq!(audio, b"MP3DATA");

        let log = captured.lock().unwrap();
        let (query, body) = &log[0];
        assert_eq!(query.get("key").map(String::as_str), Some("tts-key"));
        assert_eq!(body["input"]["text"], "Hello");
        assert_eq!(body["voice"]["languageCode"], "en-US");
    }

    #[tokio::test]
    async fn test_generate_text_extracts_first_part() {
        let (base, captured) = spawn_upstream(false).await;
        let generator = generator_for(&base);

        let template = serde_json::json!({"generationConfig": {"temperature": 0.9}});
        let text = generator.generate_text(&template, "Tell a joke").await.unwrap();
        assert_eq!(text, "Why did the crab cross?");

        let log = captured.lock().unwrap();
        let (query, body) = &log[0];
        assert_eq!(query.get("key").map(String::as_str), Some("gen-key"));
        assert_eq!(body["contents"][0]["parts"][0]["text"], "Tell a joke");
        assert_eq!(body["generationConfig"]["temperature"], 0.9);
    }

    #[tokio::test]
    async fn test_upstream_errors_carry_status_and_body() {
        let (base, _captured) = spawn_upstream(true).await;
        let generator = generator_for(&base);
        let template = serde_json::json!({});

        match generator.synthesize(&template, "Hello").await {
            Err(Error::Upstream { service, status, body }) => {
                assert_eq!(service, "synthesize");
                assert_eq!(status, 403);
                assert!(body.contains("denied"));
            }
            other => panic!("expected upstream error, got {:?}", other),
        }

        match generator.generate_text(&template, "Tell a joke").await {
            Err(Error::Upstream { service, status, .. }) => {
                assert_eq!(service, "generateContent");
                assert_eq!(status, 429);
            }
            other => panic!("expected upstream error, got {:?}", other),
        }
    }
}
