//! Generative-AI consultation text.

use reqwest::Client;
use serde::Deserialize;
use serde_json::json;

use crate::error::{Result, UpstreamError};
use crate::http::{send_json, trim_base};

const SERVICE: &str = "gemini";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

/// Sends one prompt to a Gemini model; single attempt.
pub struct RecommendationClient {
    http: Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl RecommendationClient {
    pub fn new(
        http: Client,
        base_url: &str,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            http,
            base_url: trim_base(base_url),
            api_key: api_key.into(),
            model: model.into(),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Text of the first candidate, unchanged
    pub async fn recommend(&self, prompt: &str) -> Result<String> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        );
        let request = self
            .http
            .post(url)
            .query(&[("key", self.api_key.as_str())])
            .json(&json!({
                "contents": [{"role": "user", "parts": [{"text": prompt}]}]
            }));
        let response: GenerateResponse = send_json(SERVICE, request).await?;

        let text: Option<String> = response
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|content| {
                content
                    .parts
                    .into_iter()
                    .filter_map(|p| p.text)
                    .collect::<String>()
            })
            .filter(|t| !t.is_empty());

        text.ok_or_else(|| {
            let reason = response
                .prompt_feedback
                .and_then(|f| f.block_reason)
                .unwrap_or_else(|| "no candidates".to_string());
            UpstreamError::malformed(SERVICE, format!("empty response ({})", reason))
        })
    }
}
