use crate::error::UpstreamError;
use crate::models::turn::Turn;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const SAFETY_CATEGORIES: [&str; 4] = [
    "HARM_CATEGORY_HARASSMENT",
    "HARM_CATEGORY_HATE_SPEECH",
    "HARM_CATEGORY_SEXUALLY_EXPLICIT",
    "HARM_CATEGORY_DANGEROUS_CONTENT",
];

/// Boundary to the external text-generation service. Every call carries the
/// full system prompt and transcript; the service keeps no memory between
/// calls.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ModelGateway: Send + Sync {
    async fn generate(&self, system_prompt: &str, transcript: &[Turn])
        -> Result<String, UpstreamError>;
}

/// Pass-through generation settings. The gateway does not interpret them.
#[derive(Debug, Clone)]
pub struct GenerationSettings {
    pub model: String,
    pub base_url: String,
    pub safety_threshold: String,
    pub google_search: bool,
    pub thinking_budget: i32,
    pub timeout: Duration,
}

#[derive(Clone)]
pub struct AIService {
    client: Client,
    api_key: String,
    settings: GenerationSettings,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    system_instruction: Content<'a>,
    contents: Vec<Content<'a>>,
    safety_settings: Vec<SafetySetting<'a>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<serde_json::Value>,
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'a str>,
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Serialize)]
struct SafetySetting<'a> {
    category: &'a str,
    threshold: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    thinking_config: ThinkingConfig,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ThinkingConfig {
    thinking_budget: i32,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<CandidateContent>,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

impl AIService {
    pub fn new(api_key: String, client: Client, settings: GenerationSettings) -> Self {
        Self {
            client,
            api_key,
            settings,
        }
    }

    fn build_request<'a>(&'a self, system_prompt: &'a str, transcript: &'a [Turn]) -> GenerateRequest<'a> {
        let tools = if self.settings.google_search {
            vec![serde_json::json!({ "googleSearch": {} })]
        } else {
            vec![]
        };

        GenerateRequest {
            system_instruction: Content {
                role: None,
                parts: vec![Part { text: system_prompt }],
            },
            contents: transcript
                .iter()
                .map(|turn| Content {
                    role: Some(turn.role.as_str()),
                    parts: vec![Part {
                        text: &turn.content,
                    }],
                })
                .collect(),
            safety_settings: SAFETY_CATEGORIES
                .iter()
                .copied()
                .map(|category| SafetySetting {
                    category,
                    threshold: &self.settings.safety_threshold,
                })
                .collect(),
            tools,
            generation_config: GenerationConfig {
                thinking_config: ThinkingConfig {
                    thinking_budget: self.settings.thinking_budget,
                },
            },
        }
    }
}

#[async_trait]
impl ModelGateway for AIService {
    async fn generate(
        &self,
        system_prompt: &str,
        transcript: &[Turn],
    ) -> Result<String, UpstreamError> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.settings.base_url.trim_end_matches('/'),
            self.settings.model
        );
        let payload = self.build_request(system_prompt, transcript);

        tracing::debug!(model = %self.settings.model, turns = transcript.len(), "Sending request to Gemini");
        let res = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&payload)
            .timeout(self.settings.timeout)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    UpstreamError::Timeout(self.settings.timeout)
                } else {
                    UpstreamError::Transport(e)
                }
            })?;

        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(UpstreamError::Status { status, body });
        }

        let body: GenerateResponse = res.json().await?;
        extract_text(body)
    }
}

fn extract_text(body: GenerateResponse) -> Result<String, UpstreamError> {
    let Some(candidate) = body.candidates.into_iter().next() else {
        return Err(UpstreamError::EmptyReply("no candidates".to_string()));
    };

    let text: String = candidate
        .content
        .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();

    if text.trim().is_empty() {
        return Err(UpstreamError::EmptyReply(
            candidate.finish_reason.unwrap_or_else(|| "unknown".to_string()),
        ));
    }
    Ok(text)
}
