//! Gemini reasoning client: implements [`ReasoningService`] over the
//! `generateContent` REST endpoint (mock or live).
//!
//! HTTP failures are classified with [`ServiceError::classify`], so 429/503 and
//! `RESOURCE_EXHAUSTED`-style bodies become capacity failures and the gateway rotates tiers.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use steward_core::{ReasoningRequest, ReasoningResponse, ReasoningService, SafetySetting, ServiceError, ToolCall};

const LOG_TARGET: &str = "steward::gemini";
pub const ENV_GEMINI_API_KEY: &str = "GEMINI_API_KEY";
const ENV_GEMINI_API_URL: &str = "GEMINI_API_URL";
const DEFAULT_API_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const REQUEST_TIMEOUT_SECS: u64 = 60;

/// Mode for reasoning calls: mock (deterministic offline text) or live (calls the API).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LlmMode {
    #[default]
    Mock,
    Live,
}

impl LlmMode {
    pub fn from_flag(live: bool) -> Self {
        if live {
            LlmMode::Live
        } else {
            LlmMode::Mock
        }
    }
}

// generateContent request/response structures

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content>,
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<ToolBlock<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    safety_settings: Option<&'a [SafetySetting]>,
    generation_config: GenerationBlock,
}

#[derive(Serialize, Deserialize, Debug, Default)]
struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Serialize, Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    function_call: Option<FunctionCall>,
}

#[derive(Serialize, Deserialize, Debug)]
struct FunctionCall {
    name: String,
    #[serde(default)]
    args: serde_json::Value,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
struct ToolBlock<'a> {
    function_declarations: Vec<FunctionDeclaration<'a>>,
}

#[derive(Serialize, Debug)]
struct FunctionDeclaration<'a> {
    name: &'a str,
    description: &'a str,
    parameters: &'a serde_json::Value,
}

#[derive(Serialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
struct GenerationBlock {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<&'static str>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

#[derive(Deserialize, Debug)]
struct ErrorEnvelope {
    error: ApiError,
}

#[derive(Deserialize, Debug)]
struct ApiError {
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: String,
}

fn build_body(request: &ReasoningRequest) -> GenerateContentRequest<'_> {
    let text_content = |role: Option<&str>, text: &str| Content {
        role: role.map(str::to_string),
        parts: vec![Part {
            text: Some(text.to_string()),
            function_call: None,
        }],
    };
    let tools = if request.tools.is_empty() {
        Vec::new()
    } else {
        vec![ToolBlock {
            function_declarations: request
                .tools
                .iter()
                .map(|t| FunctionDeclaration {
                    name: &t.name,
                    description: &t.description,
                    parameters: &t.parameters,
                })
                .collect(),
        }]
    };
    GenerateContentRequest {
        system_instruction: request
            .system_instruction
            .as_deref()
            .filter(|s| !s.is_empty())
            .map(|s| text_content(None, s)),
        contents: vec![text_content(Some("user"), &request.contents)],
        tools,
        safety_settings: request.safety.as_deref(),
        generation_config: GenerationBlock {
            temperature: request.generation.temperature,
            max_output_tokens: request.generation.max_output_tokens,
            response_mime_type: request.generation.json_response.then_some("application/json"),
        },
    }
}

fn into_response(model: &str, body: GenerateContentResponse) -> Result<ReasoningResponse, ServiceError> {
    let Some(candidate) = body.candidates.into_iter().next() else {
        let reason = body
            .prompt_feedback
            .and_then(|f| f.block_reason)
            .unwrap_or_else(|| "no candidates".to_string());
        return Err(ServiceError::Rejected {
            model: model.to_string(),
            status: None,
            message: format!("blocked: {reason}"),
        });
    };

    let mut text = String::new();
    let mut tool_calls = Vec::new();
    for part in candidate.content.map(|c| c.parts).unwrap_or_default() {
        if let Some(t) = part.text {
            text.push_str(&t);
        }
        if let Some(call) = part.function_call {
            tool_calls.push(ToolCall {
                name: call.name,
                args: call.args,
            });
        }
    }
    Ok(ReasoningResponse {
        text,
        tool_calls,
        finish_reason: candidate.finish_reason,
    })
}

/// Error text from a non-success body: `STATUS: message` when it is the API envelope.
fn error_message(raw: &str) -> String {
    match serde_json::from_str::<ErrorEnvelope>(raw) {
        Ok(env) if !env.error.status.is_empty() => format!("{}: {}", env.error.status, env.error.message),
        Ok(env) => env.error.message,
        Err(_) => raw.chars().take(300).collect(),
    }
}

/// `models/x` and `x` both address model `x`.
fn model_path(model: &str) -> String {
    if model.starts_with("models/") || model.starts_with("tunedModels/") {
        model.to_string()
    } else {
        format!("models/{model}")
    }
}

pub struct GeminiClient {
    mode: LlmMode,
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl GeminiClient {
    /// Live mode reads `GEMINI_API_KEY` (and optional `GEMINI_API_URL`) from the environment.
    pub fn new(mode: LlmMode) -> Self {
        let api_key = std::env::var(ENV_GEMINI_API_KEY)
            .ok()
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty());
        let base_url = std::env::var(ENV_GEMINI_API_URL).unwrap_or_else(|_| DEFAULT_API_URL.to_string());
        Self::with_endpoint(mode, base_url, api_key)
    }

    pub fn with_endpoint(mode: LlmMode, base_url: impl Into<String>, api_key: Option<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            mode,
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
        }
    }

    pub fn mode(&self) -> LlmMode {
        self.mode
    }

    /// Deterministic offline output. JSON requests get an audit-shaped document.
    fn mock_generate(&self, model: &str, request: &ReasoningRequest) -> ReasoningResponse {
        let preview: String = request.contents.lines().last().unwrap_or_default().chars().take(80).collect();
        let text = if request.generation.json_response {
            serde_json::json!({
                "current_energy": "UNKNOWN",
                "reason": "mock mode",
                "suggested_action": ""
            })
            .to_string()
        } else {
            format!("[Mock {model}] {preview}")
        };
        ReasoningResponse {
            text,
            tool_calls: Vec::new(),
            finish_reason: Some("STOP".to_string()),
        }
    }

    async fn live_generate(&self, model: &str, request: &ReasoningRequest) -> Result<ReasoningResponse, ServiceError> {
        let key = self.api_key.as_deref().ok_or_else(|| ServiceError::Rejected {
            model: model.to_string(),
            status: None,
            message: format!("missing {ENV_GEMINI_API_KEY}"),
        })?;
        let url = format!("{}/{}:generateContent", self.base_url, model_path(model));

        tracing::debug!(
            target: LOG_TARGET,
            model,
            prompt_len = request.contents.len(),
            tools = request.tools.len(),
            "dispatching generateContent"
        );

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", key)
            .json(&build_body(request))
            .send()
            .await
            .map_err(|e| ServiceError::Transport {
                model: model.to_string(),
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let raw = response.text().await.unwrap_or_default();
            let message = error_message(&raw);
            tracing::warn!(target: LOG_TARGET, model, status = status.as_u16(), error = %message, "generateContent failed");
            return Err(ServiceError::classify(model, Some(status.as_u16()), message));
        }

        let body: GenerateContentResponse = response.json().await.map_err(|e| ServiceError::Decode {
            model: model.to_string(),
            message: e.to_string(),
        })?;
        into_response(model, body)
    }
}

#[async_trait]
impl ReasoningService for GeminiClient {
    async fn generate(&self, model: &str, request: &ReasoningRequest) -> Result<ReasoningResponse, ServiceError> {
        match self.mode {
            LlmMode::Mock => Ok(self.mock_generate(model, request)),
            LlmMode::Live => self.live_generate(model, request).await,
        }
    }
}
