//! Model Invocation Gateway: tiered fallback over the reasoning service.
//!
//! [`ModelGateway::invoke`] walks the configured tiers in order with one call per tier.
//! Capacity failures move on to the next tier; anything else is returned to the caller
//! untouched. Running out of tiers is a [`TerminalFailure`] value, not an error.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::{ServiceError, StewardError};

const LOG_TARGET: &str = "steward::gateway";

/// User-displayable text returned when every tier reported a capacity failure.
pub const TIERS_EXHAUSTED_MESSAGE: &str =
    "All reasoning tiers are exhausted right now (quota or overload). Please try again later.";

// -----------------------------------------------------------------------------
// Tiers
// -----------------------------------------------------------------------------

/// Fallback-ordered endpoint ids, highest priority first. Never empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelTiers(Vec<String>);

impl ModelTiers {
    pub fn new<I, S>(tiers: I) -> Result<Self, StewardError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let tiers: Vec<String> = tiers
            .into_iter()
            .map(Into::into)
            .filter(|t: &String| !t.trim().is_empty())
            .collect();
        if tiers.is_empty() {
            return Err(StewardError::Invalid("model tier list must not be empty".into()));
        }
        Ok(Self(tiers))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn primary(&self) -> &str {
        &self.0[0]
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }
}

// -----------------------------------------------------------------------------
// Request / response
// -----------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HarmCategory {
    #[serde(rename = "HARM_CATEGORY_HARASSMENT")]
    Harassment,
    #[serde(rename = "HARM_CATEGORY_HATE_SPEECH")]
    HateSpeech,
    #[serde(rename = "HARM_CATEGORY_SEXUALLY_EXPLICIT")]
    SexuallyExplicit,
    #[serde(rename = "HARM_CATEGORY_DANGEROUS_CONTENT")]
    DangerousContent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HarmBlockThreshold {
    BlockNone,
    BlockOnlyHigh,
    BlockMediumAndAbove,
    BlockLowAndAbove,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SafetySetting {
    pub category: HarmCategory,
    pub threshold: HarmBlockThreshold,
}

/// Content filtering fully relaxed across every harm category.
pub fn permissive_safety() -> Vec<SafetySetting> {
    [
        HarmCategory::Harassment,
        HarmCategory::HateSpeech,
        HarmCategory::SexuallyExplicit,
        HarmCategory::DangerousContent,
    ]
    .into_iter()
    .map(|category| SafetySetting {
        category,
        threshold: HarmBlockThreshold::BlockNone,
    })
    .collect()
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_output_tokens: Option<u32>,
    /// Ask for an `application/json` response body.
    #[serde(default)]
    pub json_response: bool,
}

/// A callable action offered to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDeclaration {
    pub name: String,
    pub description: String,
    /// JSON-schema object describing the arguments.
    pub parameters: serde_json::Value,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReasoningRequest {
    #[serde(default)]
    pub system_instruction: Option<String>,
    pub contents: String,
    #[serde(default)]
    pub tools: Vec<ToolDeclaration>,
    #[serde(default)]
    pub generation: GenerationConfig,
    /// `None` means "no policy supplied"; the gateway then injects [`permissive_safety`].
    #[serde(default)]
    pub safety: Option<Vec<SafetySetting>>,
}

impl ReasoningRequest {
    pub fn new(contents: impl Into<String>) -> Self {
        Self {
            contents: contents.into(),
            ..Default::default()
        }
    }

    pub fn with_system(mut self, instruction: impl Into<String>) -> Self {
        self.system_instruction = Some(instruction.into());
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.generation.temperature = Some(temperature);
        self
    }

    pub fn with_max_tokens(mut self, max: u32) -> Self {
        self.generation.max_output_tokens = Some(max);
        self
    }

    pub fn with_json_response(mut self) -> Self {
        self.generation.json_response = true;
        self
    }

    pub fn with_tools(mut self, tools: Vec<ToolDeclaration>) -> Self {
        self.tools = tools;
        self
    }

    pub fn with_safety(mut self, safety: Vec<SafetySetting>) -> Self {
        self.safety = Some(safety);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub name: String,
    #[serde(default)]
    pub args: serde_json::Value,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReasoningResponse {
    pub text: String,
    #[serde(default)]
    pub tool_calls: Vec<ToolCall>,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

/// External reasoning service. Implementations must report capacity problems as
/// [`ServiceError::Capacity`] (see [`ServiceError::classify`]).
#[async_trait]
pub trait ReasoningService: Send + Sync {
    async fn generate(
        &self,
        model: &str,
        request: &ReasoningRequest,
    ) -> Result<ReasoningResponse, ServiceError>;
}

// -----------------------------------------------------------------------------
// Outcomes
// -----------------------------------------------------------------------------

/// Every tier reported a capacity failure. Displayable to the user as-is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TerminalFailure {
    pub message: String,
    pub attempts: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Invocation {
    Completed {
        model: String,
        response: ReasoningResponse,
    },
    Exhausted(TerminalFailure),
}

impl Invocation {
    /// Response text, or the terminal message when tiers ran out.
    pub fn into_text(self) -> String {
        match self {
            Invocation::Completed { response, .. } => response.text,
            Invocation::Exhausted(t) => t.message,
        }
    }

    pub fn is_exhausted(&self) -> bool {
        matches!(self, Invocation::Exhausted(_))
    }
}

// -----------------------------------------------------------------------------
// Gateway
// -----------------------------------------------------------------------------

/// Stateless across calls apart from the static tier order.
#[derive(Clone)]
pub struct ModelGateway {
    service: Arc<dyn ReasoningService>,
    tiers: ModelTiers,
}

impl ModelGateway {
    pub fn new(service: Arc<dyn ReasoningService>, tiers: ModelTiers) -> Self {
        Self { service, tiers }
    }

    pub fn tiers(&self) -> &ModelTiers {
        &self.tiers
    }

    /// Calls tiers from `start_tier` onward, at most once each.
    pub async fn invoke(
        &self,
        request: ReasoningRequest,
        start_tier: usize,
    ) -> Result<Invocation, ServiceError> {
        let request = with_default_safety(request);
        let mut attempts = 0usize;

        for (index, model) in self.tiers.as_slice().iter().enumerate().skip(start_tier) {
            attempts += 1;
            match self.service.generate(model, &request).await {
                Ok(response) => {
                    tracing::debug!(target: LOG_TARGET, model = %model, tier = index, "tier answered");
                    return Ok(Invocation::Completed {
                        model: model.clone(),
                        response,
                    });
                }
                Err(e) if e.is_capacity() => {
                    tracing::warn!(
                        target: LOG_TARGET,
                        model = %model,
                        tier = index,
                        error = %e,
                        "capacity failure; falling back to next tier"
                    );
                }
                Err(e) => {
                    tracing::error!(target: LOG_TARGET, model = %model, tier = index, error = %e, "non-retryable reasoning failure");
                    return Err(e);
                }
            }
        }

        tracing::error!(target: LOG_TARGET, attempts, "all reasoning tiers exhausted");
        Ok(Invocation::Exhausted(TerminalFailure {
            message: TIERS_EXHAUSTED_MESSAGE.to_string(),
            attempts,
        }))
    }

    /// Single call to a pinned endpoint (router model, audit models). No rotation.
    pub async fn invoke_model(
        &self,
        model: &str,
        request: ReasoningRequest,
    ) -> Result<ReasoningResponse, ServiceError> {
        let request = with_default_safety(request);
        self.service.generate(model, &request).await
    }
}

fn with_default_safety(mut request: ReasoningRequest) -> ReasoningRequest {
    if request.safety.is_none() {
        request.safety = Some(permissive_safety());
    }
    request
}
