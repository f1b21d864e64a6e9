//! Intent Router: a cheap Fast stage that answers conversational input, and a Deep
//! stage with the full prompt and tool surface for everything else.
//!
//! The Fast stage asks for a tagged JSON verdict. When the model ignores the schema
//! the escalation sentinel is still honoured anywhere in the raw text, so a verdict
//! can only be `Answer` when the output is non-empty and sentinel-free.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::ServiceError;
use crate::gateway::{Invocation, ModelGateway, ReasoningRequest};
use crate::prompts;
use crate::shared::PersistedState;
use crate::tools::{tool_declarations, ToolExecutor};

const LOG_TARGET: &str = "steward::router";

/// Substring that always means "hand off to the Deep stage".
pub const ESCALATION_SENTINEL: &str = "[[HANDOFF_TO_CORTEX]]";

pub const FAST_TEMPERATURE: f32 = 0.1;
pub const FAST_MAX_TOKENS: u32 = 100;
pub const DEEP_TEMPERATURE: f32 = 0.3;

/// Prefix of every user-visible failure.
pub const MALFUNCTION_PREFIX: &str = "system malfunction:";

/// Fast-stage decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FastVerdict {
    Answer(String),
    Escalate,
}

/// Schema the router model is asked to emit.
#[derive(Debug, Deserialize)]
#[serde(tag = "route", rename_all = "snake_case")]
enum StructuredVerdict {
    Answer { reply: String },
    Escalate,
}

/// Interprets raw Fast-stage output.
pub fn interpret_fast_output(raw: &str) -> FastVerdict {
    if raw.contains(ESCALATION_SENTINEL) {
        return FastVerdict::Escalate;
    }
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return FastVerdict::Escalate;
    }
    match serde_json::from_str::<StructuredVerdict>(strip_code_fence(trimmed)) {
        Ok(StructuredVerdict::Escalate) => FastVerdict::Escalate,
        Ok(StructuredVerdict::Answer { reply }) => {
            let reply = reply.trim();
            if reply.is_empty() {
                FastVerdict::Escalate
            } else {
                FastVerdict::Answer(reply.to_string())
            }
        }
        // Looks like an attempted verdict but does not parse: do not show JSON to the owner.
        Err(_) if trimmed.starts_with('{') || trimmed.starts_with("```") => FastVerdict::Escalate,
        Err(_) => FastVerdict::Answer(trimmed.to_string()),
    }
}

/// Models often wrap JSON in ```json fences.
fn strip_code_fence(s: &str) -> &str {
    let s = s.trim();
    let Some(rest) = s.strip_prefix("```") else {
        return s;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

/// Read-only context gathered by the caller before routing.
#[derive(Debug, Clone)]
pub struct RouterContext {
    pub state: PersistedState,
    /// Rendered short history for the Fast stage.
    pub fast_history: String,
    /// Rendered longer history for the Deep stage.
    pub deep_history: String,
    /// Upcoming 24h schedule rendering.
    pub schedule_summary: String,
    pub profile: String,
    pub now: NaiveDateTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Fast,
    Deep,
}

/// Final routed answer and where it came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoutedReply {
    pub stage: Stage,
    pub reply: String,
    /// True when the tiers ran out and `reply` is the terminal message.
    pub exhausted: bool,
}

pub struct IntentRouter {
    gateway: Arc<ModelGateway>,
    router_model: String,
    tools: Arc<ToolExecutor>,
}

impl IntentRouter {
    pub fn new(gateway: Arc<ModelGateway>, router_model: impl Into<String>, tools: Arc<ToolExecutor>) -> Self {
        Self {
            gateway,
            router_model: router_model.into(),
            tools,
        }
    }

    /// Fast then, on a miss, Deep. Never fails: Deep errors become labeled messages.
    pub async fn route(&self, user_text: &str, ctx: &RouterContext) -> RoutedReply {
        if let FastVerdict::Answer(reply) = self.fast(user_text, ctx).await {
            tracing::info!(target: LOG_TARGET, "fast path hit");
            return RoutedReply {
                stage: Stage::Fast,
                reply,
                exhausted: false,
            };
        }

        tracing::info!(target: LOG_TARGET, "escalating to deep stage");
        match self.deep(user_text, ctx).await {
            Ok(routed) => routed,
            Err(e) => {
                tracing::error!(target: LOG_TARGET, error = %e, "deep stage failed");
                RoutedReply {
                    stage: Stage::Deep,
                    reply: format!("{} {}", MALFUNCTION_PREFIX, e),
                    exhausted: false,
                }
            }
        }
    }

    /// One call to the pinned router model. Any failure is a miss.
    pub async fn fast(&self, user_text: &str, ctx: &RouterContext) -> FastVerdict {
        let prompt = prompts::router_prompt(
            &ctx.schedule_summary,
            ctx.state.energy_level.as_str(),
            &ctx.state.focus_mode,
            &ctx.fast_history,
            &ctx.profile,
            user_text,
        );
        let request = ReasoningRequest::new(prompt)
            .with_temperature(FAST_TEMPERATURE)
            .with_max_tokens(FAST_MAX_TOKENS);

        match self.gateway.invoke_model(&self.router_model, request).await {
            Ok(response) => interpret_fast_output(&response.text),
            Err(e) => {
                tracing::warn!(target: LOG_TARGET, model = %self.router_model, error = %e, "fast stage failed; treating as miss");
                FastVerdict::Escalate
            }
        }
    }

    /// Full prompt with tools through the tiered gateway.
    pub async fn deep(&self, user_text: &str, ctx: &RouterContext) -> Result<RoutedReply, ServiceError> {
        let now = ctx.now.format("%Y-%m-%d %H:%M (%A)").to_string();
        let system = prompts::cortex_system(ctx.state.energy_level.as_str(), &ctx.state.focus_mode, &now);
        let body = prompts::cortex_prompt(&ctx.profile, &ctx.schedule_summary, &ctx.deep_history, user_text);
        let request = ReasoningRequest::new(body)
            .with_system(system)
            .with_tools(tool_declarations())
            .with_temperature(DEEP_TEMPERATURE);

        let reply = match self.gateway.invoke(request, 0).await? {
            Invocation::Exhausted(terminal) => {
                return Ok(RoutedReply {
                    stage: Stage::Deep,
                    reply: terminal.message,
                    exhausted: true,
                })
            }
            Invocation::Completed { response, .. } if !response.tool_calls.is_empty() => {
                self.tools.execute_all(&response.tool_calls, ctx.now).await
            }
            Invocation::Completed { response, .. } => {
                let text = response.text.trim();
                if text.is_empty() {
                    "(No output from the reasoning service)".to_string()
                } else {
                    text.to_string()
                }
            }
        };

        Ok(RoutedReply {
            stage: Stage::Deep,
            reply,
            exhausted: false,
        })
    }
}
