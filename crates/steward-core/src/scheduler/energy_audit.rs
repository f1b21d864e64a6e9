//! Energy audit: infers the owner's energy from recent chat and the task backlog,
//! updates the state store, and speaks up only when it matters.
//!
//! * 08:00–18:00 is **tactical**: flash audit model, last 15 turns, notify only on LOW.
//! * Otherwise **strategic**: pro audit model, last 50 turns, always notify.
//! * Skipped entirely while the owner is inside a calendar event.

use chrono::{Duration, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};

use crate::error::StewardError;
use crate::gateway::ReasoningRequest;
use crate::prompts;
use crate::shared::EnergyLevel;

use super::jobs::JobContext;

const LOG_TARGET: &str = "steward::energy_audit";

pub const AUDIT_TEMPERATURE: f32 = 0.4;
const TACTICAL_HISTORY: usize = 15;
const STRATEGIC_HISTORY: usize = 50;
const TASK_LIMIT: usize = 50;
/// Look this far back for an event the owner could still be in.
const BUSY_LOOKBACK_HOURS: i64 = 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditMode {
    Tactical,
    Strategic,
}

impl AuditMode {
    pub fn for_time(now: NaiveDateTime) -> Self {
        if (8..18).contains(&now.hour()) {
            AuditMode::Tactical
        } else {
            AuditMode::Strategic
        }
    }
}

/// JSON the audit model is asked to return.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct AuditVerdict {
    pub current_energy: String,
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub suggested_action: String,
    #[serde(default)]
    pub balance_check: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum AuditOutcome {
    SkippedBusy { event: String },
    Failed { reason: String },
    Completed {
        mode: AuditMode,
        energy: EnergyLevel,
        notified: bool,
    },
}

/// Notification text for a completed audit.
pub fn audit_message(mode: AuditMode, energy: EnergyLevel, verdict: &AuditVerdict) -> String {
    let label = match mode {
        AuditMode::Tactical => "TACTICAL",
        AuditMode::Strategic => "STRATEGIC",
    };
    let mut msg = format!("Energy audit ({label})\nState: {energy}\nAnalysis: {}\n", verdict.reason);
    if let Some(balance) = verdict.balance_check.as_deref().filter(|b| !b.trim().is_empty()) {
        msg.push_str(&format!("Balance: {balance}\n"));
    }
    msg.push_str(&format!("Advice: \"{}\"", verdict.suggested_action));
    msg
}

fn parse_verdict(raw: &str) -> Result<AuditVerdict, String> {
    let trimmed = raw.trim();
    let body = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .map(|s| s.trim_end_matches("```").trim())
        .unwrap_or(trimmed);
    serde_json::from_str(body).map_err(|e| format!("audit output is not the expected JSON: {e}"))
}

pub async fn energy_audit(ctx: &JobContext, now: NaiveDateTime) -> Result<AuditOutcome, StewardError> {
    let recent = ctx
        .workspace
        .list_events(now - Duration::hours(BUSY_LOOKBACK_HOURS), now + Duration::minutes(1))
        .await;
    if let Some(busy) = recent
        .iter()
        .find(|e| matches!((e.start, e.end), (Some(s), Some(end)) if s <= now && now <= end))
    {
        tracing::info!(target: LOG_TARGET, event = %busy.title, "owner busy; audit skipped");
        return Ok(AuditOutcome::SkippedBusy {
            event: busy.title.clone(),
        });
    }

    let mode = AuditMode::for_time(now);
    let (model, history_len) = match mode {
        AuditMode::Tactical => (&ctx.audit_flash_model, TACTICAL_HISTORY),
        AuditMode::Strategic => (&ctx.audit_pro_model, STRATEGIC_HISTORY),
    };
    let history = ctx.log.format_history(&ctx.owner_id, history_len);
    let tasks = ctx.workspace.list_tasks(TASK_LIMIT).await;
    let titles = tasks
        .iter()
        .map(|t| format!("- {}", t.title))
        .collect::<Vec<_>>()
        .join("\n");

    let request = ReasoningRequest::new(prompts::audit_prompt(
        mode == AuditMode::Strategic,
        &history,
        &titles,
        tasks.len(),
    ))
    .with_temperature(AUDIT_TEMPERATURE)
    .with_json_response();

    let verdict = match ctx.gateway.invoke_model(model, request).await {
        Ok(response) => parse_verdict(&response.text),
        Err(e) => Err(e.to_string()),
    };
    let verdict = match verdict {
        Ok(v) => v,
        Err(reason) => {
            tracing::error!(target: LOG_TARGET, model = %model, reason = %reason, "energy audit failed");
            return Ok(AuditOutcome::Failed { reason });
        }
    };

    let energy = EnergyLevel::parse_lenient(&verdict.current_energy);
    ctx.state.set_energy(energy);
    tracing::info!(target: LOG_TARGET, ?mode, %energy, reason = %verdict.reason, "energy audit result");

    let wants_notice = mode == AuditMode::Strategic || energy == EnergyLevel::Low;
    let notified = if wants_notice && !verdict.suggested_action.trim().is_empty() {
        ctx.deliver(&audit_message(mode, energy, &verdict)).await
    } else {
        false
    };

    Ok(AuditOutcome::Completed {
        mode,
        energy,
        notified,
    })
}
