//! The scheduler's jobs. Each takes the shared [`JobContext`], the mutable scheduler
//! state it needs, and the tick time, and returns a typed outcome for logging and tests.

use chrono::{Datelike, Duration, NaiveDateTime, NaiveTime, Weekday};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;

use crate::config::SchedulerSettings;
use crate::error::StewardError;
use crate::formatter::{format_schedule_digest, format_tasks};
use crate::gateway::{Invocation, ModelGateway, ReasoningRequest};
use crate::memory::{ConversationLog, StateStore};
use crate::profile::ProfileCache;
use crate::prompts;
use crate::shared::{CalendarEvent, NewTask};
use crate::traits::{Messenger, Workspace};

use super::ledger::SupervisionLedger;
use super::registry::{JobKind, JobRegistry, JobTrigger};

const LOG_TARGET: &str = "steward::scheduler";

/// Tag carried by the one-shot wake trigger so planning can replace it.
pub const WAKE_TAG: &str = "wake";

pub const GREETING_TEMPERATURE: f32 = 0.8;
pub const GREETING_MAX_TOKENS: u32 = 60;
pub const REMINDER_TEMPERATURE: f32 = 0.9;
pub const REMINDER_MAX_TOKENS: u32 = 50;

/// Upper bound on tasks fetched for sync dedup and supervision checks.
const TASK_FETCH_LIMIT: usize = 100;

/// Collaborators and settings shared by every job.
pub struct JobContext {
    pub gateway: Arc<ModelGateway>,
    pub workspace: Arc<dyn Workspace>,
    pub messenger: Arc<dyn Messenger>,
    pub state: Arc<StateStore>,
    pub log: Arc<ConversationLog>,
    pub profile: Arc<ProfileCache>,
    pub settings: SchedulerSettings,
    pub audit_flash_model: String,
    pub audit_pro_model: String,
    /// Channel notifications are posted to.
    pub owner_channel: String,
    /// Conversation-log user id of the owner.
    pub owner_id: String,
}

impl JobContext {
    /// Fire-and-forget delivery; failures are logged and reported as `false`.
    pub async fn deliver(&self, text: &str) -> bool {
        let ok = self.messenger.post_message(&self.owner_channel, text).await;
        if !ok {
            tracing::warn!(target: LOG_TARGET, channel = %self.owner_channel, "notification delivery failed");
        }
        ok
    }

    /// Short generated text through the tiered gateway, or `fallback` on any failure.
    pub async fn generate_or(&self, request: ReasoningRequest, fallback: String) -> String {
        match self.gateway.invoke(request, 0).await {
            Ok(Invocation::Completed { response, .. }) => {
                let text = response.text.trim();
                if text.is_empty() {
                    fallback
                } else {
                    text.to_string()
                }
            }
            Ok(Invocation::Exhausted(t)) => {
                tracing::warn!(target: LOG_TARGET, attempts = t.attempts, "tiers exhausted; using canned text");
                fallback
            }
            Err(e) => {
                tracing::warn!(target: LOG_TARGET, error = %e, "generation failed; using canned text");
                fallback
            }
        }
    }

    fn excluded(&self, event: &CalendarEvent) -> bool {
        event.is_excluded(&self.settings.excluded_keywords)
    }
}

// -----------------------------------------------------------------------------
// Morning planning
// -----------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum PlanningOutcome {
    /// Saturday/Sunday: previous wake trigger cleared, nothing registered.
    Weekend { cleared: usize },
    WakeScheduled {
        at: NaiveDateTime,
        reason: String,
        /// Title of the event the wake time was derived from, if any.
        anchor: Option<String>,
        cleared: usize,
    },
}

/// Earliest event starting after `now` that is not excluded.
pub fn first_qualifying_event<'a>(
    events: &'a [CalendarEvent],
    now: NaiveDateTime,
    keywords: &[String],
) -> Option<(&'a CalendarEvent, NaiveDateTime)> {
    events
        .iter()
        .filter(|e| !e.is_excluded(keywords))
        .filter_map(|e| e.start.map(|s| (e, s)))
        .filter(|(_, s)| *s > now)
        .min_by_key(|(_, s)| *s)
}

pub async fn morning_planning(
    ctx: &JobContext,
    registry: &mut JobRegistry,
    now: NaiveDateTime,
) -> Result<PlanningOutcome, StewardError> {
    let cleared = registry.clear_tag(WAKE_TAG);
    if matches!(now.weekday(), Weekday::Sat | Weekday::Sun) {
        tracing::info!(target: LOG_TARGET, cleared, "weekend: no wake trigger");
        return Ok(PlanningOutcome::Weekend { cleared });
    }

    let horizon = now + Duration::hours(ctx.settings.planning_lookahead_hours);
    let events = ctx.workspace.list_events(now, horizon).await;

    let (at, reason, anchor) =
        match first_qualifying_event(&events, now, &ctx.settings.excluded_keywords) {
            Some((event, start)) => {
                let at = start - Duration::minutes(ctx.settings.wake_lead_minutes);
                let reason = format!(
                    "First event '{}' starts at {}",
                    event.title,
                    start.format("%H:%M")
                );
                (at, reason, Some(event.title.clone()))
            }
            None => {
                let wake: NaiveTime = ctx.settings.default_wake_at()?;
                let reason = "No fixed events today, but it is a weekday".to_string();
                (now.date().and_time(wake), reason, None)
            }
        };

    registry.register(
        JobKind::WakeExecution,
        JobTrigger::Once { at },
        &[WAKE_TAG],
        Some(reason.clone()),
        now,
    );
    tracing::info!(target: LOG_TARGET, wake_at = %at, anchor = ?anchor, cleared, "wake trigger registered");
    Ok(PlanningOutcome::WakeScheduled {
        at,
        reason,
        anchor,
        cleared,
    })
}

// -----------------------------------------------------------------------------
// Wake execution
// -----------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WakeOutcome {
    pub delivered: bool,
    pub message: String,
    /// Ledger entries forgotten by the daily reset.
    pub ledger_cleared: usize,
}

fn canned_greeting(reason: &str) -> String {
    format!("Good morning. The greeting generator has failed, but you must still get up. Reason: {reason}.")
}

pub async fn wake_execution(
    ctx: &JobContext,
    ledger: &mut SupervisionLedger,
    reason: Option<&str>,
    now: NaiveDateTime,
) -> Result<WakeOutcome, StewardError> {
    let reason = reason.unwrap_or("Scheduled wake-up");
    let request = ReasoningRequest::new(prompts::wake_prompt(reason, &ctx.profile.get()))
        .with_temperature(GREETING_TEMPERATURE)
        .with_max_tokens(GREETING_MAX_TOKENS);
    let greeting = ctx.generate_or(request, canned_greeting(reason)).await;

    let day_start = now.date().and_time(NaiveTime::default());
    let day_end = day_start + Duration::days(1);
    let mut today = ctx.workspace.list_events(day_start, day_end).await;
    today.retain(|e| !ctx.excluded(e));
    let mut tasks = ctx.workspace.list_tasks(ctx.settings.wake_task_limit).await;
    tasks.truncate(ctx.settings.wake_task_limit);

    let message = format!(
        "{}\n\nToday's schedule:\n{}\n\n{}",
        greeting,
        format_schedule_digest(&today),
        format_tasks(&tasks)
    );
    let delivered = ctx.deliver(&message).await;

    let ledger_cleared = ledger.reset();
    tracing::info!(target: LOG_TARGET, delivered, ledger_cleared, "wake-up executed; supervision ledger reset");
    Ok(WakeOutcome {
        delivered,
        message,
        ledger_cleared,
    })
}

// -----------------------------------------------------------------------------
// Daily sync
// -----------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncOutcome {
    pub created: Vec<String>,
    pub skipped_existing: usize,
    pub skipped_excluded: usize,
    pub failed: usize,
}

/// Task note recording the event end time.
pub fn sync_note(event: &CalendarEvent) -> String {
    let due = event
        .end
        .map(|e| e.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "unspecified".to_string());
    format!("[Auto-Sync] Due: {due}")
}

pub async fn daily_sync(ctx: &JobContext, now: NaiveDateTime) -> Result<SyncOutcome, StewardError> {
    let horizon = now + Duration::hours(ctx.settings.sync_lookahead_hours);
    let events = ctx.workspace.list_events(now, horizon).await;
    let mut outcome = SyncOutcome::default();
    if events.is_empty() {
        tracing::info!(target: LOG_TARGET, "daily sync: no upcoming events");
        return Ok(outcome);
    }

    let mut existing: HashSet<String> = ctx
        .workspace
        .list_tasks(TASK_FETCH_LIMIT)
        .await
        .into_iter()
        .map(|t| t.title)
        .collect();

    for event in &events {
        if ctx.excluded(event) {
            outcome.skipped_excluded += 1;
            continue;
        }
        if existing.contains(&event.title) {
            outcome.skipped_existing += 1;
            continue;
        }
        let created = ctx
            .workspace
            .create_task(NewTask {
                title: event.title.clone(),
                notes: Some(sync_note(event)),
            })
            .await;
        match created {
            Some(_) => {
                tracing::info!(target: LOG_TARGET, title = %event.title, "synced event to task");
                existing.insert(event.title.clone());
                outcome.created.push(event.title.clone());
            }
            None => {
                tracing::warn!(target: LOG_TARGET, title = %event.title, "task creation failed");
                outcome.failed += 1;
            }
        }
    }

    tracing::info!(target: LOG_TARGET, added = outcome.created.len(), "daily sync complete");
    Ok(outcome)
}

// -----------------------------------------------------------------------------
// Supervision ratchet
// -----------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SupervisionOutcome {
    /// Event ids flagged (reminded and added to the ledger) on this run.
    pub flagged: Vec<String>,
    /// Reminders generated but not delivered; those ids stay eligible.
    pub undelivered: Vec<String>,
}

/// Strictly inside `(end + start_min, end + end_min)`.
pub fn in_supervision_window(end: NaiveDateTime, now: NaiveDateTime, settings: &SchedulerSettings) -> bool {
    let open = end + Duration::minutes(settings.supervision_window_start_minutes);
    let close = end + Duration::minutes(settings.supervision_window_end_minutes);
    open < now && now < close
}

fn canned_reminder(title: &str) -> String {
    format!("Sir, '{title}' ended over an hour ago and is still not ticked off.")
}

pub async fn supervision_ratchet(
    ctx: &JobContext,
    ledger: &mut SupervisionLedger,
    now: NaiveDateTime,
) -> Result<SupervisionOutcome, StewardError> {
    let from = now - Duration::hours(ctx.settings.supervision_lookback_hours);
    let events = ctx.workspace.list_events(from, now).await;
    let mut outcome = SupervisionOutcome::default();

    let candidates: Vec<&CalendarEvent> = events
        .iter()
        .filter(|e| !ledger.contains(&e.id))
        .filter(|e| !ctx.excluded(e))
        .filter(|e| matches!(e.end, Some(end) if in_supervision_window(end, now, &ctx.settings)))
        .collect();
    if candidates.is_empty() {
        return Ok(outcome);
    }

    let pending: HashSet<String> = ctx
        .workspace
        .list_tasks(TASK_FETCH_LIMIT)
        .await
        .into_iter()
        .filter(|t| t.is_outstanding())
        .map(|t| t.title)
        .collect();

    for event in candidates {
        if !pending.contains(&event.title) {
            continue;
        }
        // Same id can repeat across recurring instances in one listing.
        if ledger.contains(&event.id) {
            continue;
        }
        tracing::warn!(target: LOG_TARGET, title = %event.title, event_id = %event.id, "event ended but task still outstanding");
        let request = ReasoningRequest::new(prompts::supervisor_prompt(&event.title))
            .with_temperature(REMINDER_TEMPERATURE)
            .with_max_tokens(REMINDER_MAX_TOKENS);
        let reminder = ctx.generate_or(request, canned_reminder(&event.title)).await;

        if ctx.deliver(&reminder).await {
            ledger.flag(&event.id);
            outcome.flagged.push(event.id.clone());
        } else {
            outcome.undelivered.push(event.id.clone());
        }
    }
    Ok(outcome)
}
