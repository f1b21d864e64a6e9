//! Autonomous scheduler: a single cooperative loop over registered jobs.
//!
//! Each tick collects the jobs due at that minute (registration order), runs them one
//! after another, and sleeps until the next minute boundary. A job that errors or
//! panics is logged and skipped; the loop and the remaining jobs carry on.
//!
//! The registry and the supervision ledger live behind one async mutex, so manual
//! triggers from the API never run concurrently with the loop.

mod energy_audit;
mod jobs;
mod ledger;
mod registry;

pub use energy_audit::{audit_message, energy_audit, AuditMode, AuditOutcome, AuditVerdict};
pub use jobs::{
    daily_sync, first_qualifying_event, in_supervision_window, morning_planning, supervision_ratchet,
    sync_note, wake_execution, JobContext, PlanningOutcome, SupervisionOutcome, SyncOutcome, WakeOutcome,
    WAKE_TAG,
};
pub use ledger::SupervisionLedger;
pub use registry::{JobId, JobKind, JobRegistry, JobTrigger, ScheduledJob};

use chrono::{Local, NaiveDateTime, Timelike};
use futures_util::FutureExt;
use serde::Serialize;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration as StdDuration;
use tokio::sync::Mutex;

use crate::error::StewardError;

const LOG_TARGET: &str = "steward::scheduler";

/// Typed result of one job run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "job", content = "result", rename_all = "snake_case")]
pub enum JobReport {
    MorningPlanning(PlanningOutcome),
    WakeExecution(WakeOutcome),
    DailySync(SyncOutcome),
    SupervisionRatchet(SupervisionOutcome),
    EnergyAudit(AuditOutcome),
}

/// What happened to one job during a tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TickEntry {
    pub kind: JobKind,
    pub id: JobId,
    pub outcome: Result<JobReport, String>,
}

/// Mutable scheduler state shared by the loop and manual triggers.
#[derive(Debug, Default)]
pub struct SchedulerState {
    pub registry: JobRegistry,
    pub ledger: SupervisionLedger,
}

/// Read-only view for the API.
#[derive(Debug, Clone, Serialize)]
pub struct SchedulerSnapshot {
    pub jobs: Vec<ScheduledJob>,
    pub flagged_events: Vec<String>,
}

pub struct Scheduler {
    ctx: Arc<JobContext>,
    state: Mutex<SchedulerState>,
}

impl Scheduler {
    pub fn new(ctx: Arc<JobContext>) -> Self {
        Self {
            ctx,
            state: Mutex::new(SchedulerState::default()),
        }
    }

    pub fn context(&self) -> &Arc<JobContext> {
        &self.ctx
    }

    /// Registers the standing jobs from the scheduler settings.
    pub async fn install_default_jobs(&self, now: NaiveDateTime) -> Result<(), StewardError> {
        let settings = &self.ctx.settings;
        let planning = settings.morning_planning_at()?;
        let sync = settings.daily_sync_at()?;
        let audits = settings.energy_audit_at()?;

        let mut state = self.state.lock().await;
        let reg = &mut state.registry;
        reg.register(JobKind::MorningPlanning, JobTrigger::DailyAt { time: planning }, &["daily"], None, now);
        reg.register(JobKind::DailySync, JobTrigger::DailyAt { time: sync }, &["daily"], None, now);
        reg.register(
            JobKind::SupervisionRatchet,
            JobTrigger::Every {
                minutes: settings.supervision_interval_minutes,
            },
            &["interval"],
            None,
            now,
        );
        for time in audits {
            reg.register(JobKind::EnergyAudit, JobTrigger::DailyAt { time }, &["daily", "audit"], None, now);
        }
        tracing::info!(target: LOG_TARGET, jobs = reg.len(), "scheduler jobs installed");
        Ok(())
    }

    /// Runs every job due at `now`, in registration order.
    pub async fn tick(&self, now: NaiveDateTime) -> Vec<TickEntry> {
        let mut state = self.state.lock().await;
        let due = state.registry.due(now);
        let mut entries = Vec::with_capacity(due.len());

        for id in due {
            // A job earlier in this tick may have removed this one (e.g. wake replaced).
            let Some(job) = state.registry.get(id).cloned() else {
                continue;
            };
            state.registry.mark_ran(id, now);
            let outcome = self.run_isolated(&mut state, job.kind, job.payload.as_deref(), now).await;
            entries.push(TickEntry {
                kind: job.kind,
                id,
                outcome,
            });
        }
        entries
    }

    /// Runs a job by name right now, outside its trigger.
    pub async fn trigger(&self, name: &str, now: NaiveDateTime) -> Result<JobReport, StewardError> {
        let kind: JobKind = name.parse().map_err(|_| StewardError::UnknownJob(name.to_string()))?;
        let mut state = self.state.lock().await;
        let payload = match kind {
            JobKind::WakeExecution => state
                .registry
                .with_tag(WAKE_TAG)
                .first()
                .and_then(|j| j.payload.clone()),
            _ => None,
        };
        self.run_job(&mut state, kind, payload.as_deref(), now).await
    }

    pub async fn snapshot(&self) -> SchedulerSnapshot {
        let state = self.state.lock().await;
        SchedulerSnapshot {
            jobs: state.registry.jobs().to_vec(),
            flagged_events: state.ledger.ids(),
        }
    }

    /// Drives ticks on the local clock until `shutdown` resolves.
    pub async fn run<F>(self: Arc<Self>, shutdown: F)
    where
        F: Future<Output = ()> + Send,
    {
        tokio::pin!(shutdown);
        tracing::info!(target: LOG_TARGET, "scheduler loop started");
        loop {
            let now = Local::now().naive_local();
            let ran = self.tick(now).await;
            if !ran.is_empty() {
                let failed = ran.iter().filter(|e| e.outcome.is_err()).count();
                tracing::debug!(target: LOG_TARGET, ran = ran.len(), failed, "tick complete");
            }

            tokio::select! {
                _ = tokio::time::sleep(until_next_minute(Local::now().naive_local())) => {}
                _ = &mut shutdown => {
                    tracing::info!(target: LOG_TARGET, "scheduler loop stopping");
                    break;
                }
            }
        }
    }

    async fn run_isolated(
        &self,
        state: &mut SchedulerState,
        kind: JobKind,
        payload: Option<&str>,
        now: NaiveDateTime,
    ) -> Result<JobReport, String> {
        let fut = AssertUnwindSafe(self.run_job(state, kind, payload, now)).catch_unwind();
        match fut.await {
            Ok(Ok(report)) => Ok(report),
            Ok(Err(e)) => {
                tracing::error!(target: LOG_TARGET, job = %kind, error = %e, "job returned an error");
                Err(e.to_string())
            }
            Err(panic) => {
                let msg = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                tracing::error!(target: LOG_TARGET, job = %kind, panic = %msg, "job panicked");
                Err(format!("panicked: {msg}"))
            }
        }
    }

    async fn run_job(
        &self,
        state: &mut SchedulerState,
        kind: JobKind,
        payload: Option<&str>,
        now: NaiveDateTime,
    ) -> Result<JobReport, StewardError> {
        tracing::info!(target: LOG_TARGET, job = %kind, %now, "running job");
        let ctx = self.ctx.as_ref();
        Ok(match kind {
            JobKind::MorningPlanning => {
                JobReport::MorningPlanning(morning_planning(ctx, &mut state.registry, now).await?)
            }
            JobKind::WakeExecution => {
                JobReport::WakeExecution(wake_execution(ctx, &mut state.ledger, payload, now).await?)
            }
            JobKind::DailySync => JobReport::DailySync(daily_sync(ctx, now).await?),
            JobKind::SupervisionRatchet => {
                JobReport::SupervisionRatchet(supervision_ratchet(ctx, &mut state.ledger, now).await?)
            }
            JobKind::EnergyAudit => JobReport::EnergyAudit(energy_audit(ctx, now).await?),
        })
    }
}

/// Time left until the next whole minute (at least one second).
pub fn until_next_minute(now: NaiveDateTime) -> StdDuration {
    let into_minute = u64::from(now.second()) * 1000 + u64::from(now.nanosecond() / 1_000_000).min(999);
    StdDuration::from_millis((60_000 - into_minute).max(1000))
}
