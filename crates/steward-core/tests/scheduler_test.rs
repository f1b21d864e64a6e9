//! Integration test: autonomous scheduler jobs against in-memory collaborators.
//!
//! ## Scenarios
//! 1. Daily sync is idempotent and dedups titles within one run.
//! 2. Supervision ratchet reminds once per event until the wake-up resets the ledger.
//! 3. Supervision window boundaries (59 / 61 / 121 minutes after the end).
//! 4. Undelivered reminders leave the event eligible.
//! 5. Morning planning: weekday lead time, weekday fallback, weekend clears the trigger.
//!    Exclusion keywords match whole words only.
//! 6. A panicking job does not stop the other jobs in the same tick.
//! 7. Energy audit picks the mode by hour and skips while the owner is busy.

mod common;

use chrono::Duration;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use common::*;
use steward_core::scheduler::{
    daily_sync, energy_audit, supervision_ratchet, wake_execution, AuditMode, AuditOutcome, JobReport,
    PlanningOutcome, Scheduler, SupervisionLedger, WAKE_TAG,
};
use steward_core::{EnergyLevel, JobKind};

// ---------------------------------------------------------------------------
// Daily sync
// ---------------------------------------------------------------------------

#[tokio::test]
async fn daily_sync_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let workspace = FakeWorkspace::with(
        vec![
            event("e1", "Essay", tuesday(10, 0), tuesday(11, 0)),
            event("e2", "Lunch with Sam", tuesday(12, 0), tuesday(13, 0)),
            event("e3", "Essay", tuesday(15, 0), tuesday(16, 0)),
            event("e4", "Gym", tuesday(18, 0), tuesday(19, 0)),
        ],
        vec![],
    );
    let ctx = job_context(dir.path(), ScriptedService::new(vec![]), workspace.clone(), FakeMessenger::new());

    let first = daily_sync(&ctx, tuesday(7, 0)).await.unwrap();
    assert_eq!(first.created, vec!["Essay".to_string(), "Gym".to_string()]);
    assert_eq!(first.skipped_excluded, 1);
    assert_eq!(first.skipped_existing, 1);

    let second = daily_sync(&ctx, tuesday(7, 0)).await.unwrap();
    assert!(second.created.is_empty());
    assert_eq!(second.skipped_existing, 3);
    assert_eq!(workspace.task_titles(), vec!["Essay", "Gym"]);

    let tasks = workspace.tasks.lock().unwrap();
    assert_eq!(tasks[0].notes.as_deref(), Some("[Auto-Sync] Due: 2026-03-03 11:00"));
}

#[tokio::test]
async fn daily_sync_with_empty_calendar_does_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let workspace = FakeWorkspace::new();
    let ctx = job_context(dir.path(), ScriptedService::new(vec![]), workspace.clone(), FakeMessenger::new());

    let outcome = daily_sync(&ctx, tuesday(7, 0)).await.unwrap();
    assert!(outcome.created.is_empty());
    assert!(workspace.task_titles().is_empty());
}

// ---------------------------------------------------------------------------
// Supervision ratchet
// ---------------------------------------------------------------------------

#[tokio::test]
async fn ratchet_reminds_once_until_wake_resets() {
    let dir = tempfile::tempdir().unwrap();
    let now = tuesday(12, 0);
    let workspace = FakeWorkspace::with(
        vec![event("e1", "Essay", tuesday(10, 0), now - Duration::minutes(61))],
        vec![task("t1", "Essay")],
    );
    let messenger = FakeMessenger::new();
    let ctx = job_context(dir.path(), ScriptedService::new(vec![]), workspace, messenger.clone());
    let mut ledger = SupervisionLedger::new();

    let first = supervision_ratchet(&ctx, &mut ledger, now).await.unwrap();
    assert_eq!(first.flagged, vec!["e1".to_string()]);
    assert_eq!(messenger.texts().len(), 1);
    assert!(messenger.texts()[0].contains("Essay"));

    let later = now + Duration::minutes(10);
    let second = supervision_ratchet(&ctx, &mut ledger, later).await.unwrap();
    assert!(second.flagged.is_empty());
    assert_eq!(messenger.texts().len(), 1);

    let wake = wake_execution(&ctx, &mut ledger, Some("test"), later).await.unwrap();
    assert_eq!(wake.ledger_cleared, 1);
    assert!(ledger.is_empty());

    let third = supervision_ratchet(&ctx, &mut ledger, later).await.unwrap();
    assert_eq!(third.flagged, vec!["e1".to_string()]);
}

#[tokio::test]
async fn ratchet_window_boundaries() {
    let dir = tempfile::tempdir().unwrap();
    let now = tuesday(14, 0);
    let workspace = FakeWorkspace::with(
        vec![
            event("e59", "Read chapter", tuesday(12, 0), now - Duration::minutes(59)),
            event("e61", "Problem set", tuesday(12, 0), now - Duration::minutes(61)),
            event("e121", "Lab report", tuesday(11, 0), now - Duration::minutes(121)),
        ],
        vec![
            task("t1", "Read chapter"),
            task("t2", "Problem set"),
            task("t3", "Lab report"),
        ],
    );
    let messenger = FakeMessenger::new();
    let ctx = job_context(dir.path(), ScriptedService::new(vec![]), workspace, messenger.clone());
    let mut ledger = SupervisionLedger::new();

    let outcome = supervision_ratchet(&ctx, &mut ledger, now).await.unwrap();
    assert_eq!(outcome.flagged, vec!["e61".to_string()]);
    assert_eq!(messenger.texts().len(), 1);
}

#[tokio::test]
async fn ratchet_ignores_completed_and_excluded() {
    let dir = tempfile::tempdir().unwrap();
    let now = tuesday(14, 0);
    let end = now - Duration::minutes(90);
    let mut done = task("t1", "Problem set");
    done.status = steward_core::TaskStatus::Completed;
    let workspace = FakeWorkspace::with(
        vec![
            event("e1", "Problem set", tuesday(11, 0), end),
            event("e2", "Lunch break", tuesday(11, 0), end),
        ],
        vec![done, task("t2", "Lunch break")],
    );
    let messenger = FakeMessenger::new();
    let ctx = job_context(dir.path(), ScriptedService::new(vec![]), workspace, messenger.clone());
    let mut ledger = SupervisionLedger::new();

    let outcome = supervision_ratchet(&ctx, &mut ledger, now).await.unwrap();
    assert!(outcome.flagged.is_empty());
    assert!(messenger.texts().is_empty());
}

#[tokio::test]
async fn undelivered_reminder_stays_eligible() {
    let dir = tempfile::tempdir().unwrap();
    let now = tuesday(12, 0);
    let workspace = FakeWorkspace::with(
        vec![event("e1", "Essay", tuesday(10, 0), now - Duration::minutes(70))],
        vec![task("t1", "Essay")],
    );
    let messenger = FakeMessenger::new();
    messenger.fail(true);
    let ctx = job_context(dir.path(), ScriptedService::new(vec![]), workspace, messenger.clone());
    let mut ledger = SupervisionLedger::new();

    let outcome = supervision_ratchet(&ctx, &mut ledger, now).await.unwrap();
    assert_eq!(outcome.undelivered, vec!["e1".to_string()]);
    assert!(!ledger.contains("e1"));

    messenger.fail(false);
    let retry = supervision_ratchet(&ctx, &mut ledger, now + Duration::minutes(10)).await.unwrap();
    assert_eq!(retry.flagged, vec!["e1".to_string()]);
}

#[tokio::test]
async fn reminder_uses_generated_text_when_available() {
    let dir = tempfile::tempdir().unwrap();
    let now = tuesday(12, 0);
    let workspace = FakeWorkspace::with(
        vec![event("e1", "Essay", tuesday(10, 0), now - Duration::minutes(70))],
        vec![task("t1", "Essay")],
    );
    let messenger = FakeMessenger::new();
    let service = ScriptedService::new(vec![ok("Sir, the essay. Now.")]);
    let ctx = job_context(dir.path(), service.clone(), workspace, messenger.clone());
    let mut ledger = SupervisionLedger::new();

    supervision_ratchet(&ctx, &mut ledger, now).await.unwrap();
    assert_eq!(messenger.texts(), vec!["Sir, the essay. Now.".to_string()]);
    assert_eq!(service.calls()[0].temperature, Some(0.9));
}

// ---------------------------------------------------------------------------
// Morning planning and wake-up through the scheduler
// ---------------------------------------------------------------------------

fn wake_jobs(snapshot: &steward_core::SchedulerSnapshot) -> Vec<&steward_core::scheduler::ScheduledJob> {
    snapshot.jobs.iter().filter(|j| j.has_tag(WAKE_TAG)).collect()
}

#[tokio::test]
async fn weekday_event_sets_wake_one_hour_before() {
    let dir = tempfile::tempdir().unwrap();
    let workspace = FakeWorkspace::with(
        vec![
            event("c", "Commute", tuesday(8, 0), tuesday(8, 45)),
            event("l", "Lecture", tuesday(9, 0), tuesday(10, 0)),
        ],
        vec![task("t1", "Essay")],
    );
    let messenger = FakeMessenger::new();
    let scheduler = Scheduler::new(job_context(dir.path(), ScriptedService::new(vec![]), workspace, messenger.clone()));

    let report = scheduler.trigger("morning_planning", tuesday(2, 0)).await.unwrap();
    match report {
        JobReport::MorningPlanning(PlanningOutcome::WakeScheduled { at, anchor, .. }) => {
            assert_eq!(at, tuesday(8, 0));
            assert_eq!(anchor.as_deref(), Some("Lecture"));
        }
        other => panic!("unexpected report {other:?}"),
    }
    let snapshot = scheduler.snapshot().await;
    let wake = wake_jobs(&snapshot);
    assert_eq!(wake.len(), 1);
    assert_eq!(wake[0].kind, JobKind::WakeExecution);
    assert_eq!(wake[0].next_due, tuesday(8, 0));

    assert!(scheduler.tick(tuesday(7, 59)).await.is_empty());
    let ran = scheduler.tick(tuesday(8, 0)).await;
    assert_eq!(ran.len(), 1);
    assert_eq!(ran[0].kind, JobKind::WakeExecution);
    assert!(ran[0].outcome.is_ok());

    let texts = messenger.texts();
    assert_eq!(texts.len(), 1);
    assert!(texts[0].contains("Lecture"));
    assert!(texts[0].contains("Pending Tasks:"));
    assert!(!texts[0].contains("Commute"));
    assert!(wake_jobs(&scheduler.snapshot().await).is_empty());
}

#[tokio::test]
async fn exclusion_words_do_not_match_inside_other_words() {
    let dir = tempfile::tempdir().unwrap();
    let workspace = FakeWorkspace::with(
        vec![
            event("r", "Rest", tuesday(8, 0), tuesday(8, 30)),
            event("l", "Interest Rates Lecture", tuesday(9, 0), tuesday(10, 0)),
            event("f", "Forest Restoration Meeting", tuesday(11, 0), tuesday(12, 0)),
        ],
        vec![],
    );
    let ctx = job_context(dir.path(), ScriptedService::new(vec![]), workspace.clone(), FakeMessenger::new());
    let scheduler = Scheduler::new(Arc::clone(&ctx));

    match scheduler.trigger("morning_planning", tuesday(2, 0)).await.unwrap() {
        JobReport::MorningPlanning(PlanningOutcome::WakeScheduled { at, anchor, .. }) => {
            assert_eq!(at, tuesday(8, 0));
            assert_eq!(anchor.as_deref(), Some("Interest Rates Lecture"));
        }
        other => panic!("unexpected report {other:?}"),
    }

    let synced = daily_sync(&ctx, tuesday(7, 0)).await.unwrap();
    assert_eq!(
        synced.created,
        vec!["Interest Rates Lecture".to_string(), "Forest Restoration Meeting".to_string()]
    );
    assert_eq!(synced.skipped_excluded, 1);
}

#[tokio::test]
async fn empty_weekday_uses_default_wake_time() {
    let dir = tempfile::tempdir().unwrap();
    let scheduler = Scheduler::new(job_context(
        dir.path(),
        ScriptedService::new(vec![]),
        FakeWorkspace::new(),
        FakeMessenger::new(),
    ));

    scheduler.trigger("morning_planning", tuesday(2, 0)).await.unwrap();
    let snapshot = scheduler.snapshot().await;
    let wake = wake_jobs(&snapshot);
    assert_eq!(wake.len(), 1);
    assert_eq!(wake[0].next_due, tuesday(9, 30));
}

#[tokio::test]
async fn weekend_registers_no_wake_and_clears_previous() {
    let dir = tempfile::tempdir().unwrap();
    let friday = at(2026, 3, 6, 2, 0);
    let workspace = FakeWorkspace::with(
        vec![event("s", "Seminar", saturday(10, 0), saturday(11, 0))],
        vec![],
    );
    let scheduler = Scheduler::new(job_context(
        dir.path(),
        ScriptedService::new(vec![]),
        workspace,
        FakeMessenger::new(),
    ));

    scheduler.trigger("morning_planning", friday).await.unwrap();
    assert_eq!(wake_jobs(&scheduler.snapshot().await).len(), 1);

    let report = scheduler.trigger("morning_planning", saturday(2, 0)).await.unwrap();
    assert_eq!(
        report,
        JobReport::MorningPlanning(PlanningOutcome::Weekend { cleared: 1 })
    );
    assert!(wake_jobs(&scheduler.snapshot().await).is_empty());
}

#[tokio::test]
async fn unknown_job_name_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let scheduler = Scheduler::new(job_context(
        dir.path(),
        ScriptedService::new(vec![]),
        FakeWorkspace::new(),
        FakeMessenger::new(),
    ));
    assert!(scheduler.trigger("make_coffee", tuesday(9, 0)).await.is_err());
}

// ---------------------------------------------------------------------------
// Failure isolation
// ---------------------------------------------------------------------------

#[tokio::test]
async fn panicking_job_does_not_stop_the_tick() {
    let dir = tempfile::tempdir().unwrap();
    let workspace = FakeWorkspace::with(
        vec![
            event("r", "Report", tuesday(5, 0), tuesday(6, 9)),
            event("e", "Essay", tuesday(10, 0), tuesday(11, 0)),
        ],
        vec![task("t1", "Report")],
    );
    workspace.panic_on_create_task.store(true, Ordering::SeqCst);
    let messenger = FakeMessenger::new();
    let scheduler = Arc::new(Scheduler::new(job_context(
        dir.path(),
        ScriptedService::new(vec![]),
        workspace,
        messenger.clone(),
    )));
    scheduler.install_default_jobs(tuesday(6, 55)).await.unwrap();

    let ran = scheduler.tick(tuesday(7, 10)).await;
    assert_eq!(ran.len(), 2);
    assert_eq!(ran[0].kind, JobKind::DailySync);
    let err = ran[0].outcome.as_ref().unwrap_err();
    assert!(err.contains("panicked"), "{err}");

    assert_eq!(ran[1].kind, JobKind::SupervisionRatchet);
    match ran[1].outcome.as_ref().unwrap() {
        JobReport::SupervisionRatchet(outcome) => assert_eq!(outcome.flagged, vec!["r".to_string()]),
        other => panic!("unexpected report {other:?}"),
    }
    assert_eq!(messenger.texts().len(), 1);

    // The scheduler keeps working after the panic.
    let ran = scheduler.tick(tuesday(7, 20)).await;
    assert_eq!(ran.len(), 1);
    assert!(ran[0].outcome.is_ok());
    assert_eq!(scheduler.snapshot().await.flagged_events, vec!["r".to_string()]);
}

// ---------------------------------------------------------------------------
// Energy audit
// ---------------------------------------------------------------------------

const LOW_VERDICT: &str =
    r#"{"current_energy":"LOW","reason":"short replies since noon","suggested_action":"Take a walk"}"#;

#[tokio::test]
async fn tactical_audit_sets_energy_and_notifies_on_low() {
    let dir = tempfile::tempdir().unwrap();
    let service = ScriptedService::new(vec![ok(LOW_VERDICT)]);
    let messenger = FakeMessenger::new();
    let ctx = job_context(dir.path(), service.clone(), FakeWorkspace::new(), messenger.clone());

    let outcome = energy_audit(&ctx, tuesday(10, 0)).await.unwrap();
    assert_eq!(
        outcome,
        AuditOutcome::Completed {
            mode: AuditMode::Tactical,
            energy: EnergyLevel::Low,
            notified: true,
        }
    );
    assert_eq!(ctx.state.get().energy_level, EnergyLevel::Low);
    assert_eq!(service.models(), vec![ctx.audit_flash_model.clone()]);
    assert!(messenger.texts()[0].contains("Take a walk"));
}

#[tokio::test]
async fn strategic_audit_uses_pro_model() {
    let dir = tempfile::tempdir().unwrap();
    let verdict = r#"{"current_energy":"HIGH","reason":"good day","suggested_action":"Plan tomorrow","balance_check":"ok"}"#;
    let service = ScriptedService::new(vec![ok(verdict)]);
    let messenger = FakeMessenger::new();
    let ctx = job_context(dir.path(), service.clone(), FakeWorkspace::new(), messenger.clone());

    let outcome = energy_audit(&ctx, tuesday(21, 0)).await.unwrap();
    assert!(matches!(outcome, AuditOutcome::Completed { mode: AuditMode::Strategic, notified: true, .. }));
    assert_eq!(service.models(), vec![ctx.audit_pro_model.clone()]);
}

#[tokio::test]
async fn audit_skips_while_owner_is_busy() {
    let dir = tempfile::tempdir().unwrap();
    let service = ScriptedService::new(vec![ok(LOW_VERDICT)]);
    let workspace = FakeWorkspace::with(vec![event("m", "Meeting", tuesday(9, 30), tuesday(10, 30))], vec![]);
    let ctx = job_context(dir.path(), service.clone(), workspace, FakeMessenger::new());

    let outcome = energy_audit(&ctx, tuesday(10, 0)).await.unwrap();
    assert_eq!(outcome, AuditOutcome::SkippedBusy { event: "Meeting".to_string() });
    assert!(service.calls().is_empty());
}

#[tokio::test]
async fn audit_with_unparseable_output_fails_softly() {
    let dir = tempfile::tempdir().unwrap();
    let service = ScriptedService::new(vec![ok("You seem tired.")]);
    let ctx = job_context(dir.path(), service, FakeWorkspace::new(), FakeMessenger::new());

    let outcome = energy_audit(&ctx, tuesday(10, 0)).await.unwrap();
    assert!(matches!(outcome, AuditOutcome::Failed { .. }));
    assert_eq!(ctx.state.get().energy_level, EnergyLevel::Unknown);
}
