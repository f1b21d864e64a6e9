//! Pre-flight diagnostics run at daemon start and exposed over the API.
//!
//! Only the boot-time run pings the reasoning service; the API re-runs the local
//! checks and reports the ping result from boot.
//!
//! A rate-limited or overloaded reasoning ping still passes (with a warning): the
//! service is reachable, it is just busy.

use serde::Serialize;
use std::path::Path;

use crate::formatter::{format_calendar_events, format_tasks};
use crate::gateway::{ModelGateway, ReasoningRequest};
use crate::memory::StateStore;
use crate::shared::{CalendarEvent, TaskItem, TaskStatus};

const LOG_TARGET: &str = "steward::diagnostics";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckStatus {
    Pass,
    Warn,
    Fail,
}

#[derive(Debug, Clone, Serialize)]
pub struct CheckResult {
    pub name: &'static str,
    pub status: CheckStatus,
    pub detail: String,
}

impl CheckResult {
    fn pass(name: &'static str, detail: impl Into<String>) -> Self {
        Self { name, status: CheckStatus::Pass, detail: detail.into() }
    }

    fn warn(name: &'static str, detail: impl Into<String>) -> Self {
        Self { name, status: CheckStatus::Warn, detail: detail.into() }
    }

    fn fail(name: &'static str, detail: impl Into<String>) -> Self {
        Self { name, status: CheckStatus::Fail, detail: detail.into() }
    }
}

/// Result of the pre-flight run. JSON-serializable for the API.
#[derive(Debug, Clone, Serialize)]
pub struct PreflightReport {
    pub checks: Vec<CheckResult>,
    /// False when any check failed.
    pub healthy: bool,
}

pub fn check_data_dir(dir: &Path) -> CheckResult {
    const NAME: &str = "data_dir";
    if let Err(e) = std::fs::create_dir_all(dir) {
        return CheckResult::fail(NAME, format!("cannot create {}: {e}", dir.display()));
    }
    let probe = dir.join("io_probe.tmp");
    let roundtrip = std::fs::write(&probe, b"probe")
        .and_then(|_| std::fs::read(&probe))
        .map(|bytes| bytes == b"probe");
    let _ = std::fs::remove_file(&probe);
    match roundtrip {
        Ok(true) => CheckResult::pass(NAME, format!("{} is writable", dir.display())),
        Ok(false) => CheckResult::fail(NAME, "probe file read back different bytes"),
        Err(e) => CheckResult::fail(NAME, format!("{}: {e}", dir.display())),
    }
}

pub fn check_state_store(store: &StateStore) -> CheckResult {
    let state = store.get();
    if store.path().is_file() {
        CheckResult::pass("state_store", format!("energy={} focus={}", state.energy_level, state.focus_mode))
    } else {
        CheckResult::fail("state_store", format!("{} was not created", store.path().display()))
    }
}

pub fn check_formatter() -> CheckResult {
    let events = [CalendarEvent {
        id: "123".into(),
        title: "Probe Event".into(),
        start: None,
        end: None,
        status: None,
    }];
    let tasks = [TaskItem {
        id: "1".into(),
        title: "Probe Task".into(),
        notes: None,
        due: None,
        status: TaskStatus::NeedsAction,
    }];
    if format_calendar_events(&events).contains("Probe Event") && format_tasks(&tasks).contains("Probe Task") {
        CheckResult::pass("formatter", "event and task rendering ok")
    } else {
        CheckResult::fail("formatter", "rendering dropped the record title")
    }
}

pub fn check_tiers(gateway: &ModelGateway) -> CheckResult {
    let tiers = gateway.tiers().as_slice();
    let mut seen = std::collections::HashSet::new();
    if let Some(dup) = tiers.iter().find(|t| !seen.insert(t.as_str())) {
        return CheckResult::warn("tiers", format!("{dup} appears more than once"));
    }
    CheckResult::pass("tiers", format!("{} tiers, primary {}", tiers.len(), gateway.tiers().primary()))
}

pub async fn check_reasoning(gateway: &ModelGateway) -> CheckResult {
    const NAME: &str = "reasoning";
    let model = gateway.tiers().primary().to_string();
    let request = ReasoningRequest::new("Ping").with_max_tokens(5);
    match gateway.invoke_model(&model, request).await {
        Ok(_) => CheckResult::pass(NAME, format!("{model} answered")),
        Err(e) if e.is_capacity() => CheckResult::warn(NAME, format!("{model} is rate limited: {e}")),
        Err(e) => CheckResult::fail(NAME, e.to_string()),
    }
}

/// Placeholder used by on-demand diagnostics before any boot-time ping has run.
pub fn reasoning_not_checked() -> CheckResult {
    CheckResult::warn("reasoning", "no reasoning ping since boot")
}

/// Checks that touch only local resources. Cheap enough to run on every request.
pub fn local_checks(data_dir: &Path, store: &StateStore, gateway: &ModelGateway) -> Vec<CheckResult> {
    vec![
        check_data_dir(data_dir),
        check_state_store(store),
        check_formatter(),
        check_tiers(gateway),
    ]
}

impl PreflightReport {
    /// Logs each check and derives overall health.
    pub fn from_checks(checks: Vec<CheckResult>) -> Self {
        for c in &checks {
            match c.status {
                CheckStatus::Pass => tracing::info!(target: LOG_TARGET, check = c.name, detail = %c.detail, "pass"),
                CheckStatus::Warn => tracing::warn!(target: LOG_TARGET, check = c.name, detail = %c.detail, "warn"),
                CheckStatus::Fail => tracing::error!(target: LOG_TARGET, check = c.name, detail = %c.detail, "fail"),
            }
        }
        let healthy = checks.iter().all(|c| c.status != CheckStatus::Fail);
        Self { checks, healthy }
    }
}

/// Runs every check, including a live ping of the primary tier, and logs the summary.
pub async fn run_preflight(data_dir: &Path, store: &StateStore, gateway: &ModelGateway) -> PreflightReport {
    let mut checks = local_checks(data_dir, store, gateway);
    checks.push(check_reasoning(gateway).await);
    PreflightReport::from_checks(checks)
}
