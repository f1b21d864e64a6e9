//! Deep-stage tool surface: declarations offered to the model and the executor that
//! runs the calls it asks for.
//!
//! Every outcome, including bad arguments and unknown tool names, becomes one line of
//! the execution report. Nothing here raises.

use chrono::{Duration, NaiveDateTime};
use serde_json::{json, Value};
use std::sync::Arc;

use crate::formatter::{format_calendar_events, format_tasks};
use crate::gateway::{ToolCall, ToolDeclaration};
use crate::memory::StateStore;
use crate::shared::{parse_local_datetime, EnergyLevel, EventPatch, NewEvent, NewTask};
use crate::traits::Workspace;

const LOG_TARGET: &str = "steward::tools";

/// Header of the folded tool report returned to the user.
pub const EXECUTION_REPORT_HEADER: &str = "Execution report:";

const TASK_LIST_LIMIT: usize = 20;
const DEFAULT_EVENT_HOURS: f64 = 1.0;

/// Tool name constants, shared by declarations and dispatch.
pub mod names {
    pub const CREATE_EVENT: &str = "create_event";
    pub const SEARCH_CALENDAR: &str = "search_calendar";
    pub const UPDATE_EVENT: &str = "update_event";
    pub const DELETE_EVENT: &str = "delete_event";
    pub const ADD_TASK: &str = "add_task";
    pub const LIST_TASKS: &str = "list_tasks";
    pub const SET_ENERGY_LEVEL: &str = "set_energy_level";
    pub const SET_FOCUS_MODE: &str = "set_focus_mode";
}

fn declare(name: &str, description: &str, parameters: Value) -> ToolDeclaration {
    ToolDeclaration {
        name: name.to_string(),
        description: description.to_string(),
        parameters,
    }
}

/// Declarations for every tool the executor understands.
pub fn tool_declarations() -> Vec<ToolDeclaration> {
    vec![
        declare(
            names::CREATE_EVENT,
            "Create a calendar event.",
            json!({
                "type": "object",
                "properties": {
                    "summary": {"type": "string", "description": "Event title"},
                    "start_time": {"type": "string", "description": "Local ISO-8601 start, e.g. 2026-01-20T14:00:00. Defaults to now."},
                    "duration_hours": {"type": "number", "description": "Length in hours, default 1"},
                    "reason": {"type": "string", "description": "Why this was scheduled"}
                },
                "required": ["summary"]
            }),
        ),
        declare(
            names::SEARCH_CALENDAR,
            "Search upcoming calendar events by text.",
            json!({
                "type": "object",
                "properties": {"query": {"type": "string"}},
                "required": ["query"]
            }),
        ),
        declare(
            names::UPDATE_EVENT,
            "Move or rename a calendar event. Keeps its duration when moved.",
            json!({
                "type": "object",
                "properties": {
                    "event_id": {"type": "string"},
                    "new_start_time": {"type": "string", "description": "Local ISO-8601 start"},
                    "new_summary": {"type": "string"}
                },
                "required": ["event_id"]
            }),
        ),
        declare(
            names::DELETE_EVENT,
            "Delete a calendar event by id.",
            json!({
                "type": "object",
                "properties": {"event_id": {"type": "string"}},
                "required": ["event_id"]
            }),
        ),
        declare(
            names::ADD_TASK,
            "Add a task to the to-do list.",
            json!({
                "type": "object",
                "properties": {
                    "title": {"type": "string"},
                    "notes": {"type": "string"}
                },
                "required": ["title"]
            }),
        ),
        declare(
            names::LIST_TASKS,
            "List outstanding tasks.",
            json!({"type": "object", "properties": {}}),
        ),
        declare(
            names::SET_ENERGY_LEVEL,
            "Record the owner's current energy level.",
            json!({
                "type": "object",
                "properties": {"level": {"type": "string", "enum": ["HIGH", "MED", "LOW"]}},
                "required": ["level"]
            }),
        ),
        declare(
            names::SET_FOCUS_MODE,
            "Record the owner's current focus mode, e.g. NORMAL or JOB_HUNTING.",
            json!({
                "type": "object",
                "properties": {"mode": {"type": "string"}},
                "required": ["mode"]
            }),
        ),
    ]
}

fn failed(tool: &str, why: impl std::fmt::Display) -> String {
    format!("execution failed: {tool}: {why}")
}

fn required_str<'a>(args: &'a Value, key: &str) -> Result<&'a str, String> {
    match args.get(key).and_then(Value::as_str).map(str::trim) {
        Some(s) if !s.is_empty() => Ok(s),
        _ => Err(format!("missing required argument `{key}`")),
    }
}

fn optional_str<'a>(args: &'a Value, key: &str) -> Option<&'a str> {
    args.get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

fn optional_time(args: &Value, key: &str) -> Result<Option<NaiveDateTime>, String> {
    match optional_str(args, key) {
        None => Ok(None),
        Some(raw) => parse_local_datetime(raw)
            .map(Some)
            .ok_or_else(|| format!("`{key}` is not a date-time: {raw}")),
    }
}

/// Numbers may arrive as JSON numbers or numeric strings.
fn optional_f64(args: &Value, key: &str) -> Result<Option<f64>, String> {
    match args.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => Ok(n.as_f64()),
        Some(Value::String(s)) => s
            .trim()
            .parse::<f64>()
            .map(Some)
            .map_err(|_| format!("`{key}` is not a number: {s}")),
        Some(other) => Err(format!("`{key}` is not a number: {other}")),
    }
}

/// Runs model-requested tool calls against the workspace and the state store.
pub struct ToolExecutor {
    workspace: Arc<dyn Workspace>,
    state: Arc<StateStore>,
}

impl ToolExecutor {
    pub fn new(workspace: Arc<dyn Workspace>, state: Arc<StateStore>) -> Self {
        Self { workspace, state }
    }

    /// Executes each call in order and folds the results into one report.
    pub async fn execute_all(&self, calls: &[ToolCall], now: NaiveDateTime) -> String {
        let mut lines = Vec::with_capacity(calls.len());
        for call in calls {
            lines.push(self.execute(call, now).await);
        }
        format!("{}\n{}", EXECUTION_REPORT_HEADER, lines.join("\n"))
    }

    pub async fn execute(&self, call: &ToolCall, now: NaiveDateTime) -> String {
        tracing::info!(target: LOG_TARGET, tool = %call.name, "executing tool call");
        let result = match call.name.as_str() {
            names::CREATE_EVENT => self.create_event(&call.args, now).await,
            names::SEARCH_CALENDAR => self.search_calendar(&call.args).await,
            names::UPDATE_EVENT => self.update_event(&call.args).await,
            names::DELETE_EVENT => self.delete_event(&call.args).await,
            names::ADD_TASK => self.add_task(&call.args).await,
            names::LIST_TASKS => Ok(format_tasks(&self.workspace.list_tasks(TASK_LIST_LIMIT).await)),
            names::SET_ENERGY_LEVEL => self.set_energy(&call.args),
            names::SET_FOCUS_MODE => self.set_focus(&call.args),
            other => Err(format!("unknown tool `{other}`")),
        };
        result.unwrap_or_else(|why| {
            tracing::warn!(target: LOG_TARGET, tool = %call.name, reason = %why, "tool call failed");
            failed(&call.name, why)
        })
    }

    async fn create_event(&self, args: &Value, now: NaiveDateTime) -> Result<String, String> {
        let summary = required_str(args, "summary")?;
        let start = optional_time(args, "start_time")?.unwrap_or(now);
        let hours = optional_f64(args, "duration_hours")?.unwrap_or(DEFAULT_EVENT_HOURS);
        if !(hours > 0.0 && hours <= 24.0) {
            return Err(format!("`duration_hours` out of range: {hours}"));
        }
        let end = start + Duration::minutes((hours * 60.0).round() as i64);
        let description = optional_str(args, "reason").unwrap_or_default().to_string();

        let created = self
            .workspace
            .create_event(NewEvent {
                summary: summary.to_string(),
                start,
                end,
                description,
            })
            .await
            .ok_or_else(|| "calendar rejected the event".to_string())?;
        Ok(format!(
            "Created event '{}' at {} (ID: {})",
            created.title,
            start.format("%Y-%m-%d %H:%M"),
            created.id
        ))
    }

    async fn search_calendar(&self, args: &Value) -> Result<String, String> {
        let query = required_str(args, "query")?;
        let found = self.workspace.search_events(query).await;
        Ok(format!("Search '{}':\n{}", query, format_calendar_events(&found)))
    }

    async fn update_event(&self, args: &Value) -> Result<String, String> {
        let event_id = required_str(args, "event_id")?;
        let patch = EventPatch {
            summary: optional_str(args, "new_summary").map(str::to_string),
            start: optional_time(args, "new_start_time")?,
            end: None,
        };
        if patch.is_empty() {
            return Err("nothing to update; give `new_start_time` or `new_summary`".to_string());
        }
        let updated = self
            .workspace
            .patch_event(event_id, patch)
            .await
            .ok_or_else(|| format!("calendar could not update event {event_id}"))?;
        Ok(format!("Updated event '{}' (ID: {})", updated.title, updated.id))
    }

    async fn delete_event(&self, args: &Value) -> Result<String, String> {
        let event_id = required_str(args, "event_id")?;
        if self.workspace.delete_event(event_id).await {
            Ok(format!("Deleted event {event_id}"))
        } else {
            Err(format!("calendar could not delete event {event_id}"))
        }
    }

    async fn add_task(&self, args: &Value) -> Result<String, String> {
        let title = required_str(args, "title")?;
        let notes = optional_str(args, "notes").map(str::to_string);
        let task = self
            .workspace
            .create_task(NewTask {
                title: title.to_string(),
                notes,
            })
            .await
            .ok_or_else(|| "task list rejected the task".to_string())?;
        Ok(format!("Added task '{}'", task.title))
    }

    fn set_energy(&self, args: &Value) -> Result<String, String> {
        let level: EnergyLevel = required_str(args, "level")?.parse()?;
        let state = self.state.set_energy(level);
        Ok(format!("Energy level set to {}", state.energy_level))
    }

    fn set_focus(&self, args: &Value) -> Result<String, String> {
        let mode = required_str(args, "mode")?;
        let state = self.state.set_focus(mode);
        Ok(format!("Focus mode set to {}", state.focus_mode))
    }
}
