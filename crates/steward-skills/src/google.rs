//! Google Workspace collaborator: Calendar v3 events and Tasks v1 on the default list.
//!
//! Bearer token from `GOOGLE_ACCESS_TOKEN`. Every failure is logged under
//! `steward::google` and degrades to an empty list, `None`, or `false`.

use async_trait::async_trait;
use chrono::{Local, NaiveDate, NaiveDateTime, TimeZone};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use steward_core::{
    parse_local_datetime, CalendarEvent, EventPatch, NewEvent, NewTask, TaskItem, TaskStatus, Workspace,
};

const LOG_TARGET: &str = "steward::google";
pub const ENV_GOOGLE_ACCESS_TOKEN: &str = "GOOGLE_ACCESS_TOKEN";
pub const ENV_GOOGLE_TIME_ZONE: &str = "GOOGLE_CALENDAR_TIME_ZONE";
const DEFAULT_API_URL: &str = "https://www.googleapis.com";
const DEFAULT_TIME_ZONE: &str = "Europe/London";
const EVENT_LIST_LIMIT: usize = 250;
const SEARCH_LIMIT: usize = 5;

// Calendar v3 wire types

#[derive(Deserialize, Debug, Default)]
struct EventList {
    #[serde(default)]
    items: Vec<GEvent>,
}

#[derive(Deserialize, Debug)]
struct GEvent {
    id: String,
    #[serde(default)]
    summary: Option<String>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    start: Option<GEventTime>,
    #[serde(default)]
    end: Option<GEventTime>,
}

#[derive(Serialize, Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
struct GEventTime {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    date_time: Option<String>,
    /// All-day events carry only a date.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    time_zone: Option<String>,
}

#[derive(Serialize, Debug, Default)]
struct EventBody {
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    start: Option<GEventTime>,
    #[serde(skip_serializing_if = "Option::is_none")]
    end: Option<GEventTime>,
}

impl From<GEvent> for CalendarEvent {
    fn from(e: GEvent) -> Self {
        let at = |t: Option<&GEventTime>| t.and_then(|t| t.date_time.as_deref()).and_then(parse_local_datetime);
        CalendarEvent {
            start: at(e.start.as_ref()),
            end: at(e.end.as_ref()),
            title: e.summary.unwrap_or_default(),
            status: e.status,
            id: e.id,
        }
    }
}

// Tasks v1 wire types

#[derive(Deserialize, Debug, Default)]
struct TaskList {
    #[serde(default)]
    items: Vec<GTask>,
}

#[derive(Deserialize, Debug)]
struct GTask {
    id: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    notes: Option<String>,
    #[serde(default)]
    due: Option<String>,
    #[serde(default)]
    status: Option<String>,
}

#[derive(Serialize, Debug)]
struct TaskBody<'a> {
    title: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    notes: Option<&'a str>,
}

impl From<GTask> for TaskItem {
    fn from(t: GTask) -> Self {
        TaskItem {
            due: t
                .due
                .as_deref()
                .and_then(|d| d.get(..10))
                .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok()),
            status: match t.status.as_deref() {
                Some("completed") => TaskStatus::Completed,
                _ => TaskStatus::NeedsAction,
            },
            id: t.id,
            title: t.title,
            notes: t.notes,
        }
    }
}

/// RFC 3339 in the machine's local offset, for `timeMin` / `timeMax`.
fn rfc3339_local(t: NaiveDateTime) -> String {
    match Local.from_local_datetime(&t).earliest() {
        Some(dt) => dt.to_rfc3339(),
        None => t.format("%Y-%m-%dT%H:%M:%SZ").to_string(),
    }
}

pub struct GoogleWorkspace {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
    time_zone: String,
}

impl GoogleWorkspace {
    /// Reads `GOOGLE_ACCESS_TOKEN` and `GOOGLE_CALENDAR_TIME_ZONE` (default Europe/London).
    pub fn from_env() -> Self {
        let token = std::env::var(ENV_GOOGLE_ACCESS_TOKEN)
            .ok()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty());
        let tz = std::env::var(ENV_GOOGLE_TIME_ZONE).unwrap_or_else(|_| DEFAULT_TIME_ZONE.to_string());
        Self::with_endpoint(DEFAULT_API_URL, token, tz)
    }

    pub fn with_endpoint(base_url: impl Into<String>, token: Option<String>, time_zone: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token,
            time_zone: time_zone.into(),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.token.is_some()
    }

    fn events_url(&self) -> String {
        format!("{}/calendar/v3/calendars/primary/events", self.base_url)
    }

    fn event_url(&self, event_id: &str) -> String {
        format!("{}/{}", self.events_url(), urlencoding::encode(event_id))
    }

    fn tasks_url(&self) -> String {
        format!("{}/tasks/v1/lists/@default/tasks", self.base_url)
    }

    fn local_time(&self, t: NaiveDateTime) -> GEventTime {
        GEventTime {
            date_time: Some(t.format("%Y-%m-%dT%H:%M:%S").to_string()),
            date: None,
            time_zone: Some(self.time_zone.clone()),
        }
    }

    /// Sends an authorised request and decodes the JSON body; `None` on any failure.
    async fn call<T: for<'de> Deserialize<'de>>(&self, op: &str, req: reqwest::RequestBuilder) -> Option<T> {
        let Some(token) = self.token.as_deref() else {
            tracing::warn!(target: LOG_TARGET, op, "no {} set; workspace call skipped", ENV_GOOGLE_ACCESS_TOKEN);
            return None;
        };
        let res = match req.bearer_auth(token).send().await {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!(target: LOG_TARGET, op, error = %e, "request failed");
                return None;
            }
        };
        if !res.status().is_success() {
            let status = res.status();
            let body: String = res.text().await.unwrap_or_default().chars().take(200).collect();
            tracing::warn!(target: LOG_TARGET, op, %status, body = %body, "request rejected");
            return None;
        }
        match res.json::<T>().await {
            Ok(v) => Some(v),
            Err(e) => {
                tracing::warn!(target: LOG_TARGET, op, error = %e, "unexpected response body");
                None
            }
        }
    }

    async fn get_event(&self, event_id: &str) -> Option<GEvent> {
        self.call("events.get", self.client.get(self.event_url(event_id))).await
    }
}

#[async_trait]
impl Workspace for GoogleWorkspace {
    async fn list_events(&self, from: NaiveDateTime, to: NaiveDateTime) -> Vec<CalendarEvent> {
        let url = format!(
            "{}?timeMin={}&timeMax={}&singleEvents=true&orderBy=startTime&maxResults={}",
            self.events_url(),
            urlencoding::encode(&rfc3339_local(from)),
            urlencoding::encode(&rfc3339_local(to)),
            EVENT_LIST_LIMIT
        );
        self.call::<EventList>("events.list", self.client.get(url))
            .await
            .unwrap_or_default()
            .items
            .into_iter()
            .filter(|e| e.status.as_deref() != Some("cancelled"))
            .map(CalendarEvent::from)
            .collect()
    }

    async fn search_events(&self, query: &str) -> Vec<CalendarEvent> {
        let url = format!(
            "{}?q={}&timeMin={}&singleEvents=true&maxResults={}",
            self.events_url(),
            urlencoding::encode(query),
            urlencoding::encode(&rfc3339_local(Local::now().naive_local())),
            SEARCH_LIMIT
        );
        self.call::<EventList>("events.search", self.client.get(url))
            .await
            .unwrap_or_default()
            .items
            .into_iter()
            .map(CalendarEvent::from)
            .collect()
    }

    async fn create_event(&self, event: NewEvent) -> Option<CalendarEvent> {
        let body = EventBody {
            summary: Some(event.summary),
            description: Some(event.description).filter(|d| !d.is_empty()),
            start: Some(self.local_time(event.start)),
            end: Some(self.local_time(event.end)),
        };
        let created: GEvent = self
            .call("events.insert", self.client.post(self.events_url()).json(&body))
            .await?;
        tracing::info!(target: LOG_TARGET, event_id = %created.id, "event created");
        Some(created.into())
    }

    async fn patch_event(&self, event_id: &str, patch: EventPatch) -> Option<CalendarEvent> {
        let mut body = EventBody {
            summary: patch.summary,
            ..Default::default()
        };
        if let Some(start) = patch.start {
            let end = match patch.end {
                Some(end) => end,
                None => {
                    // Keep the current duration when only the start moves.
                    let current = CalendarEvent::from(self.get_event(event_id).await?);
                    let length = match (current.start, current.end) {
                        (Some(s), Some(e)) if e > s => e - s,
                        _ => chrono::Duration::hours(1),
                    };
                    start + length
                }
            };
            body.start = Some(self.local_time(start));
            body.end = Some(self.local_time(end));
        }
        let updated: GEvent = self
            .call("events.patch", self.client.patch(self.event_url(event_id)).json(&body))
            .await?;
        Some(updated.into())
    }

    async fn delete_event(&self, event_id: &str) -> bool {
        let Some(token) = self.token.as_deref() else {
            tracing::warn!(target: LOG_TARGET, "no {} set; delete skipped", ENV_GOOGLE_ACCESS_TOKEN);
            return false;
        };
        // Delete answers 204 with an empty body, so it bypasses `call`.
        match self.client.delete(self.event_url(event_id)).bearer_auth(token).send().await {
            Ok(res) if res.status().is_success() => true,
            Ok(res) => {
                tracing::warn!(target: LOG_TARGET, event_id, status = %res.status(), "events.delete rejected");
                false
            }
            Err(e) => {
                tracing::warn!(target: LOG_TARGET, event_id, error = %e, "events.delete failed");
                false
            }
        }
    }

    async fn list_tasks(&self, max: usize) -> Vec<TaskItem> {
        let url = format!("{}?showCompleted=false&maxResults={}", self.tasks_url(), max.clamp(1, 100));
        let mut tasks: Vec<TaskItem> = self
            .call::<TaskList>("tasks.list", self.client.get(url))
            .await
            .unwrap_or_default()
            .items
            .into_iter()
            .map(TaskItem::from)
            .filter(TaskItem::is_outstanding)
            .collect();
        tasks.truncate(max);
        tasks
    }

    async fn create_task(&self, task: NewTask) -> Option<TaskItem> {
        let body = TaskBody {
            title: &task.title,
            notes: task.notes.as_deref(),
        };
        let created: GTask = self
            .call("tasks.insert", self.client.post(self.tasks_url()).json(&body))
            .await?;
        Some(created.into())
    }
}
