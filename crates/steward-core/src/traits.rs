//! Collaborator seams: the calendar/task workspace and the messaging channel.
//!
//! Every operation degrades instead of raising. Reads return empty lists on failure,
//! writes return `None` / `false`; implementations log the cause.

use async_trait::async_trait;
use chrono::NaiveDateTime;

use crate::shared::{CalendarEvent, EventPatch, NewEvent, NewTask, TaskItem};

/// Calendar + task provider for the single owner.
#[async_trait]
pub trait Workspace: Send + Sync {
    /// Events overlapping `[from, to)`, ordered by start time.
    async fn list_events(&self, from: NaiveDateTime, to: NaiveDateTime) -> Vec<CalendarEvent>;

    /// Upcoming events whose text matches `query`.
    async fn search_events(&self, query: &str) -> Vec<CalendarEvent>;

    async fn create_event(&self, event: NewEvent) -> Option<CalendarEvent>;

    async fn patch_event(&self, event_id: &str, patch: EventPatch) -> Option<CalendarEvent>;

    async fn delete_event(&self, event_id: &str) -> bool;

    /// Outstanding (not completed) tasks, at most `max`.
    async fn list_tasks(&self, max: usize) -> Vec<TaskItem>;

    async fn create_task(&self, task: NewTask) -> Option<TaskItem>;
}

/// Fire-and-forget outbound channel.
#[async_trait]
pub trait Messenger: Send + Sync {
    /// Returns whether delivery was accepted.
    async fn post_message(&self, channel: &str, text: &str) -> bool;
}
