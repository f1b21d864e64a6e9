//! Human/LLM-readable renderings of calendar events and tasks.

use crate::shared::{CalendarEvent, TaskItem, TaskStatus};

/// `- [MM-DD HH:MM] title (ID: id)` per event; all-day events show `all-day`.
pub fn format_calendar_events(events: &[CalendarEvent]) -> String {
    if events.is_empty() {
        return "(No events found)".to_string();
    }
    events
        .iter()
        .map(|e| {
            let when = e
                .start
                .map(|s| s.format("%m-%d %H:%M").to_string())
                .unwrap_or_else(|| "all-day".to_string());
            let title = if e.title.is_empty() { "Untitled" } else { &e.title };
            format!("- [{}] {} (ID: {})", when, title, e.id)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Today's digest used in the wake-up message: `HH:MM title` lines.
pub fn format_schedule_digest(events: &[CalendarEvent]) -> String {
    if events.is_empty() {
        return "Nothing on the calendar today.".to_string();
    }
    events
        .iter()
        .map(|e| match e.start {
            Some(s) => format!("- {} {}", s.format("%H:%M"), e.title),
            None => format!("- (all day) {}", e.title),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn format_tasks(tasks: &[TaskItem]) -> String {
    if tasks.is_empty() {
        return "(No pending tasks)".to_string();
    }
    let mut lines = vec!["Pending Tasks:".to_string()];
    for t in tasks {
        let mark = if t.status == TaskStatus::Completed { "[x]" } else { "[ ]" };
        let due = t
            .due
            .map(|d| format!(" [Due: {}]", d.format("%Y-%m-%d")))
            .unwrap_or_default();
        lines.push(format!("{} {}{}", mark, t.title, due));
    }
    lines.join("\n")
}
