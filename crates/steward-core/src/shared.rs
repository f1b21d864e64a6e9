//! Shared types used across the steward crates.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Default user id for the single-owner deployment.
pub const DEFAULT_USER_ID: &str = "DEFAULT_USER";

/// Focus mode written on first access.
pub const DEFAULT_FOCUS_MODE: &str = "NORMAL";

// -----------------------------------------------------------------------------
// Persisted state (energy / focus / metrics)
// -----------------------------------------------------------------------------

/// Self-reported or inferred energy of the owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EnergyLevel {
    High,
    Med,
    Low,
    #[default]
    Unknown,
}

impl EnergyLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            EnergyLevel::High => "HIGH",
            EnergyLevel::Med => "MED",
            EnergyLevel::Low => "LOW",
            EnergyLevel::Unknown => "UNKNOWN",
        }
    }

    /// Parses loosely; anything unrecognised becomes `Unknown`.
    pub fn parse_lenient(s: &str) -> Self {
        s.parse().unwrap_or(EnergyLevel::Unknown)
    }
}

impl fmt::Display for EnergyLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EnergyLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "HIGH" => Ok(EnergyLevel::High),
            "MED" | "MEDIUM" => Ok(EnergyLevel::Med),
            "LOW" => Ok(EnergyLevel::Low),
            "UNKNOWN" => Ok(EnergyLevel::Unknown),
            other => Err(format!("unknown energy level: {other}")),
        }
    }
}

fn default_focus_mode() -> String {
    DEFAULT_FOCUS_MODE.to_string()
}

/// The single per-deployment state record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedState {
    #[serde(default)]
    pub energy_level: EnergyLevel,
    /// Free label, always stored upper-case.
    #[serde(default = "default_focus_mode")]
    pub focus_mode: String,
    #[serde(default)]
    pub last_interaction: Option<NaiveDateTime>,
    #[serde(default)]
    pub metrics: BTreeMap<String, u64>,
}

impl Default for PersistedState {
    fn default() -> Self {
        Self {
            energy_level: EnergyLevel::Unknown,
            focus_mode: default_focus_mode(),
            last_interaction: None,
            metrics: BTreeMap::new(),
        }
    }
}

impl PersistedState {
    /// Counter value, zero when never incremented.
    pub fn metric(&self, name: &str) -> u64 {
        self.metrics.get(name).copied().unwrap_or(0)
    }
}

// -----------------------------------------------------------------------------
// Conversation
// -----------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::User => f.write_str("user"),
            Role::Assistant => f.write_str("assistant"),
        }
    }
}

/// One entry of the append-only conversation log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: Role,
    pub content: String,
    pub timestamp: NaiveDateTime,
}

// -----------------------------------------------------------------------------
// Calendar / task records
// -----------------------------------------------------------------------------

/// Calendar entry as seen by the scheduler. All-day entries carry no start/end time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarEvent {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub start: Option<NaiveDateTime>,
    #[serde(default)]
    pub end: Option<NaiveDateTime>,
    #[serde(default)]
    pub status: Option<String>,
}

impl CalendarEvent {
    pub fn is_excluded(&self, keywords: &[String]) -> bool {
        title_is_excluded(&self.title, keywords)
    }
}

fn words(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// True if any keyword appears in the title as whole words, case-insensitively.
/// `rest` excludes "Rest day" but not "Interest Rates"; multi-word keywords match
/// as a consecutive run.
pub fn title_is_excluded(title: &str, keywords: &[String]) -> bool {
    let title_words = words(title);
    keywords.iter().any(|k| {
        let key = words(k);
        !key.is_empty() && title_words.windows(key.len()).any(|w| w == key.as_slice())
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    NeedsAction,
    Completed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskItem {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub due: Option<NaiveDate>,
    #[serde(default)]
    pub status: TaskStatus,
}

impl TaskItem {
    pub fn is_outstanding(&self) -> bool {
        self.status == TaskStatus::NeedsAction
    }
}

/// Insert body for a calendar entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewEvent {
    pub summary: String,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    #[serde(default)]
    pub description: String,
}

/// Partial update; `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventPatch {
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub start: Option<NaiveDateTime>,
    #[serde(default)]
    pub end: Option<NaiveDateTime>,
}

impl EventPatch {
    pub fn is_empty(&self) -> bool {
        self.summary.is_none() && self.start.is_none() && self.end.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTask {
    pub title: String,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Outbound message produced by a job. Not persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateNotification {
    pub channel: String,
    pub text: String,
}

/// Parses the date-time shapes the reasoning service tends to emit
/// (`2024-05-01T09:00:00`, `2024-05-01T09:00`, `2024-05-01 09:00`, RFC 3339 with offset).
pub fn parse_local_datetime(raw: &str) -> Option<NaiveDateTime> {
    let s = raw.trim();
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_local());
    }
    let normalised = s.replacen(' ', "T", 1);
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(&normalised, fmt).ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn energy_parses_case_insensitively() {
        assert_eq!("high".parse::<EnergyLevel>().unwrap(), EnergyLevel::High);
        assert_eq!("Medium".parse::<EnergyLevel>().unwrap(), EnergyLevel::Med);
        assert_eq!(EnergyLevel::parse_lenient("sleepy"), EnergyLevel::Unknown);
    }

    #[test]
    fn state_defaults_fill_missing_fields() {
        let s: PersistedState = serde_json::from_str(r#"{"energy_level":"LOW"}"#).unwrap();
        assert_eq!(s.energy_level, EnergyLevel::Low);
        assert_eq!(s.focus_mode, "NORMAL");
        assert!(s.metrics.is_empty());
    }

    #[test]
    fn exclusion_matches_whole_words_case_insensitively() {
        let kw: Vec<String> = ["lunch", "commute", "rest", "day off"].iter().map(|s| s.to_string()).collect();
        assert!(title_is_excluded("Team LUNCH", &kw));
        assert!(title_is_excluded("Commute (bus)", &kw));
        assert!(title_is_excluded("Rest", &kw));
        assert!(title_is_excluded("Friday: day-off", &kw));
        assert!(!title_is_excluded("Write report", &kw));
        assert!(!title_is_excluded("Interest Rates Lecture", &kw));
        assert!(!title_is_excluded("Restaurant booking", &kw));
        assert!(!title_is_excluded("Forest walk", &kw));
        assert!(!title_is_excluded("Day planning", &kw));
    }

    #[test]
    fn parses_model_datetimes() {
        assert!(parse_local_datetime("2024-05-01T09:00:00").is_some());
        assert!(parse_local_datetime("2024-05-01 09:00").is_some());
        assert!(parse_local_datetime("2024-05-01T09:00:00+01:00").is_some());
        assert!(parse_local_datetime("tomorrow").is_none());
    }
}
