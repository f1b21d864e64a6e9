//! Job registry: triggers, tags, and due-time bookkeeping.

use chrono::{Duration, NaiveDateTime, NaiveTime};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// The named jobs the scheduler knows how to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    MorningPlanning,
    WakeExecution,
    DailySync,
    SupervisionRatchet,
    EnergyAudit,
}

impl JobKind {
    pub const ALL: [JobKind; 5] = [
        JobKind::MorningPlanning,
        JobKind::WakeExecution,
        JobKind::DailySync,
        JobKind::SupervisionRatchet,
        JobKind::EnergyAudit,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            JobKind::MorningPlanning => "morning_planning",
            JobKind::WakeExecution => "wake_execution",
            JobKind::DailySync => "daily_sync",
            JobKind::SupervisionRatchet => "supervision_ratchet",
            JobKind::EnergyAudit => "energy_audit",
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for JobKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        JobKind::ALL
            .into_iter()
            .find(|k| k.name() == s.trim())
            .ok_or_else(|| format!("unknown job: {s}"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum JobTrigger {
    /// Every day at a wall-clock time.
    DailyAt { time: NaiveTime },
    /// Fixed interval, first run one interval after registration.
    Every { minutes: u32 },
    /// Runs once at (or on the first tick after) the given time, then is removed.
    Once { at: NaiveDateTime },
}

impl JobTrigger {
    /// First due time for a trigger registered at `now`.
    fn first_due(&self, now: NaiveDateTime) -> NaiveDateTime {
        match *self {
            JobTrigger::DailyAt { time } => {
                let today = now.date().and_time(time);
                if today >= now {
                    today
                } else {
                    today + Duration::days(1)
                }
            }
            JobTrigger::Every { minutes } => now + Duration::minutes(i64::from(minutes.max(1))),
            JobTrigger::Once { at } => at,
        }
    }

    /// Next due time after a run at `now`; `None` for one-shots.
    fn after_run(&self, now: NaiveDateTime) -> Option<NaiveDateTime> {
        match *self {
            JobTrigger::DailyAt { time } => {
                let today = now.date().and_time(time);
                Some(if today > now {
                    today
                } else {
                    today + Duration::days(1)
                })
            }
            JobTrigger::Every { minutes } => Some(now + Duration::minutes(i64::from(minutes.max(1)))),
            JobTrigger::Once { .. } => None,
        }
    }
}

pub type JobId = u64;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScheduledJob {
    pub id: JobId,
    pub kind: JobKind,
    pub trigger: JobTrigger,
    pub tags: Vec<String>,
    /// Free-form argument handed to the job (e.g. the wake reason).
    pub payload: Option<String>,
    pub next_due: NaiveDateTime,
    pub last_run: Option<NaiveDateTime>,
}

impl ScheduledJob {
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }
}

/// Jobs in registration order.
#[derive(Debug, Default)]
pub struct JobRegistry {
    jobs: Vec<ScheduledJob>,
    next_id: JobId,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        kind: JobKind,
        trigger: JobTrigger,
        tags: &[&str],
        payload: Option<String>,
        now: NaiveDateTime,
    ) -> JobId {
        self.next_id += 1;
        let id = self.next_id;
        self.jobs.push(ScheduledJob {
            id,
            kind,
            trigger,
            tags: tags.iter().map(|t| t.to_string()).collect(),
            payload,
            next_due: trigger.first_due(now),
            last_run: None,
        });
        id
    }

    /// Removes every job carrying `tag`; returns how many were removed.
    pub fn clear_tag(&mut self, tag: &str) -> usize {
        let before = self.jobs.len();
        self.jobs.retain(|j| !j.has_tag(tag));
        before - self.jobs.len()
    }

    pub fn with_tag(&self, tag: &str) -> Vec<&ScheduledJob> {
        self.jobs.iter().filter(|j| j.has_tag(tag)).collect()
    }

    /// Ids of jobs due at `now`, in registration order.
    pub fn due(&self, now: NaiveDateTime) -> Vec<JobId> {
        self.jobs
            .iter()
            .filter(|j| j.next_due <= now)
            .map(|j| j.id)
            .collect()
    }

    pub fn get(&self, id: JobId) -> Option<&ScheduledJob> {
        self.jobs.iter().find(|j| j.id == id)
    }

    /// Records a run: reschedules repeating jobs, drops one-shots.
    pub fn mark_ran(&mut self, id: JobId, now: NaiveDateTime) {
        let Some(pos) = self.jobs.iter().position(|j| j.id == id) else {
            return;
        };
        match self.jobs[pos].trigger.after_run(now) {
            Some(next) => {
                let job = &mut self.jobs[pos];
                job.last_run = Some(now);
                job.next_due = next;
            }
            None => {
                self.jobs.remove(pos);
            }
        }
    }

    pub fn jobs(&self) -> &[ScheduledJob] {
        &self.jobs
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}
