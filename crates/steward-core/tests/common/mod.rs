//! In-memory collaborators shared by the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use steward_core::{
    CalendarEvent, CoreConfig, EventPatch, JobContext, Messenger, ModelGateway, ModelTiers, NewEvent,
    NewTask, ProfileCache, ReasoningRequest, ReasoningResponse, ReasoningService, ServiceError, StateStore,
    TaskItem, TaskStatus, Workspace, ConversationLog, DEFAULT_USER_ID,
};

pub fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(y, mo, d)
        .unwrap()
        .and_hms_opt(h, mi, 0)
        .unwrap()
}

/// 2026-03-03 is a Tuesday.
pub fn tuesday(h: u32, mi: u32) -> NaiveDateTime {
    at(2026, 3, 3, h, mi)
}

/// 2026-03-07 is a Saturday.
pub fn saturday(h: u32, mi: u32) -> NaiveDateTime {
    at(2026, 3, 7, h, mi)
}

pub fn event(id: &str, title: &str, start: NaiveDateTime, end: NaiveDateTime) -> CalendarEvent {
    CalendarEvent {
        id: id.to_string(),
        title: title.to_string(),
        start: Some(start),
        end: Some(end),
        status: Some("confirmed".to_string()),
    }
}

pub fn task(id: &str, title: &str) -> TaskItem {
    TaskItem {
        id: id.to_string(),
        title: title.to_string(),
        notes: None,
        due: None,
        status: TaskStatus::NeedsAction,
    }
}

// -----------------------------------------------------------------------------
// Reasoning
// -----------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub model: String,
    pub contents: String,
    pub temperature: Option<f32>,
    pub has_tools: bool,
}

/// Replays queued results in call order; an empty queue answers with empty text.
#[derive(Default)]
pub struct ScriptedService {
    results: Mutex<VecDeque<Result<ReasoningResponse, ServiceError>>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl ScriptedService {
    pub fn new(results: Vec<Result<ReasoningResponse, ServiceError>>) -> Arc<Self> {
        Arc::new(Self {
            results: Mutex::new(results.into()),
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn push(&self, result: Result<ReasoningResponse, ServiceError>) {
        self.results.lock().unwrap().push_back(result);
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn models(&self) -> Vec<String> {
        self.calls().into_iter().map(|c| c.model).collect()
    }
}

#[async_trait]
impl ReasoningService for ScriptedService {
    async fn generate(&self, model: &str, request: &ReasoningRequest) -> Result<ReasoningResponse, ServiceError> {
        self.calls.lock().unwrap().push(RecordedCall {
            model: model.to_string(),
            contents: request.contents.clone(),
            temperature: request.generation.temperature,
            has_tools: !request.tools.is_empty(),
        });
        self.results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(ReasoningResponse::default()))
    }
}

pub fn ok(text: &str) -> Result<ReasoningResponse, ServiceError> {
    Ok(ReasoningResponse {
        text: text.to_string(),
        ..Default::default()
    })
}

pub fn capacity(model: &str) -> Result<ReasoningResponse, ServiceError> {
    Err(ServiceError::classify(model, Some(429), "RESOURCE_EXHAUSTED: quota"))
}

pub fn rejected(model: &str) -> Result<ReasoningResponse, ServiceError> {
    Err(ServiceError::classify(model, Some(400), "invalid argument"))
}

// -----------------------------------------------------------------------------
// Workspace
// -----------------------------------------------------------------------------

/// Calendar and task list held in memory. `list_events` uses overlap semantics.
#[derive(Default)]
pub struct FakeWorkspace {
    pub events: Mutex<Vec<CalendarEvent>>,
    pub tasks: Mutex<Vec<TaskItem>>,
    next_id: AtomicU64,
    /// When set, `create_task` panics.
    pub panic_on_create_task: AtomicBool,
}

impl FakeWorkspace {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with(events: Vec<CalendarEvent>, tasks: Vec<TaskItem>) -> Arc<Self> {
        let ws = Self::default();
        *ws.events.lock().unwrap() = events;
        *ws.tasks.lock().unwrap() = tasks;
        Arc::new(ws)
    }

    pub fn task_titles(&self) -> Vec<String> {
        self.tasks.lock().unwrap().iter().map(|t| t.title.clone()).collect()
    }

    fn id(&self, prefix: &str) -> String {
        format!("{prefix}-{}", self.next_id.fetch_add(1, Ordering::SeqCst) + 1)
    }
}

#[async_trait]
impl Workspace for FakeWorkspace {
    async fn list_events(&self, from: NaiveDateTime, to: NaiveDateTime) -> Vec<CalendarEvent> {
        let mut found: Vec<CalendarEvent> = self
            .events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| match (e.start, e.end.or(e.start)) {
                (Some(s), Some(end)) => s < to && end > from,
                _ => true,
            })
            .cloned()
            .collect();
        found.sort_by_key(|e| e.start);
        found
    }

    async fn search_events(&self, query: &str) -> Vec<CalendarEvent> {
        let q = query.to_lowercase();
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.title.to_lowercase().contains(&q))
            .cloned()
            .collect()
    }

    async fn create_event(&self, new: NewEvent) -> Option<CalendarEvent> {
        let created = event(&self.id("evt"), &new.summary, new.start, new.end);
        self.events.lock().unwrap().push(created.clone());
        Some(created)
    }

    async fn patch_event(&self, event_id: &str, patch: EventPatch) -> Option<CalendarEvent> {
        let mut events = self.events.lock().unwrap();
        let e = events.iter_mut().find(|e| e.id == event_id)?;
        if let Some(summary) = patch.summary {
            e.title = summary;
        }
        if let Some(start) = patch.start {
            let length = match (e.start, e.end) {
                (Some(s), Some(end)) => end - s,
                _ => chrono::Duration::hours(1),
            };
            e.start = Some(start);
            e.end = Some(patch.end.unwrap_or(start + length));
        }
        Some(e.clone())
    }

    async fn delete_event(&self, event_id: &str) -> bool {
        let mut events = self.events.lock().unwrap();
        let before = events.len();
        events.retain(|e| e.id != event_id);
        events.len() != before
    }

    async fn list_tasks(&self, max: usize) -> Vec<TaskItem> {
        self.tasks
            .lock()
            .unwrap()
            .iter()
            .filter(|t| t.is_outstanding())
            .take(max)
            .cloned()
            .collect()
    }

    async fn create_task(&self, new: NewTask) -> Option<TaskItem> {
        if self.panic_on_create_task.load(Ordering::SeqCst) {
            panic!("task backend exploded");
        }
        let created = TaskItem {
            id: self.id("task"),
            title: new.title,
            notes: new.notes,
            due: None,
            status: TaskStatus::NeedsAction,
        };
        self.tasks.lock().unwrap().push(created.clone());
        Some(created)
    }
}

// -----------------------------------------------------------------------------
// Messenger
// -----------------------------------------------------------------------------

#[derive(Default)]
pub struct FakeMessenger {
    pub posts: Mutex<Vec<(String, String)>>,
    pub failing: AtomicBool,
}

impl FakeMessenger {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn texts(&self) -> Vec<String> {
        self.posts.lock().unwrap().iter().map(|(_, t)| t.clone()).collect()
    }

    pub fn fail(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl Messenger for FakeMessenger {
    async fn post_message(&self, channel: &str, text: &str) -> bool {
        if self.failing.load(Ordering::SeqCst) {
            return false;
        }
        self.posts
            .lock()
            .unwrap()
            .push((channel.to_string(), text.to_string()));
        true
    }
}

// -----------------------------------------------------------------------------
// Wiring
// -----------------------------------------------------------------------------

pub fn test_config(dir: &std::path::Path) -> CoreConfig {
    CoreConfig {
        data_dir: dir.to_string_lossy().into_owned(),
        owner_channel: "owner".to_string(),
        ..CoreConfig::default()
    }
}

/// A job context over fakes, rooted in `dir`.
pub fn job_context(
    dir: &std::path::Path,
    service: Arc<ScriptedService>,
    workspace: Arc<FakeWorkspace>,
    messenger: Arc<FakeMessenger>,
) -> Arc<JobContext> {
    let cfg = test_config(dir);
    let tiers = ModelTiers::new(cfg.models.tiers.clone()).unwrap();
    Arc::new(JobContext {
        gateway: Arc::new(ModelGateway::new(service, tiers)),
        workspace,
        messenger,
        state: Arc::new(StateStore::open_path(cfg.state_file())),
        log: Arc::new(ConversationLog::open_path(cfg.conversation_db()).unwrap()),
        profile: Arc::new(ProfileCache::open_path(cfg.profile_file())),
        settings: cfg.scheduler.clone(),
        audit_flash_model: cfg.models.audit_flash.clone(),
        audit_pro_model: cfg.models.audit_pro.clone(),
        owner_channel: cfg.owner_channel.clone(),
        owner_id: DEFAULT_USER_ID.to_string(),
    })
}
