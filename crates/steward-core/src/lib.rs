//! steward-core: personal automation agent core.
//!
//! Tiered model gateway, two-stage intent router, JSON state store plus sled
//! conversation log, and the autonomous scheduler. External services (reasoning,
//! calendar/tasks workspace, messaging) are reached only through the traits in
//! [`gateway`] and [`traits`]; concrete clients live in `steward-skills`.

mod config;
mod diagnostics;
mod error;
mod formatter;
mod memory;
mod orchestrator;
mod profile;
mod shared;
pub mod gateway;
pub mod prompts;
pub mod router;
pub mod scheduler;
pub mod tools;
pub mod traits;

pub use config::{parse_hhmm, CoreConfig, ModelSettings, SchedulerSettings};
pub use diagnostics::{local_checks, run_preflight, CheckResult, CheckStatus, PreflightReport};
pub use error::{is_capacity_signal, ServiceError, StewardError};
pub use formatter::{format_calendar_events, format_schedule_digest, format_tasks};
pub use memory::{format_turns, ConversationLog, StateStore};
pub use orchestrator::{Orchestrator, METRIC_DEEP_PATH, METRIC_FAST_PATH};
pub use profile::ProfileCache;
pub use shared::{
    parse_local_datetime, title_is_excluded, CalendarEvent, CandidateNotification, ConversationTurn,
    EnergyLevel, EventPatch, NewEvent, NewTask, PersistedState, Role, TaskItem, TaskStatus,
    DEFAULT_FOCUS_MODE, DEFAULT_USER_ID,
};

pub use gateway::{
    GenerationConfig, Invocation, ModelGateway, ModelTiers, ReasoningRequest, ReasoningResponse,
    ReasoningService, SafetySetting, TerminalFailure, ToolCall, ToolDeclaration,
};
pub use router::{IntentRouter, RoutedReply, RouterContext, Stage};
pub use scheduler::{JobContext, JobKind, JobReport, Scheduler, SchedulerSnapshot};
pub use tools::ToolExecutor;
pub use traits::{Messenger, Workspace};
