//! Steward configuration loaded from `config/steward.toml` and `STEWARD__*` env vars.
//!
//! Secrets (reasoning-service key, messaging token, workspace token) are never part of
//! this file; the clients in `steward-skills` read them from the environment.
//!
//! | Key | Default | Description |
//! |-----|---------|-------------|
//! | app_name | Steward | Display name used in logs and prompts. |
//! | data_dir | ./data | State document, conversation log, profile, and log files. |
//! | owner_channel | (empty) | Messaging channel or user id notifications go to. |
//! | http_port | 8010 | Daemon API port. |
//! | llm_mode | mock | `mock` answers offline, `live` calls the reasoning service. |
//! | models.tiers | gemini flash family | Fallback-ordered endpoints for deep reasoning and jobs. |
//! | models.router | gemma-3-27b-it | Cheap endpoint for the Fast stage. |
//! | scheduler.* | see [`SchedulerSettings`] | Job times, windows, and exclusion keywords. |

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::StewardError;

const ENV_CONFIG_PATH: &str = "STEWARD_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "config/steward";
const ENV_PREFIX: &str = "STEWARD";

fn default_tiers() -> Vec<String> {
    vec![
        "models/gemini-2.5-flash".to_string(),
        "models/gemini-2.5-flash-lite".to_string(),
        "models/gemini-2.5-flash-preview-09-2025".to_string(),
        "models/gemini-2.5-flash-lite-preview-09-2025".to_string(),
        "models/gemini-pro-latest".to_string(),
    ]
}

fn default_router_model() -> String {
    "models/gemma-3-27b-it".to_string()
}

fn default_audit_flash() -> String {
    "models/gemini-3-flash-preview".to_string()
}

fn default_audit_pro() -> String {
    "models/gemini-3-pro-preview".to_string()
}

/// Reasoning endpoints by role.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelSettings {
    /// Fallback-ordered tier list, highest priority first. Must be non-empty.
    #[serde(default = "default_tiers")]
    pub tiers: Vec<String>,
    /// Fast-stage endpoint; pinned, never rotated.
    #[serde(default = "default_router_model")]
    pub router: String,
    /// Daytime (tactical) energy audit endpoint.
    #[serde(default = "default_audit_flash")]
    pub audit_flash: String,
    /// Evening (strategic) energy audit endpoint.
    #[serde(default = "default_audit_pro")]
    pub audit_pro: String,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            tiers: default_tiers(),
            router: default_router_model(),
            audit_flash: default_audit_flash(),
            audit_pro: default_audit_pro(),
        }
    }
}

/// Job times, windows, and filters for the autonomous scheduler.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerSettings {
    /// Daily `HH:MM` for morning planning.
    pub morning_planning_time: String,
    /// Daily `HH:MM` for calendar → task sync.
    pub daily_sync_time: String,
    pub supervision_interval_minutes: u32,
    /// Wake time used on weekdays with no qualifying event.
    pub default_wake_time: String,
    /// Minutes between wake-up and the first qualifying event.
    pub wake_lead_minutes: i64,
    pub planning_lookahead_hours: i64,
    pub sync_lookahead_hours: i64,
    pub supervision_lookback_hours: i64,
    /// Reminder window after an event ends, exclusive on both sides.
    pub supervision_window_start_minutes: i64,
    pub supervision_window_end_minutes: i64,
    /// Words (matched as whole words) whose events are never planned around, synced, or supervised.
    pub excluded_keywords: Vec<String>,
    /// Optional daily `HH:MM` times for the energy audit job. Empty disables it.
    pub energy_audit_times: Vec<String>,
    /// Outstanding tasks listed in the wake-up digest.
    pub wake_task_limit: usize,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            morning_planning_time: "02:00".to_string(),
            daily_sync_time: "07:00".to_string(),
            supervision_interval_minutes: 10,
            default_wake_time: "09:30".to_string(),
            wake_lead_minutes: 60,
            planning_lookahead_hours: 20,
            sync_lookahead_hours: 18,
            supervision_lookback_hours: 24,
            supervision_window_start_minutes: 60,
            supervision_window_end_minutes: 120,
            excluded_keywords: ["commute", "lunch", "break", "rest", "sleep"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            energy_audit_times: Vec::new(),
            wake_task_limit: 5,
        }
    }
}

impl SchedulerSettings {
    pub fn morning_planning_at(&self) -> Result<NaiveTime, StewardError> {
        parse_hhmm("scheduler.morning_planning_time", &self.morning_planning_time)
    }

    pub fn daily_sync_at(&self) -> Result<NaiveTime, StewardError> {
        parse_hhmm("scheduler.daily_sync_time", &self.daily_sync_time)
    }

    pub fn default_wake_at(&self) -> Result<NaiveTime, StewardError> {
        parse_hhmm("scheduler.default_wake_time", &self.default_wake_time)
    }

    pub fn energy_audit_at(&self) -> Result<Vec<NaiveTime>, StewardError> {
        self.energy_audit_times
            .iter()
            .map(|t| parse_hhmm("scheduler.energy_audit_times", t))
            .collect()
    }
}

/// Parses a wall-clock `HH:MM` (seconds optional).
pub fn parse_hhmm(key: &str, raw: &str) -> Result<NaiveTime, StewardError> {
    let s = raw.trim();
    NaiveTime::parse_from_str(s, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M:%S"))
        .map_err(|_| StewardError::Invalid(format!("{key}: expected HH:MM, got {raw:?}")))
}

/// Top-level configuration for the steward daemon and core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoreConfig {
    pub app_name: String,
    /// Base directory for the state document, sled log, profile, and logs.
    pub data_dir: String,
    /// Channel (or user id) that receives proactive notifications.
    #[serde(default)]
    pub owner_channel: String,
    pub http_port: u16,
    /// `mock` or `live`.
    pub llm_mode: String,
    #[serde(default)]
    pub models: ModelSettings,
    #[serde(default)]
    pub scheduler: SchedulerSettings,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            app_name: "Steward".to_string(),
            data_dir: "./data".to_string(),
            owner_channel: String::new(),
            http_port: 8010,
            llm_mode: "mock".to_string(),
            models: ModelSettings::default(),
            scheduler: SchedulerSettings::default(),
        }
    }
}

impl CoreConfig {
    /// Load config from file and environment. Precedence: env `STEWARD__*` > file
    /// (`STEWARD_CONFIG` path, else `config/steward.toml`) > defaults.
    pub fn load() -> Result<Self, StewardError> {
        let config_path =
            std::env::var(ENV_CONFIG_PATH).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        Self::load_from(Path::new(&config_path))
    }

    /// Same as [`CoreConfig::load`] with an explicit file path (extension optional).
    pub fn load_from(path: &Path) -> Result<Self, StewardError> {
        let builder = config::Config::builder()
            .set_default("app_name", "Steward")?
            .set_default("data_dir", "./data")?
            .set_default("http_port", 8010_i64)?
            .set_default("llm_mode", "mock")?;

        let with_toml = path.with_extension("toml");
        let builder = if path.is_file() {
            builder.add_source(config::File::from(path))
        } else if with_toml.is_file() {
            builder.add_source(config::File::from(with_toml.as_path()))
        } else {
            builder
        };

        let built = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("models.tiers")
                    .with_list_parse_key("scheduler.excluded_keywords")
                    .with_list_parse_key("scheduler.energy_audit_times"),
            )
            .build()?;

        let cfg: CoreConfig = built.try_deserialize()?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Rejects configs the core cannot run with.
    pub fn validate(&self) -> Result<(), StewardError> {
        if self.models.tiers.iter().all(|t| t.trim().is_empty()) {
            return Err(StewardError::Invalid("models.tiers must not be empty".into()));
        }
        let s = &self.scheduler;
        s.morning_planning_at()?;
        s.daily_sync_at()?;
        s.default_wake_at()?;
        s.energy_audit_at()?;
        if s.supervision_interval_minutes == 0 {
            return Err(StewardError::Invalid(
                "scheduler.supervision_interval_minutes must be at least 1".into(),
            ));
        }
        if s.supervision_window_start_minutes >= s.supervision_window_end_minutes {
            return Err(StewardError::Invalid(
                "scheduler supervision window start must be before its end".into(),
            ));
        }
        Ok(())
    }

    pub fn data_path(&self) -> PathBuf {
        PathBuf::from(&self.data_dir)
    }

    pub fn state_file(&self) -> PathBuf {
        self.data_path().join("user_state.json")
    }

    pub fn conversation_db(&self) -> PathBuf {
        self.data_path().join("conversation_db")
    }

    pub fn profile_file(&self) -> PathBuf {
        self.data_path().join("user_profile.json")
    }

    pub fn log_dir(&self) -> PathBuf {
        self.data_path().join("logs")
    }

    pub fn is_live(&self) -> bool {
        self.llm_mode.eq_ignore_ascii_case("live")
    }
}
