//! Orchestrator: builds and owns every component, and handles inbound messages.
//!
//! There are no ambient singletons. The orchestrator constructs the gateway, router,
//! stores, profile cache, and scheduler from [`CoreConfig`] plus the three external
//! collaborators, and hands out `Arc`s to whoever needs them.

use chrono::{Duration, Local, NaiveDateTime};
use std::sync::{Arc, RwLock};

use crate::config::CoreConfig;
use crate::diagnostics::{local_checks, reasoning_not_checked, run_preflight, CheckResult, PreflightReport};
use crate::error::StewardError;
use crate::formatter::format_calendar_events;
use crate::gateway::{ModelGateway, ModelTiers, ReasoningService};
use crate::memory::{ConversationLog, StateStore};
use crate::profile::ProfileCache;
use crate::router::{IntentRouter, RoutedReply, RouterContext, Stage};
use crate::scheduler::{JobContext, Scheduler};
use crate::shared::{EnergyLevel, PersistedState, Role, DEFAULT_USER_ID};
use crate::tools::ToolExecutor;
use crate::traits::{Messenger, Workspace};

const LOG_TARGET: &str = "steward::orchestrator";

pub const METRIC_FAST_PATH: &str = "fast_path_hits";
pub const METRIC_DEEP_PATH: &str = "deep_path_calls";

const FAST_HISTORY_TURNS: usize = 3;
const DEEP_HISTORY_TURNS: usize = 10;
const SCHEDULE_CONTEXT_HOURS: i64 = 24;

pub struct Orchestrator {
    config: CoreConfig,
    gateway: Arc<ModelGateway>,
    router: IntentRouter,
    state: Arc<StateStore>,
    log: Arc<ConversationLog>,
    workspace: Arc<dyn Workspace>,
    profile: Arc<ProfileCache>,
    scheduler: Arc<Scheduler>,
    /// Reasoning ping from the last full pre-flight.
    reasoning_check: RwLock<Option<CheckResult>>,
}

impl Orchestrator {
    pub fn new(
        config: CoreConfig,
        reasoning: Arc<dyn ReasoningService>,
        workspace: Arc<dyn Workspace>,
        messenger: Arc<dyn Messenger>,
    ) -> Result<Self, StewardError> {
        config.validate()?;
        std::fs::create_dir_all(config.data_path())?;

        let tiers = ModelTiers::new(config.models.tiers.clone())?;
        let gateway = Arc::new(ModelGateway::new(reasoning, tiers));
        let state = Arc::new(StateStore::open_path(config.state_file()));
        let log = Arc::new(ConversationLog::open_path(config.conversation_db())?);
        let profile = Arc::new(ProfileCache::open_path(config.profile_file()));

        let tools = Arc::new(ToolExecutor::new(Arc::clone(&workspace), Arc::clone(&state)));
        let router = IntentRouter::new(Arc::clone(&gateway), config.models.router.clone(), tools);

        let job_ctx = Arc::new(JobContext {
            gateway: Arc::clone(&gateway),
            workspace: Arc::clone(&workspace),
            messenger,
            state: Arc::clone(&state),
            log: Arc::clone(&log),
            profile: Arc::clone(&profile),
            settings: config.scheduler.clone(),
            audit_flash_model: config.models.audit_flash.clone(),
            audit_pro_model: config.models.audit_pro.clone(),
            owner_channel: config.owner_channel.clone(),
            owner_id: DEFAULT_USER_ID.to_string(),
        });
        let scheduler = Arc::new(Scheduler::new(job_ctx));

        tracing::info!(
            target: LOG_TARGET,
            app = %config.app_name,
            tiers = gateway.tiers().len(),
            router_model = %config.models.router,
            data_dir = %config.data_dir,
            "orchestrator ready"
        );

        Ok(Self {
            config,
            gateway,
            router,
            state,
            log,
            workspace,
            profile,
            scheduler,
            reasoning_check: RwLock::new(None),
        })
    }

    /// Routes one inbound message at the current local time.
    pub async fn handle_message(&self, user_id: &str, text: &str) -> RoutedReply {
        self.handle_message_at(user_id, text, Local::now().naive_local()).await
    }

    /// Routes one inbound message, records both turns, and bumps the path metric.
    pub async fn handle_message_at(&self, user_id: &str, text: &str, now: NaiveDateTime) -> RoutedReply {
        let state = self.state.record_interaction();
        let ctx = self.router_context(user_id, state, now).await;

        let routed = self.router.route(text, &ctx).await;
        self.state.increment_metric(match routed.stage {
            Stage::Fast => METRIC_FAST_PATH,
            Stage::Deep => METRIC_DEEP_PATH,
        });

        for (role, content) in [(Role::User, text), (Role::Assistant, routed.reply.as_str())] {
            if let Err(e) = self.log.append(user_id, role, content) {
                tracing::warn!(target: LOG_TARGET, user_id, error = %e, "could not record conversation turn");
            }
        }
        routed
    }

    async fn router_context(&self, user_id: &str, state: PersistedState, now: NaiveDateTime) -> RouterContext {
        let upcoming = self
            .workspace
            .list_events(now, now + Duration::hours(SCHEDULE_CONTEXT_HOURS))
            .await;
        RouterContext {
            state,
            fast_history: self.log.format_history(user_id, FAST_HISTORY_TURNS),
            deep_history: self.log.format_history(user_id, DEEP_HISTORY_TURNS),
            schedule_summary: format_calendar_events(&upcoming),
            profile: self.profile.get(),
            now,
        }
    }

    /// Boot-time state reset: energy is unknown until the owner says otherwise.
    pub fn reset_on_boot(&self) -> PersistedState {
        self.state.set_energy(EnergyLevel::Unknown)
    }

    pub fn refresh_profile(&self) -> String {
        self.profile.refresh()
    }

    /// Full pre-flight including a live reasoning ping. Run once at boot.
    pub async fn preflight(&self) -> PreflightReport {
        let report = run_preflight(&self.config.data_path(), &self.state, &self.gateway).await;
        let ping = report.checks.iter().find(|c| c.name == "reasoning").cloned();
        *self.reasoning_check.write().unwrap_or_else(|p| p.into_inner()) = ping;
        report
    }

    /// On-demand diagnostics: fresh local checks plus the boot-time reasoning result.
    /// Never calls the reasoning service.
    pub fn diagnostics(&self) -> PreflightReport {
        let mut checks = local_checks(&self.config.data_path(), &self.state, &self.gateway);
        let ping = self
            .reasoning_check
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .clone()
            .unwrap_or_else(reasoning_not_checked);
        checks.push(ping);
        PreflightReport::from_checks(checks)
    }

    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    pub fn state(&self) -> &Arc<StateStore> {
        &self.state
    }

    pub fn conversation(&self) -> &Arc<ConversationLog> {
        &self.log
    }

    pub fn gateway(&self) -> &Arc<ModelGateway> {
        &self.gateway
    }

    pub fn scheduler(&self) -> &Arc<Scheduler> {
        &self.scheduler
    }
}
