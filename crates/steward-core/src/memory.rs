//! Persistent memory: the JSON state document and the sled-backed conversation log.
//!
//! Neither store raises on I/O trouble during normal operation. Failures are logged
//! under `steward::memory` and the caller sees defaults (state) or an empty window (log).

use chrono::{Local, NaiveDateTime};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use sled::Db;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::error::StewardError;
use crate::shared::{ConversationTurn, EnergyLevel, PersistedState, Role};

const LOG_TARGET: &str = "steward::memory";

/// Hot-cache depth per user; reads deeper than this go to sled.
const HOT_TURNS: usize = 16;

fn now_local() -> NaiveDateTime {
    Local::now().naive_local()
}

// -----------------------------------------------------------------------------
// State Store
// -----------------------------------------------------------------------------

/// Read-modify-write store for [`PersistedState`], persisted as a pretty JSON document.
///
/// Updates from clones of one store are serialized; separate processes are not coordinated.
#[derive(Debug, Clone)]
pub struct StateStore {
    path: PathBuf,
    write_lock: Arc<Mutex<()>>,
}

impl StateStore {
    pub fn open_path<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current state. Creates and persists defaults when no record exists.
    pub fn get(&self) -> PersistedState {
        match self.read() {
            Ok(Some(state)) => state,
            Ok(None) => {
                let state = PersistedState::default();
                if let Err(e) = self.write(&state) {
                    tracing::warn!(target: LOG_TARGET, path = %self.path.display(), error = %e, "could not create default state record");
                }
                state
            }
            Err(e) => {
                tracing::warn!(target: LOG_TARGET, path = %self.path.display(), error = %e, "state read failed; using defaults");
                PersistedState::default()
            }
        }
    }

    /// Sets the energy level and stamps the interaction time.
    pub fn set_energy(&self, level: EnergyLevel) -> PersistedState {
        let state = self.update(|s| {
            s.energy_level = level;
            s.last_interaction = Some(now_local());
        });
        tracing::info!(target: LOG_TARGET, energy = %level, "energy level updated");
        state
    }

    /// Sets the focus label, normalised upper-case.
    pub fn set_focus(&self, mode: &str) -> PersistedState {
        let normalised = mode.trim().to_uppercase();
        let state = self.update(|s| s.focus_mode = normalised.clone());
        tracing::info!(target: LOG_TARGET, focus = %normalised, "focus mode updated");
        state
    }

    pub fn increment_metric(&self, name: &str) -> PersistedState {
        self.update(|s| {
            *s.metrics.entry(name.to_string()).or_insert(0) += 1;
        })
    }

    pub fn record_interaction(&self) -> PersistedState {
        self.update(|s| s.last_interaction = Some(now_local()))
    }

    /// Whole-record read-modify-write. A missing record starts from defaults; an
    /// unreadable one is left on disk untouched and the update is skipped. A failed
    /// write is logged and the in-memory result is still returned.
    fn update<F: FnOnce(&mut PersistedState)>(&self, f: F) -> PersistedState {
        let _guard = self.write_lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let mut state = match self.read() {
            Ok(Some(state)) => state,
            Ok(None) => PersistedState::default(),
            Err(e) => {
                tracing::warn!(target: LOG_TARGET, path = %self.path.display(), error = %e, "state read failed; update skipped");
                return PersistedState::default();
            }
        };
        f(&mut state);
        if let Err(e) = self.write(&state) {
            tracing::warn!(target: LOG_TARGET, path = %self.path.display(), error = %e, "state write failed; change not persisted");
        }
        state
    }

    fn read(&self) -> Result<Option<PersistedState>, StewardError> {
        if !self.path.exists() {
            return Ok(None);
        }
        let raw = std::fs::read_to_string(&self.path)?;
        if raw.trim().is_empty() {
            return Ok(None);
        }
        Ok(Some(serde_json::from_str(&raw)?))
    }

    fn write(&self, state: &PersistedState) -> Result<(), StewardError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let body = serde_json::to_string_pretty(state)?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, body)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

// -----------------------------------------------------------------------------
// Conversation Log
// -----------------------------------------------------------------------------

fn user_prefix(user_id: &str) -> String {
    format!("conversation/{}/", user_id)
}

/// Append-only per-user conversation log on sled, with a small hot cache of the
/// latest turns per user (checked before sled, like the vault's hot cache).
pub struct ConversationLog {
    db: Db,
    hot: DashMap<String, VecDeque<ConversationTurn>>,
}

impl ConversationLog {
    pub fn open_path<P: AsRef<Path>>(path: P) -> Result<Self, StewardError> {
        let db = sled::open(path)?;
        Ok(Self {
            db,
            hot: DashMap::new(),
        })
    }

    /// Appends one turn stamped with the current local time.
    pub fn append(&self, user_id: &str, role: Role, content: &str) -> Result<(), StewardError> {
        self.append_turn(
            user_id,
            ConversationTurn {
                role,
                content: content.to_string(),
                timestamp: now_local(),
            },
        )
    }

    pub fn append_turn(&self, user_id: &str, turn: ConversationTurn) -> Result<(), StewardError> {
        // The cache entry stays locked across the sled insert so a concurrent cache
        // fill in `recent` sees either both or neither.
        let entry = self.hot.entry(user_id.to_string());
        // Zero-padded monotonic id keeps lexicographic order == insertion order.
        let seq = self.db.generate_id()?;
        let key = format!("{}{:020}", user_prefix(user_id), seq);
        let value = serde_json::to_vec(&turn)?;
        self.db.insert(key.as_bytes(), value)?;

        if let Entry::Occupied(mut cached) = entry {
            let cached = cached.get_mut();
            cached.push_back(turn);
            while cached.len() > HOT_TURNS {
                cached.pop_front();
            }
        }
        Ok(())
    }

    /// Last `limit` turns in insertion order. Reads only the suffix it returns.
    pub fn recent(&self, user_id: &str, limit: usize) -> Vec<ConversationTurn> {
        if limit == 0 {
            return Vec::new();
        }
        if let Some(cached) = self.hot.get(user_id) {
            if cached.len() >= limit {
                return cached.iter().skip(cached.len() - limit).cloned().collect();
            }
        }

        let entry = self.hot.entry(user_id.to_string());
        let turns = self.scan_recent(user_id, limit);
        if limit >= HOT_TURNS || turns.len() < limit {
            let keep = turns.len().saturating_sub(HOT_TURNS);
            let suffix: VecDeque<ConversationTurn> = turns.iter().skip(keep).cloned().collect();
            match entry {
                Entry::Occupied(mut cached) => {
                    cached.insert(suffix);
                }
                Entry::Vacant(slot) => {
                    slot.insert(suffix);
                }
            }
        }
        turns
    }

    fn scan_recent(&self, user_id: &str, limit: usize) -> Vec<ConversationTurn> {
        let mut turns = Vec::with_capacity(limit);
        for item in self.db.scan_prefix(user_prefix(user_id).as_bytes()).rev() {
            if turns.len() >= limit {
                break;
            }
            match item {
                Ok((_, v)) => match serde_json::from_slice::<ConversationTurn>(&v) {
                    Ok(turn) => turns.push(turn),
                    Err(e) => {
                        tracing::warn!(target: LOG_TARGET, error = %e, "skipping unreadable conversation turn")
                    }
                },
                Err(e) => {
                    tracing::warn!(target: LOG_TARGET, user_id, error = %e, "conversation scan failed");
                    break;
                }
            }
        }
        turns.reverse();
        turns
    }

    /// Prompt rendering of the last `limit` turns.
    pub fn format_history(&self, user_id: &str, limit: usize) -> String {
        format_turns(&self.recent(user_id, limit))
    }

    pub fn flush(&self) -> Result<(), StewardError> {
        self.db.flush()?;
        Ok(())
    }
}

/// `[YYYY-MM-DD HH:MM] role: content` per line, or a placeholder when empty.
pub fn format_turns(turns: &[ConversationTurn]) -> String {
    if turns.is_empty() {
        return "(No previous conversation)".to_string();
    }
    turns
        .iter()
        .map(|t| {
            format!(
                "[{}] {}: {}",
                t.timestamp.format("%Y-%m-%d %H:%M"),
                t.role,
                t.content
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}
