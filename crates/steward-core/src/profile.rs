//! Cached owner profile (`user_profile.json`), rendered as pretty JSON for prompts.

use std::path::{Path, PathBuf};
use std::sync::RwLock;

const LOG_TARGET: &str = "steward::profile";

pub struct ProfileCache {
    path: PathBuf,
    cached: RwLock<Option<String>>,
}

impl ProfileCache {
    pub fn open_path<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            cached: RwLock::new(None),
        }
    }

    /// Profile text; loaded on first use. Missing or invalid files yield an empty string.
    pub fn get(&self) -> String {
        if let Ok(guard) = self.cached.read() {
            if let Some(text) = guard.as_ref() {
                return text.clone();
            }
        }
        self.refresh()
    }

    /// Re-reads the file and replaces the cached text.
    pub fn refresh(&self) -> String {
        let text = self.load();
        if let Ok(mut guard) = self.cached.write() {
            *guard = Some(text.clone());
        }
        text
    }

    fn load(&self) -> String {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return String::new(),
            Err(e) => {
                tracing::warn!(target: LOG_TARGET, path = %self.path.display(), error = %e, "profile unreadable");
                return String::new();
            }
        };
        match serde_json::from_str::<serde_json::Value>(&raw) {
            Ok(value) => serde_json::to_string_pretty(&value).unwrap_or_default(),
            Err(e) => {
                tracing::warn!(target: LOG_TARGET, path = %self.path.display(), error = %e, "profile is not valid JSON");
                String::new()
            }
        }
    }
}
