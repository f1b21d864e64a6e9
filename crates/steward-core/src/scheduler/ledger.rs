use std::collections::HashSet;

/// Event ids already flagged by the supervision ratchet today.
///
/// Ids are only ever added; [`SupervisionLedger::reset`] (called by wake execution)
/// is the sole way to forget them. Process-local: a restart starts empty.
#[derive(Debug, Default, Clone)]
pub struct SupervisionLedger {
    flagged: HashSet<String>,
}

impl SupervisionLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, event_id: &str) -> bool {
        self.flagged.contains(event_id)
    }

    /// Returns false if the id was already present.
    pub fn flag(&mut self, event_id: &str) -> bool {
        self.flagged.insert(event_id.to_string())
    }

    /// Daily reset; returns how many ids were forgotten.
    pub fn reset(&mut self) -> usize {
        let n = self.flagged.len();
        self.flagged.clear();
        n
    }

    pub fn len(&self) -> usize {
        self.flagged.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flagged.is_empty()
    }

    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<_> = self.flagged.iter().cloned().collect();
        ids.sort();
        ids
    }
}
