//! In-memory participant roster for one live class.
//!
//! Populated from adapter-level membership callbacks. Blocked ids are
//! checked against the moderation registry on insert, so a blocked
//! participant can never reappear here.

use std::sync::Arc;

use dashmap::DashMap;

use super::moderation::ModerationRegistry;

/// A participant currently present in the primary channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Participant {
    pub id: String,
    pub display_name: String,
}

/// Thread-safe, DashMap-backed roster.
pub struct Roster {
    inner: DashMap<String, Participant>,
    moderation: Arc<ModerationRegistry>,
}

impl Roster {
    pub fn new(moderation: Arc<ModerationRegistry>) -> Self {
        Self {
            inner: DashMap::new(),
            moderation,
        }
    }

    /// Add a participant on a membership-join callback.
    ///
    /// Returns the record when a new entry was created; `None` for blocked
    /// ids and for ids already present (re-joins don't produce duplicate
    /// events).
    pub fn add(&self, id: &str, display_name: &str) -> Option<Participant> {
        if self.moderation.is_blocked(id) {
            tracing::debug!(participant_id = %id, "blocked participant ignored on join");
            return None;
        }
        if self.inner.contains_key(id) {
            return None;
        }
        let participant = Participant {
            id: id.to_string(),
            display_name: display_name.to_string(),
        };
        self.inner.insert(id.to_string(), participant.clone());
        Some(participant)
    }

    /// Remove a participant on a membership-leave callback or a block.
    pub fn remove(&self, id: &str) -> Option<Participant> {
        self.inner.remove(id).map(|(_, p)| p)
    }

    pub fn get(&self, id: &str) -> Option<Participant> {
        self.inner.get(id).map(|e| e.clone())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.inner.contains_key(id)
    }

    /// All participants, sorted by id for stable iteration.
    pub fn list(&self) -> Vec<Participant> {
        let mut all: Vec<Participant> = self.inner.iter().map(|e| e.value().clone()).collect();
        all.sort_by(|a, b| a.id.cmp(&b.id));
        all
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}
