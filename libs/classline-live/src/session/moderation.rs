//! Per-session blocked-participant registry.
//!
//! Single source of truth for blocked status: the event router and the
//! roster consult this registry, never a copy. A block lasts for the
//! session's lifetime — there is no unblock in the current feature set,
//! though the record keeps enough to support one later.

use chrono::{DateTime, Utc};
use dashmap::DashMap;

/// Metadata recorded when a participant is blocked.
#[derive(Debug, Clone)]
pub struct BlockRecord {
    pub blocked_by: String,
    pub blocked_at: DateTime<Utc>,
}

/// Thread-safe blocked set.
pub struct ModerationRegistry {
    blocked: DashMap<String, BlockRecord>,
}

impl ModerationRegistry {
    pub fn new() -> Self {
        Self {
            blocked: DashMap::new(),
        }
    }

    /// Record a block. Returns false if the participant was already
    /// blocked (the earlier record is kept).
    pub fn insert(&self, participant_id: &str, blocked_by: &str) -> bool {
        if self.blocked.contains_key(participant_id) {
            return false;
        }
        self.blocked.insert(
            participant_id.to_string(),
            BlockRecord {
                blocked_by: blocked_by.to_string(),
                blocked_at: Utc::now(),
            },
        );
        true
    }

    pub fn is_blocked(&self, participant_id: &str) -> bool {
        self.blocked.contains_key(participant_id)
    }

    pub fn blocked_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.blocked.iter().map(|e| e.key().clone()).collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.blocked.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocked.is_empty()
    }
}

impl Default for ModerationRegistry {
    fn default() -> Self {
        Self::new()
    }
}
