//! Wire-format envelopes exchanged over the signaling transport.
//!
//! Every application-level payload is a JSON object tagged by `type`.
//! Transport-level sender ids are delivered out of band by the adapter;
//! the envelope only carries what the source screen renders.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::identity::Role;

/// Reaction kinds participants can send.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReactionKind {
    Like,
    Heart,
    Laugh,
    Clap,
}

/// An application-level signaling payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Envelope {
    /// Chat message, broadcast on the primary channel.
    #[serde(rename_all = "camelCase")]
    Chat {
        text: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        sender_name: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        sender_role: Option<Role>,
        #[serde(default = "Utc::now")]
        timestamp: DateTime<Utc>,
    },
    /// Reaction, broadcast on the primary channel.
    #[serde(rename_all = "camelCase")]
    Reaction {
        reaction_type: ReactionKind,
        sender_name: String,
        sender_role: Role,
        timestamp: DateTime<Utc>,
    },
    /// Sent peer-to-peer to the host by a guest asking to be let in.
    #[serde(rename_all = "camelCase")]
    JoinRequest {
        name: String,
        user_id: String,
        class_id: String,
    },
    /// Sent peer-to-peer to the requester by the host.
    #[serde(rename_all = "camelCase")]
    JoinApproved { class_id: String },
    /// Sent peer-to-peer to the requester by the host.
    #[serde(rename_all = "camelCase")]
    JoinRejected { class_id: String },
    /// Sent peer-to-peer to a participant the host just blocked.
    Blocked { message: String },
}

impl Envelope {
    /// Parse an inbound payload.
    ///
    /// Anything that is not a well-formed envelope is treated as a
    /// plain-text chat message — non-conforming senders exist and their
    /// text should still show up.
    pub fn parse(raw: &str) -> Self {
        serde_json::from_str(raw).unwrap_or_else(|_| Envelope::Chat {
            text: raw.to_string(),
            sender_name: None,
            sender_role: None,
            timestamp: Utc::now(),
        })
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}
