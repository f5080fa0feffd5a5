//! Typed event hub the embedding front-end subscribes to.
//!
//! Uses a single `tokio::sync::broadcast` channel. Every UI layer
//! interested in updates subscribes once and filters locally.

use std::sync::Arc;

use tokio::sync::broadcast;

use super::admission::AdmissionState;
use super::envelope::ReactionKind;
use super::lifecycle::ChannelState;
use super::roster::Participant;
use super::router::{ActiveReaction, ChatMessage};

/// Capacity of the broadcast channel. Slow receivers that fall behind
/// skip events (RecvError::Lagged).
const EVENT_CAPACITY: usize = 1024;

/// An application-level event produced by the session coordinator.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    ChatReceived(ChatMessage),
    ReactionAdded(ActiveReaction),
    ReactionExpired {
        sender_id: String,
        kind: ReactionKind,
    },
    MemberJoined(Participant),
    MemberLeft {
        participant_id: String,
    },
    /// Host side: a guest is waiting to be let in.
    JoinRequestReceived {
        requester_id: String,
        requester_name: String,
    },
    /// Guest side: admission progressed.
    AdmissionChanged(AdmissionState),
    /// Host side: a block took effect locally.
    ParticipantBlocked {
        participant_id: String,
    },
    /// This participant was blocked by the host.
    BlockedNotice {
        message: String,
    },
    ChannelStateChanged(ChannelState),
    ScreenShareStarted,
    ScreenShareStopped,
}

/// Broadcast hub for session events. Cloneable; stored in every component
/// that emits.
#[derive(Clone)]
pub struct SessionEvents {
    sender: broadcast::Sender<Arc<SessionEvent>>,
}

impl SessionEvents {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(EVENT_CAPACITY);
        Self { sender }
    }

    /// Subscribe to session events. Each subscriber gets its own receiver.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<SessionEvent>> {
        self.sender.subscribe()
    }

    /// Emit an event to all subscribers.
    pub fn emit(&self, event: SessionEvent) {
        // send() errors when there are no receivers — that's fine.
        let _ = self.sender.send(Arc::new(event));
    }
}

impl Default for SessionEvents {
    fn default() -> Self {
        Self::new()
    }
}
