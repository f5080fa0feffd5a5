//! Demultiplexes inbound signaling into typed session events, applying
//! moderation before anything reaches application state.
//!
//! Broadcast delivery is in-order per channel (transport property), so the
//! chat log is ordered by arrival, not by timestamp. Nothing here is
//! persisted; the log and the reaction set die with the session.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use classline_common::id::prefix;
use classline_common::PrefixedId;

use crate::adapter::{SignalingEvent, SignalingSender};
use crate::error::LiveError;

use super::admission::AdmissionWiring;
use super::envelope::{Envelope, ReactionKind};
use super::events::{SessionEvent, SessionEvents};
use super::identity::{Role, SessionIdentity};
use super::moderation::ModerationRegistry;
use super::roster::Roster;

/// Longest the chat log grows before the oldest entries are evicted.
const MAX_CHAT_LOG: usize = 1000;

/// How long a reaction stays in the active set.
pub const REACTION_TTL: Duration = Duration::from_secs(5);

/// A chat entry in the in-memory log.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatMessage {
    pub id: String,
    pub text: String,
    pub sender_id: String,
    pub sender_name: Option<String>,
    pub sender_role: Option<Role>,
    pub timestamp: DateTime<Utc>,
}

impl PrefixedId for ChatMessage {
    const PREFIX: &'static str = prefix::MESSAGE;
}

/// A reaction in the active set. `(sender_id, kind, timestamp)` keys the
/// expiry timer: identical reactions from different senders expire
/// independently.
#[derive(Debug, Clone, PartialEq)]
pub struct ActiveReaction {
    pub kind: ReactionKind,
    pub sender_id: String,
    pub timestamp: DateTime<Utc>,
}

/// Routes inbound signaling to application state and serializes outbound
/// chat/reactions.
pub struct SessionEventRouter {
    identity: SessionIdentity,
    moderation: Arc<ModerationRegistry>,
    roster: Arc<Roster>,
    events: SessionEvents,
    signaling: SignalingSender,
    admission: AdmissionWiring,
    log: Mutex<VecDeque<ChatMessage>>,
    reactions: Mutex<Vec<ActiveReaction>>,
}

impl SessionEventRouter {
    pub fn new(
        identity: SessionIdentity,
        moderation: Arc<ModerationRegistry>,
        roster: Arc<Roster>,
        events: SessionEvents,
        signaling: SignalingSender,
        admission: AdmissionWiring,
    ) -> Self {
        Self {
            identity,
            moderation,
            roster,
            events,
            signaling,
            admission,
            log: Mutex::new(VecDeque::new()),
            reactions: Mutex::new(Vec::new()),
        }
    }

    /// Route one inbound signaling event. Synchronous: all routing is
    /// in-memory, so the event pump never stalls on a slow consumer.
    pub fn handle_event(self: &Arc<Self>, event: SignalingEvent) {
        match event {
            SignalingEvent::ChannelMessage {
                channel_id,
                sender_id,
                payload,
            } => self.handle_channel_message(&channel_id, &sender_id, &payload),
            SignalingEvent::PeerMessage { sender_id, payload } => {
                self.handle_peer_message(&sender_id, &payload)
            }
            SignalingEvent::MemberJoined {
                channel_id,
                member_id,
                display_name,
            } => {
                if channel_id != self.identity.class_id.main {
                    return;
                }
                if let Some(participant) = self.roster.add(&member_id, &display_name) {
                    self.events.emit(SessionEvent::MemberJoined(participant));
                }
            }
            SignalingEvent::MemberLeft {
                channel_id,
                member_id,
            } => {
                if channel_id != self.identity.class_id.main {
                    return;
                }
                if self.roster.remove(&member_id).is_some() {
                    self.events.emit(SessionEvent::MemberLeft {
                        participant_id: member_id,
                    });
                }
            }
        }
    }

    fn handle_channel_message(self: &Arc<Self>, channel_id: &str, sender_id: &str, payload: &str) {
        if channel_id != self.identity.class_id.main {
            tracing::debug!(%channel_id, "broadcast on unexpected channel ignored");
            return;
        }
        // Moderation gate: a blocked sender is invisible going forward.
        if self.moderation.is_blocked(sender_id) {
            tracing::trace!(%sender_id, "broadcast from blocked sender dropped");
            return;
        }

        match Envelope::parse(payload) {
            Envelope::Chat {
                text,
                sender_name,
                sender_role,
                timestamp,
            } => {
                let message = ChatMessage {
                    id: ChatMessage::generate(),
                    text,
                    sender_id: sender_id.to_string(),
                    sender_name,
                    sender_role,
                    timestamp,
                };
                self.append_chat(message);
            }
            Envelope::Reaction {
                reaction_type,
                timestamp,
                ..
            } => {
                self.append_reaction(ActiveReaction {
                    kind: reaction_type,
                    sender_id: sender_id.to_string(),
                    timestamp,
                });
            }
            other => {
                tracing::debug!(envelope = ?other, "non-broadcast envelope on channel ignored");
            }
        }
    }

    fn handle_peer_message(&self, sender_id: &str, payload: &str) {
        if self.moderation.is_blocked(sender_id) {
            tracing::trace!(%sender_id, "peer message from blocked sender dropped");
            return;
        }

        match Envelope::parse(payload) {
            Envelope::JoinRequest { name, user_id, .. } => match &self.admission {
                AdmissionWiring::Host(queue) => {
                    queue.push(&user_id, &name);
                }
                AdmissionWiring::Guest(_) => {
                    tracing::debug!(%sender_id, "guest received join request, ignored");
                }
            },
            decision @ (Envelope::JoinApproved { .. } | Envelope::JoinRejected { .. }) => {
                match &self.admission {
                    AdmissionWiring::Guest(controller) => controller.handle_decision(&decision),
                    AdmissionWiring::Host(_) => {
                        tracing::debug!(%sender_id, "host received admission decision, ignored");
                    }
                }
            }
            Envelope::Blocked { message } => {
                tracing::warn!(%sender_id, "blocked by host");
                self.events.emit(SessionEvent::BlockedNotice { message });
            }
            other => {
                tracing::debug!(%sender_id, envelope = ?other, "unexpected peer payload ignored");
            }
        }
    }

    /// Broadcast a chat message on the primary channel. The transport does
    /// not echo our own broadcasts back, so the message is appended to the
    /// local log on success.
    pub async fn send_chat(self: &Arc<Self>, text: &str) -> Result<ChatMessage, LiveError> {
        let timestamp = Utc::now();
        let envelope = Envelope::Chat {
            text: text.to_string(),
            sender_name: Some(self.identity.display_name.clone()),
            sender_role: Some(self.identity.role),
            timestamp,
        };
        self.signaling
            .broadcast(&self.identity.class_id.main, &envelope.to_json())
            .await?;

        let message = ChatMessage {
            id: ChatMessage::generate(),
            text: text.to_string(),
            sender_id: self.identity.self_id.main.clone(),
            sender_name: Some(self.identity.display_name.clone()),
            sender_role: Some(self.identity.role),
            timestamp,
        };
        self.append_chat(message.clone());
        Ok(message)
    }

    /// Broadcast a reaction and add it to the local active set with its
    /// own expiry timer.
    pub async fn send_reaction(self: &Arc<Self>, kind: ReactionKind) -> Result<(), LiveError> {
        let timestamp = Utc::now();
        let envelope = Envelope::Reaction {
            reaction_type: kind,
            sender_name: self.identity.display_name.clone(),
            sender_role: self.identity.role,
            timestamp,
        };
        self.signaling
            .broadcast(&self.identity.class_id.main, &envelope.to_json())
            .await?;

        self.append_reaction(ActiveReaction {
            kind,
            sender_id: self.identity.self_id.main.clone(),
            timestamp,
        });
        Ok(())
    }

    /// Host-only: block a participant with retroactive effect.
    ///
    /// Records the block, removes the participant from the roster, purges
    /// their messages and reactions already in memory, and notifies them
    /// best-effort. Local enforcement does not depend on the notification
    /// reaching them.
    pub async fn block_participant(&self, participant_id: &str) -> Result<(), LiveError> {
        if !self.identity.is_host() {
            return Err(LiveError::Forbidden("only the host can block participants"));
        }
        if !self
            .moderation
            .insert(participant_id, &self.identity.self_id.main)
        {
            return Ok(()); // already blocked
        }

        self.roster.remove(participant_id);
        self.log
            .lock()
            .retain(|m| m.sender_id != participant_id);
        self.reactions
            .lock()
            .retain(|r| r.sender_id != participant_id);

        tracing::info!(%participant_id, "participant blocked");
        self.events.emit(SessionEvent::ParticipantBlocked {
            participant_id: participant_id.to_string(),
        });

        let envelope = Envelope::Blocked {
            message: "You have been removed from this class by the teacher".to_string(),
        };
        if let Err(e) = self
            .signaling
            .send_to_peer(participant_id, &envelope.to_json())
            .await
        {
            tracing::warn!(%participant_id, error = %e, "block notification failed");
        }
        Ok(())
    }

    /// Chat log snapshot, oldest first.
    pub fn messages(&self) -> Vec<ChatMessage> {
        self.log.lock().iter().cloned().collect()
    }

    /// Currently active (unexpired) reactions.
    pub fn active_reactions(&self) -> Vec<ActiveReaction> {
        self.reactions.lock().clone()
    }

    fn append_chat(&self, message: ChatMessage) {
        let mut log = self.log.lock();
        log.push_back(message.clone());
        while log.len() > MAX_CHAT_LOG {
            log.pop_front();
        }
        drop(log);
        self.events.emit(SessionEvent::ChatReceived(message));
    }

    fn append_reaction(self: &Arc<Self>, reaction: ActiveReaction) {
        self.reactions.lock().push(reaction.clone());
        self.events
            .emit(SessionEvent::ReactionAdded(reaction.clone()));

        // Exactly one timer per reaction instance.
        let router = Arc::clone(self);
        tokio::spawn(async move {
            tokio::time::sleep(REACTION_TTL).await;
            router.expire_reaction(&reaction);
        });
    }

    fn expire_reaction(&self, reaction: &ActiveReaction) {
        let mut set = self.reactions.lock();
        // Purged-on-block reactions are already gone; their timers no-op.
        if let Some(pos) = set.iter().position(|r| r == reaction) {
            set.remove(pos);
            drop(set);
            self.events.emit(SessionEvent::ReactionExpired {
                sender_id: reaction.sender_id.clone(),
                kind: reaction.kind,
            });
        }
    }
}
