//! Signaling client seam: channel join/leave, broadcast, and direct peer
//! messages, plus the inbound event subscription.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::broadcast;

use crate::error::LiveError;

/// Inbound callbacks surfaced by a signaling client.
#[derive(Debug, Clone)]
pub enum SignalingEvent {
    /// A broadcast message on a joined channel.
    ChannelMessage {
        channel_id: String,
        sender_id: String,
        payload: String,
    },
    /// A direct peer-to-peer message addressed to this participant.
    PeerMessage {
        sender_id: String,
        payload: String,
    },
    /// A participant joined a channel we are in.
    MemberJoined {
        channel_id: String,
        member_id: String,
        display_name: String,
    },
    /// A participant left a channel we are in.
    MemberLeft {
        channel_id: String,
        member_id: String,
    },
}

/// A logged-in connection to the signaling service.
///
/// Implementations wrap the platform messaging SDK; tests use recording
/// mocks. All methods are suspension points and may fail independently.
#[async_trait]
pub trait SignalingClient: Send + Sync {
    async fn login(&self, participant_id: &str, token: &str) -> Result<(), LiveError>;
    async fn logout(&self) -> Result<(), LiveError>;
    async fn join_channel(&self, channel_id: &str) -> Result<(), LiveError>;
    async fn leave_channel(&self, channel_id: &str) -> Result<(), LiveError>;
    async fn broadcast(&self, channel_id: &str, payload: &str) -> Result<(), LiveError>;
    async fn send_to_peer(&self, peer_id: &str, payload: &str) -> Result<(), LiveError>;

    /// Subscribe to inbound events. Each subscription is independent;
    /// dropping the receiver detaches the listener.
    fn subscribe(&self) -> broadcast::Receiver<SignalingEvent>;
}

/// Outbound-only signaling handle.
///
/// The lifecycle manager exclusively owns the client objects. Components
/// that need to *send* (router, admission) hold one of these instead; the
/// manager installs the live client on init and revokes it on teardown, so
/// a torn-down session cannot be written to.
#[derive(Clone)]
pub struct SignalingSender {
    inner: Arc<Mutex<Option<Arc<dyn SignalingClient>>>>,
}

impl SignalingSender {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(None)),
        }
    }

    pub(crate) fn install(&self, client: Arc<dyn SignalingClient>) {
        *self.inner.lock() = Some(client);
    }

    pub(crate) fn revoke(&self) {
        *self.inner.lock() = None;
    }

    pub fn is_installed(&self) -> bool {
        self.inner.lock().is_some()
    }

    fn client(&self) -> Result<Arc<dyn SignalingClient>, LiveError> {
        self.inner
            .lock()
            .clone()
            .ok_or(LiveError::NotInitialized("signaling client is not logged in"))
    }

    pub async fn broadcast(&self, channel_id: &str, payload: &str) -> Result<(), LiveError> {
        self.client()?.broadcast(channel_id, payload).await
    }

    pub async fn send_to_peer(&self, peer_id: &str, payload: &str) -> Result<(), LiveError> {
        self.client()?.send_to_peer(peer_id, payload).await
    }
}

impl Default for SignalingSender {
    fn default() -> Self {
        Self::new()
    }
}
