//! Top-level session facade.
//!
//! `LiveClassSession` wires the admission, lifecycle, routing and
//! moderation pieces together for one participant in one class, and is
//! the only type an embedding app needs to hold.

use std::sync::Arc;

use tokio::sync::broadcast;

use crate::adapter::{AdapterFactory, SignalingSender};
use crate::backend::{ClassStatusClient, TokenClient};
use crate::config::Config;
use crate::error::LiveError;

use super::admission::{AdmissionState, AdmissionWiring, Decision, PendingRequest};
use super::envelope::ReactionKind;
use super::events::{SessionEvent, SessionEvents};
use super::identity::SessionIdentity;
use super::lifecycle::{ChannelLifecycleManager, ChannelState};
use super::moderation::ModerationRegistry;
use super::roster::{Participant, Roster};
use super::router::{ActiveReaction, ChatMessage, SessionEventRouter};

/// One participant's live-class session.
pub struct LiveClassSession {
    identity: SessionIdentity,
    events: SessionEvents,
    roster: Arc<Roster>,
    router: Arc<SessionEventRouter>,
    lifecycle: Arc<ChannelLifecycleManager>,
    admission: AdmissionWiring,
    status: ClassStatusClient,
}

impl LiveClassSession {
    pub fn new(
        identity: SessionIdentity,
        factory: Arc<dyn AdapterFactory>,
        config: &Config,
    ) -> Self {
        let events = SessionEvents::new();
        let sender = SignalingSender::new();
        let moderation = Arc::new(ModerationRegistry::new());
        let roster = Arc::new(Roster::new(Arc::clone(&moderation)));

        let admission = if identity.is_host() {
            AdmissionWiring::Host(Arc::new(super::admission::AdmissionQueue::new(
                identity.clone(),
                sender.clone(),
                events.clone(),
            )))
        } else {
            AdmissionWiring::Guest(Arc::new(super::admission::AdmissionController::new(
                identity.clone(),
                sender.clone(),
                events.clone(),
            )))
        };

        let router = Arc::new(SessionEventRouter::new(
            identity.clone(),
            moderation,
            Arc::clone(&roster),
            events.clone(),
            sender.clone(),
            admission.clone(),
        ));

        let controller = match &admission {
            AdmissionWiring::Guest(c) => Some(Arc::clone(c)),
            AdmissionWiring::Host(_) => None,
        };
        let lifecycle = Arc::new(ChannelLifecycleManager::new(
            identity.clone(),
            factory,
            TokenClient::new(&config.token_service_url),
            Arc::clone(&router),
            sender,
            controller,
            events.clone(),
        ));

        Self {
            identity,
            events,
            roster,
            router,
            lifecycle,
            admission,
            status: ClassStatusClient::new(&config.class_service_url),
        }
    }

    pub fn identity(&self) -> &SessionIdentity {
        &self.identity
    }

    /// Subscribe to session events. Every subscriber sees every event.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<SessionEvent>> {
        self.events.subscribe()
    }

    pub fn channel_state(&self) -> ChannelState {
        self.lifecycle.state()
    }

    pub fn participants(&self) -> Vec<Participant> {
        self.roster.list()
    }

    pub fn messages(&self) -> Vec<ChatMessage> {
        self.router.messages()
    }

    pub fn active_reactions(&self) -> Vec<ActiveReaction> {
        self.router.active_reactions()
    }

    /// Guest admission state; `None` for the host, who never asks.
    pub fn admission_state(&self) -> Option<AdmissionState> {
        match &self.admission {
            AdmissionWiring::Guest(controller) => Some(controller.state()),
            AdmissionWiring::Host(_) => None,
        }
    }

    /// Join requests awaiting the host's review. Empty for guests.
    pub fn pending_requests(&self) -> Vec<PendingRequest> {
        match &self.admission {
            AdmissionWiring::Host(queue) => queue.pending(),
            AdmissionWiring::Guest(_) => Vec::new(),
        }
    }

    /// Host entry point: bring up the channel pair, go on air, and mark
    /// the class live. The status update is advisory; a failure there
    /// never blocks the class from starting.
    pub async fn start_class(&self) -> Result<(), LiveError> {
        if !self.identity.is_host() {
            return Err(LiveError::Forbidden("only the host starts the class"));
        }
        self.lifecycle.init_primary().await?;
        self.lifecycle.join_primary_media().await?;
        if let Err(e) = self.status.set_live(&self.identity.class_id.main).await {
            tracing::warn!(error = %e, "failed to mark class live");
        }
        Ok(())
    }

    /// Guest entry point: bring up signaling only. Media join waits for
    /// admission approval, see [`join_class`](Self::join_class).
    pub async fn enter(&self) -> Result<(), LiveError> {
        self.lifecycle.init_primary().await
    }

    /// Guest: ask the host to let us in.
    pub async fn request_to_join(&self) -> Result<(), LiveError> {
        match &self.admission {
            AdmissionWiring::Guest(controller) => controller.request_to_join().await,
            AdmissionWiring::Host(_) => {
                Err(LiveError::Forbidden("the host does not request admission"))
            }
        }
    }

    /// Host: approve or reject a pending join request.
    pub async fn review_request(
        &self,
        requester_id: &str,
        decision: Decision,
    ) -> Result<(), LiveError> {
        match &self.admission {
            AdmissionWiring::Host(queue) => queue.review_request(requester_id, decision).await,
            AdmissionWiring::Guest(_) => {
                Err(LiveError::Forbidden("only the host reviews join requests"))
            }
        }
    }

    /// Join the media room. For guests this requires an approved
    /// admission request.
    pub async fn join_class(&self) -> Result<(), LiveError> {
        self.lifecycle.join_primary_media().await
    }

    pub async fn send_chat(&self, text: &str) -> Result<ChatMessage, LiveError> {
        self.router.send_chat(text).await
    }

    pub async fn send_reaction(&self, kind: ReactionKind) -> Result<(), LiveError> {
        self.router.send_reaction(kind).await
    }

    /// Host: block a participant and purge their contributions.
    pub async fn block_participant(&self, participant_id: &str) -> Result<(), LiveError> {
        self.router.block_participant(participant_id).await
    }

    pub async fn start_screen_share(&self) -> Result<(), LiveError> {
        self.lifecycle.start_screen_share().await
    }

    pub async fn stop_screen_share(&self) -> Result<(), LiveError> {
        self.lifecycle.stop_screen_share().await
    }

    /// Host exit: mark the class completed (advisory) and tear everything
    /// down.
    pub async fn end_class(&self) -> Result<(), LiveError> {
        if !self.identity.is_host() {
            return Err(LiveError::Forbidden("only the host ends the class"));
        }
        if let Err(e) = self
            .status
            .set_completed(&self.identity.class_id.main)
            .await
        {
            tracing::warn!(error = %e, "failed to mark class completed");
        }
        self.lifecycle.teardown().await;
        Ok(())
    }

    /// Leave the session. Always succeeds; safe to call repeatedly.
    pub async fn leave(&self) {
        self.lifecycle.teardown().await;
    }
}
