//! Join-request admission: the guest-side request/approve/reject state
//! machine and the host-side pending queue.
//!
//! Approval is a precondition gate for the guest's media join, not a
//! sequencing signal — there is no ordering guarantee between a decision
//! message and subsequent channel broadcasts.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use crate::adapter::SignalingSender;
use crate::error::LiveError;

use super::envelope::Envelope;
use super::events::{SessionEvent, SessionEvents};
use super::identity::SessionIdentity;

/// Guest admission progress. Only meaningful for the Guest role.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdmissionState {
    Idle,
    Requesting,
    Approved,
    Rejected,
}

/// Host decision on a pending join request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Approve,
    Reject,
}

/// Guest-side admission state machine.
pub struct AdmissionController {
    identity: SessionIdentity,
    signaling: SignalingSender,
    events: SessionEvents,
    state: Mutex<AdmissionState>,
}

impl AdmissionController {
    pub fn new(identity: SessionIdentity, signaling: SignalingSender, events: SessionEvents) -> Self {
        Self {
            identity,
            signaling,
            events,
            state: Mutex::new(AdmissionState::Idle),
        }
    }

    pub fn state(&self) -> AdmissionState {
        *self.state.lock()
    }

    pub fn is_approved(&self) -> bool {
        self.state() == AdmissionState::Approved
    }

    /// Send one join request to the host and enter `Requesting`.
    ///
    /// Requires a logged-in signaling client. Exactly one direct message
    /// goes out per call; re-entrant calls while `Requesting` send
    /// duplicates, so callers disable the control until a decision lands.
    /// A send failure reverts the state to `Idle` for retry.
    pub async fn request_to_join(&self) -> Result<(), LiveError> {
        if self.identity.is_host() {
            return Err(LiveError::Forbidden("hosts do not request admission"));
        }
        if !self.signaling.is_installed() {
            return Err(LiveError::NotInitialized("signaling client is not logged in"));
        }

        self.transition(AdmissionState::Requesting);

        let envelope = Envelope::JoinRequest {
            name: self.identity.display_name.clone(),
            user_id: self.identity.self_id.main.clone(),
            class_id: self.identity.class_id.main.clone(),
        };
        match self
            .signaling
            .send_to_peer(&self.identity.host_id, &envelope.to_json())
            .await
        {
            Ok(()) => {
                tracing::info!(
                    class_id = %self.identity.class_id.main,
                    "join request sent to host"
                );
                Ok(())
            }
            Err(e) => {
                tracing::warn!(error = %e, "join request send failed");
                self.transition(AdmissionState::Idle);
                Err(e)
            }
        }
    }

    /// Handle a decision addressed to this guest.
    ///
    /// Decisions apply while `Requesting` or `Rejected` — the host can
    /// change their mind and approve after an earlier rejection. A decision
    /// arriving while `Idle` (no outstanding request) or `Approved` is
    /// stale and ignored.
    pub fn handle_decision(&self, envelope: &Envelope) {
        let next = match envelope {
            Envelope::JoinApproved { class_id } if *class_id == self.identity.class_id.main => {
                AdmissionState::Approved
            }
            Envelope::JoinRejected { class_id } if *class_id == self.identity.class_id.main => {
                AdmissionState::Rejected
            }
            _ => return,
        };

        let mut state = self.state.lock();
        if !matches!(*state, AdmissionState::Requesting | AdmissionState::Rejected) {
            tracing::debug!(?next, current = ?*state, "stale admission decision ignored");
            return;
        }
        *state = next;
        drop(state);

        tracing::info!(decision = ?next, "admission decision received");
        self.events.emit(SessionEvent::AdmissionChanged(next));
    }

    fn transition(&self, next: AdmissionState) {
        *self.state.lock() = next;
        self.events.emit(SessionEvent::AdmissionChanged(next));
    }
}

/// A guest waiting for the host's decision.
#[derive(Debug, Clone)]
pub struct PendingRequest {
    pub requester_id: String,
    pub requester_name: String,
    pub received_at: DateTime<Utc>,
}

/// Host-side queue of students waiting to be let in.
///
/// In-memory only: pending requests are lost if the host reloads, and a
/// waiting student simply re-requests.
pub struct AdmissionQueue {
    identity: SessionIdentity,
    signaling: SignalingSender,
    events: SessionEvents,
    pending: Mutex<Vec<PendingRequest>>,
}

impl AdmissionQueue {
    pub fn new(identity: SessionIdentity, signaling: SignalingSender, events: SessionEvents) -> Self {
        Self {
            identity,
            signaling,
            events,
            pending: Mutex::new(Vec::new()),
        }
    }

    /// Queue an inbound join request. Duplicate requester ids collapse
    /// into the earlier entry so the pending list never shows the same
    /// student twice.
    pub fn push(&self, requester_id: &str, requester_name: &str) -> bool {
        let mut pending = self.pending.lock();
        if pending.iter().any(|r| r.requester_id == requester_id) {
            tracing::debug!(%requester_id, "duplicate join request collapsed");
            return false;
        }
        pending.push(PendingRequest {
            requester_id: requester_id.to_string(),
            requester_name: requester_name.to_string(),
            received_at: Utc::now(),
        });
        drop(pending);

        self.events.emit(SessionEvent::JoinRequestReceived {
            requester_id: requester_id.to_string(),
            requester_name: requester_name.to_string(),
        });
        true
    }

    pub fn pending(&self) -> Vec<PendingRequest> {
        self.pending.lock().clone()
    }

    /// Send a decision to a requester and drop them from the queue.
    ///
    /// The decision goes out even if the requester is no longer pending —
    /// the guest side ignores anything stale.
    pub async fn review_request(
        &self,
        requester_id: &str,
        decision: Decision,
    ) -> Result<(), LiveError> {
        if !self.identity.is_host() {
            return Err(LiveError::Forbidden("only the host reviews join requests"));
        }

        self.pending
            .lock()
            .retain(|r| r.requester_id != requester_id);

        let envelope = match decision {
            Decision::Approve => Envelope::JoinApproved {
                class_id: self.identity.class_id.main.clone(),
            },
            Decision::Reject => Envelope::JoinRejected {
                class_id: self.identity.class_id.main.clone(),
            },
        };
        self.signaling
            .send_to_peer(requester_id, &envelope.to_json())
            .await?;

        tracing::info!(%requester_id, ?decision, "join request reviewed");
        Ok(())
    }
}

/// Role-dependent admission wiring held by the event router.
#[derive(Clone)]
pub enum AdmissionWiring {
    Host(Arc<AdmissionQueue>),
    Guest(Arc<AdmissionController>),
}
