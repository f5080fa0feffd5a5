//! Shared harness for the integration suites: recording adapter mocks
//! wired through an in-process signaling network, plus an axum stub for
//! the token and class-status services.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use parking_lot::Mutex;
use serde_json::json;
use tokio::sync::{broadcast, oneshot, Notify};

use classline_live::adapter::{
    AdapterFactory, MediaTransport, ScreenCapture, ScreenTrack, SignalingClient, SignalingEvent,
    TrackKind,
};
use classline_live::error::LiveError;
use classline_live::session::identity::{Role, SessionIdentity};
use classline_live::Config;

/// Install a log subscriber for the test binary; `RUST_LOG` controls the
/// filter. Safe to call from every test.
pub fn init_tracing() {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let _ = tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer().with_test_writer())
        .try_init();
}

pub fn host_identity() -> SessionIdentity {
    SessionIdentity::new("cls1", "t1", "t1", "Ms Finch", Role::Host)
}

pub fn guest_identity(id: &str, name: &str) -> SessionIdentity {
    SessionIdentity::new("cls1", id, "t1", name, Role::Guest)
}

/// Poll `cond` until it holds or two seconds pass.
pub async fn wait_for<F: Fn() -> bool>(what: &str, cond: F) {
    let deadline = async {
        while !cond() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    };
    tokio::time::timeout(Duration::from_secs(2), deadline)
        .await
        .unwrap_or_else(|_| panic!("timed out waiting for {what}"));
}

/// Ordered record of every adapter call, labelled by instance generation
/// (`signaling#1.login(t1)`), shared across all mocks of one factory.
#[derive(Default)]
pub struct CallLog(Mutex<Vec<String>>);

impl CallLog {
    pub fn push(&self, entry: impl Into<String>) {
        self.0.lock().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().clone()
    }

    pub fn contains(&self, entry: &str) -> bool {
        self.0.lock().iter().any(|e| e == entry)
    }

    pub fn position(&self, entry: &str) -> Option<usize> {
        self.0.lock().iter().position(|e| e == entry)
    }

    pub fn clear(&self) {
        self.0.lock().clear();
    }
}

/// In-process signaling fabric. Routes broadcasts, peer messages, and
/// membership events between every logged-in mock client.
///
/// Lock order is `peers` before `channels`, always — sessions run on
/// separate tasks of a multi-threaded runtime.
#[derive(Default)]
pub struct Network {
    peers: Mutex<HashMap<String, broadcast::Sender<SignalingEvent>>>,
    channels: Mutex<HashMap<String, Vec<String>>>,
}

impl Network {
    fn login(&self, id: &str, tx: broadcast::Sender<SignalingEvent>) {
        self.peers.lock().insert(id.to_string(), tx);
    }

    fn logout(&self, id: &str) {
        let mut peers = self.peers.lock();
        peers.remove(id);
        for members in self.channels.lock().values_mut() {
            members.retain(|m| m != id);
        }
    }

    fn join(&self, channel: &str, id: &str) {
        let peers = self.peers.lock();
        let mut channels = self.channels.lock();
        let members = channels.entry(channel.to_string()).or_default();
        for member in members.iter() {
            if let Some(tx) = peers.get(member) {
                let _ = tx.send(SignalingEvent::MemberJoined {
                    channel_id: channel.to_string(),
                    member_id: id.to_string(),
                    display_name: id.to_string(),
                });
            }
        }
        members.push(id.to_string());
    }

    fn leave(&self, channel: &str, id: &str) {
        let peers = self.peers.lock();
        let mut channels = self.channels.lock();
        if let Some(members) = channels.get_mut(channel) {
            members.retain(|m| m != id);
            for member in members.iter() {
                if let Some(tx) = peers.get(member) {
                    let _ = tx.send(SignalingEvent::MemberLeft {
                        channel_id: channel.to_string(),
                        member_id: id.to_string(),
                    });
                }
            }
        }
    }

    fn broadcast(&self, channel: &str, sender: &str, payload: &str) {
        let peers = self.peers.lock();
        let channels = self.channels.lock();
        let Some(members) = channels.get(channel) else {
            return;
        };
        for member in members.iter().filter(|m| *m != sender) {
            if let Some(tx) = peers.get(member) {
                let _ = tx.send(SignalingEvent::ChannelMessage {
                    channel_id: channel.to_string(),
                    sender_id: sender.to_string(),
                    payload: payload.to_string(),
                });
            }
        }
    }

    fn send_to_peer(&self, to: &str, from: &str, payload: &str) {
        if let Some(tx) = self.peers.lock().get(to) {
            let _ = tx.send(SignalingEvent::PeerMessage {
                sender_id: from.to_string(),
                payload: payload.to_string(),
            });
        }
    }
}

pub struct MockSignaling {
    label: String,
    network: Arc<Network>,
    log: Arc<CallLog>,
    id: Mutex<Option<String>>,
    tx: broadcast::Sender<SignalingEvent>,
    login_gate: Option<Arc<Notify>>,
    fail_ops: Mutex<HashSet<String>>,
}

impl MockSignaling {
    /// Inject an inbound event directly, bypassing the network.
    pub fn push(&self, event: SignalingEvent) {
        let _ = self.tx.send(event);
    }

    /// Script a failure: the named operation errors until cleared. Failed
    /// calls are not recorded in the call log.
    pub fn fail_on(&self, op: &str) {
        self.fail_ops.lock().insert(op.to_string());
    }

    pub fn clear_failures(&self) {
        self.fail_ops.lock().clear();
    }

    fn check(&self, op: &str) -> Result<(), LiveError> {
        if self.fail_ops.lock().contains(op) {
            return Err(LiveError::Signaling(format!("scripted {op} failure")));
        }
        Ok(())
    }

    fn my_id(&self) -> String {
        self.id.lock().clone().unwrap_or_default()
    }
}

#[async_trait]
impl SignalingClient for MockSignaling {
    async fn login(&self, participant_id: &str, _token: &str) -> Result<(), LiveError> {
        self.check("login")?;
        self.log.push(format!("{}.login({participant_id})", self.label));
        if let Some(gate) = &self.login_gate {
            gate.notified().await;
        }
        *self.id.lock() = Some(participant_id.to_string());
        self.network.login(participant_id, self.tx.clone());
        Ok(())
    }

    async fn logout(&self) -> Result<(), LiveError> {
        self.check("logout")?;
        self.log.push(format!("{}.logout", self.label));
        self.network.logout(&self.my_id());
        Ok(())
    }

    async fn join_channel(&self, channel_id: &str) -> Result<(), LiveError> {
        self.check("join_channel")?;
        self.log
            .push(format!("{}.join_channel({channel_id})", self.label));
        self.network.join(channel_id, &self.my_id());
        Ok(())
    }

    async fn leave_channel(&self, channel_id: &str) -> Result<(), LiveError> {
        self.check("leave_channel")?;
        self.log
            .push(format!("{}.leave_channel({channel_id})", self.label));
        self.network.leave(channel_id, &self.my_id());
        Ok(())
    }

    async fn broadcast(&self, channel_id: &str, payload: &str) -> Result<(), LiveError> {
        self.check("broadcast")?;
        self.log.push(format!("{}.broadcast", self.label));
        self.network.broadcast(channel_id, &self.my_id(), payload);
        Ok(())
    }

    async fn send_to_peer(&self, peer_id: &str, payload: &str) -> Result<(), LiveError> {
        self.check("send_to_peer")?;
        self.log
            .push(format!("{}.send_to_peer({peer_id})", self.label));
        self.network.send_to_peer(peer_id, &self.my_id(), payload);
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<SignalingEvent> {
        self.tx.subscribe()
    }
}

pub struct MockMedia {
    label: String,
    log: Arc<CallLog>,
    joined: Mutex<Option<String>>,
    published: Mutex<Vec<TrackKind>>,
    fail_ops: Mutex<HashSet<String>>,
}

impl MockMedia {
    pub fn joined_room(&self) -> Option<String> {
        self.joined.lock().clone()
    }

    pub fn published(&self) -> Vec<TrackKind> {
        self.published.lock().clone()
    }

    /// Script a failure for `join`, `leave`, or a specific track operation
    /// (`publish(screen)`, `unpublish(camera)`). Failed calls are not
    /// recorded in the call log.
    pub fn fail_on(&self, op: &str) {
        self.fail_ops.lock().insert(op.to_string());
    }

    pub fn clear_failures(&self) {
        self.fail_ops.lock().clear();
    }

    fn check(&self, op: &str) -> Result<(), LiveError> {
        if self.fail_ops.lock().contains(op) {
            return Err(LiveError::Media(format!("scripted {op} failure")));
        }
        Ok(())
    }
}

#[async_trait]
impl MediaTransport for MockMedia {
    async fn join(
        &self,
        room_id: &str,
        participant_id: &str,
        _token: &str,
    ) -> Result<(), LiveError> {
        self.check("join")?;
        self.log
            .push(format!("{}.join({room_id},{participant_id})", self.label));
        *self.joined.lock() = Some(room_id.to_string());
        Ok(())
    }

    async fn leave(&self) -> Result<(), LiveError> {
        self.check("leave")?;
        self.log.push(format!("{}.leave", self.label));
        *self.joined.lock() = None;
        Ok(())
    }

    async fn publish(&self, track: TrackKind) -> Result<(), LiveError> {
        self.check(&format!("publish({})", track.as_str()))?;
        self.log
            .push(format!("{}.publish({})", self.label, track.as_str()));
        let mut published = self.published.lock();
        if !published.contains(&track) {
            published.push(track);
        }
        Ok(())
    }

    async fn unpublish(&self, track: TrackKind) -> Result<(), LiveError> {
        self.check(&format!("unpublish({})", track.as_str()))?;
        self.log
            .push(format!("{}.unpublish({})", self.label, track.as_str()));
        self.published.lock().retain(|t| *t != track);
        Ok(())
    }
}

pub struct MockCapture {
    label: String,
    log: Arc<CallLog>,
    end_tx: Mutex<Option<oneshot::Sender<()>>>,
}

impl MockCapture {
    /// Simulate the user ending the share from the platform chrome.
    pub fn end_share(&self) {
        if let Some(tx) = self.end_tx.lock().take() {
            let _ = tx.send(());
        }
    }

    pub fn is_live(&self) -> bool {
        self.end_tx.lock().is_some()
    }
}

#[async_trait]
impl ScreenCapture for MockCapture {
    async fn acquire(&self) -> Result<ScreenTrack, LiveError> {
        self.log.push(format!("{}.acquire", self.label));
        let (tx, rx) = oneshot::channel();
        *self.end_tx.lock() = Some(tx);
        Ok(ScreenTrack { ended: rx })
    }

    async fn release(&self) -> Result<(), LiveError> {
        self.log.push(format!("{}.release", self.label));
        self.end_tx.lock().take();
        Ok(())
    }
}

/// Records every adapter it hands out so tests can inspect individual
/// instances after the fact.
pub struct MockFactory {
    network: Arc<Network>,
    pub log: Arc<CallLog>,
    signalings: Mutex<Vec<Arc<MockSignaling>>>,
    medias: Mutex<Vec<Arc<MockMedia>>>,
    captures: Mutex<Vec<Arc<MockCapture>>>,
    hold_next_login: Mutex<Option<Arc<Notify>>>,
    fail_next_signaling: Mutex<Vec<String>>,
    fail_next_media: Mutex<Vec<String>>,
}

impl MockFactory {
    pub fn new(network: Arc<Network>) -> Arc<Self> {
        Arc::new(Self {
            network,
            log: Arc::new(CallLog::default()),
            signalings: Mutex::new(Vec::new()),
            medias: Mutex::new(Vec::new()),
            captures: Mutex::new(Vec::new()),
            hold_next_login: Mutex::new(None),
            fail_next_signaling: Mutex::new(Vec::new()),
            fail_next_media: Mutex::new(Vec::new()),
        })
    }

    /// The next signaling client's `login` will block until the returned
    /// handle is notified. Lets tests hold an operation in flight.
    pub fn hold_next_login(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.hold_next_login.lock() = Some(gate.clone());
        gate
    }

    /// Script a failure on the next signaling client this factory creates.
    /// For clients that already exist, call `fail_on` on the instance.
    pub fn fail_next_signaling(&self, op: &str) {
        self.fail_next_signaling.lock().push(op.to_string());
    }

    /// Script a failure on the next media transport this factory creates.
    pub fn fail_next_media(&self, op: &str) {
        self.fail_next_media.lock().push(op.to_string());
    }

    pub fn signaling_at(&self, index: usize) -> Arc<MockSignaling> {
        self.signalings.lock()[index].clone()
    }

    pub fn media_at(&self, index: usize) -> Arc<MockMedia> {
        self.medias.lock()[index].clone()
    }

    pub fn media_count(&self) -> usize {
        self.medias.lock().len()
    }

    pub fn capture_at(&self, index: usize) -> Arc<MockCapture> {
        self.captures.lock()[index].clone()
    }
}

impl AdapterFactory for MockFactory {
    fn signaling(&self) -> Arc<dyn SignalingClient> {
        let mut signalings = self.signalings.lock();
        let (tx, _) = broadcast::channel(64);
        let client = Arc::new(MockSignaling {
            label: format!("signaling#{}", signalings.len() + 1),
            network: self.network.clone(),
            log: self.log.clone(),
            id: Mutex::new(None),
            tx,
            login_gate: self.hold_next_login.lock().take(),
            fail_ops: Mutex::new(self.fail_next_signaling.lock().drain(..).collect()),
        });
        signalings.push(client.clone());
        client
    }

    fn media(&self) -> Arc<dyn MediaTransport> {
        let mut medias = self.medias.lock();
        let transport = Arc::new(MockMedia {
            label: format!("media#{}", medias.len() + 1),
            log: self.log.clone(),
            joined: Mutex::new(None),
            published: Mutex::new(Vec::new()),
            fail_ops: Mutex::new(self.fail_next_media.lock().drain(..).collect()),
        });
        medias.push(transport.clone());
        transport
    }

    fn screen_capture(&self) -> Arc<dyn ScreenCapture> {
        let mut captures = self.captures.lock();
        let capture = Arc::new(MockCapture {
            label: format!("capture#{}", captures.len() + 1),
            log: self.log.clone(),
            end_tx: Mutex::new(None),
        });
        captures.push(capture.clone());
        capture
    }
}

/// What the stub backend has been asked for.
#[derive(Default)]
pub struct BackendLog {
    /// `channel/participant` per token fetch, in order.
    pub token_requests: Mutex<Vec<String>>,
    /// `(class_id, status)` per status update, in order.
    pub statuses: Mutex<Vec<(String, String)>>,
}

/// Spawn a stub token + class-status service and return a [`Config`]
/// pointing at it.
pub async fn spawn_backend() -> (Config, Arc<BackendLog>) {
    init_tracing();
    let log = Arc::new(BackendLog::default());

    async fn tokens(
        State(log): State<Arc<BackendLog>>,
        Path((channel, participant)): Path<(String, String)>,
    ) -> Json<serde_json::Value> {
        log.token_requests
            .lock()
            .push(format!("{channel}/{participant}"));
        Json(json!({
            "mediaToken": format!("media-{channel}"),
            "signalingToken": format!("sig-{channel}"),
        }))
    }

    async fn status(
        State(log): State<Arc<BackendLog>>,
        Path(class_id): Path<String>,
        Json(body): Json<serde_json::Value>,
    ) -> StatusCode {
        let status = body["status"].as_str().unwrap_or_default().to_string();
        log.statuses.lock().push((class_id, status));
        StatusCode::NO_CONTENT
    }

    let app = Router::new()
        .route("/tokens/{channel}/{participant}", get(tokens))
        .route("/classes/{class_id}/status", post(status))
        .with_state(log.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let base = format!("http://{addr}");
    (Config::new(&base, &base), log)
}
