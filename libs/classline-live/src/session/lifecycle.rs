//! Channel pair lifecycle: init, media join, the auxiliary room, screen
//! share, and teardown.
//!
//! The manager exclusively owns the adapter instances for one session.
//! Re-initialization always destroys the previous handle first — the
//! alternative is duplicate listeners and ghost subscriptions. Teardown is
//! idempotent and runs in reverse acquisition order, and stays defensive
//! because it often runs during unmount.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::adapter::{
    AdapterFactory, MediaTransport, ScreenCapture, ScreenTrack, SignalingClient, SignalingSender,
    TrackKind,
};
use crate::backend::{Credentials, TokenClient};
use crate::error::LiveError;

use super::admission::AdmissionController;
use super::events::{SessionEvent, SessionEvents};
use super::identity::SessionIdentity;
use super::router::SessionEventRouter;

/// Lifecycle of one channel-pair handle.
///
/// `TornDown` is terminal for a handle generation; `init_primary` starts a
/// fresh generation after destroying whatever the old one still holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Uninitialized,
    Initializing,
    Joined,
    ScreenSharing,
    TornDown,
}

/// Everything one handle generation holds. At most one live signaling
/// client and one live media transport per logical channel at any time.
struct HandleState {
    state: ChannelState,
    creds: Option<Credentials>,
    signaling: Option<Arc<dyn SignalingClient>>,
    media: Option<Arc<dyn MediaTransport>>,
    aux_media: Option<Arc<dyn MediaTransport>>,
    capture: Option<Arc<dyn ScreenCapture>>,
    pump: Option<JoinHandle<()>>,
    share_watch: Option<JoinHandle<()>>,
}

impl HandleState {
    fn new() -> Self {
        Self {
            state: ChannelState::Uninitialized,
            creds: None,
            signaling: None,
            media: None,
            aux_media: None,
            capture: None,
            pump: None,
            share_watch: None,
        }
    }
}

/// Owns the primary and auxiliary channel lifecycles across both adapters.
pub struct ChannelLifecycleManager {
    identity: SessionIdentity,
    factory: Arc<dyn AdapterFactory>,
    tokens: TokenClient,
    router: Arc<SessionEventRouter>,
    sender: SignalingSender,
    /// Present for guests: gates the primary media join on approval.
    admission: Option<Arc<AdmissionController>>,
    events: SessionEvents,
    state: Mutex<HandleState>,
    /// In-flight guard: one lifecycle command at a time per handle.
    op_gate: tokio::sync::Mutex<()>,
}

impl ChannelLifecycleManager {
    pub fn new(
        identity: SessionIdentity,
        factory: Arc<dyn AdapterFactory>,
        tokens: TokenClient,
        router: Arc<SessionEventRouter>,
        sender: SignalingSender,
        admission: Option<Arc<AdmissionController>>,
        events: SessionEvents,
    ) -> Self {
        Self {
            identity,
            factory,
            tokens,
            router,
            sender,
            admission,
            events,
            state: Mutex::new(HandleState::new()),
            op_gate: tokio::sync::Mutex::new(()),
        }
    }

    pub fn state(&self) -> ChannelState {
        self.state.lock().state
    }

    /// Bring up the primary signaling channel: fetch credentials, log in,
    /// join, and start the event pump.
    ///
    /// If a previous handle is still live it is fully torn down first —
    /// destroy-before-create is mandatory here. On failure every partially
    /// acquired resource is released and the handle returns to
    /// `Uninitialized` so entry can be retried.
    pub async fn init_primary(&self) -> Result<(), LiveError> {
        let _gate = self.op_gate.try_lock().map_err(|_| LiveError::Busy)?;

        self.release_all().await;
        self.set_state(ChannelState::Initializing);

        match self.init_primary_inner().await {
            Ok(()) => Ok(()),
            Err(e) => {
                tracing::warn!(error = %e, "primary channel init failed, rolling back");
                self.release_all().await;
                self.set_state(ChannelState::Uninitialized);
                Err(e)
            }
        }
    }

    async fn init_primary_inner(&self) -> Result<(), LiveError> {
        let creds = self
            .tokens
            .fetch(&self.identity.class_id.main, &self.identity.self_id.main)
            .await?;

        let signaling = self.factory.signaling();
        // Stored before the fallible steps so a teardown requested
        // mid-initialization still releases it.
        {
            let mut st = self.state.lock();
            st.creds = Some(creds.clone());
            st.signaling = Some(signaling.clone());
        }

        signaling
            .login(&self.identity.self_id.main, &creds.signaling_token)
            .await?;
        signaling.join_channel(&self.identity.class_id.main).await?;

        let pump = self.spawn_pump(&signaling);
        self.state.lock().pump = Some(pump);
        self.sender.install(signaling);

        tracing::info!(
            class_id = %self.identity.class_id.main,
            role = ?self.identity.role,
            "primary channel initialized"
        );
        Ok(())
    }

    /// Join the primary media room.
    ///
    /// Hosts go on air immediately (audio + camera); guests join
    /// subscribe-only, and only once admission is approved. Guest joins
    /// also bring up the auxiliary room so the host-face feed renders
    /// during screen shares.
    pub async fn join_primary_media(&self) -> Result<(), LiveError> {
        let _gate = self.op_gate.try_lock().map_err(|_| LiveError::Busy)?;

        if self.state() != ChannelState::Initializing {
            return Err(LiveError::NotInitialized("primary channel is not initialized"));
        }
        if let Some(admission) = &self.admission {
            if !admission.is_approved() {
                return Err(LiveError::NotApproved);
            }
        }
        let creds = self
            .state
            .lock()
            .creds
            .clone()
            .ok_or(LiveError::NotInitialized("primary credentials missing"))?;

        let media = self.factory.media();
        media
            .join(
                &self.identity.class_id.main,
                &self.identity.self_id.main,
                &creds.media_token,
            )
            .await?;
        self.state.lock().media = Some(media.clone());
        self.set_state(ChannelState::Joined);

        if self.identity.is_host() {
            // Publish failures degrade the session (camera off), they
            // don't tear it down.
            if let Err(e) = media.publish(TrackKind::Audio).await {
                tracing::warn!(error = %e, "audio publish failed");
            }
            if let Err(e) = media.publish(TrackKind::Camera).await {
                tracing::warn!(error = %e, "camera publish failed");
            }
        } else if let Err(e) = self.open_auxiliary_inner().await {
            tracing::warn!(error = %e, "auxiliary room join failed, continuing without pip feed");
        }

        tracing::info!(
            class_id = %self.identity.class_id.main,
            "primary media room joined"
        );
        Ok(())
    }

    /// Open the auxiliary (picture-in-picture) room on demand.
    pub async fn open_auxiliary(&self) -> Result<(), LiveError> {
        let _gate = self.op_gate.try_lock().map_err(|_| LiveError::Busy)?;

        if !matches!(
            self.state(),
            ChannelState::Joined | ChannelState::ScreenSharing
        ) {
            return Err(LiveError::NotInitialized("media room is not joined"));
        }
        self.open_auxiliary_inner().await
    }

    /// Lazy auxiliary join: fetch `_pip` credentials and join the room.
    /// No-op when the room is already open.
    async fn open_auxiliary_inner(&self) -> Result<(), LiveError> {
        if self.state.lock().aux_media.is_some() {
            return Ok(());
        }

        let creds = self
            .tokens
            .fetch(&self.identity.class_id.pip, &self.identity.self_id.pip)
            .await?;
        let aux = self.factory.media();
        aux.join(
            &self.identity.class_id.pip,
            &self.identity.self_id.pip,
            &creds.media_token,
        )
        .await?;
        self.state.lock().aux_media = Some(aux);

        tracing::info!(aux_id = %self.identity.class_id.pip, "auxiliary room joined");
        Ok(())
    }

    /// Host-only: swap the primary room from camera to screen, keeping the
    /// camera alive on the auxiliary room.
    ///
    /// The sequence is strictly ordered and runs under the in-flight
    /// guard; a failure partway restores the camera before returning.
    pub async fn start_screen_share(self: &Arc<Self>) -> Result<(), LiveError> {
        let _gate = self.op_gate.try_lock().map_err(|_| LiveError::Busy)?;

        if !self.identity.is_host() {
            return Err(LiveError::Forbidden("only the host can share a screen"));
        }
        let (current, media) = {
            let st = self.state.lock();
            (st.state, st.media.clone())
        };
        match current {
            ChannelState::ScreenSharing => return Ok(()),
            ChannelState::Joined => {}
            _ => return Err(LiveError::NotInitialized("media room is not joined")),
        }
        let media = media.ok_or(LiveError::NotInitialized("media room is not joined"))?;

        let capture = self.factory.screen_capture();
        let track = capture.acquire().await?;

        media.unpublish(TrackKind::Camera).await?;
        if let Err(e) = media.publish(TrackKind::Screen).await {
            self.abort_share(&media, &capture, false).await;
            return Err(e);
        }
        if let Err(e) = self.open_auxiliary_inner().await {
            self.abort_share(&media, &capture, true).await;
            return Err(e);
        }
        let aux = self.state.lock().aux_media.clone();
        if let Some(aux) = aux {
            if let Err(e) = aux.publish(TrackKind::Camera).await {
                // Sharing continues; viewers just lose the host-face feed.
                tracing::warn!(error = %e, "camera publish to auxiliary room failed");
            }
        }

        let watch = self.spawn_ended_watch(track);
        {
            let mut st = self.state.lock();
            st.capture = Some(capture);
            st.share_watch = Some(watch);
        }
        self.set_state(ChannelState::ScreenSharing);
        self.events.emit(SessionEvent::ScreenShareStarted);

        tracing::info!(class_id = %self.identity.class_id.main, "screen share started");
        Ok(())
    }

    /// Explicit stop from the app UI.
    pub async fn stop_screen_share(&self) -> Result<(), LiveError> {
        let _gate = self.op_gate.try_lock().map_err(|_| LiveError::Busy)?;
        self.restore_from_share(true).await
    }

    /// Restore the exact pre-share state: screen unpublished and closed,
    /// auxiliary room down, camera back on the primary room. No-op unless
    /// currently sharing, which also keeps the capture-ended watcher and
    /// the explicit stop path from double-restoring.
    async fn restore_from_share(&self, abort_watch: bool) -> Result<(), LiveError> {
        let (media, capture, aux, watch) = {
            let mut st = self.state.lock();
            if st.state != ChannelState::ScreenSharing {
                return Ok(());
            }
            (
                st.media.clone(),
                st.capture.take(),
                st.aux_media.take(),
                st.share_watch.take(),
            )
        };
        if let Some(watch) = watch {
            if abort_watch {
                watch.abort();
            }
        }
        let Some(media) = media else {
            return Ok(());
        };

        if let Err(e) = media.unpublish(TrackKind::Screen).await {
            tracing::warn!(error = %e, "screen unpublish failed");
        }
        if let Some(capture) = capture {
            if let Err(e) = capture.release().await {
                tracing::debug!(error = %e, "screen capture release failed");
            }
        }
        if let Some(aux) = aux {
            if let Err(e) = aux.leave().await {
                tracing::warn!(error = %e, "auxiliary room leave failed");
            }
        }

        self.set_state(ChannelState::Joined);
        self.events.emit(SessionEvent::ScreenShareStopped);
        tracing::info!(class_id = %self.identity.class_id.main, "screen share stopped");

        // Recoverable: the class continues with the camera off if this
        // fails; the caller surfaces the error.
        media.publish(TrackKind::Camera).await?;
        Ok(())
    }

    /// Tear the whole handle down. Waits out any in-flight command rather
    /// than rejecting — leaving must always be possible — and is safe to
    /// call any number of times.
    pub async fn teardown(&self) {
        let _gate = self.op_gate.lock().await;
        self.release_all().await;
        self.set_state(ChannelState::TornDown);
    }

    /// Release everything in reverse acquisition order: media rooms,
    /// listeners, signaling channel, signaling login. Every failure is
    /// logged and the remaining steps still run.
    async fn release_all(&self) {
        let (signaling, media, aux, capture, pump, watch) = {
            let mut st = self.state.lock();
            st.creds = None;
            (
                st.signaling.take(),
                st.media.take(),
                st.aux_media.take(),
                st.capture.take(),
                st.pump.take(),
                st.share_watch.take(),
            )
        };

        if let Some(watch) = watch {
            watch.abort();
        }
        if let Some(capture) = capture {
            if let Err(e) = capture.release().await {
                tracing::debug!(error = %e, "screen capture release failed during teardown");
            }
        }
        if let Some(aux) = aux {
            if let Err(e) = aux.leave().await {
                tracing::debug!(error = %e, "auxiliary room leave failed during teardown");
            }
        }
        if let Some(media) = media {
            if let Err(e) = media.leave().await {
                tracing::debug!(error = %e, "media room leave failed during teardown");
            }
        }
        if let Some(pump) = pump {
            pump.abort();
        }
        self.sender.revoke();
        if let Some(signaling) = signaling {
            if let Err(e) = signaling.leave_channel(&self.identity.class_id.main).await {
                tracing::debug!(error = %e, "signaling channel leave failed during teardown");
            }
            if let Err(e) = signaling.logout().await {
                tracing::debug!(error = %e, "signaling logout failed during teardown");
            }
        }
    }

    /// Best-effort rollback when a share sequence fails partway through.
    async fn abort_share(
        &self,
        media: &Arc<dyn MediaTransport>,
        capture: &Arc<dyn ScreenCapture>,
        screen_published: bool,
    ) {
        if screen_published {
            if let Err(e) = media.unpublish(TrackKind::Screen).await {
                tracing::debug!(error = %e, "screen unpublish during rollback failed");
            }
        }
        if let Err(e) = capture.release().await {
            tracing::debug!(error = %e, "screen capture release during rollback failed");
        }
        if let Err(e) = media.publish(TrackKind::Camera).await {
            tracing::warn!(error = %e, "camera restore failed after aborted share");
        }
    }

    /// Forward inbound signaling events to the router until the
    /// subscription closes or the pump is aborted on teardown.
    fn spawn_pump(&self, signaling: &Arc<dyn SignalingClient>) -> JoinHandle<()> {
        let mut rx = signaling.subscribe();
        let router = Arc::clone(&self.router);
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(event) => router.handle_event(event),
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!(skipped = n, "event pump lagged behind signaling");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }

    fn spawn_ended_watch(self: &Arc<Self>, track: ScreenTrack) -> JoinHandle<()> {
        let manager = Arc::clone(self);
        tokio::spawn(async move {
            // Fires only when the user stops sharing via the platform
            // chrome; an app-initiated stop aborts this task first.
            if track.ended.await.is_ok() {
                tracing::info!("screen capture ended by platform, restoring camera");
                let _gate = manager.op_gate.lock().await;
                if let Err(e) = manager.restore_from_share(false).await {
                    tracing::warn!(error = %e, "camera restore after capture end failed");
                }
            }
        })
    }

    fn set_state(&self, next: ChannelState) {
        let mut st = self.state.lock();
        if st.state == next {
            return;
        }
        st.state = next;
        drop(st);
        self.events.emit(SessionEvent::ChannelStateChanged(next));
    }
}
