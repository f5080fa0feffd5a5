//! Media transport seam: real-time rooms and published tracks.

use async_trait::async_trait;
use tokio::sync::oneshot;

use crate::error::LiveError;

/// Kinds of local tracks a participant can publish.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrackKind {
    Audio,
    Camera,
    Screen,
}

impl TrackKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrackKind::Audio => "audio",
            TrackKind::Camera => "camera",
            TrackKind::Screen => "screen",
        }
    }
}

/// A connection to one media room.
///
/// One instance per logical room: the lifecycle manager creates a fresh
/// transport for the primary room and another for the auxiliary room,
/// and never reuses a left instance.
#[async_trait]
pub trait MediaTransport: Send + Sync {
    async fn join(&self, room_id: &str, participant_id: &str, token: &str)
        -> Result<(), LiveError>;
    async fn leave(&self) -> Result<(), LiveError>;
    async fn publish(&self, track: TrackKind) -> Result<(), LiveError>;
    async fn unpublish(&self, track: TrackKind) -> Result<(), LiveError>;
}

/// Handle to an acquired screen track.
///
/// `ended` fires when the user stops sharing through the platform chrome
/// rather than the app UI; the lifecycle manager watches it to restore the
/// pre-share state.
pub struct ScreenTrack {
    pub ended: oneshot::Receiver<()>,
}

/// Platform screen-capture capability.
#[async_trait]
pub trait ScreenCapture: Send + Sync {
    /// Prompt for and acquire a screen track. Fails if the user dismisses
    /// the picker or the platform denies capture.
    async fn acquire(&self) -> Result<ScreenTrack, LiveError>;

    /// Close the captured track and release the capture.
    async fn release(&self) -> Result<(), LiveError>;
}
