//! Adapter seams over the third-party signaling and media SDKs.

pub mod media;
pub mod signaling;

use std::sync::Arc;

pub use media::{MediaTransport, ScreenCapture, ScreenTrack, TrackKind};
pub use signaling::{SignalingClient, SignalingEvent, SignalingSender};

/// Creates fresh adapter instances for the channel lifecycle manager.
///
/// Every (re)initialization gets brand-new clients; a stale pair is always
/// torn down first and never reused.
pub trait AdapterFactory: Send + Sync {
    fn signaling(&self) -> Arc<dyn SignalingClient>;
    fn media(&self) -> Arc<dyn MediaTransport>;
    fn screen_capture(&self) -> Arc<dyn ScreenCapture>;
}
