//! Session coordinator error types.
//!
//! Nothing in this crate is fatal to the hosting process: initialization
//! errors leave the session restartable, mid-session errors degrade the
//! session, and cleanup errors are logged and swallowed at the call site.

use thiserror::Error;

/// Error type for every fallible coordinator operation.
#[derive(Debug, Error)]
pub enum LiveError {
    /// A precondition resource (signaling login, joined channel) is not up.
    #[error("not initialized: {0}")]
    NotInitialized(&'static str),

    /// Another lifecycle command is still in flight for this handle.
    #[error("a lifecycle operation is already in progress")]
    Busy,

    /// A guest tried to join the primary media room before being approved.
    #[error("admission has not been approved")]
    NotApproved,

    /// The caller's role does not permit this operation.
    #[error("forbidden: {0}")]
    Forbidden(&'static str),

    /// Token service request failed or returned garbage.
    #[error("token service error: {0}")]
    TokenService(String),

    /// Class status service request failed.
    #[error("class service error: {0}")]
    ClassService(String),

    /// Signaling client operation failed.
    #[error("signaling error: {0}")]
    Signaling(String),

    /// Media transport operation failed.
    #[error("media transport error: {0}")]
    Media(String),

    /// Screen capture could not be acquired or released.
    #[error("screen capture error: {0}")]
    Capture(String),
}
