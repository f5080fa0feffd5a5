//! Live-classroom session coordination for Classline.
//!
//! The dashboard's live-class screens sit on top of two independently
//! stateful clients: a signaling client (channel join/leave, broadcast,
//! peer messages) and a media transport (rooms, tracks). This crate owns
//! the coordination between them — the join-request admission handshake,
//! the primary/picture-in-picture channel pair, chat/reaction fan-out, and
//! host moderation — independent of any rendering layer.
//!
//! The embedding front-end constructs a [`LiveClassSession`], issues
//! commands on it, and subscribes to [`SessionEvent`]s for state updates.

pub mod adapter;
pub mod backend;
pub mod config;
pub mod error;
pub mod session;

pub use config::Config;
pub use error::LiveError;
pub use session::coordinator::LiveClassSession;
pub use session::events::SessionEvent;
