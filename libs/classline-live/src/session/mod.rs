//! The session coordination core: identity, wire envelopes, admission,
//! channel lifecycle, event routing, and moderation.

pub mod admission;
pub mod coordinator;
pub mod envelope;
pub mod events;
pub mod identity;
pub mod lifecycle;
pub mod moderation;
pub mod roster;
pub mod router;
