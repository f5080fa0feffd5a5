//! Per-session identity: who we are, which class, which channels.

use serde::{Deserialize, Serialize};

/// Suffix correlating a primary channel with its picture-in-picture
/// companion. Part of the contract with the token service and the media
/// transport — both sides derive the same names.
const PIP_SUFFIX: &str = "_pip";

/// Participant role within a live class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    /// The teacher running the class.
    #[serde(rename = "teacher")]
    Host,
    /// A student attending it.
    #[serde(rename = "student")]
    Guest,
}

impl Role {
    pub fn is_host(&self) -> bool {
        matches!(self, Role::Host)
    }
}

/// A main identifier together with its `_pip` companion.
///
/// Derived once at session construction and threaded explicitly; call
/// sites never re-derive the suffix ad hoc.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipPair {
    pub main: String,
    pub pip: String,
}

impl PipPair {
    /// Pure derivation: two calls with the same input produce identical
    /// pairs.
    pub fn derive(main: &str) -> Self {
        Self {
            main: main.to_string(),
            pip: format!("{main}{PIP_SUFFIX}"),
        }
    }
}

/// Immutable per-session constants, created once at session entry.
#[derive(Debug, Clone)]
pub struct SessionIdentity {
    /// Primary channel name (the class id) and its auxiliary companion.
    pub class_id: PipPair,
    /// This participant's id and its auxiliary companion.
    pub self_id: PipPair,
    /// The host's participant id (admission requests are addressed here).
    pub host_id: String,
    /// This participant's display name.
    pub display_name: String,
    pub role: Role,
}

impl SessionIdentity {
    pub fn new(
        class_id: &str,
        self_id: &str,
        host_id: &str,
        display_name: &str,
        role: Role,
    ) -> Self {
        Self {
            class_id: PipPair::derive(class_id),
            self_id: PipPair::derive(self_id),
            host_id: host_id.to_string(),
            display_name: display_name.to_string(),
            role,
        }
    }

    pub fn is_host(&self) -> bool {
        self.role.is_host()
    }
}
