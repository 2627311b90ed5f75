// ── Core error types ──
//
// Errors surfaced by skyctl-core. Rejected events are local to one event
// and one controller: the dispatcher logs them and moves on, the
// connection is never torn down because of one.

use std::path::PathBuf;

use thiserror::Error;

use crate::device::ConnectionState;

/// An inbound event that must be dropped wholesale.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RejectedEvent {
    /// A required field is missing or carries an unknown wire value.
    #[error("Invalid {field} in {event} event")]
    InvalidField {
        event: &'static str,
        field: &'static str,
    },

    /// A range field has `min > max`, or a value is out of its valid range.
    #[error("Invalid {field} range in {event} event")]
    InvalidRange {
        event: &'static str,
        field: &'static str,
    },

    /// The event references an instance id with no known controller.
    #[error("No such camera [id: {id}]")]
    UnknownInstance { id: u8 },

    /// The event announces an instance id the router cannot address.
    #[error("Camera id {id} is out of range")]
    InstanceOutOfRange { id: u16 },
}

impl RejectedEvent {
    pub(crate) fn field(event: &'static str, field: &'static str) -> Self {
        Self::InvalidField { event, field }
    }

    pub(crate) fn range(event: &'static str, field: &'static str) -> Self {
        Self::InvalidRange { event, field }
    }
}

/// Failure of a file-backed persistent store operation.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Cannot access store file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot serialize store document: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Lifecycle errors ─────────────────────────────────────────────
    #[error("Invalid connection transition: {from:?} -> {to:?}")]
    InvalidTransition {
        from: ConnectionState,
        to: ConnectionState,
    },

    // ── Wrapped errors ───────────────────────────────────────────────
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Rejected(#[from] RejectedEvent),
}
