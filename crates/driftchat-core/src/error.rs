//! Error types for the synchronization core.
//!
//! Strongly-typed errors per layer: connection errors (illegal lifecycle
//! transitions) and subscription errors (acknowledgment contract
//! violations). Stale callbacks from superseded connection attempts are not
//! errors; they are discarded silently by generation guarding.

use thiserror::Error;

use crate::{connection::ConnectionState, subscription::SubscriptionId};

/// Errors from the connection lifecycle state machine.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConnectionError {
    /// Invalid state transition attempted
    #[error("invalid state transition: cannot {operation} from {state:?}")]
    InvalidState {
        /// Current state when the error occurred
        state: ConnectionState,
        /// Operation that was attempted
        operation: &'static str,
    },
}

/// Errors from the subscription registry.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SubscriptionError {
    /// Acknowledgment for a subscription this registry never issued
    #[error("unknown subscription {0}")]
    Unknown(SubscriptionId),

    /// Second acknowledgment for an already-applied subscription
    #[error("subscription {0} acknowledged twice")]
    AlreadyApplied(SubscriptionId),
}
