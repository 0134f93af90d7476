//! Client error type.

use driftchat_core::{ConnectionError, SubscriptionError};
use thiserror::Error;

/// Errors returned by the chat client.
///
/// Stale remote callbacks are never errors; they are discarded silently by
/// the underlying generation guarding.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClientError {
    /// Connection lifecycle violation
    #[error(transparent)]
    Connection(#[from] ConnectionError),

    /// Subscription acknowledgment contract violation
    #[error(transparent)]
    Subscription(#[from] SubscriptionError),

    /// Operation requires an established session
    #[error("not connected: cannot {operation}")]
    NotConnected {
        /// Operation that was attempted
        operation: &'static str,
    },
}
