//! Subscription tracking.
//!
//! The registry issues declarative queries over an established connection
//! and tracks their acknowledgment. A subscription becomes applied exactly
//! once, asynchronously; a second acknowledgment for the same handle is a
//! contract violation surfaced as an error rather than a double-fired
//! callback.
//!
//! Independent `subscribe` calls with overlapping queries are permitted and
//! independent; the registry does not deduplicate. Callers that want
//! deduplication aggregate their queries before subscribing.

use std::{collections::HashMap, fmt};

use crate::error::SubscriptionError;

/// Handle identifying one subscription within a registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    /// Construct from a raw value.
    ///
    /// Registries mint their own ids; this is for callers echoing an id they
    /// received over the wire.
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One issued query set and its applied state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscription {
    /// Declarative select expressions sent to the remote source.
    pub queries: Vec<String>,
    /// True once the remote source has acknowledged the subscription.
    pub applied: bool,
}

/// Actions returned by the registry for the driver to execute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubscriptionAction {
    /// Send this query set to the remote source.
    Subscribe {
        /// Handle the acknowledgment must be reported against.
        id: SubscriptionId,
        /// Declarative select expressions.
        queries: Vec<String>,
    },
}

/// Issues queries and tracks their acknowledgments.
#[derive(Debug, Clone, Default)]
pub struct SubscriptionRegistry {
    next_id: u64,
    subscriptions: HashMap<u64, Subscription>,
}

impl SubscriptionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue a query set.
    ///
    /// Returns the handle and the `Subscribe` action to execute over the
    /// established connection.
    pub fn subscribe(&mut self, queries: Vec<String>) -> (SubscriptionId, Vec<SubscriptionAction>) {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.subscriptions.insert(id.0, Subscription { queries: queries.clone(), applied: false });

        tracing::debug!(%id, count = queries.len(), "subscribing");
        (id, vec![SubscriptionAction::Subscribe { id, queries }])
    }

    /// Record the remote source's acknowledgment for a handle.
    ///
    /// # Errors
    ///
    /// - `SubscriptionError::Unknown` if the handle was never issued here
    /// - `SubscriptionError::AlreadyApplied` on a second acknowledgment
    pub fn handle_applied(&mut self, id: SubscriptionId) -> Result<(), SubscriptionError> {
        let subscription =
            self.subscriptions.get_mut(&id.0).ok_or(SubscriptionError::Unknown(id))?;

        if subscription.applied {
            return Err(SubscriptionError::AlreadyApplied(id));
        }

        subscription.applied = true;
        tracing::debug!(%id, "subscription applied");
        Ok(())
    }

    /// True if this handle has been acknowledged.
    pub fn is_applied(&self, id: SubscriptionId) -> bool {
        self.subscriptions.get(&id.0).is_some_and(|s| s.applied)
    }

    /// True if every issued subscription has been acknowledged.
    ///
    /// Vacuously true for an empty registry.
    pub fn all_applied(&self) -> bool {
        self.subscriptions.values().all(|s| s.applied)
    }

    /// Subscription stored under this handle, if any.
    pub fn get(&self, id: SubscriptionId) -> Option<&Subscription> {
        self.subscriptions.get(&id.0)
    }

    /// Number of issued subscriptions.
    pub fn len(&self) -> usize {
        self.subscriptions.len()
    }

    /// True if no subscriptions have been issued.
    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }

    /// Drop all handles (session teardown).
    pub fn clear(&mut self) {
        self.subscriptions.clear();
    }
}
