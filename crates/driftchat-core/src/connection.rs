//! Connection lifecycle state machine.
//!
//! Manages one connection to the remote source. Uses the action pattern:
//! methods consume events and return actions for the driver to execute,
//! keeping the state machine pure (no I/O).
//!
//! Connection establishment is asynchronous, so the owning scope may be torn
//! down or reconfigured before an attempt resolves. Every attempt therefore
//! carries a [`Generation`] captured at call time; callbacks for a superseded
//! generation are silent no-ops. This prevents a slow, stale connection from
//! resurrecting state after the owner moved on.
//!
//! # State Machine
//!
//! ```text
//! ┌──────┐ connect ┌────────────┐  connected   ┌───────────┐
//! │ Idle │────────>│ Connecting │─────────────>│ Connected │
//! └──────┘         └────────────┘              └───────────┘
//!                        │ ▲                         │
//!          connect error │ │ connect      disconnect │
//!                        ↓ │                         ↓
//!                   ┌───────┐             ┌──────────────┐
//!                   │ Error │             │ Disconnected │──┐
//!                   └───────┘             └──────────────┘  │ connect
//!                                                ▲──────────┘
//! ```

use serde::{Deserialize, Serialize};

use crate::{error::ConnectionError, identity::RemoteIdentity};

/// Compression mode requested from the remote source.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Compression {
    /// Gzip-compressed row delivery.
    #[default]
    Gzip,
    /// Uncompressed row delivery.
    None,
}

/// Configuration for one connection attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Remote endpoint URI (e.g. `ws://localhost:3000`).
    pub endpoint: String,
    /// Module/namespace identifier on the remote source.
    pub module: String,
    /// Compression mode for pushed rows.
    pub compression: Compression,
    /// Request full row history when false, live rows only when true.
    pub light_mode: bool,
    /// Token from a previous session, presented for re-authentication.
    pub token: Option<String>,
}

impl ConnectionConfig {
    /// Create a config with default compression and full history.
    pub fn new(endpoint: impl Into<String>, module: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            module: module.into(),
            compression: Compression::default(),
            light_mode: false,
            token: None,
        }
    }

    /// Set the compression mode.
    #[must_use]
    pub fn with_compression(mut self, compression: Compression) -> Self {
        self.compression = compression;
        self
    }

    /// Set the light mode flag.
    #[must_use]
    pub fn with_light_mode(mut self, light_mode: bool) -> Self {
        self.light_mode = light_mode;
        self
    }

    /// Present a stored token for re-authentication.
    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }
}

/// Monotonically increasing marker for one connect attempt.
///
/// Captured when the attempt starts; any later callback must present it to
/// prove it belongs to the current attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Generation(u64);

impl Generation {
    /// Numeric value, for logging.
    pub const fn value(self) -> u64 {
        self.0
    }
}

/// Connection state.
///
/// Exactly one value is active at any time; the state is well-defined for
/// the entire lifetime of the owning scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No connection attempt made yet.
    Idle,
    /// Handshake in flight, awaiting the remote source.
    Connecting,
    /// Handshake succeeded; identity and token assigned.
    Connected,
    /// Session dropped after being connected.
    Disconnected,
    /// Handshake failed.
    Error,
}

/// Actions returned by the connection state machine.
///
/// The driver executes these:
/// - `Open`: start the asynchronous handshake with the remote source
/// - `Close`: tear down the underlying session
/// - `PersistToken`: store the issued token via the external token store
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionAction {
    /// Start a handshake for this attempt.
    Open {
        /// Connection parameters.
        config: ConnectionConfig,
        /// Generation of this attempt; echoed back by the remote callbacks.
        generation: Generation,
    },

    /// Close the underlying session.
    Close,

    /// Persist the issued auth token for future re-authentication.
    PersistToken {
        /// Token issued by the remote source.
        token: String,
    },
}

/// Connection lifecycle state machine.
///
/// Pure state machine: no I/O, no timers. The driver opens connections,
/// delivers the resulting callbacks as `handle_*` calls, and executes the
/// returned actions.
#[derive(Debug, Clone)]
pub struct ConnectionManager {
    /// Current state.
    state: ConnectionState,
    /// Generation of the newest attempt. Bumped on every connect and on
    /// teardown so in-flight callbacks become stale.
    generation: u64,
    /// Identity issued on the last successful connect.
    identity: Option<RemoteIdentity>,
    /// Token issued on the last successful connect.
    token: Option<String>,
}

impl ConnectionManager {
    /// Create a manager in [`ConnectionState::Idle`].
    pub fn new() -> Self {
        Self { state: ConnectionState::Idle, generation: 0, identity: None, token: None }
    }

    /// Current connection state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Generation of the current attempt.
    #[must_use]
    pub fn generation(&self) -> Generation {
        Generation(self.generation)
    }

    /// Identity issued by the remote source. `None` until first connected.
    #[must_use]
    pub fn identity(&self) -> Option<RemoteIdentity> {
        self.identity
    }

    /// Auth token issued by the remote source. `None` until first connected.
    #[must_use]
    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    /// Start a new connection attempt.
    ///
    /// Bumps the generation and transitions to Connecting. Allowed from
    /// Idle, Disconnected, and Error. Also allowed while Connecting: a
    /// reconfiguration mid-handshake supersedes the in-flight attempt, whose
    /// callbacks then fail the generation check. An established connection
    /// must go through [`ConnectionManager::disconnect`] first.
    ///
    /// # Errors
    ///
    /// - `ConnectionError::InvalidState` if Connected
    pub fn connect(
        &mut self,
        config: ConnectionConfig,
    ) -> Result<Vec<ConnectionAction>, ConnectionError> {
        match self.state {
            ConnectionState::Idle | ConnectionState::Disconnected | ConnectionState::Error => {},
            ConnectionState::Connecting => {
                tracing::debug!(superseded = self.generation, "superseding in-flight attempt");
            },
            state @ ConnectionState::Connected => {
                return Err(ConnectionError::InvalidState { state, operation: "connect" });
            },
        }

        self.generation += 1;
        self.state = ConnectionState::Connecting;
        tracing::debug!(generation = self.generation, endpoint = %config.endpoint, "connecting");

        Ok(vec![ConnectionAction::Open { config, generation: Generation(self.generation) }])
    }

    /// Handshake succeeded: identity and token delivered.
    ///
    /// Transitions Connecting→Connected and returns `PersistToken` so the
    /// caller can store the token. A stale generation is a silent no-op.
    pub fn handle_connected(
        &mut self,
        generation: Generation,
        identity: RemoteIdentity,
        token: String,
    ) -> Vec<ConnectionAction> {
        if !self.is_current(generation, "connected") {
            return vec![];
        }
        if self.state != ConnectionState::Connecting {
            tracing::warn!(state = ?self.state, "connected callback outside handshake");
            return vec![];
        }

        self.state = ConnectionState::Connected;
        self.identity = Some(identity);
        self.token = Some(token.clone());
        tracing::debug!(%identity, "connected");

        vec![ConnectionAction::PersistToken { token }]
    }

    /// Session dropped after being connected.
    ///
    /// Transitions Connected→Disconnected. No automatic reconnect; the
    /// owning scope must re-initiate. A stale generation is a silent no-op.
    pub fn handle_disconnected(
        &mut self,
        generation: Generation,
        reason: Option<String>,
    ) -> Vec<ConnectionAction> {
        if !self.is_current(generation, "disconnected") {
            return vec![];
        }
        if self.state != ConnectionState::Connected {
            tracing::warn!(state = ?self.state, "disconnect callback while not connected");
            return vec![];
        }

        self.state = ConnectionState::Disconnected;
        tracing::debug!(reason = reason.as_deref().unwrap_or("none"), "disconnected");

        vec![]
    }

    /// Handshake failed.
    ///
    /// Transitions Connecting→Error. No automatic retry. A stale generation
    /// is a silent no-op.
    pub fn handle_connect_error(
        &mut self,
        generation: Generation,
        reason: String,
    ) -> Vec<ConnectionAction> {
        if !self.is_current(generation, "connect error") {
            return vec![];
        }
        if self.state != ConnectionState::Connecting {
            tracing::warn!(state = ?self.state, "connect error outside handshake");
            return vec![];
        }

        self.state = ConnectionState::Error;
        tracing::debug!(%reason, "connect failed");

        vec![]
    }

    /// Tear down the connection. Idempotent.
    ///
    /// Always bumps the generation so any in-flight attempt becomes stale.
    /// Returns `Close` exactly once, on the Connected→Disconnected
    /// transition; repeated calls and calls on a never-connected manager
    /// return no actions and change no state.
    pub fn disconnect(&mut self) -> Vec<ConnectionAction> {
        self.generation += 1;

        if self.state == ConnectionState::Connected {
            self.state = ConnectionState::Disconnected;
            tracing::debug!("disconnecting");
            return vec![ConnectionAction::Close];
        }

        vec![]
    }

    /// Check that a callback belongs to the current attempt.
    fn is_current(&self, generation: Generation, callback: &str) -> bool {
        if generation.0 == self.generation {
            return true;
        }
        tracing::trace!(
            stale = generation.0,
            current = self.generation,
            callback,
            "discarding stale callback"
        );
        false
    }
}

impl Default for ConnectionManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_identity() -> RemoteIdentity {
        RemoteIdentity::from_bytes([7u8; 32])
    }

    fn config() -> ConnectionConfig {
        ConnectionConfig::new("ws://localhost:3000", "driftchat")
    }

    #[test]
    fn connection_lifecycle() {
        let mut conn = ConnectionManager::new();
        assert_eq!(conn.state(), ConnectionState::Idle);
        assert_eq!(conn.identity(), None);

        let actions = conn.connect(config()).unwrap();
        assert_eq!(conn.state(), ConnectionState::Connecting);
        let generation = match actions.as_slice() {
            [ConnectionAction::Open { generation, .. }] => *generation,
            other => panic!("expected Open action, got {other:?}"),
        };

        let actions = conn.handle_connected(generation, test_identity(), "tok-1".into());
        assert_eq!(conn.state(), ConnectionState::Connected);
        assert_eq!(conn.identity(), Some(test_identity()));
        assert_eq!(conn.token(), Some("tok-1"));
        assert_eq!(actions, vec![ConnectionAction::PersistToken { token: "tok-1".into() }]);

        let actions = conn.handle_disconnected(generation, Some("server shutdown".into()));
        assert_eq!(conn.state(), ConnectionState::Disconnected);
        assert!(actions.is_empty());
    }

    #[test]
    fn connect_error_path() {
        let mut conn = ConnectionManager::new();
        let generation = connect(&mut conn);

        let actions = conn.handle_connect_error(generation, "refused".into());
        assert_eq!(conn.state(), ConnectionState::Error);
        assert!(actions.is_empty());

        // Error is not terminal: a fresh attempt is allowed
        assert!(conn.connect(config()).is_ok());
        assert_eq!(conn.state(), ConnectionState::Connecting);
    }

    #[test]
    fn connect_while_connected_is_invalid() {
        let mut conn = ConnectionManager::new();
        let generation = connect(&mut conn);
        let _ = conn.handle_connected(generation, test_identity(), "tok".into());

        let result = conn.connect(config());
        assert!(matches!(
            result,
            Err(ConnectionError::InvalidState { state: ConnectionState::Connected, .. })
        ));
    }

    #[test]
    fn reconfigure_supersedes_in_flight_attempt() {
        let mut conn = ConnectionManager::new();
        let first = connect(&mut conn);

        // Reconfiguration before the handshake resolves
        let second = connect(&mut conn);
        assert_eq!(conn.state(), ConnectionState::Connecting);
        assert_ne!(first, second);

        // The superseded attempt resolves late and must change nothing
        let actions = conn.handle_connected(first, test_identity(), "stale".into());
        assert!(actions.is_empty());
        assert_eq!(conn.state(), ConnectionState::Connecting);

        let actions = conn.handle_connected(second, test_identity(), "tok".into());
        assert_eq!(actions.len(), 1);
        assert_eq!(conn.state(), ConnectionState::Connected);
    }

    #[test]
    fn stale_connected_is_discarded() {
        let mut conn = ConnectionManager::new();
        let stale = connect(&mut conn);

        // Owner tears down before the attempt resolves
        let _ = conn.disconnect();

        let actions = conn.handle_connected(stale, test_identity(), "tok".into());
        assert!(actions.is_empty());
        assert_eq!(conn.state(), ConnectionState::Connecting);
        assert_eq!(conn.identity(), None);
    }

    #[test]
    fn stale_callbacks_after_reconnect_are_discarded() {
        let mut conn = ConnectionManager::new();
        let first = connect(&mut conn);
        let _ = conn.handle_connect_error(first, "timeout".into());

        let second = connect(&mut conn);
        assert_ne!(first, second);

        // Late resolution of the first attempt must not touch state
        let actions = conn.handle_connected(first, test_identity(), "tok".into());
        assert!(actions.is_empty());
        assert_eq!(conn.state(), ConnectionState::Connecting);

        // The current attempt still resolves normally
        let actions = conn.handle_connected(second, test_identity(), "tok".into());
        assert_eq!(actions.len(), 1);
        assert_eq!(conn.state(), ConnectionState::Connected);
    }

    #[test]
    fn disconnect_is_idempotent() {
        let mut conn = ConnectionManager::new();
        let generation = connect(&mut conn);
        let _ = conn.handle_connected(generation, test_identity(), "tok".into());

        let actions = conn.disconnect();
        assert_eq!(actions, vec![ConnectionAction::Close]);
        assert_eq!(conn.state(), ConnectionState::Disconnected);

        // Repeated teardown fires nothing
        assert!(conn.disconnect().is_empty());
        assert!(conn.disconnect().is_empty());
        assert_eq!(conn.state(), ConnectionState::Disconnected);
    }

    #[test]
    fn disconnect_before_connect_is_a_no_op() {
        let mut conn = ConnectionManager::new();
        assert!(conn.disconnect().is_empty());
        assert_eq!(conn.state(), ConnectionState::Idle);
    }

    #[test]
    fn reconnect_presents_stored_token() {
        let mut conn = ConnectionManager::new();
        let generation = connect(&mut conn);
        let _ = conn.handle_connected(generation, test_identity(), "tok-1".into());
        let _ = conn.disconnect();

        let cfg = config().with_token(conn.token().unwrap());
        let actions = conn.connect(cfg).unwrap();
        match actions.as_slice() {
            [ConnectionAction::Open { config, .. }] => {
                assert_eq!(config.token.as_deref(), Some("tok-1"));
            },
            other => panic!("expected Open action, got {other:?}"),
        }
    }

    fn connect(conn: &mut ConnectionManager) -> Generation {
        let actions = conn.connect(config()).unwrap();
        match actions.as_slice() {
            [ConnectionAction::Open { generation, .. }] => *generation,
            other => panic!("expected Open action, got {other:?}"),
        }
    }
}
