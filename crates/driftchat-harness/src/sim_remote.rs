//! In-memory authoritative remote source.
//!
//! `SimRemote` plays the role of the remote module: it owns the authoritative
//! `user` and `message` tables, executes reducer calls against them, and
//! broadcasts the resulting row events to every subscribed session. Identities
//! and access tokens are drawn from a seeded RNG so runs are reproducible.

use std::collections::{HashMap, VecDeque};

use driftchat_client::{Message, ReducerCall, RemoteEvent, RemoteIdentity, RowEvent, User};
use driftchat_core::SubscriptionId;
use rand::RngCore;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

/// Microseconds the authoritative clock advances per reducer call.
const CLOCK_STEP_US: u64 = 1_000;

/// Handle to one connected session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(u64);

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "session-{}", self.0)
    }
}

/// Per-session state on the remote side.
struct Session {
    identity: RemoteIdentity,
    /// Events queued for delivery to this session, in broadcast order.
    outbox: VecDeque<RemoteEvent>,
    /// Live row events are only delivered once the session has subscribed.
    subscribed: bool,
}

/// Result of accepting a connection.
#[derive(Debug, Clone)]
pub struct ConnectOutcome {
    /// Handle for the new session.
    pub session: SessionId,
    /// Identity assigned to (or re-derived for) the caller.
    pub identity: RemoteIdentity,
    /// Access token the caller should present on its next connect.
    pub token: String,
}

/// Deterministic in-memory remote source.
///
/// Single-threaded and test-driven: callers explicitly connect, subscribe,
/// invoke reducers, and drain per-session outboxes. No I/O is involved.
pub struct SimRemote {
    rng: ChaCha8Rng,
    /// Authoritative clock in microseconds, stamps message rows.
    clock_us: u64,
    users: HashMap<RemoteIdentity, User>,
    /// Authoritative message log, in send order.
    messages: Vec<Message>,
    /// Token to identity, so re-presented tokens resume the same identity.
    tokens: HashMap<String, RemoteIdentity>,
    sessions: HashMap<SessionId, Session>,
    next_session: u64,
    next_token: u64,
}

impl SimRemote {
    /// Create a remote source seeded for reproducible identity assignment.
    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
            clock_us: 0,
            users: HashMap::new(),
            messages: Vec::new(),
            tokens: HashMap::new(),
            sessions: HashMap::new(),
            next_session: 1,
            next_token: 1,
        }
    }

    /// Accept a connection, resolving the identity from `token` when one is
    /// presented and known, otherwise minting a fresh identity and token.
    ///
    /// Connecting marks the user row online and broadcasts the change.
    pub fn connect(&mut self, token: Option<&str>) -> ConnectOutcome {
        let (identity, token) = match token.and_then(|t| self.tokens.get(t).copied().map(|i| (i, t))) {
            Some((identity, token)) => (identity, token.to_owned()),
            None => {
                let mut bytes = [0u8; driftchat_core::IDENTITY_SIZE];
                self.rng.fill_bytes(&mut bytes);
                let identity = RemoteIdentity::from_bytes(bytes);
                let token = format!("token-{:08x}", self.next_token);
                self.next_token += 1;
                self.tokens.insert(token.clone(), identity);
                (identity, token)
            },
        };

        let event = match self.users.get(&identity) {
            Some(existing) => {
                let old = existing.clone();
                let new = User { online: true, ..old.clone() };
                self.users.insert(identity, new.clone());
                RowEvent::Update { old, new }
            },
            None => {
                let row = User { identity, name: None, online: true };
                self.users.insert(identity, row.clone());
                RowEvent::Insert(row)
            },
        };
        self.broadcast(RemoteEvent::UserRow(event));

        let session = SessionId(self.next_session);
        self.next_session += 1;
        self.sessions.insert(
            session,
            Session { identity, outbox: VecDeque::new(), subscribed: false },
        );
        tracing::debug!(%session, %identity, "session connected");

        ConnectOutcome { session, identity, token }
    }

    /// Close a session, marking its user row offline and broadcasting the
    /// change to the remaining sessions.
    pub fn disconnect(&mut self, session: SessionId) {
        let Some(state) = self.sessions.remove(&session) else {
            tracing::warn!(%session, "disconnect for unknown session");
            return;
        };
        if let Some(existing) = self.users.get(&state.identity) {
            let old = existing.clone();
            let new = User { online: false, ..old.clone() };
            self.users.insert(state.identity, new.clone());
            self.broadcast(RemoteEvent::UserRow(RowEvent::Update { old, new }));
        }
        tracing::debug!(%session, "session disconnected");
    }

    /// Activate a subscription for `session`: replay the current table
    /// contents as inserts, then acknowledge with `SubscriptionApplied`.
    ///
    /// After the acknowledgment the session receives live row events.
    pub fn subscribe(&mut self, session: SessionId, id: SubscriptionId) {
        let mut users: Vec<_> = self.users.values().cloned().collect();
        users.sort_by(|a, b| a.identity.cmp(&b.identity));
        let messages = self.messages.clone();

        let Some(state) = self.sessions.get_mut(&session) else {
            tracing::warn!(%session, "subscribe for unknown session");
            return;
        };
        for row in users {
            state.outbox.push_back(RemoteEvent::UserRow(RowEvent::Insert(row)));
        }
        for row in messages {
            state.outbox.push_back(RemoteEvent::MessageRow(RowEvent::Insert(row)));
        }
        state.outbox.push_back(RemoteEvent::SubscriptionApplied { id });
        state.subscribed = true;
    }

    /// Execute a reducer call on behalf of `session`.
    ///
    /// Empty names and empty messages are rejected, matching the module's
    /// validation. Rejection is silent from the caller's point of view; only
    /// accepted calls produce row events.
    pub fn invoke(&mut self, session: SessionId, call: ReducerCall) {
        let Some(state) = self.sessions.get(&session) else {
            tracing::warn!(%session, "reducer call for unknown session");
            return;
        };
        let identity = state.identity;

        match call {
            ReducerCall::SetName { name } => {
                let trimmed = name.trim();
                if trimmed.is_empty() {
                    tracing::warn!(%session, "rejected empty name");
                    return;
                }
                if let Some(existing) = self.users.get(&identity) {
                    let old = existing.clone();
                    let new = User { name: Some(trimmed.to_owned()), ..old.clone() };
                    self.users.insert(identity, new.clone());
                    self.broadcast(RemoteEvent::UserRow(RowEvent::Update { old, new }));
                }
            },
            ReducerCall::SendMessage { text } => {
                let trimmed = text.trim();
                if trimmed.is_empty() {
                    tracing::warn!(%session, "rejected empty message");
                    return;
                }
                self.clock_us += CLOCK_STEP_US;
                let row = Message { sender: identity, sent: self.clock_us, text: trimmed.to_owned() };
                self.messages.push(row.clone());
                self.broadcast(RemoteEvent::MessageRow(RowEvent::Insert(row)));
            },
        }
    }

    /// Remove a message row from the authoritative table and broadcast the
    /// deletion. Test-only affordance; the module has no delete reducer.
    pub fn retract_message(&mut self, row: &Message) {
        let before = self.messages.len();
        self.messages.retain(|m| m != row);
        if self.messages.len() != before {
            self.broadcast(RemoteEvent::MessageRow(RowEvent::Delete(row.clone())));
        }
    }

    /// Drain the queued events for `session`, in delivery order.
    pub fn drain(&mut self, session: SessionId) -> Vec<RemoteEvent> {
        match self.sessions.get_mut(&session) {
            Some(state) => state.outbox.drain(..).collect(),
            None => Vec::new(),
        }
    }

    /// Authoritative user row for `identity`, if one exists.
    pub fn user(&self, identity: &RemoteIdentity) -> Option<&User> {
        self.users.get(identity)
    }

    /// Number of messages in the authoritative log.
    pub fn message_count(&self) -> usize {
        self.messages.len()
    }

    /// Messages in the authoritative log, in send order.
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    fn broadcast(&mut self, event: RemoteEvent) {
        for state in self.sessions.values_mut() {
            if state.subscribed {
                state.outbox.push_back(event.clone());
            }
        }
    }
}
