//! Chat session state machine.
//!
//! A [`ChatClient`] is one session against the remote chat module: it owns
//! the connection lifecycle, the subscription registry, the `user` and
//! `message` table mirrors, and the presence log. The session is created at
//! scope entry and torn down on every exit path via
//! [`ClientEvent::Teardown`]; mirrors and listeners never outlive it.

use driftchat_core::{
    ChangeListener, ConnectionConfig, ConnectionManager, ConnectionState, ListenerId,
    RemoteIdentity, Snapshot, SubscriptionError, SubscriptionRegistry, TableMirror,
};

use crate::{
    error::ClientError,
    event::{ClientAction, ClientEvent, ReducerCall, RemoteEvent},
    tables::{Message, User},
    view::{PresenceLog, PrettyMessage, pretty_messages},
};

/// Query subscribing to the full message table.
pub const MESSAGE_QUERY: &str = "SELECT * FROM message";

/// Query subscribing to the full user table.
pub const USER_QUERY: &str = "SELECT * FROM user";

/// Client for one chat session against the remote source.
pub struct ChatClient {
    /// Connection lifecycle with generation guarding.
    connection: ConnectionManager,
    /// Issued queries and their acknowledgments.
    subscriptions: SubscriptionRegistry,
    /// Mirror of the `user` table.
    users: TableMirror<User>,
    /// Mirror of the `message` table.
    messages: TableMirror<Message>,
    /// Derived connect/disconnect log.
    presence: PresenceLog,
}

impl ChatClient {
    /// Create an idle client with empty mirrors.
    pub fn new() -> Self {
        Self {
            connection: ConnectionManager::new(),
            subscriptions: SubscriptionRegistry::new(),
            users: TableMirror::new("user"),
            messages: TableMirror::new("message"),
            presence: PresenceLog::new(),
        }
    }

    /// Process an event and return resulting actions.
    pub fn handle(&mut self, event: ClientEvent) -> Result<Vec<ClientAction>, ClientError> {
        match event {
            ClientEvent::Connect { config } => self.handle_connect(config),
            ClientEvent::Teardown => Ok(self.teardown()),
            ClientEvent::SetName { name } => self.invoke(ReducerCall::SetName { name }, "set name"),
            ClientEvent::SendMessage { text } => {
                self.invoke(ReducerCall::SendMessage { text }, "send message")
            },
            ClientEvent::Remote(remote) => self.handle_remote(remote),
        }
    }

    fn handle_connect(
        &mut self,
        config: ConnectionConfig,
    ) -> Result<Vec<ClientAction>, ClientError> {
        let mut actions: Vec<ClientAction> = Vec::new();

        // Reconfiguring an established session closes it first
        if self.connection.state() == ConnectionState::Connected {
            actions.extend(self.teardown());
        }

        actions.extend(self.connection.connect(config)?.into_iter().map(ClientAction::from));
        Ok(actions)
    }

    fn handle_remote(&mut self, event: RemoteEvent) -> Result<Vec<ClientAction>, ClientError> {
        match event {
            RemoteEvent::Connected { generation, identity, token } => {
                let connection_actions =
                    self.connection.handle_connected(generation, identity, token);
                if connection_actions.is_empty() {
                    // Stale attempt; nothing happened
                    return Ok(vec![]);
                }

                let mut actions: Vec<ClientAction> =
                    connection_actions.into_iter().map(ClientAction::from).collect();

                let (_, subscribe) = self
                    .subscriptions
                    .subscribe(vec![MESSAGE_QUERY.to_owned(), USER_QUERY.to_owned()]);
                actions.extend(subscribe.into_iter().map(ClientAction::from));

                Ok(actions)
            },
            RemoteEvent::Disconnected { generation, reason } => {
                let _ = self.connection.handle_disconnected(generation, reason);
                Ok(vec![])
            },
            RemoteEvent::ConnectFailed { generation, reason } => {
                let _ = self.connection.handle_connect_error(generation, reason);
                Ok(vec![])
            },
            RemoteEvent::SubscriptionApplied { id } => {
                match self.subscriptions.handle_applied(id) {
                    Ok(()) => Ok(vec![]),
                    Err(SubscriptionError::Unknown(id)) => {
                        // Acknowledgment for a superseded session's handle
                        tracing::trace!(%id, "discarding applied for unknown subscription");
                        Ok(vec![])
                    },
                    Err(err @ SubscriptionError::AlreadyApplied(_)) => Err(err.into()),
                }
            },
            RemoteEvent::UserRow(row_event) => {
                if self.connection.state() != ConnectionState::Connected {
                    tracing::trace!("discarding user row outside established session");
                    return Ok(vec![]);
                }
                self.presence.observe(&row_event);
                self.users.apply(row_event);
                Ok(vec![])
            },
            RemoteEvent::MessageRow(row_event) => {
                if self.connection.state() != ConnectionState::Connected {
                    tracing::trace!("discarding message row outside established session");
                    return Ok(vec![]);
                }
                self.messages.apply(row_event);
                Ok(vec![])
            },
        }
    }

    /// Invoke a reducer. Fire-and-forget: success is observed only through
    /// the resulting row events, never assumed.
    fn invoke(
        &self,
        call: ReducerCall,
        operation: &'static str,
    ) -> Result<Vec<ClientAction>, ClientError> {
        if self.connection.state() != ConnectionState::Connected {
            return Err(ClientError::NotConnected { operation });
        }
        Ok(vec![ClientAction::InvokeReducer(call)])
    }

    /// Tear down the session: disconnect idempotently, invalidate the
    /// current generation, drop subscriptions, clear mirrors, detach
    /// listeners.
    fn teardown(&mut self) -> Vec<ClientAction> {
        let actions = self.connection.disconnect();
        self.subscriptions.clear();
        self.users.clear();
        self.messages.clear();
        self.presence.clear();

        actions.into_iter().map(ClientAction::from).collect()
    }

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        self.connection.state()
    }

    /// Identity issued for this session. `None` until first connected.
    pub fn identity(&self) -> Option<RemoteIdentity> {
        self.connection.identity()
    }

    /// Auth token issued for this session. `None` until first connected.
    pub fn token(&self) -> Option<&str> {
        self.connection.token()
    }

    /// True once every issued subscription has been acknowledged.
    pub fn subscriptions_applied(&self) -> bool {
        !self.subscriptions.is_empty() && self.subscriptions.all_applied()
    }

    /// Current snapshot of the `user` mirror.
    pub fn users(&self) -> Snapshot<User> {
        self.users.snapshot()
    }

    /// Current snapshot of the `message` mirror.
    pub fn messages(&self) -> Snapshot<Message> {
        self.messages.snapshot()
    }

    /// Display feed, joined and sorted. Recomputed from current snapshots.
    pub fn pretty_messages(&self) -> Vec<PrettyMessage> {
        pretty_messages(&self.messages.snapshot(), &self.users.snapshot())
    }

    /// Presence log lines, oldest first.
    pub fn presence_lines(&self) -> &[String] {
        self.presence.lines()
    }

    /// Own display name: the name from the user mirror, falling back to the
    /// identity's short hex prefix. `None` before first connected.
    pub fn display_name(&self) -> Option<String> {
        let identity = self.connection.identity()?;
        Some(
            self.users
                .get(&identity)
                .map_or_else(|| identity.short_hex(), User::display_name),
        )
    }

    /// Register a listener on the `user` mirror (render layer hook).
    pub fn on_user_change(&mut self, listener: ChangeListener<User>) -> ListenerId {
        self.users.on_change(listener)
    }

    /// Remove a `user` mirror listener. Returns false if already removed.
    pub fn off_user_change(&mut self, id: ListenerId) -> bool {
        self.users.off_change(id)
    }

    /// Register a listener on the `message` mirror (render layer hook).
    pub fn on_message_change(&mut self, listener: ChangeListener<Message>) -> ListenerId {
        self.messages.on_change(listener)
    }

    /// Remove a `message` mirror listener. Returns false if already removed.
    pub fn off_message_change(&mut self, id: ListenerId) -> bool {
        self.messages.off_change(id)
    }
}

impl Default for ChatClient {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ChatClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatClient")
            .field("state", &self.connection.state())
            .field("users", &self.users.len())
            .field("messages", &self.messages.len())
            .finish()
    }
}
