//! Client events and actions.

use driftchat_core::{
    ConnectionAction, ConnectionConfig, Generation, RemoteIdentity, RowEvent, SubscriptionAction,
    SubscriptionId,
};
use serde::{Deserialize, Serialize};

use crate::tables::{Message, User};

/// Events the remote source delivers back to the client.
///
/// The caller is responsible for receiving these from the remote boundary
/// and feeding them in as [`ClientEvent::Remote`]. Connection-level events
/// carry the generation of the attempt they belong to; callbacks from a
/// superseded attempt are discarded silently.
#[derive(Debug, Clone)]
pub enum RemoteEvent {
    /// Handshake succeeded: identity and token issued.
    Connected {
        /// Generation of the attempt this callback belongs to.
        generation: Generation,
        /// Identity issued for this session.
        identity: RemoteIdentity,
        /// Auth token for future re-authentication.
        token: String,
    },

    /// Session dropped after being connected.
    Disconnected {
        /// Generation of the attempt this callback belongs to.
        generation: Generation,
        /// Reason, if the remote source gave one.
        reason: Option<String>,
    },

    /// Handshake failed.
    ConnectFailed {
        /// Generation of the attempt this callback belongs to.
        generation: Generation,
        /// Failure description.
        reason: String,
    },

    /// The remote source acknowledged a subscription.
    SubscriptionApplied {
        /// Handle returned when the subscription was issued.
        id: SubscriptionId,
    },

    /// Row change pushed for the `user` table.
    UserRow(RowEvent<User>),

    /// Row change pushed for the `message` table.
    MessageRow(RowEvent<Message>),
}

/// Events the caller feeds into the client.
#[derive(Debug, Clone)]
pub enum ClientEvent {
    /// Open (or reconfigure) the connection to the remote source.
    Connect {
        /// Connection parameters, including any stored token.
        config: ConnectionConfig,
    },

    /// Tear down the session. Idempotent.
    Teardown,

    /// User wants to set their display name.
    SetName {
        /// New display name.
        name: String,
    },

    /// User wants to send a chat message.
    SendMessage {
        /// Message body.
        text: String,
    },

    /// Callback or push from the remote source.
    Remote(RemoteEvent),
}

/// Named remote procedures (reducers) the client can invoke.
///
/// Invocation is fire-and-forget: there is no direct return value, and
/// success is observed only through the resulting table row events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReducerCall {
    /// Set the calling user's display name.
    SetName {
        /// New display name.
        name: String,
    },

    /// Send a chat message; the server assigns the timestamp.
    SendMessage {
        /// Message body.
        text: String,
    },
}

/// Actions the client produces for the caller to execute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientAction {
    /// Start the asynchronous handshake with the remote source.
    OpenConnection {
        /// Connection parameters.
        config: ConnectionConfig,
        /// Generation the remote callbacks must echo back.
        generation: Generation,
    },

    /// Close the underlying session.
    CloseConnection,

    /// Persist the issued auth token via the external token store.
    PersistToken {
        /// Token issued by the remote source.
        token: String,
    },

    /// Send a query set to the remote source.
    Subscribe {
        /// Handle the acknowledgment must be reported against.
        id: SubscriptionId,
        /// Declarative select expressions.
        queries: Vec<String>,
    },

    /// Invoke a named remote procedure.
    InvokeReducer(ReducerCall),
}

impl From<ConnectionAction> for ClientAction {
    fn from(action: ConnectionAction) -> Self {
        match action {
            ConnectionAction::Open { config, generation } => {
                Self::OpenConnection { config, generation }
            },
            ConnectionAction::Close => Self::CloseConnection,
            ConnectionAction::PersistToken { token } => Self::PersistToken { token },
        }
    }
}

impl From<SubscriptionAction> for ClientAction {
    fn from(action: SubscriptionAction) -> Self {
        match action {
            SubscriptionAction::Subscribe { id, queries } => Self::Subscribe { id, queries },
        }
    }
}
