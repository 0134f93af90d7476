//! Mirrored table row types.
//!
//! Rust-side shapes of the rows the remote source pushes for the chat
//! module's `user` and `message` tables.

use driftchat_core::{RemoteIdentity, TableRow};
use serde::{Deserialize, Serialize};

/// A chat participant, from the `user` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Remote-issued identity; the row's primary key.
    pub identity: RemoteIdentity,
    /// Chosen display name. `None` until the user sets one.
    pub name: Option<String>,
    /// True while the user has an active session.
    pub online: bool,
}

impl User {
    /// Display name, falling back to the identity's short hex prefix when no
    /// name is set.
    pub fn display_name(&self) -> String {
        match self.name.as_deref() {
            Some(name) if !name.is_empty() => name.to_owned(),
            _ => self.identity.short_hex(),
        }
    }
}

impl TableRow for User {
    type Key = RemoteIdentity;

    fn primary_key(&self) -> RemoteIdentity {
        self.identity
    }
}

/// A chat message, from the `message` table.
///
/// The table has no server-assigned row id; the primary identity is the
/// composite of sender, send timestamp, and text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Identity of the sending user.
    pub sender: RemoteIdentity,
    /// Send timestamp in microseconds, assigned by the remote source.
    pub sent: u64,
    /// Message body.
    pub text: String,
}

/// Composite primary identity of a [`Message`].
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MessageKey {
    /// Identity of the sending user.
    pub sender: RemoteIdentity,
    /// Send timestamp in microseconds.
    pub sent: u64,
    /// Message body.
    pub text: String,
}

impl TableRow for Message {
    type Key = MessageKey;

    fn primary_key(&self) -> MessageKey {
        MessageKey { sender: self.sender, sent: self.sent, text: self.text.clone() }
    }
}
