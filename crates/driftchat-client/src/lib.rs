//! Chat client
//!
//! Action-based chat client built on the [`driftchat_core`] sync layer. A
//! [`ChatClient`] is one session: it owns the connection lifecycle, the
//! table mirrors for the `user` and `message` tables, and the derived views
//! (sorted message feed, presence log).
//!
//! # Architecture
//!
//! The client follows the same sans-IO, event→action pattern as the core.
//! It receives events ([`ClientEvent`]), processes them through pure state
//! machine logic, and returns actions ([`ClientAction`]) for the caller to
//! execute against the remote source.
//!
//! # Components
//!
//! - [`ChatClient`]: Session object composing connection, subscriptions,
//!   mirrors, and presence log
//! - [`ClientEvent`] / [`RemoteEvent`]: Events fed into the client
//! - [`ClientAction`] / [`ReducerCall`]: Actions produced for the caller
//! - [`pretty_messages`] / [`PresenceLog`]: Derived read-only views

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod client;
mod error;
mod event;
mod tables;
mod view;

pub use client::{ChatClient, MESSAGE_QUERY, USER_QUERY};
pub use driftchat_core::{
    Compression, ConnectionConfig, ConnectionState, Generation, ListenerId, RemoteIdentity,
    RowEvent, Snapshot, SubscriptionId,
};
pub use error::ClientError;
pub use event::{ClientAction, ClientEvent, ReducerCall, RemoteEvent};
pub use tables::{Message, MessageKey, User};
pub use view::{PresenceLog, PrettyMessage, pretty_messages};
