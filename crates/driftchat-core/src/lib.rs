//! Core synchronization layer
//!
//! Sans-IO primitives that keep local chat state consistent with a remotely
//! pushed, subscription-based data source. The caller owns all I/O: state
//! machines here consume events delivered by the remote source and return
//! actions for the caller to execute.
//!
//! # Components
//!
//! - [`ConnectionManager`]: Connection lifecycle state machine with
//!   generation guarding against stale asynchronous callbacks
//! - [`SubscriptionRegistry`]: Tracks declarative queries and their applied
//!   acknowledgments
//! - [`TableMirror`]: Per-table local cache that applies ordered row-change
//!   events into immutable snapshots
//! - [`Dispatcher`]: Fans out mirror mutations to registered listeners
//!
//! # Concurrency model
//!
//! Single-threaded and event-driven. Mutations to a mirror are applied
//! sequentially in remote delivery order; [`TableMirror::snapshot`] is safe
//! to call at any point, including from inside a change listener, and always
//! observes a fully applied state.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod connection;
mod dispatch;
mod error;
mod identity;
mod mirror;
mod subscription;

pub use connection::{
    Compression, ConnectionAction, ConnectionConfig, ConnectionManager, ConnectionState,
    Generation,
};
pub use dispatch::{ChangeListener, Dispatcher, ListenerId};
pub use error::{ConnectionError, SubscriptionError};
pub use identity::{IDENTITY_SIZE, RemoteIdentity, SHORT_HEX_LEN};
pub use mirror::{RowEvent, Snapshot, TableMirror, TableRow};
pub use subscription::{Subscription, SubscriptionAction, SubscriptionId, SubscriptionRegistry};
