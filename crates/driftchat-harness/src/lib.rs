//! Deterministic simulation harness for driftchat testing.
//!
//! `SimRemote` is an in-memory stand-in for the remote module: authoritative
//! tables, reducer execution, and row-event broadcast, with identities drawn
//! from a seeded RNG. `SimDriver` couples one [`ChatClient`] to the shared
//! remote, executing the actions the client emits and delivering events back.
//! Acknowledgment delivery can be withheld to exercise stale-callback
//! handling.
//!
//! [`ChatClient`]: driftchat_client::ChatClient

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod driver;
pub mod sim_remote;

pub use driver::{SimDriver, pump_until_quiescent};
pub use sim_remote::{ConnectOutcome, SessionId, SimRemote};
