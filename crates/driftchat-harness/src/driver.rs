//! Simulation driver coupling a `ChatClient` to a `SimRemote`.
//!
//! `SimDriver` plays the role of the async runtime around the client: it
//! executes the actions the client emits against the shared remote and feeds
//! remote events back in. Delivery of the connect acknowledgment can be
//! withheld to exercise stale-callback handling.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use driftchat_client::{
    ChatClient, ClientAction, ClientError, ClientEvent, ConnectionConfig, RemoteEvent,
};

use crate::sim_remote::{SessionId, SimRemote};

/// Endpoint presented to the client; the simulation ignores it.
const SIM_ENDPOINT: &str = "sim://remote";
/// Module name presented to the client.
const SIM_MODULE: &str = "driftchat";

/// Test driver owning one client side of a simulated session.
///
/// Holds the external collaborators the client delegates to through actions:
/// the remote source (shared across drivers) and the token store (a plain
/// field here).
pub struct SimDriver {
    client: ChatClient,
    remote: Rc<RefCell<SimRemote>>,
    session: Option<SessionId>,
    /// Token persisted on behalf of the client, re-presented on connect.
    stored_token: Option<String>,
    /// When set, connect acknowledgments queue up instead of delivering.
    withhold_handshake: bool,
    withheld: VecDeque<RemoteEvent>,
}

impl SimDriver {
    /// Create a driver for one client against the shared remote.
    pub fn new(remote: Rc<RefCell<SimRemote>>) -> Self {
        Self {
            client: ChatClient::new(),
            remote,
            session: None,
            stored_token: None,
            withhold_handshake: false,
            withheld: VecDeque::new(),
        }
    }

    /// The driven client.
    pub fn client(&self) -> &ChatClient {
        &self.client
    }

    /// Token the driver has persisted on the client's behalf.
    pub fn stored_token(&self) -> Option<&str> {
        self.stored_token.as_deref()
    }

    /// Session handle on the remote side, while connected.
    pub fn session(&self) -> Option<SessionId> {
        self.session
    }

    /// Queue connect acknowledgments instead of delivering them.
    pub fn set_withhold_handshake(&mut self, withhold: bool) {
        self.withhold_handshake = withhold;
    }

    /// Deliver every withheld event now, returning how many were delivered.
    pub fn release_withheld(&mut self) -> Result<usize, ClientError> {
        let mut delivered = 0;
        while let Some(event) = self.withheld.pop_front() {
            delivered += 1;
            let actions = self.client.handle(ClientEvent::Remote(event))?;
            self.execute(actions)?;
        }
        Ok(delivered)
    }

    /// Connect to the remote, presenting the stored token when one exists.
    pub fn connect(&mut self) -> Result<(), ClientError> {
        let mut config = ConnectionConfig::new(SIM_ENDPOINT, SIM_MODULE);
        if let Some(token) = &self.stored_token {
            config = config.with_token(token.clone());
        }
        let actions = self.client.handle(ClientEvent::Connect { config })?;
        self.execute(actions)
    }

    /// Tear the client down, closing the remote session.
    pub fn teardown(&mut self) -> Result<(), ClientError> {
        let actions = self.client.handle(ClientEvent::Teardown)?;
        self.execute(actions)
    }

    /// Ask the remote to rename this client's user.
    pub fn set_name(&mut self, name: &str) -> Result<(), ClientError> {
        let actions = self.client.handle(ClientEvent::SetName { name: name.to_owned() })?;
        self.execute(actions)
    }

    /// Send a chat message.
    pub fn send_message(&mut self, text: &str) -> Result<(), ClientError> {
        let actions = self.client.handle(ClientEvent::SendMessage { text: text.to_owned() })?;
        self.execute(actions)
    }

    /// Deliver every event queued for this session, including events that
    /// executing earlier actions queued up. Returns how many were delivered.
    pub fn pump(&mut self) -> Result<usize, ClientError> {
        let mut delivered = 0;
        loop {
            let events = match self.session {
                Some(session) => self.remote.borrow_mut().drain(session),
                None => Vec::new(),
            };
            if events.is_empty() {
                return Ok(delivered);
            }
            for event in events {
                delivered += 1;
                let actions = self.client.handle(ClientEvent::Remote(event))?;
                self.execute(actions)?;
            }
        }
    }

    fn execute(&mut self, actions: Vec<ClientAction>) -> Result<(), ClientError> {
        for action in actions {
            match action {
                ClientAction::OpenConnection { config, generation } => {
                    let outcome = self.remote.borrow_mut().connect(config.token.as_deref());
                    self.session = Some(outcome.session);
                    let event = RemoteEvent::Connected {
                        generation,
                        identity: outcome.identity,
                        token: outcome.token,
                    };
                    if self.withhold_handshake {
                        self.withheld.push_back(event);
                    } else {
                        let followups = self.client.handle(ClientEvent::Remote(event))?;
                        self.execute(followups)?;
                    }
                },
                ClientAction::CloseConnection => {
                    if let Some(session) = self.session.take() {
                        self.remote.borrow_mut().disconnect(session);
                    }
                },
                ClientAction::PersistToken { token } => {
                    self.stored_token = Some(token);
                },
                ClientAction::Subscribe { id, queries: _ } => {
                    // The simulation serves full tables regardless of query text.
                    if let Some(session) = self.session {
                        self.remote.borrow_mut().subscribe(session, id);
                    }
                },
                ClientAction::InvokeReducer(call) => {
                    if let Some(session) = self.session {
                        self.remote.borrow_mut().invoke(session, call);
                    }
                },
            }
        }
        Ok(())
    }
}

/// Pump every driver until no events remain anywhere, returning the total
/// number of events delivered.
pub fn pump_until_quiescent(drivers: &mut [&mut SimDriver]) -> Result<usize, ClientError> {
    let mut total = 0;
    loop {
        let mut round = 0;
        for driver in drivers.iter_mut() {
            round += driver.pump()?;
        }
        if round == 0 {
            return Ok(total);
        }
        total += round;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use driftchat_client::ConnectionState;

    fn shared_remote() -> Rc<RefCell<SimRemote>> {
        Rc::new(RefCell::new(SimRemote::with_seed(42)))
    }

    #[test]
    fn connect_then_pump_reaches_connected_and_applied() {
        let remote = shared_remote();
        let mut driver = SimDriver::new(remote);
        driver.connect().unwrap();
        driver.pump().unwrap();

        assert_eq!(driver.client().state(), ConnectionState::Connected);
        assert!(driver.client().subscriptions_applied());
        assert!(driver.stored_token().is_some());
        // Own user row arrives through the subscription replay.
        assert_eq!(driver.client().users().len(), 1);
    }

    #[test]
    fn withheld_handshake_keeps_client_connecting() {
        let remote = shared_remote();
        let mut driver = SimDriver::new(remote);
        driver.set_withhold_handshake(true);
        driver.connect().unwrap();
        driver.pump().unwrap();

        assert_eq!(driver.client().state(), ConnectionState::Connecting);

        driver.release_withheld().unwrap();
        driver.pump().unwrap();
        assert_eq!(driver.client().state(), ConnectionState::Connected);
    }

    #[test]
    fn teardown_closes_the_remote_session() {
        let remote = shared_remote();
        let mut driver = SimDriver::new(Rc::clone(&remote));
        driver.connect().unwrap();
        driver.pump().unwrap();
        let identity = driver.client().identity().unwrap();

        driver.teardown().unwrap();
        assert!(driver.session().is_none());
        assert!(!remote.borrow().user(&identity).unwrap().online);
    }
}
