//! End-to-end tests: two clients over a shared `SimRemote`.

use std::cell::RefCell;
use std::rc::Rc;

use driftchat_client::ConnectionState;
use driftchat_harness::{SimDriver, SimRemote, pump_until_quiescent};

fn shared_remote() -> Rc<RefCell<SimRemote>> {
    Rc::new(RefCell::new(SimRemote::with_seed(1234)))
}

#[test]
fn two_clients_exchange_messages_and_names() {
    let remote = shared_remote();
    let mut alice = SimDriver::new(Rc::clone(&remote));
    let mut bob = SimDriver::new(Rc::clone(&remote));

    alice.connect().unwrap();
    bob.connect().unwrap();
    pump_until_quiescent(&mut [&mut alice, &mut bob]).unwrap();

    assert_eq!(alice.client().state(), ConnectionState::Connected);
    assert_eq!(bob.client().state(), ConnectionState::Connected);
    assert_eq!(alice.client().users().len(), 2);
    assert_eq!(bob.client().users().len(), 2);

    alice.set_name("Alice").unwrap();
    bob.set_name("Bob").unwrap();
    alice.send_message("hi bob").unwrap();
    bob.send_message("hi alice").unwrap();
    pump_until_quiescent(&mut [&mut alice, &mut bob]).unwrap();

    let feed_a = alice.client().pretty_messages();
    let feed_b = bob.client().pretty_messages();
    assert_eq!(feed_a, feed_b);
    assert_eq!(feed_a.len(), 2);
    assert_eq!(feed_a[0].sender_name, "Alice");
    assert_eq!(feed_a[0].text, "hi bob");
    assert_eq!(feed_a[1].sender_name, "Bob");
    assert_eq!(feed_a[1].text, "hi alice");

    // Presence lines agree up to delivery order (subscription replay sorts
    // by identity, live delivery is chronological).
    let mut presence_a = alice.client().presence_lines().to_vec();
    let mut presence_b = bob.client().presence_lines().to_vec();
    presence_a.sort();
    presence_b.sort();
    assert_eq!(presence_a, presence_b);
}

#[test]
fn presence_log_tracks_peer_lifecycle() {
    let remote = shared_remote();
    let mut alice = SimDriver::new(Rc::clone(&remote));
    alice.connect().unwrap();
    alice.pump().unwrap();

    let mut bob = SimDriver::new(Rc::clone(&remote));
    bob.connect().unwrap();
    pump_until_quiescent(&mut [&mut alice, &mut bob]).unwrap();

    let bob_identity = bob.client().identity().unwrap();
    let bob_short = bob_identity.short_hex();
    assert_eq!(
        alice.client().presence_lines().last().map(String::as_str),
        Some(format!("{bob_short} has connected.").as_str())
    );

    bob.set_name("Bob").unwrap();
    bob.teardown().unwrap();
    alice.pump().unwrap();

    // The rename arrived before the disconnect, so the line uses the name.
    assert_eq!(
        alice.client().presence_lines().last().map(String::as_str),
        Some("Bob has disconnected.")
    );
}

#[test]
fn rename_applies_retroactively_to_the_feed() {
    let remote = shared_remote();
    let mut alice = SimDriver::new(Rc::clone(&remote));
    let mut bob = SimDriver::new(Rc::clone(&remote));
    alice.connect().unwrap();
    bob.connect().unwrap();
    pump_until_quiescent(&mut [&mut alice, &mut bob]).unwrap();

    alice.send_message("first").unwrap();
    pump_until_quiescent(&mut [&mut alice, &mut bob]).unwrap();

    let short = alice.client().identity().unwrap().short_hex();
    assert_eq!(bob.client().pretty_messages()[0].sender_name, short);

    alice.set_name("Alice").unwrap();
    pump_until_quiescent(&mut [&mut alice, &mut bob]).unwrap();

    assert_eq!(bob.client().pretty_messages()[0].sender_name, "Alice");
}

#[test]
fn late_joiner_sees_full_history() {
    let remote = shared_remote();
    let mut alice = SimDriver::new(Rc::clone(&remote));
    alice.connect().unwrap();
    alice.pump().unwrap();
    alice.set_name("Alice").unwrap();
    alice.send_message("one").unwrap();
    alice.send_message("two").unwrap();
    alice.pump().unwrap();

    let mut bob = SimDriver::new(Rc::clone(&remote));
    bob.connect().unwrap();
    pump_until_quiescent(&mut [&mut alice, &mut bob]).unwrap();

    let feed = bob.client().pretty_messages();
    assert_eq!(feed.len(), 2);
    assert_eq!(feed[0].text, "one");
    assert_eq!(feed[1].text, "two");
    assert_eq!(feed[0].sender_name, "Alice");
}

#[test]
fn reconnect_with_stored_token_resumes_identity() {
    let remote = shared_remote();
    let mut alice = SimDriver::new(Rc::clone(&remote));
    alice.connect().unwrap();
    alice.pump().unwrap();
    let first = alice.client().identity().unwrap();

    alice.teardown().unwrap();
    alice.connect().unwrap();
    alice.pump().unwrap();

    assert_eq!(alice.client().identity(), Some(first));
    // No second user row was minted for the returning identity.
    assert_eq!(alice.client().users().len(), 1);
}

#[test]
fn message_retraction_removes_the_exact_row() {
    let remote = shared_remote();
    let mut alice = SimDriver::new(Rc::clone(&remote));
    let mut bob = SimDriver::new(Rc::clone(&remote));
    alice.connect().unwrap();
    bob.connect().unwrap();
    pump_until_quiescent(&mut [&mut alice, &mut bob]).unwrap();

    alice.send_message("keep").unwrap();
    alice.send_message("drop").unwrap();
    pump_until_quiescent(&mut [&mut alice, &mut bob]).unwrap();

    let victim = remote
        .borrow()
        .messages()
        .iter()
        .find(|m| m.text == "drop")
        .cloned()
        .unwrap();
    remote.borrow_mut().retract_message(&victim);
    pump_until_quiescent(&mut [&mut alice, &mut bob]).unwrap();

    for driver in [&alice, &bob] {
        let feed = driver.client().pretty_messages();
        assert_eq!(feed.len(), 1);
        assert_eq!(feed[0].text, "keep");
    }
}
