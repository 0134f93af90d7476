//! Derived, read-only views over the mirrors.
//!
//! Views hold no ownership of mirror state: the message feed is a pure
//! function over snapshots, recomputed on demand, and the presence log is an
//! append-only record of the user-row transitions it has observed.

use driftchat_core::{RowEvent, Snapshot};

use crate::tables::{Message, User};

/// A message joined against the user mirror for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrettyMessage {
    /// Sender's display name (short hex prefix when unnamed or unknown).
    pub sender_name: String,
    /// Message body.
    pub text: String,
}

/// Build the display feed from the current mirror snapshots.
///
/// Messages are sorted ascending by send timestamp under a total, stable
/// order: equal timestamps tie-break by sender identity, then by the
/// mirror's raw apply sequence, so the feed never flickers between
/// recomputations.
pub fn pretty_messages(
    messages: &Snapshot<Message>,
    users: &Snapshot<User>,
) -> Vec<PrettyMessage> {
    let mut rows: Vec<(u64, &Message)> = messages.iter_stamped().collect();
    rows.sort_by(|(seq_a, a), (seq_b, b)| {
        a.sent
            .cmp(&b.sent)
            .then_with(|| a.sender.cmp(&b.sender))
            .then_with(|| seq_a.cmp(seq_b))
    });

    rows.into_iter()
        .map(|(_, message)| PrettyMessage {
            sender_name: users
                .get(&message.sender)
                .map_or_else(|| message.sender.short_hex(), User::display_name),
            text: message.text.clone(),
        })
        .collect()
}

/// Append-only log of connect/disconnect transitions in the user mirror.
///
/// Unbounded for the lifetime of the session; the owning session clears it
/// on teardown.
#[derive(Debug, Clone, Default)]
pub struct PresenceLog {
    lines: Vec<String>,
}

impl PresenceLog {
    /// Create an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Observe one user-row event, appending a line when the online flag
    /// transitions.
    ///
    /// An insert of an already-online user counts as a connect. Updates that
    /// leave the flag unchanged (e.g. a rename) emit nothing.
    pub fn observe(&mut self, event: &RowEvent<User>) {
        match event {
            RowEvent::Insert(user) if user.online => {
                self.lines.push(format!("{} has connected.", user.display_name()));
            },
            RowEvent::Update { old, new } => {
                if !old.online && new.online {
                    self.lines.push(format!("{} has connected.", new.display_name()));
                } else if old.online && !new.online {
                    self.lines.push(format!("{} has disconnected.", new.display_name()));
                }
            },
            RowEvent::Insert(_) | RowEvent::Delete(_) => {},
        }
    }

    /// Lines observed so far, oldest first.
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// Number of lines.
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// True if nothing has been observed.
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Drop all lines (session teardown).
    pub fn clear(&mut self) {
        self.lines.clear();
    }
}
