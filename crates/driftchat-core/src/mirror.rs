//! Per-table local mirrors.
//!
//! A [`TableMirror`] is a read-optimized cache of one remote table, kept
//! consistent by applying the ordered stream of row-change events the remote
//! source pushes for that table. Each application produces a new immutable
//! [`Snapshot`]; readers holding an older snapshot keep observing it in full,
//! never a partially applied row.

use std::{
    collections::{HashMap, hash_map::Entry},
    fmt,
    hash::Hash,
    sync::Arc,
};

use crate::dispatch::{ChangeListener, Dispatcher, ListenerId};

/// A value that lives in a mirrored table.
///
/// The primary key is derived from the row's own fields. Two rows with the
/// same key are the same logical row; a mirror never holds both.
pub trait TableRow: Clone + fmt::Debug {
    /// Primary identity of a row.
    ///
    /// `Ord` gives derived views a deterministic tiebreaker.
    type Key: Clone + Eq + Hash + Ord + fmt::Debug;

    /// Derive the primary key from this row's fields.
    fn primary_key(&self) -> Self::Key;
}

/// A row-change event pushed by the remote source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowEvent<T> {
    /// A row was inserted.
    Insert(T),
    /// A row was replaced, possibly under a new primary key.
    Update {
        /// Row value before the update.
        old: T,
        /// Row value after the update.
        new: T,
    },
    /// A row was deleted.
    Delete(T),
}

/// A row together with the mirror's apply sequence number.
#[derive(Debug, Clone)]
struct Stamped<T> {
    /// Monotonic counter assigned when the row first entered the mirror.
    seq: u64,
    row: T,
}

/// Immutable view of a mirror at one point in time.
///
/// Cheap to clone (shared storage) and safe to read from anywhere, including
/// inside a change listener while the mirror is mid-mutation elsewhere.
#[derive(Debug, Clone)]
pub struct Snapshot<T: TableRow> {
    rows: Arc<HashMap<T::Key, Stamped<T>>>,
}

impl<T: TableRow> Snapshot<T> {
    /// Row stored under this key, if any.
    pub fn get(&self, key: &T::Key) -> Option<&T> {
        self.rows.get(key).map(|entry| &entry.row)
    }

    /// True if a row is stored under this key.
    pub fn contains_key(&self, key: &T::Key) -> bool {
        self.rows.contains_key(key)
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// True if the mirror was empty.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Iterate over `(key, row)` pairs. Order is not meaningful.
    pub fn iter(&self) -> impl Iterator<Item = (&T::Key, &T)> {
        self.rows.iter().map(|(key, entry)| (key, &entry.row))
    }

    /// Iterate over `(apply_sequence, row)` pairs.
    ///
    /// The sequence number records when the row first entered the mirror and
    /// serves as the final sort tiebreaker in derived views.
    pub fn iter_stamped(&self) -> impl Iterator<Item = (u64, &T)> {
        self.rows.values().map(|entry| (entry.seq, &entry.row))
    }
}

/// Local cache of one remote table.
///
/// Events must be applied in the order the remote source delivers them
/// (single ordered stream per table). Listeners registered via
/// [`TableMirror::on_change`] are notified after every application with the
/// event and the post-apply snapshot.
pub struct TableMirror<T: TableRow> {
    /// Shared row storage. Copy-on-write: mutation clones only when a
    /// snapshot is still held elsewhere.
    rows: Arc<HashMap<T::Key, Stamped<T>>>,
    /// Next apply sequence number.
    next_seq: u64,
    /// Listener fan-out.
    dispatcher: Dispatcher<T>,
    /// Table name, for diagnostics.
    table: &'static str,
}

impl<T: TableRow> TableMirror<T> {
    /// Create an empty mirror for the named table.
    pub fn new(table: &'static str) -> Self {
        Self {
            rows: Arc::new(HashMap::new()),
            next_seq: 0,
            dispatcher: Dispatcher::new(),
            table,
        }
    }

    /// Apply one row-change event and notify listeners.
    ///
    /// - Insert: idempotent overwrite at the row's key. Re-inserting an
    ///   existing key replaces the value and keeps its sequence number, so a
    ///   duplicated insert never changes the snapshot.
    /// - Update: removes the old row's key and stores the new row in one
    ///   step, which also covers key-changing updates. The old row's
    ///   sequence number carries over.
    /// - Delete: removes the row whose key exactly equals the deleted row's
    ///   key. An absent key is a no-op, not an error.
    pub fn apply(&mut self, event: RowEvent<T>) {
        match &event {
            RowEvent::Insert(row) => {
                let key = row.primary_key();
                let seq = self.next_seq;
                match Arc::make_mut(&mut self.rows).entry(key) {
                    Entry::Occupied(mut entry) => entry.get_mut().row = row.clone(),
                    Entry::Vacant(vacant) => {
                        vacant.insert(Stamped { seq, row: row.clone() });
                        self.next_seq += 1;
                    },
                }
            },
            RowEvent::Update { old, new } => {
                let old_key = old.primary_key();
                let new_key = new.primary_key();
                let rows = Arc::make_mut(&mut self.rows);
                let seq = match rows.remove(&old_key) {
                    Some(entry) => entry.seq,
                    None => {
                        tracing::trace!(table = self.table, ?old_key, "update for absent row");
                        let seq = self.next_seq;
                        self.next_seq += 1;
                        seq
                    },
                };
                rows.insert(new_key, Stamped { seq, row: new.clone() });
            },
            RowEvent::Delete(row) => {
                let key = row.primary_key();
                if self.rows.contains_key(&key) {
                    Arc::make_mut(&mut self.rows).remove(&key);
                } else {
                    tracing::trace!(table = self.table, ?key, "delete for absent row");
                }
            },
        }

        let snapshot = Snapshot { rows: Arc::clone(&self.rows) };
        self.dispatcher.emit(&event, &snapshot);
    }

    /// Current immutable snapshot.
    pub fn snapshot(&self) -> Snapshot<T> {
        Snapshot { rows: Arc::clone(&self.rows) }
    }

    /// Row stored under this key, if any.
    pub fn get(&self, key: &T::Key) -> Option<&T> {
        self.rows.get(key).map(|entry| &entry.row)
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// True if the mirror holds no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Register a change listener. See [`Dispatcher::add`].
    pub fn on_change(&mut self, listener: ChangeListener<T>) -> ListenerId {
        self.dispatcher.add(listener)
    }

    /// Remove a change listener. Returns false if already removed.
    pub fn off_change(&mut self, id: ListenerId) -> bool {
        self.dispatcher.remove(id)
    }

    /// Drop all rows and detach all listeners (session teardown).
    pub fn clear(&mut self) {
        self.rows = Arc::new(HashMap::new());
        self.dispatcher.clear();
        tracing::debug!(table = self.table, "mirror cleared");
    }
}

impl<T: TableRow> fmt::Debug for TableMirror<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TableMirror")
            .field("table", &self.table)
            .field("rows", &self.rows.len())
            .field("listeners", &self.dispatcher.len())
            .finish()
    }
}
