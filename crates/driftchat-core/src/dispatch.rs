//! Listener fan-out for mirror mutations.
//!
//! A [`Dispatcher`] delivers every applied row event, together with the
//! post-apply snapshot, to registered listeners in registration order.
//! Registration is symmetric: every added listener is removable by its
//! [`ListenerId`], so callbacks never leak across reconnects.

use crate::mirror::{RowEvent, Snapshot, TableRow};

/// Handle for removing a registered listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Callback invoked after a row event is applied.
///
/// Receives the applied event and the post-apply snapshot, so listeners can
/// read consistent state without holding a borrow of the mirror itself.
pub type ChangeListener<T> = Box<dyn FnMut(&RowEvent<T>, &Snapshot<T>)>;

/// Fans out mirror mutations to interested listeners.
pub struct Dispatcher<T: TableRow> {
    next_id: u64,
    listeners: Vec<(u64, ChangeListener<T>)>,
}

impl<T: TableRow> Dispatcher<T> {
    /// Create an empty dispatcher.
    pub fn new() -> Self {
        Self { next_id: 0, listeners: Vec::new() }
    }

    /// Register a listener. The returned id removes exactly this listener.
    pub fn add(&mut self, listener: ChangeListener<T>) -> ListenerId {
        let id = self.next_id;
        self.next_id += 1;
        self.listeners.push((id, listener));
        ListenerId(id)
    }

    /// Remove a listener. Returns false if the id was already removed.
    pub fn remove(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(listener_id, _)| *listener_id != id.0);
        self.listeners.len() != before
    }

    /// Deliver an event to all listeners in registration order.
    pub fn emit(&mut self, event: &RowEvent<T>, snapshot: &Snapshot<T>) {
        for (_, listener) in &mut self.listeners {
            listener(event, snapshot);
        }
    }

    /// Number of registered listeners.
    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    /// True if no listeners are registered.
    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    /// Detach all listeners.
    pub fn clear(&mut self) {
        self.listeners.clear();
    }
}

impl<T: TableRow> Default for Dispatcher<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: TableRow> std::fmt::Debug for Dispatcher<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher").field("listeners", &self.listeners.len()).finish()
    }
}

#[cfg(test)]
mod tests {
    use std::{cell::RefCell, rc::Rc};

    use super::*;
    use crate::mirror::TableMirror;

    #[derive(Debug, Clone, PartialEq, Eq)]
    struct Counter {
        id: u8,
    }

    impl TableRow for Counter {
        type Key = u8;

        fn primary_key(&self) -> u8 {
            self.id
        }
    }

    #[test]
    fn removal_is_symmetric() {
        let mut mirror: TableMirror<Counter> = TableMirror::new("counter");
        let seen = Rc::new(RefCell::new(0u32));

        let seen_a = Rc::clone(&seen);
        let a = mirror.on_change(Box::new(move |_, _| *seen_a.borrow_mut() += 1));
        let seen_b = Rc::clone(&seen);
        let b = mirror.on_change(Box::new(move |_, _| *seen_b.borrow_mut() += 10));

        mirror.apply(RowEvent::Insert(Counter { id: 1 }));
        assert_eq!(*seen.borrow(), 11);

        assert!(mirror.off_change(a));
        mirror.apply(RowEvent::Insert(Counter { id: 2 }));
        assert_eq!(*seen.borrow(), 21);

        // Double removal reports false
        assert!(!mirror.off_change(a));
        assert!(mirror.off_change(b));

        mirror.apply(RowEvent::Insert(Counter { id: 3 }));
        assert_eq!(*seen.borrow(), 21);
    }

    #[test]
    fn listener_sees_post_apply_snapshot() {
        let mut mirror: TableMirror<Counter> = TableMirror::new("counter");
        let observed = Rc::new(RefCell::new(Vec::new()));

        let observed_inner = Rc::clone(&observed);
        let _ = mirror.on_change(Box::new(move |_, snapshot| {
            observed_inner.borrow_mut().push(snapshot.len());
        }));

        mirror.apply(RowEvent::Insert(Counter { id: 1 }));
        mirror.apply(RowEvent::Insert(Counter { id: 2 }));
        mirror.apply(RowEvent::Delete(Counter { id: 1 }));

        assert_eq!(*observed.borrow(), vec![1, 2, 1]);
    }
}
