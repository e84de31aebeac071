//! The state store.
//!
//! Holds the current [`Snapshot`] and publishes replacements atomically.
//! Single-threaded: interior mutability through [`RefCell`] and [`Cell`], no
//! locks. Updates are applied strictly in the order `set_state` was called.
//!
//! # Reentrancy
//!
//! A listener (or an updater) may call [`Store::set_state`] again. The nested
//! update is queued and applied after the current commit has notified every
//! listener, so listeners always observe snapshots in commit order.

use std::{
    cell::{Cell, RefCell},
    collections::VecDeque,
    fmt,
    rc::Rc,
    sync::Arc,
};

use tokio::sync::watch;
use tracing::trace;

use crate::{Event, reducer::reduce, state::Snapshot};

type Updater = Box<dyn FnOnce(&Arc<Snapshot>) -> Arc<Snapshot>>;
type Listener = Rc<dyn Fn(&Arc<Snapshot>)>;

/// Handle returned by [`Store::on_change`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

/// Single-threaded snapshot store.
pub struct Store {
    current: RefCell<Arc<Snapshot>>,
    pending: RefCell<VecDeque<Updater>>,
    committing: Cell<bool>,
    listeners: RefCell<Vec<(ListenerId, Listener)>>,
    next_listener: Cell<u64>,
    version: Cell<u64>,
    channel: watch::Sender<Arc<Snapshot>>,
}

/// Clears the committing flag even if an updater or listener panics.
struct CommitGuard<'a>(&'a Cell<bool>);

impl Drop for CommitGuard<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

impl Store {
    /// Store publishing `initial` as version 0.
    pub fn new(initial: Snapshot) -> Self {
        let initial = Arc::new(initial);
        let (channel, _) = watch::channel(Arc::clone(&initial));
        Self {
            current: RefCell::new(initial),
            pending: RefCell::new(VecDeque::new()),
            committing: Cell::new(false),
            listeners: RefCell::new(Vec::new()),
            next_listener: Cell::new(0),
            version: Cell::new(0),
            channel,
        }
    }

    /// Current snapshot.
    pub fn get_state(&self) -> Arc<Snapshot> {
        self.current.borrow().clone()
    }

    /// Number of commits so far. No-op updates do not count.
    pub fn version(&self) -> u64 {
        self.version.get()
    }

    /// Queue `updater` and, unless a commit is already running, drain the queue.
    ///
    /// An updater returning its input (`Arc::ptr_eq`) commits nothing and
    /// notifies nobody.
    pub fn set_state(&self, updater: impl FnOnce(&Arc<Snapshot>) -> Arc<Snapshot> + 'static) {
        self.pending.borrow_mut().push_back(Box::new(updater));
        if self.committing.get() {
            trace!("update queued behind in-flight commit");
            return;
        }

        self.committing.set(true);
        let _guard = CommitGuard(&self.committing);

        loop {
            let Some(updater) = self.pending.borrow_mut().pop_front() else {
                break;
            };
            let current = self.get_state();
            let next = updater(&current);
            if Arc::ptr_eq(&current, &next) {
                continue;
            }
            self.commit(next);
        }
    }

    /// Apply the reducer for `event`.
    pub fn dispatch(&self, event: Event) {
        trace!(event = event.name(), "dispatch");
        self.set_state(move |state| reduce(state, &event));
    }

    /// Register a listener invoked with every committed snapshot.
    pub fn on_change(&self, listener: impl Fn(&Arc<Snapshot>) + 'static) -> ListenerId {
        let id = ListenerId(self.next_listener.get());
        self.next_listener.set(id.0 + 1);
        self.listeners.borrow_mut().push((id, Rc::new(listener)));
        id
    }

    /// Remove a listener. Returns `false` if it was not registered.
    pub fn off_change(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.borrow_mut();
        let before = listeners.len();
        listeners.retain(|(existing, _)| *existing != id);
        listeners.len() != before
    }

    /// Channel form of change notification for async consumers.
    ///
    /// The receiver starts at the current snapshot.
    pub fn subscribe(&self) -> watch::Receiver<Arc<Snapshot>> {
        self.channel.subscribe()
    }

    fn commit(&self, next: Arc<Snapshot>) {
        *self.current.borrow_mut() = Arc::clone(&next);
        let version = self.version.get() + 1;
        self.version.set(version);
        trace!(version, "commit");

        self.channel.send_replace(Arc::clone(&next));

        // Listeners may register or remove listeners while being notified.
        let listeners: Vec<Listener> =
            self.listeners.borrow().iter().map(|(_, l)| Rc::clone(l)).collect();
        for listener in listeners {
            listener(&next);
        }
    }
}

impl fmt::Debug for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("version", &self.version.get())
            .field("listeners", &self.listeners.borrow().len())
            .field("pending", &self.pending.borrow().len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CommunicationIdentifier, state::CallState};

    fn store() -> Store {
        Store::new(Snapshot::new(CommunicationIdentifier::user("me")))
    }

    #[test]
    fn no_op_update_does_not_notify() {
        let store = store();
        let calls = Rc::new(Cell::new(0));
        let seen = Rc::clone(&calls);
        store.on_change(move |_| seen.set(seen.get() + 1));

        store.set_state(Arc::clone);
        store.dispatch(Event::CallRemoved { call_id: "missing".into() });
        assert_eq!(calls.get(), 0);
        assert_eq!(store.version(), 0);

        store.dispatch(Event::CallAdded { call: CallState::new("c1".into()) });
        assert_eq!(calls.get(), 1);
        assert_eq!(store.version(), 1);
    }

    #[test]
    fn off_change_stops_notifications() {
        let store = store();
        let calls = Rc::new(Cell::new(0));
        let seen = Rc::clone(&calls);
        let id = store.on_change(move |_| seen.set(seen.get() + 1));

        assert!(store.off_change(id));
        assert!(!store.off_change(id));
        store.dispatch(Event::CallAdded { call: CallState::new("c1".into()) });
        assert_eq!(calls.get(), 0);
    }
}
