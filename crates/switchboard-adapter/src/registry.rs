//! Listener registry.
//!
//! Maps each live SDK object to the handlers the adapter registered on it and
//! the snapshot entity it feeds. Objects form a tree (call agent, call,
//! participant, stream) so removing an object removes its descendants in the
//! same step.
//!
//! The registry is the single source of truth for "what is subscribed". The
//! adapter updates it in the same synchronous turn as the reducer that adds
//! or removes the entity, so the set of registered non-root entities always
//! equals the set of call, participant, and stream entities in the snapshot.

use std::{
    cell::Cell,
    collections::{BTreeSet, HashMap},
    fmt,
    rc::Rc,
};

use switchboard_core::{CallId, ParticipantId, StreamId};
use tracing::trace;

use crate::sdk::{EventKind, EventSource, HandlerId, ObjectId};

/// Handle for everything registered by one [`crate::Adapter::attach`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionToken(pub(crate) u64);

/// Snapshot entity a subscribed object feeds.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EntityKey {
    /// Call agent root.
    CallAgent(ObjectId),
    /// Device manager root.
    DeviceManager(ObjectId),
    /// Chat client root.
    ChatClient(ObjectId),
    /// A call.
    Call(CallId),
    /// A remote participant.
    Participant(CallId, ParticipantId),
    /// A remote video stream.
    Stream(CallId, ParticipantId, StreamId),
}

impl EntityKey {
    /// Roots are attached explicitly and have no snapshot entity.
    pub fn is_root(&self) -> bool {
        matches!(self, Self::CallAgent(_) | Self::DeviceManager(_) | Self::ChatClient(_))
    }
}

/// Registered handlers on one SDK object.
pub(crate) struct Subscription {
    pub source: Rc<dyn EventSource>,
    pub key: EntityKey,
    pub token: SubscriptionToken,
    pub parent: Option<ObjectId>,
    pub handlers: Vec<(EventKind, HandlerId)>,
    /// Shared with every handler closure; cleared before the handlers are
    /// unregistered so in-flight notifications are dropped.
    pub alive: Rc<Cell<bool>>,
    children: BTreeSet<ObjectId>,
}

impl Subscription {
    pub fn new(
        source: Rc<dyn EventSource>,
        key: EntityKey,
        token: SubscriptionToken,
        parent: Option<ObjectId>,
        alive: Rc<Cell<bool>>,
    ) -> Self {
        Self { source, key, token, parent, handlers: Vec::new(), alive, children: BTreeSet::new() }
    }

    /// Mark dead and unregister every handler from the source.
    pub fn release(self) {
        self.alive.set(false);
        for (kind, id) in self.handlers {
            self.source.off(kind, id);
        }
        trace!(key = ?self.key, "released subscription");
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("object", &self.source.object_id())
            .field("key", &self.key)
            .field("token", &self.token)
            .field("handlers", &self.handlers.len())
            .field("children", &self.children.len())
            .finish_non_exhaustive()
    }
}

/// Live subscriptions by object identity.
#[derive(Debug, Default)]
pub(crate) struct ListenerRegistry {
    by_object: HashMap<ObjectId, Subscription>,
    by_key: HashMap<EntityKey, ObjectId>,
}

impl ListenerRegistry {
    pub fn contains(&self, object: ObjectId) -> bool {
        self.by_object.contains_key(&object)
    }

    pub fn object_for(&self, key: &EntityKey) -> Option<ObjectId> {
        self.by_key.get(key).copied()
    }

    pub fn token_of(&self, object: ObjectId) -> Option<SubscriptionToken> {
        self.by_object.get(&object).map(|s| s.token)
    }

    /// Record a subscription and link it under its parent.
    ///
    /// Callers check [`Self::contains`] and [`Self::object_for`] first; a
    /// duplicate here replaces nothing and is handed back for release.
    pub fn insert(&mut self, subscription: Subscription) -> Option<Subscription> {
        let object = subscription.source.object_id();
        if self.by_object.contains_key(&object) || self.by_key.contains_key(&subscription.key) {
            return Some(subscription);
        }
        if let Some(parent) = subscription.parent.and_then(|p| self.by_object.get_mut(&p)) {
            parent.children.insert(object);
        }
        self.by_key.insert(subscription.key.clone(), object);
        self.by_object.insert(object, subscription);
        None
    }

    /// Remove `object` and all of its descendants, deepest first.
    ///
    /// The caller releases the returned subscriptions after dropping its
    /// borrow of the registry.
    pub fn remove_tree(&mut self, object: ObjectId) -> Vec<Subscription> {
        let Some(parent) = self.by_object.get(&object).map(|s| s.parent) else {
            return Vec::new();
        };
        if let Some(parent) = parent.and_then(|p| self.by_object.get_mut(&p)) {
            parent.children.remove(&object);
        }

        let mut order = vec![object];
        let mut cursor = 0;
        while let Some(current) = order.get(cursor).copied() {
            if let Some(sub) = self.by_object.get(&current) {
                order.extend(sub.children.iter().copied());
            }
            cursor += 1;
        }

        order
            .into_iter()
            .rev()
            .filter_map(|id| {
                let sub = self.by_object.remove(&id)?;
                self.by_key.remove(&sub.key);
                Some(sub)
            })
            .collect()
    }

    /// Root objects attached under `token`.
    pub fn roots_of(&self, token: SubscriptionToken) -> Vec<ObjectId> {
        self.by_object
            .iter()
            .filter(|(_, s)| s.token == token && s.parent.is_none())
            .map(|(id, _)| *id)
            .collect()
    }

    /// Every registered entity, roots included.
    pub fn keys(&self) -> impl Iterator<Item = &EntityKey> {
        self.by_key.keys()
    }

    /// Total handlers registered across all objects.
    pub fn handler_count(&self) -> usize {
        self.by_object.values().map(|s| s.handlers.len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use std::{
        cell::RefCell,
        collections::{BTreeMap, BTreeSet},
    };

    use proptest::prelude::*;

    use super::*;
    use crate::sdk::Handler;

    #[derive(Default)]
    struct Source {
        id: u64,
        offs: RefCell<Vec<HandlerId>>,
    }

    impl EventSource for Source {
        fn object_id(&self) -> ObjectId {
            ObjectId(self.id)
        }

        fn on(&self, _kind: EventKind, _handler: Handler) -> HandlerId {
            HandlerId(self.id)
        }

        fn off(&self, _kind: EventKind, id: HandlerId) {
            self.offs.borrow_mut().push(id);
        }
    }

    fn sub(id: u64, key: EntityKey, parent: Option<u64>) -> (Rc<Source>, Subscription) {
        let source = Rc::new(Source { id, ..Source::default() });
        let mut sub = Subscription::new(
            source.clone(),
            key,
            SubscriptionToken(1),
            parent.map(ObjectId),
            Rc::new(Cell::new(true)),
        );
        sub.handlers.push((EventKind::StateChanged, HandlerId(id)));
        (source, sub)
    }

    #[test]
    fn removing_a_call_removes_its_descendants() {
        let mut registry = ListenerRegistry::default();
        let call = CallId::from("c1");
        let user = ParticipantId::from("u1");

        let (_, agent) = sub(1, EntityKey::CallAgent(ObjectId(1)), None);
        let (_, call_sub) = sub(2, EntityKey::Call(call.clone()), Some(1));
        let (_, participant) = sub(3, EntityKey::Participant(call.clone(), user.clone()), Some(2));
        let (stream_source, stream) =
            sub(4, EntityKey::Stream(call.clone(), user, "s1".into()), Some(3));
        let alive = Rc::clone(&stream.alive);
        for s in [agent, call_sub, participant, stream] {
            assert!(registry.insert(s).is_none());
        }

        let removed = registry.remove_tree(ObjectId(2));
        let keys: Vec<_> = removed.iter().map(|s| s.source.object_id().0).collect();
        assert_eq!(keys, [4, 3, 2]);
        for s in removed {
            s.release();
        }

        assert!(!alive.get());
        assert_eq!(*stream_source.offs.borrow(), [HandlerId(4)]);
        assert_eq!(registry.keys().count(), 1);
        assert_eq!(registry.handler_count(), 1);
        assert!(registry.remove_tree(ObjectId(2)).is_empty());
    }

    #[test]
    fn duplicate_object_or_key_is_rejected() {
        let mut registry = ListenerRegistry::default();
        let (_, first) = sub(1, EntityKey::Call("c1".into()), None);
        let (_, same_object) = sub(1, EntityKey::Call("c2".into()), None);
        let (_, same_key) = sub(2, EntityKey::Call("c1".into()), None);

        assert!(registry.insert(first).is_none());
        assert!(registry.insert(same_object).is_some());
        assert!(registry.insert(same_key).is_some());
        assert_eq!(registry.roots_of(SubscriptionToken(1)), [ObjectId(1)]);
    }

    proptest! {
        /// Removing any object removes exactly its sub-tree.
        #[test]
        fn remove_tree_takes_exactly_the_subtree(
            parents in prop::collection::vec(any::<prop::sample::Index>(), 1..16),
            target in any::<prop::sample::Index>(),
        ) {
            // Object 1 is the root; object i + 2 hangs under one of 1..=i + 1.
            let parent_of: BTreeMap<u64, u64> = parents
                .iter()
                .enumerate()
                .map(|(i, pick)| (i as u64 + 2, pick.index(i + 1) as u64 + 1))
                .collect();
            let count = parents.len() as u64 + 1;

            let mut registry = ListenerRegistry::default();
            let (_, root) = sub(1, EntityKey::CallAgent(ObjectId(1)), None);
            registry.insert(root);
            for (&id, &parent) in &parent_of {
                let key = EntityKey::Call(CallId::new(format!("c{id}")));
                let (_, child) = sub(id, key, Some(parent));
                prop_assert!(registry.insert(child).is_none());
            }

            let target = target.index(count as usize) as u64 + 1;
            let mut expected = BTreeSet::from([target]);
            let mut grew = true;
            while grew {
                grew = false;
                for (&id, parent) in &parent_of {
                    if expected.contains(parent) && expected.insert(id) {
                        grew = true;
                    }
                }
            }

            let removed: BTreeSet<u64> = registry
                .remove_tree(ObjectId(target))
                .into_iter()
                .map(|s| s.source.object_id().0)
                .collect();
            prop_assert_eq!(&removed, &expected);
            prop_assert_eq!(registry.keys().count() as u64, count - expected.len() as u64);
            for id in 1..=count {
                prop_assert_eq!(registry.contains(ObjectId(id)), !expected.contains(&id));
            }
        }
    }
}
