//! Memoization primitives.
//!
//! A [`Selector`] splits a view-model into two steps: cheap extractors that
//! pull inputs out of the snapshot, and a combiner that builds the output from
//! them. The combiner runs only when some input differs from the previous
//! call by [`Identity`]. Because reducers share every unchanged branch, an
//! `Arc` input that is pointer-equal is guaranteed to be value-equal.
//!
//! Selectors hold their own cache. Each constructor call returns an
//! independent instance; subscribers that need one instance per key (one
//! tile per participant) keep them in a [`MemoTable`].

use std::{collections::BTreeMap, fmt, sync::Arc};

use chrono::{DateTime, Utc};
use switchboard_core::{
    CallId, CommunicationIdentifier, MessageId, ParticipantId, Snapshot, StreamId, ThreadId,
    state::{CallEndReason, CallStatus, DeviceAccess},
};
use tracing::trace;

/// "Same input" test used to decide whether to recompute.
pub trait Identity {
    /// `other` is interchangeable with `self` as a selector input.
    fn same(&self, other: &Self) -> bool;
}

impl<T: ?Sized> Identity for Arc<T> {
    fn same(&self, other: &Self) -> bool {
        Arc::ptr_eq(self, other)
    }
}

impl<T: Identity> Identity for Option<T> {
    fn same(&self, other: &Self) -> bool {
        match (self, other) {
            (Some(a), Some(b)) => a.same(b),
            (None, None) => true,
            _ => false,
        }
    }
}

macro_rules! identity_by_value {
    ($($ty:ty),* $(,)?) => {
        $(
            impl Identity for $ty {
                fn same(&self, other: &Self) -> bool {
                    self == other
                }
            }
        )*
    };
}

identity_by_value!(
    bool,
    u32,
    u64,
    usize,
    String,
    DateTime<Utc>,
    CallId,
    ParticipantId,
    StreamId,
    ThreadId,
    MessageId,
    CommunicationIdentifier,
    CallStatus,
    CallEndReason,
    DeviceAccess,
);

macro_rules! identity_for_tuple {
    ($($name:ident : $idx:tt),+) => {
        impl<$($name: Identity),+> Identity for ($($name,)+) {
            fn same(&self, other: &Self) -> bool {
                $(self.$idx.same(&other.$idx))&&+
            }
        }
    };
}

identity_for_tuple!(A: 0);
identity_for_tuple!(A: 0, B: 1);
identity_for_tuple!(A: 0, B: 1, C: 2);
identity_for_tuple!(A: 0, B: 1, C: 2, D: 3);
identity_for_tuple!(A: 0, B: 1, C: 2, D: 3, E: 4);
identity_for_tuple!(A: 0, B: 1, C: 2, D: 3, E: 4, F: 5);

/// Last inputs and the output computed from them.
pub struct Memo<I, O> {
    last: Option<(I, Arc<O>)>,
    recomputations: u64,
    equal: Option<fn(&O, &O) -> bool>,
}

impl<I: Identity, O> Memo<I, O> {
    /// Empty cache.
    pub const fn new() -> Self {
        Self { last: None, recomputations: 0, equal: None }
    }

    /// Cached output if `input` is the same as last time, else `compute`.
    pub fn get_or_compute(&mut self, input: I, compute: impl FnOnce(&I) -> O) -> Arc<O> {
        if let Some((last, output)) = &self.last
            && last.same(&input)
        {
            return Arc::clone(output);
        }
        let computed = compute(&input);
        self.recomputations += 1;
        let output = match (&self.last, self.equal) {
            (Some((_, previous)), Some(equal)) if equal(previous, &computed) => {
                Arc::clone(previous)
            },
            _ => Arc::new(computed),
        };
        self.last = Some((input, Arc::clone(&output)));
        output
    }

    /// How many times the output has been computed.
    pub fn recomputations(&self) -> u64 {
        self.recomputations
    }

    /// Drop the cached value.
    pub fn clear(&mut self) {
        self.last = None;
    }
}

impl<I: Identity, O: PartialEq> Memo<I, O> {
    /// Empty cache that keeps handing out the previous output while a
    /// recomputation yields an equal value.
    pub fn reusing_equal() -> Self {
        Self { equal: Some(O::eq), ..Self::new() }
    }
}

impl<I: Identity, O> Default for Memo<I, O> {
    fn default() -> Self {
        Self::new()
    }
}

impl<I, O> fmt::Debug for Memo<I, O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Memo")
            .field("cached", &self.last.is_some())
            .field("recomputations", &self.recomputations)
            .finish()
    }
}

/// Extractors composed with a memoized combiner.
pub struct Selector<P, I, O> {
    name: &'static str,
    extract: fn(&Snapshot, &P) -> I,
    combine: fn(&I) -> O,
    memo: Memo<I, O>,
}

impl<P, I: Identity, O> Selector<P, I, O> {
    /// Selector named `name` for logs.
    pub const fn new(
        name: &'static str,
        extract: fn(&Snapshot, &P) -> I,
        combine: fn(&I) -> O,
    ) -> Self {
        Self { name, extract, combine, memo: Memo::new() }
    }

    /// View-model for `state`. Pointer-equal to the previous result when no
    /// input changed.
    pub fn select(&mut self, state: &Snapshot, props: &P) -> Arc<O> {
        let input = (self.extract)(state, props);
        let combine = self.combine;
        let before = self.memo.recomputations();
        let output = self.memo.get_or_compute(input, combine);
        if self.memo.recomputations() != before {
            trace!(selector = self.name, recomputations = self.memo.recomputations(), "recomputed");
        }
        output
    }

    /// How many times the combiner has run.
    pub fn recomputations(&self) -> u64 {
        self.memo.recomputations()
    }
}

impl<P, I: Identity, O: PartialEq> Selector<P, I, O> {
    /// Return the previous view-model when a recomputation produces an equal
    /// one. For inputs that change more often than the output, like a clock.
    #[must_use]
    pub fn reusing_equal_output(self) -> Self {
        Self { memo: Memo::reusing_equal(), ..self }
    }
}

impl<P, I, O> fmt::Debug for Selector<P, I, O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Selector").field("name", &self.name).field("memo", &self.memo).finish()
    }
}

/// Per-key selector instances.
///
/// Entries live until [`MemoTable::release`]d; nothing is evicted
/// implicitly.
pub struct MemoTable<K, S> {
    make: fn() -> S,
    entries: BTreeMap<K, S>,
}

impl<K: Ord, S> MemoTable<K, S> {
    /// Table creating entries with `make`.
    pub const fn new(make: fn() -> S) -> Self {
        Self { make, entries: BTreeMap::new() }
    }

    /// Instance for `key`, created on first use.
    pub fn get(&mut self, key: K) -> &mut S {
        self.entries.entry(key).or_insert_with(self.make)
    }

    /// Drop the instance for `key`. Returns whether there was one.
    pub fn release(&mut self, key: &K) -> bool {
        self.entries.remove(key).is_some()
    }

    /// Keep only the keys `keep` accepts.
    pub fn retain(&mut self, mut keep: impl FnMut(&K) -> bool) {
        self.entries.retain(|k, _| keep(k));
    }

    /// Live instances.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// No live instances.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: fmt::Debug, S> fmt::Debug for MemoTable<K, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.entries.keys()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arc_identity_is_pointer_equality() {
        let a = Arc::new(vec![1]);
        let b = Arc::new(vec![1]);
        assert!(a.same(&Arc::clone(&a)));
        assert!(!a.same(&b));
        assert!((Some(Arc::clone(&a)), true).same(&(Some(a), true)));
    }

    #[test]
    fn memo_recomputes_only_on_new_input() {
        let mut memo: Memo<(Arc<u32>, bool), u32> = Memo::new();
        let input = Arc::new(2);

        let first = memo.get_or_compute((Arc::clone(&input), true), |(n, _)| **n * 10);
        let second = memo.get_or_compute((Arc::clone(&input), true), |_| unreachable!());
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(memo.recomputations(), 1);

        let third = memo.get_or_compute((input, false), |(n, _)| **n);
        assert_eq!(*third, 2);
        assert_eq!(memo.recomputations(), 2);
    }

    #[test]
    fn equal_recomputation_reuses_the_previous_output() {
        let mut memo: Memo<u32, bool> = Memo::reusing_equal();
        let first = memo.get_or_compute(1, |n| *n < 10);
        let second = memo.get_or_compute(2, |n| *n < 10);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(memo.recomputations(), 2);

        let third = memo.get_or_compute(11, |n| *n < 10);
        assert!(!*third);
    }

    #[test]
    fn table_entries_are_independent_until_released() {
        let mut table: MemoTable<u32, Memo<bool, bool>> = MemoTable::new(Memo::new);
        table.get(1).get_or_compute(true, |b| *b);
        table.get(2).get_or_compute(true, |b| *b);
        assert_eq!(table.get(1).recomputations(), 1);
        assert_eq!(table.len(), 2);

        assert!(table.release(&1));
        assert!(!table.release(&1));
        assert_eq!(table.get(1).recomputations(), 0);

        table.retain(|k| *k != 2);
        assert_eq!(table.len(), 1);
    }
}
