use std::collections::{HashSet, VecDeque};
use std::hash::Hash;

/// An insertion-ordered set with FIFO pop.
///
/// Pushing a value that is already queued is a no-op, so a value appears at
/// most once. Values only ever leave from the head, which lets a plain
/// [`VecDeque`] carry the order while a [`HashSet`] answers membership; both
/// operations are O(1) expected.
///
/// The queue itself is not synchronized. Shared queues live behind a mutex in
/// [`JobQueues`](crate::JobQueues).
#[derive(Debug, Clone)]
pub struct DedupQueue<T> {
    order: VecDeque<T>,
    members: HashSet<T>,
}

impl<T> Default for DedupQueue<T> {
    fn default() -> Self {
        Self {
            order: VecDeque::new(),
            members: HashSet::new(),
        }
    }
}

impl<T> DedupQueue<T>
where
    T: Hash + Eq + Clone,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `value` at the tail unless it is already queued.
    ///
    /// Returns `true` if the value was added.
    pub fn push(&mut self, value: T) -> bool {
        if !self.members.insert(value.clone()) {
            return false;
        }
        self.order.push_back(value);
        true
    }

    /// Removes and returns the oldest queued value, or `None` when empty.
    pub fn pop(&mut self) -> Option<T> {
        let value = self.order.pop_front()?;
        self.members.remove(&value);
        Some(value)
    }

    pub fn contains(&self, value: &T) -> bool {
        self.members.contains(value)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Queued values, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.order.iter()
    }
}

impl<T> Extend<T> for DedupQueue<T>
where
    T: Hash + Eq + Clone,
{
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        for value in iter {
            self.push(value);
        }
    }
}
