//! Reference implementation of a FIFO queue using standard library primitives.

use std::collections::VecDeque;

/// A growable FIFO queue backed by [`VecDeque`].
///
/// Mirrors the observable behavior of [`crate::RingBuffer`], except for
/// capacity management, which is left to [`VecDeque`].
#[derive(Debug, Default)]
pub(crate) struct Oracle<T> {
    deque: VecDeque<T>,
}

impl<T: Copy + PartialEq> Oracle<T> {
    pub(crate) fn len(&self) -> usize {
        self.deque.len()
    }

    pub(crate) fn enqueue(&mut self, item: T) {
        self.deque.push_back(item);
    }

    pub(crate) fn enqueue_many(&mut self, items: impl IntoIterator<Item = T>) {
        self.deque.extend(items);
    }

    pub(crate) fn dequeue(&mut self) -> Option<T> {
        self.deque.pop_front()
    }

    /// Caller makes sure count <= self.len().
    pub(crate) fn dequeue_n(&mut self, count: usize) -> Vec<T> {
        self.deque.drain(..count).collect()
    }

    pub(crate) fn dequeue_until(&mut self, sentinel: &T) -> Vec<T> {
        // Sentinel is included in the drained items.
        let end = match self.deque.iter().position(|item| item == sentinel) {
            Some(index) => index + 1,
            None => self.deque.len(),
        };

        self.deque.drain(..end).collect()
    }

    pub(crate) fn peek(&self) -> Option<&T> {
        self.deque.front()
    }

    pub(crate) fn contains(&self, item: &T) -> bool {
        self.deque.contains(item)
    }

    pub(crate) fn clear(&mut self) {
        self.deque.clear();
    }

    pub(crate) fn to_vec(&self) -> Vec<T> {
        self.deque.iter().copied().collect()
    }
}
