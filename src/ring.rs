//! Definition of a growable ring buffer.

use log::debug;
use std::{cmp::max, iter::FusedIterator};
use thiserror::Error;

/// Minimum number of slots added when the ring buffer grows.
pub const MIN_GROWTH: usize = 4;

/// Multiplier applied to current capacity when the ring buffer grows.
pub const GROWTH_FACTOR: usize = 2;

/// Fraction of capacity below which [`RingBuffer::trim`] reallocates.
pub const TRIM_THRESHOLD: f64 = 0.9;

/// Different types of error that can happen when operating on a [`RingBuffer`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RingError {
    #[error("Ring buffer is empty")]
    Empty,

    #[error("Invalid argument `{0}`: {1}")]
    InvalidArgument(&'static str, String),

    #[error("Ring buffer modified during iteration. Expected version: {0}, Found: {1}")]
    ConcurrentModification(u64, u64),
}

/// A FIFO queue backed by a circular array that grows on demand.
///
/// Items are stored in `slots[(head + i) % capacity]` for `i` in `0..len`.
/// Unoccupied slots are always `None`, dequeued items are moved out of
/// their slot so the ring never holds on to stale items.
///
/// Every structural mutation (enqueue, dequeue, clear, resize) bumps a
/// version counter, which detached [`Cursor`]s use to detect that the
/// ring changed underneath them.
#[derive(Debug, Clone)]
pub struct RingBuffer<T> {
    // Backing memory, length of the slice is the capacity.
    slots: Box<[Option<T>]>,

    // Index of the oldest item, next to dequeue.
    head: usize,

    // Index of the next free slot, next to enqueue.
    tail: usize,

    // Number of items currently held in the ring buffer.
    length: usize,

    // Incremented on every structural mutation.
    version: u64,
}

impl<T> Default for RingBuffer<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> RingBuffer<T> {
    /// Create a new empty ring buffer with no allocated slots.
    ///
    /// The first enqueue allocates [`MIN_GROWTH`] slots.
    pub fn new() -> Self {
        Self {
            slots: alloc(0),
            head: 0,
            tail: 0,
            length: 0,
            version: 0,
        }
    }

    /// Create a new empty ring buffer with pre-allocated slots.
    ///
    /// # Errors
    ///
    /// * [`RingError::InvalidArgument`] if capacity == 0.
    ///
    /// # Arguments
    ///
    /// * `capacity` - Number of items the ring buffer can hold before it grows.
    pub fn with_capacity(capacity: usize) -> Result<Self, RingError> {
        if capacity == 0 {
            return Err(RingError::InvalidArgument(
                "capacity",
                format!("capacity [{capacity}] must be > 0"),
            ));
        }

        Ok(Self {
            slots: alloc(capacity),
            ..Self::new()
        })
    }

    /// Number of items currently held in the ring buffer.
    #[inline]
    pub fn len(&self) -> usize {
        self.length
    }

    /// Returns true if the ring buffer holds no items.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// Number of items the ring buffer can hold before it has to grow.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Number of items that can be enqueued without a reallocation.
    #[inline]
    pub fn space_remaining(&self) -> usize {
        self.capacity() - self.length
    }

    /// Current mutation version of the ring buffer.
    #[inline]
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Append an item to the back of the ring buffer.
    ///
    /// If the ring buffer is full, it is reallocated to the larger of
    /// `capacity + MIN_GROWTH` and `capacity * GROWTH_FACTOR` slots.
    ///
    /// # Arguments
    ///
    /// * `item` - Item to enqueue.
    pub fn enqueue(&mut self, item: T) {
        if self.length == self.capacity() {
            self.set_capacity(self.grown_capacity(1));
        }

        self.slots[self.tail] = Some(item);
        self.tail = (self.tail + 1) % self.capacity();
        self.length += 1;
        self.bump();
    }

    /// Append a batch of items to the back of the ring buffer.
    ///
    /// Equivalent to enqueueing items one at a time, except that the ring
    /// buffer grows at most once up front when the batch is known to overflow.
    ///
    /// # Arguments
    ///
    /// * `items` - Items to enqueue, oldest first.
    pub fn enqueue_many<I: IntoIterator<Item = T>>(&mut self, items: I) {
        let items = items.into_iter();

        // Reserve for the batch in one shot, iterator might under report though.
        let (additional, _) = items.size_hint();
        if additional > self.space_remaining() {
            self.set_capacity(self.grown_capacity(additional));
        }

        for item in items {
            self.enqueue(item);
        }
    }

    /// Remove and return the oldest item in the ring buffer.
    ///
    /// # Errors
    ///
    /// * [`RingError::Empty`] if there are no items to dequeue.
    pub fn dequeue(&mut self) -> Result<T, RingError> {
        if self.length == 0 {
            return Err(RingError::Empty);
        }

        // Move item out so the slot no longer references it.
        let item = self.slots[self.head].take().ok_or(RingError::Empty)?;
        self.head = (self.head + 1) % self.capacity();
        self.length -= 1;
        self.bump();

        Ok(item)
    }

    /// Lazily dequeue the next `count` items.
    ///
    /// Items are dequeued one at a time as the returned iterator is consumed.
    /// Dropping the iterator early leaves the remaining items in the ring buffer.
    ///
    /// # Errors
    ///
    /// * [`RingError::InvalidArgument`] if count > self.len().
    ///
    /// # Arguments
    ///
    /// * `count` - Number of items to dequeue.
    pub fn dequeue_n(&mut self, count: usize) -> Result<DequeueN<'_, T>, RingError> {
        if count > self.length {
            return Err(RingError::InvalidArgument(
                "count",
                format!(
                    "cannot dequeue more items [{count}] than currently queued [{}]",
                    self.length
                ),
            ));
        }

        Ok(DequeueN {
            ring: self,
            remaining: count,
        })
    }

    /// Return a reference to the oldest item without removing it.
    ///
    /// # Errors
    ///
    /// * [`RingError::Empty`] if there are no items to peek.
    pub fn peek(&self) -> Result<&T, RingError> {
        self.get(0).ok_or(RingError::Empty)
    }

    /// Return a reference to the item at a logical position, oldest is 0.
    ///
    /// # Arguments
    ///
    /// * `index` - Logical position of the item.
    pub fn get(&self, index: usize) -> Option<&T> {
        if index >= self.length {
            return None;
        }

        self.slots[(self.head + index) % self.capacity()].as_ref()
    }

    /// An iterator over all items currently in the ring buffer, oldest first.
    pub fn iter(&self) -> Iter<'_, T> {
        Iter {
            ring: self,
            index: 0,
        }
    }

    /// A detached iteration position stamped with the current version.
    ///
    /// Unlike [`RingBuffer::iter`], a cursor does not borrow the ring buffer,
    /// so it can outlive mutations. It reports them instead of yielding
    /// inconsistent items.
    pub fn cursor(&self) -> Cursor {
        Cursor {
            index: 0,
            version: self.version,
        }
    }

    /// Remove all items, keeping the allocated capacity.
    pub fn clear(&mut self) {
        for index in 0..self.length {
            let slot = (self.head + index) % self.capacity();
            self.slots[slot] = None;
        }

        self.head = 0;
        self.tail = 0;
        self.length = 0;
        self.bump();
    }

    /// Release unused capacity.
    ///
    /// If the ring buffer is less than [`TRIM_THRESHOLD`] full, storage is
    /// reallocated to exactly fit the items currently held.
    #[allow(clippy::cast_precision_loss)]
    #[allow(clippy::cast_possible_truncation)]
    #[allow(clippy::cast_sign_loss)]
    pub fn trim(&mut self) {
        let threshold = (self.capacity() as f64 * TRIM_THRESHOLD) as usize;
        if self.length >= threshold {
            return;
        }

        self.set_capacity(self.length);
    }

    /// Capacity to grow to so that `additional` more items fit.
    fn grown_capacity(&self, additional: usize) -> usize {
        let capacity = self.capacity();
        let grown = max(capacity + MIN_GROWTH, capacity * GROWTH_FACTOR);
        max(grown, self.length + additional)
    }

    /// Reallocate storage, moving items to the start of the new slots.
    ///
    /// # Invariants
    ///
    /// * capacity >= self.len()
    fn set_capacity(&mut self, capacity: usize) {
        let previous = self.capacity();
        let mut slots = alloc(capacity);

        // Linearize items so that the oldest lands in slot 0.
        for (index, slot) in slots.iter_mut().enumerate().take(self.length) {
            *slot = self.slots[(self.head + index) % previous].take();
        }

        self.slots = slots;
        self.head = 0;
        self.tail = if self.length == capacity { 0 } else { self.length };
        self.bump();

        debug!(
            "Ring buffer reallocated. Previous: {previous}, Capacity: {capacity}, Length: {}",
            self.length
        );
    }

    #[inline]
    fn bump(&mut self) {
        self.version = self.version.wrapping_add(1);
    }
}

impl<T: PartialEq> RingBuffer<T> {
    /// Returns true if an item equal to the given one is in the ring buffer.
    ///
    /// For rings holding [`Option`]s, `None` can be searched for like any other value.
    ///
    /// # Arguments
    ///
    /// * `item` - Item to search for.
    pub fn contains(&self, item: &T) -> bool {
        self.iter().any(|queued| queued == item)
    }

    /// Lazily dequeue items until one equal to `sentinel` has been dequeued.
    ///
    /// The matching item is yielded as the final item. If no item matches,
    /// the iterator drains the ring buffer and stops when it is empty.
    ///
    /// # Arguments
    ///
    /// * `sentinel` - Item that marks the end of the sequence.
    pub fn dequeue_until(&mut self, sentinel: T) -> DequeueUntil<'_, T> {
        DequeueUntil {
            ring: self,
            sentinel,
            done: false,
        }
    }
}

impl<T: Clone> RingBuffer<T> {
    /// Copy all items into a new [`Vec`], oldest first.
    pub fn to_vec(&self) -> Vec<T> {
        self.iter().cloned().collect()
    }

    /// Copy all items into a slice, oldest first, starting at `offset`.
    ///
    /// Returns the number of items copied.
    ///
    /// # Errors
    ///
    /// * [`RingError::InvalidArgument`] if offset > dst.len().
    /// * [`RingError::InvalidArgument`] if dst has less than self.len() slots after offset.
    ///
    /// # Arguments
    ///
    /// * `dst` - Destination to copy items into.
    /// * `offset` - Index in dst of the first copied item.
    pub fn copy_to_slice(&self, dst: &mut [T], offset: usize) -> Result<usize, RingError> {
        if offset > dst.len() {
            return Err(RingError::InvalidArgument(
                "offset",
                format!("offset [{offset}] must be in range [0, {}]", dst.len()),
            ));
        }

        let room = dst.len() - offset;
        if room < self.length {
            return Err(RingError::InvalidArgument(
                "dst",
                format!(
                    "slice length-offset < size [{}-{offset}<{}]",
                    dst.len(),
                    self.length
                ),
            ));
        }

        for (slot, item) in dst[offset..].iter_mut().zip(self.iter()) {
            slot.clone_from(item);
        }

        Ok(self.length)
    }
}

impl<T> FromIterator<T> for RingBuffer<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut ring = Self {
            slots: alloc(MIN_GROWTH),
            ..Self::new()
        };

        ring.enqueue_many(iter);
        ring
    }
}

impl<T> Extend<T> for RingBuffer<T> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        self.enqueue_many(iter);
    }
}

impl<'a, T> IntoIterator for &'a RingBuffer<T> {
    type Item = &'a T;
    type IntoIter = Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<T> IntoIterator for RingBuffer<T> {
    type Item = T;
    type IntoIter = IntoIter<T>;

    fn into_iter(self) -> Self::IntoIter {
        IntoIter(self)
    }
}

/// Borrowing iterator over the items of a [`RingBuffer`], oldest first.
#[derive(Debug, Clone)]
pub struct Iter<'a, T> {
    ring: &'a RingBuffer<T>,
    index: usize,
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<Self::Item> {
        let item = self.ring.get(self.index)?;
        self.index += 1;
        Some(item)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.ring.len() - self.index;
        (remaining, Some(remaining))
    }
}

impl<T> ExactSizeIterator for Iter<'_, T> {}

impl<T> FusedIterator for Iter<'_, T> {}

/// Owning iterator that drains a [`RingBuffer`], oldest first.
#[derive(Debug)]
pub struct IntoIter<T>(RingBuffer<T>);

impl<T> Iterator for IntoIter<T> {
    type Item = T;

    fn next(&mut self) -> Option<Self::Item> {
        self.0.dequeue().ok()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.0.len(), Some(self.0.len()))
    }
}

impl<T> ExactSizeIterator for IntoIter<T> {}

impl<T> FusedIterator for IntoIter<T> {}

/// Iterator returned from [`RingBuffer::dequeue_n`].
#[derive(Debug)]
pub struct DequeueN<'a, T> {
    ring: &'a mut RingBuffer<T>,
    remaining: usize,
}

impl<T> Iterator for DequeueN<'_, T> {
    type Item = T;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }

        self.remaining -= 1;
        self.ring.dequeue().ok()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<T> ExactSizeIterator for DequeueN<'_, T> {}

impl<T> FusedIterator for DequeueN<'_, T> {}

/// Iterator returned from [`RingBuffer::dequeue_until`].
#[derive(Debug)]
pub struct DequeueUntil<'a, T> {
    ring: &'a mut RingBuffer<T>,
    sentinel: T,
    done: bool,
}

impl<T: PartialEq> Iterator for DequeueUntil<'_, T> {
    type Item = T;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        // Ring buffer ran dry before the sentinel showed up.
        let Ok(item) = self.ring.dequeue() else {
            self.done = true;
            return None;
        };

        self.done = item == self.sentinel;
        Some(item)
    }
}

impl<T: PartialEq> FusedIterator for DequeueUntil<'_, T> {}

/// A detached, version-stamped position in a [`RingBuffer`].
///
/// Created with [`RingBuffer::cursor`]. Each step checks that the ring buffer
/// has not been structurally modified since the cursor was created.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cursor {
    index: usize,
    version: u64,
}

impl Cursor {
    /// Step to the next item of the ring buffer this cursor was created from.
    ///
    /// Returns `Ok(None)` once all items have been visited.
    ///
    /// # Errors
    ///
    /// * [`RingError::ConcurrentModification`] if the ring buffer was mutated
    ///   after this cursor was created.
    ///
    /// # Arguments
    ///
    /// * `ring` - Ring buffer this cursor was created from.
    pub fn advance<'a, T>(
        &mut self,
        ring: &'a RingBuffer<T>,
    ) -> Result<Option<&'a T>, RingError> {
        if ring.version() != self.version {
            return Err(RingError::ConcurrentModification(
                self.version,
                ring.version(),
            ));
        }

        let item = ring.get(self.index);
        if item.is_some() {
            self.index += 1;
        }

        Ok(item)
    }

    /// Number of items this cursor has already visited.
    pub fn position(&self) -> usize {
        self.index
    }
}

/// Allocate `capacity` empty slots.
fn alloc<T>(capacity: usize) -> Box<[Option<T>]> {
    std::iter::repeat_with(|| None).take(capacity).collect()
}
