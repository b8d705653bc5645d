//! # Ringmemo
//!
//! Ringmemo provides two small in-memory building blocks: a growable FIFO ring
//! buffer and a memoizing cache with hit/miss statistics.
//!
//! ## RingBuffer
//!
//! A [`RingBuffer`] is a first-in-first-out queue backed by a circular array. It
//! grows on demand, supports lazy bulk dequeue ([`RingBuffer::dequeue_n`],
//! [`RingBuffer::dequeue_until`]) and tracks a mutation version so that detached
//! [`Cursor`]s can detect modification.
//!
//! ## MemoCache
//!
//! A [`MemoCache`] computes the value of a key on first request and serves it from
//! its store afterwards. Values are produced by a [`Strategy`]: nothing, a function
//! of the key, or a [`Calculator`] that derives keys and values from inputs.
//! Keys whose computation yields no value can optionally be blacklisted. A
//! computation may also fail, the error is returned as [`CacheError::Compute`]
//! and nothing is remembered about the key.
//!
//! ## Concurrency
//!
//! Neither type synchronizes internally. Wrap them in a lock to share across threads.
//! A cache is `Send` only when its compute function or calculator is.

pub(crate) mod cache;
pub(crate) mod calculator;
pub(crate) mod ring;
pub(crate) mod stats;

#[cfg(test)]
pub(crate) mod oracle;

// Externally exposed types.
pub use cache::{CacheBuilder, CacheError, Compute, MemoCache, Strategy};
pub use calculator::Calculator;
pub use ring::{
    Cursor, DequeueN, DequeueUntil, GROWTH_FACTOR, IntoIter, Iter, MIN_GROWTH, RingBuffer,
    RingError, TRIM_THRESHOLD,
};
pub use stats::CacheStats;
