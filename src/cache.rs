//! Definition of a memoizing cache with hit/miss statistics.

use crate::{CacheStats, Calculator};
use log::{debug, trace};
use rustc_hash::{FxHashMap, FxHashSet};
use std::{
    collections::hash_map::{Iter, Keys, Values},
    convert::Infallible,
    fmt,
    hash::Hash,
};
use thiserror::Error;

/// Function invoked on a cache miss to compute the value of a key.
///
/// Returns `Ok(None)` when the key has no value and `Err` when the value
/// could not be computed right now.
pub type Compute<K, V, E = Infallible> = Box<dyn FnMut(&K) -> Result<Option<V>, E>>;

/// Different types of error that can happen when reading from [`MemoCache`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CacheError<E = Infallible> {
    #[error("Invalid argument `{0}`: {1}")]
    InvalidArgument(&'static str, String),

    #[error("Failed to compute value: {0}")]
    Compute(#[source] E),
}

/// How a [`MemoCache`] produces values for keys it has not seen yet.
pub enum Strategy<I, K, V, E = Infallible> {
    /// Nothing is computed, every miss resolves to no value.
    Absent,

    /// Value is computed straight from the key.
    Direct(Compute<K, V, E>),

    /// Key and value are derived from an input by a [`Calculator`].
    Derived(Box<dyn Calculator<I, K, V, Error = E>>),
}

impl<I, K, V, E> fmt::Debug for Strategy<I, K, V, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Absent => f.write_str("Absent"),
            Self::Direct(_) => f.write_str("Direct"),
            Self::Derived(_) => f.write_str("Derived"),
        }
    }
}

/// Stored values along with everything that is tracked about lookups.
struct Memo<K, V> {
    store: FxHashMap<K, V>,
    blacklist: Option<FxHashSet<K>>,
    stats: CacheStats,
}

impl<K: Hash + Eq, V> Memo<K, V> {
    fn is_blacklisted(&self, key: &K) -> bool {
        self.blacklist
            .as_ref()
            .is_some_and(|blacklist| blacklist.contains(key))
    }

    /// Look up a key, counting a hit or a miss.
    fn find(&mut self, key: &K) -> Option<&V> {
        let value = self.store.get(key);
        match value {
            Some(_) => self.stats.hits += 1,
            None => self.stats.misses += 1,
        }

        value
    }
}

impl<K: Hash + Eq, V: Clone> Memo<K, V> {
    fn lookup(&mut self, key: &K) -> Option<V> {
        self.find(key).cloned()
    }

    /// Record the outcome of a successful computation for a key.
    fn admit(&mut self, key: K, value: Option<V>) -> Option<V> {
        let Some(value) = value else {
            self.stats.not_found += 1;
            if let Some(blacklist) = self.blacklist.as_mut() {
                blacklist.insert(key);
                debug!(
                    "Key blacklisted after computation yielded no value. Blacklisted: {}",
                    blacklist.len()
                );
            }

            return None;
        };

        self.store.insert(key, value.clone());
        Some(value)
    }
}

/// A permanent memo table from keys to values.
///
/// Values are computed on first request of a key and served from the store
/// afterwards, there is no eviction. Every lookup that reaches the store is
/// counted as either a hit or a miss, and every computation that yields no
/// value is counted as not found.
///
/// When blacklisting is enabled, keys whose computation yields no value are
/// remembered and resolve to no value on later lookups without computing
/// again and without touching any counters.
///
/// A computation that fails with `E` is not a "no value" outcome. The error
/// is returned to the caller and nothing is stored or blacklisted, so the
/// next request for the key computes again.
pub struct MemoCache<K, V, I = K, E = Infallible> {
    memo: Memo<K, V>,
    strategy: Strategy<I, K, V, E>,
}

impl<K, V, I, E> fmt::Debug for MemoCache<K, V, I, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoCache")
            .field("entries", &self.memo.store.len())
            .field("strategy", &self.strategy)
            .field("blacklisted", &self.memo.blacklist.as_ref().map(FxHashSet::len))
            .field("stats", &self.memo.stats)
            .finish()
    }
}

impl<K: Hash + Eq, V> MemoCache<K, V> {
    /// Create a new cache that computes missing values with a function.
    ///
    /// # Arguments
    ///
    /// * `compute` - Computes the value of a key, `None` if key has no value.
    pub fn new<F>(compute: F) -> Self
    where
        F: FnMut(&K) -> Option<V> + 'static,
    {
        CacheBuilder::new().compute(compute).build()
    }

    /// Create a new cache without a compute function.
    ///
    /// Such a cache only serves values that were inserted directly.
    pub fn without_compute() -> Self {
        CacheBuilder::new().build()
    }

    /// Create a new cache that blacklists keys whose computation yields no value.
    ///
    /// # Arguments
    ///
    /// * `compute` - Computes the value of a key, `None` if key has no value.
    pub fn with_blacklist<F>(compute: F) -> Self
    where
        F: FnMut(&K) -> Option<V> + 'static,
    {
        CacheBuilder::new().compute(compute).blacklist(true).build()
    }

    /// Builder to configure a new cache.
    pub fn builder() -> CacheBuilder<K, V> {
        CacheBuilder::new()
    }
}

impl<K: Hash + Eq, V, E> MemoCache<K, V, K, E> {
    /// Create a new cache that computes missing values with a fallible function.
    ///
    /// # Arguments
    ///
    /// * `compute` - Computes the value of a key, `Ok(None)` if key has no value.
    pub fn try_new<F>(compute: F) -> Self
    where
        F: FnMut(&K) -> Result<Option<V>, E> + 'static,
    {
        CacheBuilder::new().try_compute(compute).build()
    }

    /// Create a new blacklisting cache with a fallible compute function.
    ///
    /// Only `Ok(None)` blacklists a key, errors never do.
    ///
    /// # Arguments
    ///
    /// * `compute` - Computes the value of a key, `Ok(None)` if key has no value.
    pub fn try_with_blacklist<F>(compute: F) -> Self
    where
        F: FnMut(&K) -> Result<Option<V>, E> + 'static,
    {
        CacheBuilder::new()
            .try_compute(compute)
            .blacklist(true)
            .build()
    }
}

impl<K: Hash + Eq, V, I, E> MemoCache<K, V, I, E> {
    /// Create a new cache that derives keys and values with a [`Calculator`].
    ///
    /// # Arguments
    ///
    /// * `calculator` - Derives keys and values from inputs.
    pub fn derived<C>(calculator: C) -> Self
    where
        C: Calculator<I, K, V, Error = E> + 'static,
    {
        CacheBuilder::new().calculator(calculator).build()
    }

    /// Create a new derived cache seeded with existing entries.
    ///
    /// # Arguments
    ///
    /// * `calculator` - Derives keys and values from inputs.
    /// * `store` - Entries the cache starts out with.
    pub fn derived_with_store<C, S>(calculator: C, store: S) -> Self
    where
        C: Calculator<I, K, V, Error = E> + 'static,
        S: IntoIterator<Item = (K, V)>,
    {
        CacheBuilder::new()
            .store(store)
            .calculator(calculator)
            .build()
    }

    /// Number of entries in the store.
    #[inline]
    pub fn len(&self) -> usize {
        self.memo.store.len()
    }

    /// Number of entries in the store, same as [`MemoCache::len`].
    #[inline]
    pub fn entries(&self) -> usize {
        self.len()
    }

    /// Returns true if the store has no entries.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.memo.store.is_empty()
    }

    /// Returns true if the cache has a way to compute missing values.
    pub fn has_compute(&self) -> bool {
        !matches!(self.strategy, Strategy::Absent)
    }

    /// Number of lookups answered from the store.
    pub fn hits(&self) -> u64 {
        self.memo.stats.hits
    }

    /// Number of lookups that did not find the key in the store.
    pub fn misses(&self) -> u64 {
        self.memo.stats.misses
    }

    /// Number of computations that produced no value.
    pub fn not_found(&self) -> u64 {
        self.memo.stats.not_found
    }

    /// Snapshot of all the counters.
    pub fn stats(&self) -> CacheStats {
        self.memo.stats
    }

    /// Returns true if the key has a value in the store.
    ///
    /// Blacklisted keys are never contained.
    pub fn contains_key(&self, key: &K) -> bool {
        self.memo.store.contains_key(key)
    }

    /// Returns true if the key has been blacklisted.
    pub fn is_blacklisted(&self, key: &K) -> bool {
        self.memo.is_blacklisted(key)
    }

    /// An iterator over blacklisted keys, in arbitrary order.
    pub fn blacklisted(&self) -> impl Iterator<Item = &K> {
        self.memo.blacklist.iter().flatten()
    }

    /// An iterator over cached keys, in arbitrary order.
    pub fn keys(&self) -> Keys<'_, K, V> {
        self.memo.store.keys()
    }

    /// An iterator over cached values, in arbitrary order.
    pub fn values(&self) -> Values<'_, K, V> {
        self.memo.store.values()
    }

    /// An iterator over cached entries, in arbitrary order.
    pub fn iter(&self) -> Iter<'_, K, V> {
        self.memo.store.iter()
    }

    /// Insert a value directly, bypassing computation.
    ///
    /// Returns the value previously stored for the key, if any.
    ///
    /// # Arguments
    ///
    /// * `key` - Key to store value under.
    /// * `value` - Value to store.
    pub fn insert(&mut self, key: K, value: V) -> Option<V> {
        self.memo.store.insert(key, value)
    }

    /// Look up a key in the store without ever computing a value.
    ///
    /// Counts a hit or a miss just like [`MemoCache::get`].
    ///
    /// # Arguments
    ///
    /// * `key` - Key to look up.
    pub fn try_get_value(&mut self, key: &K) -> Option<&V> {
        self.memo.find(key)
    }
}

impl<K: Hash + Eq, V: Clone, I, E> MemoCache<K, V, I, E> {
    /// Get the value of a key, computing and storing it on first request.
    ///
    /// Returns `Ok(None)` when the key has no value: the cache has no
    /// compute function, the computation yielded nothing or the key has
    /// been blacklisted.
    ///
    /// # Errors
    ///
    /// * [`CacheError::InvalidArgument`] if key is `None`.
    /// * [`CacheError::Compute`] if computing the value failed. The miss is
    ///   counted, the key is neither stored nor blacklisted.
    ///
    /// # Arguments
    ///
    /// * `key` - Key to get value for.
    pub fn get(&mut self, key: impl Into<Option<K>>) -> Result<Option<V>, CacheError<E>> {
        let Some(key) = key.into() else {
            return Err(CacheError::InvalidArgument(
                "key",
                "get requires a present key".to_string(),
            ));
        };

        // Blacklisted keys short circuit ahead of the counters.
        if self.memo.is_blacklisted(&key) {
            return Ok(None);
        }

        if let Some(value) = self.memo.lookup(&key) {
            return Ok(Some(value));
        }

        let value = match &mut self.strategy {
            Strategy::Absent => return Ok(None),
            Strategy::Direct(compute) => {
                trace!("Cache miss, computing value from key");
                compute(&key)
            }
            Strategy::Derived(calculator) => {
                trace!("Cache miss, computing value from reconstructed input");
                let input = calculator.input(&key);
                calculator.value(&input)
            }
        }
        .map_err(CacheError::Compute)?;

        Ok(self.memo.admit(key, value))
    }

    /// Get the value for an input of a derived cache.
    ///
    /// The key is derived from the input first, the value is only derived
    /// when the key is not in the store yet.
    ///
    /// # Errors
    ///
    /// * [`CacheError::InvalidArgument`] if input is `None`.
    /// * [`CacheError::InvalidArgument`] if the cache has no [`Calculator`].
    /// * [`CacheError::Compute`] if deriving the value failed.
    ///
    /// # Arguments
    ///
    /// * `input` - Input to derive key and value from.
    pub fn get_input(
        &mut self,
        input: impl Into<Option<I>>,
    ) -> Result<Option<V>, CacheError<E>> {
        let Some(input) = input.into() else {
            return Err(CacheError::InvalidArgument(
                "input",
                "get_input requires a present input".to_string(),
            ));
        };

        let Strategy::Derived(calculator) = &mut self.strategy else {
            return Err(CacheError::InvalidArgument(
                "input",
                "cache derives no keys without a calculator".to_string(),
            ));
        };

        // Cheap part of the derivation.
        let key = calculator.key(&input);
        if self.memo.is_blacklisted(&key) {
            return Ok(None);
        }

        if let Some(value) = self.memo.lookup(&key) {
            return Ok(Some(value));
        }

        // Expensive part of the derivation, only on a miss.
        trace!("Cache miss, computing value from input");
        let value = calculator.value(&input).map_err(CacheError::Compute)?;
        Ok(self.memo.admit(key, value))
    }
}

impl<'a, K, V, I, E> IntoIterator for &'a MemoCache<K, V, I, E> {
    type Item = (&'a K, &'a V);
    type IntoIter = Iter<'a, K, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.memo.store.iter()
    }
}

/// Configuration for a new [`MemoCache`].
///
/// Starts out with no compute strategy, no blacklist and an empty store.
/// Choosing a strategy fixes the input and error types of the cache.
pub struct CacheBuilder<K, V, I = K, E = Infallible> {
    strategy: Strategy<I, K, V, E>,
    blacklist: bool,
    capacity: usize,
    store: FxHashMap<K, V>,
}

impl<K: Hash + Eq, V> Default for CacheBuilder<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Hash + Eq, V> CacheBuilder<K, V> {
    /// Create a new builder with default configuration.
    pub fn new() -> Self {
        Self {
            strategy: Strategy::Absent,
            blacklist: false,
            capacity: 0,
            store: FxHashMap::default(),
        }
    }
}

impl<K: Hash + Eq, V, I, E> CacheBuilder<K, V, I, E> {
    /// Produce missing values with the given strategy.
    ///
    /// Replaces any previously configured strategy.
    ///
    /// # Arguments
    ///
    /// * `strategy` - How values for unseen keys are produced.
    pub fn strategy<J, X>(self, strategy: Strategy<J, K, V, X>) -> CacheBuilder<K, V, J, X> {
        CacheBuilder {
            strategy,
            blacklist: self.blacklist,
            capacity: self.capacity,
            store: self.store,
        }
    }

    /// Compute missing values straight from the key.
    ///
    /// Replaces any previously configured strategy.
    pub fn compute<F>(self, mut compute: F) -> Self
    where
        F: FnMut(&K) -> Option<V> + 'static,
    {
        self.strategy(Strategy::Direct(Box::new(
            move |key: &K| -> Result<Option<V>, E> { Ok(compute(key)) },
        )))
    }

    /// Compute missing values straight from the key with a fallible function.
    ///
    /// Replaces any previously configured strategy.
    pub fn try_compute<F, X>(self, compute: F) -> CacheBuilder<K, V, I, X>
    where
        F: FnMut(&K) -> Result<Option<V>, X> + 'static,
    {
        self.strategy(Strategy::Direct(Box::new(compute)))
    }

    /// Derive keys and missing values from inputs.
    ///
    /// Replaces any previously configured strategy.
    pub fn calculator<C, J>(self, calculator: C) -> CacheBuilder<K, V, J, C::Error>
    where
        C: Calculator<J, K, V> + 'static,
    {
        self.strategy(Strategy::Derived(Box::new(calculator)))
    }

    /// Remember keys whose computation yields no value.
    pub fn blacklist(mut self, enabled: bool) -> Self {
        self.blacklist = enabled;
        self
    }

    /// Number of entries to pre-allocate room for.
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Entries the cache starts out with.
    pub fn store<S: IntoIterator<Item = (K, V)>>(mut self, store: S) -> Self {
        self.store.extend(store);
        self
    }

    /// Build the configured cache.
    pub fn build(self) -> MemoCache<K, V, I, E> {
        let mut store = self.store;
        store.reserve(self.capacity.saturating_sub(store.len()));

        MemoCache {
            memo: Memo {
                store,
                blacklist: self.blacklist.then(FxHashSet::default),
                stats: CacheStats::default(),
            },
            strategy: self.strategy,
        }
    }
}
