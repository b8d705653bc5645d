//! Definition of a two stage key/value derivation used by derived caches.

/// Derives a cache key and a cache value from an input.
///
/// Deriving the key is expected to be cheap, deriving the value expensive.
/// A derived [`crate::MemoCache`] derives the key first and only derives
/// the value when the key is not cached yet, so repeated inputs that map to
/// the same key pay for the value only once.
pub trait Calculator<I, K, V> {
    /// Error returned when a value cannot be derived right now.
    ///
    /// Use [`std::convert::Infallible`] when deriving never fails.
    type Error;

    /// Cheaply derive the cache key for an input.
    ///
    /// # Arguments
    ///
    /// * `input` - Input to derive key from.
    fn key(&self, input: &I) -> K;

    /// Derive the value for an input, `None` when the input has no value.
    ///
    /// # Errors
    ///
    /// Any error that prevents deriving the value. Errors are handed back to
    /// the caller of the cache, the key is neither stored nor blacklisted.
    ///
    /// # Arguments
    ///
    /// * `input` - Input to derive value from.
    fn value(&mut self, input: &I) -> Result<Option<V>, Self::Error>;

    /// Reconstruct an input that derives the given key.
    ///
    /// Used when a value is requested by key rather than by input.
    ///
    /// # Arguments
    ///
    /// * `key` - Key to reconstruct input for.
    fn input(&self, key: &K) -> I;
}
