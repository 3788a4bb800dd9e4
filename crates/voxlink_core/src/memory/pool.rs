//! # Array Pool
//!
//! Reusable `u32` backing arrays for dense chunk storage.
//!
//! ## Contract
//!
//! Returned arrays are cached per length and handed out again **without
//! zeroing**. The type system carries that contract:
//!
//! - [`ArrayPool::rent`] yields a [`DirtyArray`], which exposes no reads.
//! - Only a full overwrite (`fill`, `fill_with`, `copy_from`, `read_from`)
//!   turns it into a readable [`PooledArray`].
//!
//! Dropping either handle returns its array to the pool.
//!
//! ## Thread Safety
//!
//! One coarse lock guards the free lists. Rent/return are called from the
//! network, simulation and render threads; each array is owned by exactly
//! one handle at a time, so no two callers can receive the same array.

use std::collections::HashMap;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::codec::WireReader;
use crate::error::CodecResult;

/// Pool counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Rents served from the free list.
    pub hits: u64,
    /// Rents that allocated.
    pub misses: u64,
    /// Arrays returned.
    pub returns: u64,
}

/// Size-keyed free lists of `u32` arrays.
///
/// Capacity is unbounded: a burst grows the pool and it never shrinks.
#[derive(Debug, Default)]
pub struct ArrayPool {
    free: Mutex<HashMap<usize, Vec<Box<[u32]>>>>,
    hits: AtomicU64,
    misses: AtomicU64,
    returns: AtomicU64,
}

impl ArrayPool {
    /// Creates an empty pool behind an `Arc`, ready to share.
    #[must_use]
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Rents an array of `len` elements with unspecified contents.
    #[must_use]
    pub fn rent(self: &Arc<Self>, len: usize) -> DirtyArray {
        let cached = self.free.lock().get_mut(&len).and_then(Vec::pop);
        let data = if let Some(data) = cached {
            self.hits.fetch_add(1, Ordering::Relaxed);
            data
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
            vec![0u32; len].into_boxed_slice()
        };
        DirtyArray {
            data,
            pool: Arc::clone(self),
        }
    }

    /// Rents an array with every element set to `value`.
    #[must_use]
    pub fn rent_filled(self: &Arc<Self>, len: usize, value: u32) -> PooledArray {
        self.rent(len).fill(value)
    }

    fn give_back(&self, data: Box<[u32]>) {
        if data.is_empty() {
            return;
        }
        self.returns.fetch_add(1, Ordering::Relaxed);
        self.free.lock().entry(data.len()).or_default().push(data);
    }

    /// Number of cached arrays of `len` elements.
    #[must_use]
    pub fn cached(&self, len: usize) -> usize {
        self.free.lock().get(&len).map_or(0, Vec::len)
    }

    /// Snapshot of the counters.
    #[must_use]
    pub fn stats(&self) -> PoolStats {
        PoolStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            returns: self.returns.load(Ordering::Relaxed),
        }
    }

    /// Drops every cached array.
    pub fn clear(&self) {
        self.free.lock().clear();
    }
}

/// A rented array that has not been written yet. Not readable.
pub struct DirtyArray {
    data: Box<[u32]>,
    pool: Arc<ArrayPool>,
}

impl DirtyArray {
    /// Number of elements.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns true for a zero-length array.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    fn into_written(mut self) -> PooledArray {
        PooledArray {
            data: std::mem::take(&mut self.data),
            pool: Arc::clone(&self.pool),
        }
    }

    /// Sets every element to `value`.
    #[must_use]
    pub fn fill(mut self, value: u32) -> PooledArray {
        self.data.fill(value);
        self.into_written()
    }

    /// Sets every element from its index.
    #[must_use]
    pub fn fill_with(mut self, mut f: impl FnMut(usize) -> u32) -> PooledArray {
        for (i, slot) in self.data.iter_mut().enumerate() {
            *slot = f(i);
        }
        self.into_written()
    }

    /// Copies `source` in.
    ///
    /// # Panics
    ///
    /// If `source` has a different length.
    #[must_use]
    pub fn copy_from(mut self, source: &[u32]) -> PooledArray {
        assert_eq!(source.len(), self.data.len(), "pooled array length mismatch");
        self.data.copy_from_slice(source);
        self.into_written()
    }

    /// Fills the array from wire data. On failure the array goes back to the pool.
    ///
    /// # Errors
    ///
    /// Fails on truncated input.
    pub fn read_from(mut self, reader: &mut WireReader) -> CodecResult<PooledArray> {
        reader.read_u32_into(&mut self.data)?;
        Ok(self.into_written())
    }
}

impl Drop for DirtyArray {
    fn drop(&mut self) {
        self.pool.give_back(std::mem::take(&mut self.data));
    }
}

/// A fully written rented array. Returns to its pool on drop.
pub struct PooledArray {
    data: Box<[u32]>,
    pool: Arc<ArrayPool>,
}

impl PooledArray {
    /// The pool this array returns to.
    #[must_use]
    pub fn pool(&self) -> &Arc<ArrayPool> {
        &self.pool
    }
}

impl Deref for PooledArray {
    type Target = [u32];

    fn deref(&self) -> &Self::Target {
        &self.data
    }
}

impl DerefMut for PooledArray {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.data
    }
}

impl Clone for PooledArray {
    /// Independent copy backed by another rented array.
    fn clone(&self) -> Self {
        self.pool.rent(self.data.len()).copy_from(&self.data)
    }
}

impl std::fmt::Debug for PooledArray {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PooledArray")
            .field("len", &self.data.len())
            .finish_non_exhaustive()
    }
}

impl Drop for PooledArray {
    fn drop(&mut self) {
        self.pool.give_back(std::mem::take(&mut self.data));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_reuse_after_drop() {
        let pool = ArrayPool::shared();
        let first = pool.rent_filled(64, 7);
        let ptr = first.as_ptr();
        drop(first);
        assert_eq!(pool.cached(64), 1);

        let second = pool.rent(64);
        assert_eq!(pool.cached(64), 0);
        let second = second.fill(1);
        assert_eq!(second.as_ptr(), ptr);
        assert!(second.iter().all(|&v| v == 1));
        assert_eq!(pool.stats(), PoolStats { hits: 1, misses: 1, returns: 1 });
    }

    #[test]
    fn test_keyed_by_length() {
        let pool = ArrayPool::shared();
        drop(pool.rent_filled(16, 0));
        let other = pool.rent(32);
        assert_eq!(other.len(), 32);
        assert_eq!(pool.cached(16), 1);
    }

    #[test]
    fn test_clone_is_independent() {
        let pool = ArrayPool::shared();
        let mut original = pool.rent_filled(8, 3);
        let copy = original.clone();
        original[0] = 9;
        assert_eq!(copy[0], 3);
        assert_ne!(copy.as_ptr(), original.as_ptr());
    }

    #[test]
    fn test_failed_read_returns_array() {
        let pool = ArrayPool::shared();
        let mut reader = WireReader::new();
        reader.load_data(&[0u8; 10]);
        assert!(pool.rent(4).read_from(&mut reader).is_err());
        assert_eq!(pool.cached(4), 1);
    }

    #[test]
    fn test_concurrent_rent_never_shares() {
        let pool = ArrayPool::shared();
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let pool = Arc::clone(&pool);
                std::thread::spawn(move || {
                    for i in 0..500u32 {
                        let mut array = pool.rent_filled(32, t);
                        array[0] = i;
                        assert!(array[1..].iter().all(|&v| v == t));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        // Everything came back exactly once.
        let stats = pool.stats();
        assert_eq!(stats.returns, stats.hits + stats.misses);
        let held: Vec<_> = (0..pool.cached(32)).map(|_| pool.rent(32)).collect();
        let unique: HashSet<_> = held.iter().map(|a| a.data.as_ptr() as usize).collect();
        assert_eq!(unique.len(), held.len());
    }
}
