//! # Registry
//!
//! Bidirectional mapping between three coordinate spaces:
//!
//! - **key**: [`ResourceKey`], stable across processes
//! - **raw**: dense `u32` in `[0, N)`, assigned at [`Registry::generate_ids`]
//! - **entry**: the in-memory content object
//!
//! ## Lifecycle
//!
//! ```text
//!   register*  ──generate_ids──▶  frozen (raw IDs valid)  ──clear──▶  empty
//!       ▲                                                            │
//!       └────────────────────────────────────────────────────────────┘
//! ```
//!
//! Raw IDs belong to one generation. They must never be persisted and must
//! never be compared against raw IDs from another process or from before a
//! `clear`. The generation counter makes stale IDs detectable.

use std::collections::HashMap;
use std::hash::Hash;

use crate::error::{CoreError, CoreResult};
use crate::key::ResourceKey;

/// Session-local dense identifier.
pub type RawId = u32;

/// Back-mapping tables built by `generate_ids`.
struct RawTables<T> {
    raw_to_key: Vec<ResourceKey>,
    raw_to_entry: Vec<T>,
    key_to_raw: HashMap<ResourceKey, RawId>,
    entry_to_raw: HashMap<T, RawId>,
}

/// A name-addressed content table that mints raw IDs once loading finishes.
pub struct Registry<T> {
    name: String,
    pending: Vec<(ResourceKey, T)>,
    pending_keys: HashMap<ResourceKey, usize>,
    tables: Option<RawTables<T>>,
    generation: u64,
}

impl<T: Clone + Eq + Hash> Registry<T> {
    /// Creates an empty registry.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            pending: Vec::new(),
            pending_keys: HashMap::new(),
            tables: None,
            generation: 0,
        }
    }

    /// Returns the registry's name (used in sync frames and diagnostics).
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the number of registered entries.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Returns true if nothing is registered.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Returns true once raw IDs have been generated.
    #[inline]
    #[must_use]
    pub fn is_frozen(&self) -> bool {
        self.tables.is_some()
    }

    /// Returns how many times raw IDs have been generated.
    #[inline]
    #[must_use]
    pub const fn generation(&self) -> u64 {
        self.generation
    }

    /// Stores a pending `key -> entry` association.
    ///
    /// # Errors
    ///
    /// Fails if the key is already registered or the registry is frozen.
    pub fn register(&mut self, key: ResourceKey, entry: T) -> CoreResult<()> {
        if self.is_frozen() {
            return Err(CoreError::RegistryFrozen(self.name.clone()));
        }
        if self.pending_keys.contains_key(&key) {
            return Err(CoreError::DuplicateKey {
                registry: self.name.clone(),
                key,
            });
        }
        self.pending_keys.insert(key.clone(), self.pending.len());
        self.pending.push((key, entry));
        Ok(())
    }

    /// Assigns raw IDs in registration order and builds the lookup tables.
    ///
    /// Calling this again without `clear` rebuilds the same assignment and
    /// bumps the generation.
    pub fn generate_ids(&mut self) {
        let count = self.pending.len();
        let mut tables = RawTables {
            raw_to_key: Vec::with_capacity(count),
            raw_to_entry: Vec::with_capacity(count),
            key_to_raw: HashMap::with_capacity(count),
            entry_to_raw: HashMap::with_capacity(count),
        };

        for (raw, (key, entry)) in self.pending.iter().enumerate() {
            let raw = raw as RawId;
            tables.raw_to_key.push(key.clone());
            tables.raw_to_entry.push(entry.clone());
            tables.key_to_raw.insert(key.clone(), raw);
            // First registration wins if two keys share an equal entry.
            tables.entry_to_raw.entry(entry.clone()).or_insert(raw);
        }

        self.tables = Some(tables);
        self.generation += 1;
        tracing::debug!(
            registry = %self.name,
            entries = count,
            generation = self.generation,
            "generated raw ids"
        );
    }

    /// Moves a registered key to the head of the registration order so the
    /// next `generate_ids` gives it raw 0. Returns false if `key` is unknown.
    pub fn move_to_front(&mut self, key: &ResourceKey) -> bool {
        let Some(&index) = self.pending_keys.get(key) else {
            return false;
        };
        if index != 0 {
            let entry = self.pending.remove(index);
            self.pending.insert(0, entry);
            for (i, (k, _)) in self.pending.iter().enumerate().take(index + 1) {
                self.pending_keys.insert(k.clone(), i);
            }
        }
        true
    }

    /// Drops all entries and raw IDs.
    pub fn clear(&mut self) {
        self.pending.clear();
        self.pending_keys.clear();
        self.tables = None;
    }

    /// Looks up a pending or frozen entry by key.
    #[must_use]
    pub fn get(&self, key: &ResourceKey) -> Option<&T> {
        self.pending_keys.get(key).map(|&i| &self.pending[i].1)
    }

    /// Returns true if `raw` is valid in the current generation.
    #[inline]
    #[must_use]
    pub fn contains_raw(&self, raw: RawId) -> bool {
        self.tables
            .as_ref()
            .is_some_and(|t| (raw as usize) < t.raw_to_key.len())
    }

    /// raw -> key.
    #[must_use]
    pub fn raw_to_key(&self, raw: RawId) -> Option<&ResourceKey> {
        self.tables.as_ref()?.raw_to_key.get(raw as usize)
    }

    /// raw -> entry.
    #[must_use]
    pub fn raw_to_entry(&self, raw: RawId) -> Option<&T> {
        self.tables.as_ref()?.raw_to_entry.get(raw as usize)
    }

    /// key -> raw.
    #[must_use]
    pub fn key_to_raw(&self, key: &ResourceKey) -> Option<RawId> {
        self.tables.as_ref()?.key_to_raw.get(key).copied()
    }

    /// key -> entry, through the frozen tables.
    #[must_use]
    pub fn key_to_entry(&self, key: &ResourceKey) -> Option<&T> {
        let raw = self.key_to_raw(key)?;
        self.raw_to_entry(raw)
    }

    /// entry -> raw.
    #[must_use]
    pub fn entry_to_raw(&self, entry: &T) -> Option<RawId> {
        self.tables.as_ref()?.entry_to_raw.get(entry).copied()
    }

    /// entry -> key.
    #[must_use]
    pub fn entry_to_key(&self, entry: &T) -> Option<&ResourceKey> {
        let raw = self.entry_to_raw(entry)?;
        self.raw_to_key(raw)
    }

    /// key -> raw, failing with a diagnostic.
    ///
    /// # Errors
    ///
    /// Fails before `generate_ids` or when `key` is not registered.
    pub fn require_raw(&self, key: &ResourceKey) -> CoreResult<RawId> {
        if !self.is_frozen() {
            return Err(CoreError::RegistryNotFrozen(self.name.clone()));
        }
        self.key_to_raw(key).ok_or_else(|| CoreError::UnknownKey {
            registry: self.name.clone(),
            key: key.clone(),
        })
    }

    /// raw -> entry, failing with a diagnostic.
    ///
    /// # Errors
    ///
    /// Fails before `generate_ids` or when `raw` is out of range.
    pub fn require_entry(&self, raw: RawId) -> CoreResult<&T> {
        if !self.is_frozen() {
            return Err(CoreError::RegistryNotFrozen(self.name.clone()));
        }
        self.raw_to_entry(raw).ok_or_else(|| CoreError::UnknownRawId {
            registry: self.name.clone(),
            raw,
        })
    }

    /// Iterates `(raw, key, entry)` in raw order. Empty before `generate_ids`.
    pub fn iter(&self) -> impl Iterator<Item = (RawId, &ResourceKey, &T)> {
        self.tables.iter().flat_map(|t| {
            t.raw_to_key
                .iter()
                .zip(&t.raw_to_entry)
                .enumerate()
                .map(|(raw, (key, entry))| (raw as RawId, key, entry))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry_with(names: &[&str]) -> Registry<String> {
        let mut registry = Registry::new("test");
        for name in names {
            registry
                .register(ResourceKey::core(*name), (*name).to_owned())
                .unwrap();
        }
        registry
    }

    #[test]
    fn test_raw_ids_follow_insertion_order() {
        let mut registry = registry_with(&["air", "stone", "dirt", "grass"]);
        registry.generate_ids();

        for (expected, name) in ["air", "stone", "dirt", "grass"].iter().enumerate() {
            let key = ResourceKey::core(*name);
            assert_eq!(registry.key_to_raw(&key), Some(expected as RawId));
            assert_eq!(registry.raw_to_key(expected as RawId), Some(&key));
            assert_eq!(registry.raw_to_entry(expected as RawId).unwrap(), name);
        }
        assert!(!registry.contains_raw(4));
    }

    #[test]
    fn test_no_raw_ids_before_generation() {
        let registry = registry_with(&["air"]);
        assert!(!registry.is_frozen());
        assert_eq!(registry.key_to_raw(&ResourceKey::core("air")), None);
        assert!(registry.get(&ResourceKey::core("air")).is_some());
        assert!(matches!(
            registry.require_entry(0),
            Err(CoreError::RegistryNotFrozen(_))
        ));
    }

    #[test]
    fn test_stable_within_generation() {
        let mut registry = registry_with(&["air", "stone", "dirt"]);
        registry.generate_ids();
        let stone = "stone".to_owned();
        let raw = registry.entry_to_raw(&stone).unwrap();
        for _ in 0..1000 {
            assert_eq!(registry.entry_to_raw(&stone), Some(raw));
            assert_eq!(registry.raw_to_entry(raw), Some(&stone));
            assert_eq!(registry.entry_to_key(&stone), Some(&ResourceKey::core("stone")));
        }
    }

    #[test]
    fn test_duplicate_and_frozen() {
        let mut registry = registry_with(&["air"]);
        assert!(matches!(
            registry.register(ResourceKey::core("air"), "x".into()),
            Err(CoreError::DuplicateKey { .. })
        ));
        registry.generate_ids();
        assert!(matches!(
            registry.register(ResourceKey::core("new"), "new".into()),
            Err(CoreError::RegistryFrozen(_))
        ));
    }

    #[test]
    fn test_clear_starts_new_generation() {
        let mut registry = registry_with(&["air", "stone"]);
        registry.generate_ids();
        assert_eq!(registry.generation(), 1);

        registry.clear();
        assert!(registry.is_empty());
        assert!(!registry.contains_raw(0));

        registry.register(ResourceKey::core("stone"), "stone".into()).unwrap();
        registry.generate_ids();
        assert_eq!(registry.generation(), 2);
        assert_eq!(registry.key_to_raw(&ResourceKey::core("stone")), Some(0));
    }

    #[test]
    fn test_iter_in_raw_order() {
        let mut registry = registry_with(&["a", "b", "c"]);
        assert_eq!(registry.iter().count(), 0);
        registry.generate_ids();
        let names: Vec<_> = registry.iter().map(|(raw, _, e)| (raw, e.clone())).collect();
        assert_eq!(names, vec![(0, "a".into()), (1, "b".into()), (2, "c".into())]);
    }

    #[test]
    fn test_move_to_front_takes_raw_zero() {
        let mut registry = registry_with(&["stone", "dirt", "grass", "air"]);
        assert!(registry.move_to_front(&ResourceKey::core("air")));
        assert!(!registry.move_to_front(&ResourceKey::core("glass")));
        registry.generate_ids();

        let order: Vec<_> = registry.iter().map(|(raw, _, e)| (raw, e.clone())).collect();
        assert_eq!(
            order,
            vec![(0, "air".into()), (1, "stone".into()), (2, "dirt".into()), (3, "grass".into())]
        );
        assert!(registry.get(&ResourceKey::core("grass")).is_some());
    }
}
