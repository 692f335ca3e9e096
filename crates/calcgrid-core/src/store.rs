//! Dual-indexed sparse storage
//!
//! [`IndexedStore`] keeps every element reachable two ways: by a stable id
//! that is minted once and never reused, and by a volatile position that
//! shifts when slots are inserted or deleted in front of it. Sheets, rows
//! and cells are all stored this way, which lets formulas refer to cells by
//! id while users keep addressing them by position.

use ahash::AHashMap;

use crate::error::{Error, Result};

/// Stable identity of an element within its store
pub type Id = u64;

#[derive(Debug, Clone)]
struct Slot<T> {
    index: usize,
    value: T,
}

/// Sparse collection addressable by stable id and by volatile index
///
/// Structure:
/// - `slots[index]` holds the id occupying that position (or nothing)
/// - `entries[id]` holds the element together with its current position
///
/// The two maps are kept as mirror images: an id appears in `slots` exactly
/// at the position recorded in its entry. `slots` never ends in an empty
/// position, so `len()` is one past the highest occupied index.
#[derive(Debug, Clone)]
pub struct IndexedStore<T> {
    slots: Vec<Option<Id>>,
    entries: AHashMap<Id, Slot<T>>,
    next_id: Id,
    limit: usize,
}

impl<T> IndexedStore<T> {
    /// Create an empty store without a position limit
    pub fn new() -> Self {
        Self::with_limit(usize::MAX)
    }

    /// Create an empty store whose positions must stay below `limit`
    pub fn with_limit(limit: usize) -> Self {
        Self {
            slots: Vec::new(),
            entries: AHashMap::new(),
            next_id: 0,
            limit,
        }
    }

    /// Rebuild a store from persisted `(index, id, element)` triples
    pub fn from_parts(next_id: Id, elements: Vec<(usize, Id, T)>) -> Result<Self> {
        let mut store = Self::new();
        store.next_id = next_id;

        for (index, id, value) in elements {
            if id >= next_id {
                return Err(Error::IndexOutOfRange(format!(
                    "id {} was never minted (next id is {})",
                    id, next_id
                )));
            }
            if store.entries.contains_key(&id) {
                return Err(Error::InvalidArgument(format!("duplicate id {}", id)));
            }
            if store.id_of(index).is_some() {
                return Err(Error::InvalidArgument(format!("duplicate index {}", index)));
            }
            store.place(index, id, value);
        }

        Ok(store)
    }

    /// Highest position allowed plus one
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Change the position limit
    ///
    /// Fails if an element already sits at or beyond the new limit.
    pub fn set_limit(&mut self, limit: usize) -> Result<()> {
        if self.slots.len() > limit {
            return Err(Error::IndexOutOfRange(format!(
                "store already extends to index {} (limit {})",
                self.slots.len() - 1,
                limit
            )));
        }
        self.limit = limit;
        Ok(())
    }

    /// One past the highest occupied position
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Check if no element is stored
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of occupied positions
    pub fn count(&self) -> usize {
        self.entries.len()
    }

    /// The id the next created element will receive
    pub fn next_id(&self) -> Id {
        self.next_id
    }

    /// Id of the element at `index`, if any
    pub fn id_of(&self, index: usize) -> Option<Id> {
        self.slots.get(index).copied().flatten()
    }

    /// Current position of the element with `id`, if it still exists
    pub fn index_of(&self, id: Id) -> Option<usize> {
        self.entries.get(&id).map(|slot| slot.index)
    }

    /// Check if an element with `id` exists
    pub fn contains_id(&self, id: Id) -> bool {
        self.entries.contains_key(&id)
    }

    /// Get the element at `index`
    pub fn get_by_index(&self, index: usize) -> Option<&T> {
        self.id_of(index).and_then(|id| self.get_by_id(id))
    }

    /// Get the element at `index` mutably
    pub fn get_by_index_mut(&mut self, index: usize) -> Option<&mut T> {
        let id = self.id_of(index)?;
        self.get_by_id_mut(id)
    }

    /// Get the element with `id`
    pub fn get_by_id(&self, id: Id) -> Option<&T> {
        self.entries.get(&id).map(|slot| &slot.value)
    }

    /// Get the element with `id` mutably
    pub fn get_by_id_mut(&mut self, id: Id) -> Option<&mut T> {
        self.entries.get_mut(&id).map(|slot| &mut slot.value)
    }

    /// Return the element with `id`
    ///
    /// Elements can only be created by position, so an unknown id is an error.
    pub fn ensure_by_id(&mut self, id: Id) -> Result<&mut T> {
        self.get_by_id_mut(id)
            .ok_or_else(|| Error::IndexOutOfRange(format!("no element with id {}", id)))
    }

    /// Replace the element at `index`, creating the slot if needed
    ///
    /// An occupied slot keeps its id. Returns the id of the slot.
    pub fn set_by_index(&mut self, index: usize, value: T) -> Result<Id> {
        self.check_index(index)?;

        if let Some(id) = self.id_of(index) {
            if let Some(slot) = self.entries.get_mut(&id) {
                slot.value = value;
                return Ok(id);
            }
        }

        Ok(self.occupy(index, value))
    }

    /// Replace the element with `id`
    pub fn set_by_id(&mut self, id: Id, value: T) -> Result<()> {
        *self.ensure_by_id(id)? = value;
        Ok(())
    }

    /// Open a gap of `count` empty slots at `index`
    ///
    /// Elements at or after `index` keep their ids and move `count` positions
    /// up. Elements created in the gap later receive fresh ids.
    pub fn insert(&mut self, index: usize, count: usize) -> Result<()> {
        if count == 0 {
            return Err(Error::InvalidArgument("insert count must be positive".into()));
        }
        if index > self.slots.len() {
            return Err(Error::IndexOutOfRange(format!(
                "insert index {} beyond end {}",
                index,
                self.slots.len()
            )));
        }
        if index == self.slots.len() {
            // Nothing to shift
            return Ok(());
        }

        let new_len = self.slots.len().checked_add(count).unwrap_or(usize::MAX);
        if new_len > self.limit {
            return Err(Error::IndexOutOfRange(format!(
                "inserting {} at {} would move elements beyond limit {}",
                count, index, self.limit
            )));
        }

        self.slots
            .splice(index..index, std::iter::repeat(None).take(count));
        for slot in self.entries.values_mut() {
            if slot.index >= index {
                slot.index += count;
            }
        }

        Ok(())
    }

    /// Remove the `count` elements at `[index, index + count)`
    ///
    /// Their ids are discarded permanently. Elements above the range keep
    /// their ids and move down by `count`. Returns the removed elements in
    /// position order.
    pub fn delete(&mut self, index: usize, count: usize) -> Result<Vec<(Id, T)>> {
        if count == 0 {
            return Err(Error::InvalidArgument("delete count must be positive".into()));
        }
        let end = index
            .checked_add(count)
            .filter(|&end| end <= self.slots.len())
            .ok_or_else(|| {
                Error::IndexOutOfRange(format!(
                    "delete range {}..{} beyond end {}",
                    index,
                    index.saturating_add(count),
                    self.slots.len()
                ))
            })?;

        let removed_ids: Vec<Id> = self.slots.drain(index..end).flatten().collect();
        let removed = removed_ids
            .into_iter()
            .filter_map(|id| self.entries.remove(&id).map(|slot| (id, slot.value)))
            .collect();

        for slot in self.entries.values_mut() {
            if slot.index >= end {
                slot.index -= count;
            }
        }
        self.trim();

        Ok(removed)
    }

    /// Iterate over `(index, id, element)` in position order
    pub fn iter(&self) -> impl Iterator<Item = (usize, Id, &T)> {
        self.slots.iter().enumerate().filter_map(move |(index, id)| {
            let id = (*id)?;
            self.entries.get(&id).map(|slot| (index, id, &slot.value))
        })
    }

    /// Iterate over all elements mutably, in no particular order
    pub fn values_mut(&mut self) -> impl Iterator<Item = &mut T> {
        self.entries.values_mut().map(|slot| &mut slot.value)
    }

    fn check_index(&self, index: usize) -> Result<()> {
        if index >= self.limit {
            return Err(Error::IndexOutOfRange(format!(
                "index {} out of bounds (limit {})",
                index, self.limit
            )));
        }
        Ok(())
    }

    /// Mint an id for a new element at an empty position
    fn occupy(&mut self, index: usize, value: T) -> Id {
        let id = self.next_id;
        self.next_id += 1;
        self.place(index, id, value);
        id
    }

    fn place(&mut self, index: usize, id: Id, value: T) {
        if index >= self.slots.len() {
            self.slots.resize(index + 1, None);
        }
        self.slots[index] = Some(id);
        self.entries.insert(id, Slot { index, value });
    }

    fn trim(&mut self) {
        while matches!(self.slots.last(), Some(None)) {
            self.slots.pop();
        }
    }
}

impl<T: Default> IndexedStore<T> {
    /// Return the element at `index`, creating a default one if the slot is empty
    pub fn ensure_by_index(&mut self, index: usize) -> Result<&mut T> {
        self.check_index(index)?;

        let id = match self.id_of(index) {
            Some(id) => id,
            None => self.occupy(index, T::default()),
        };
        self.ensure_by_id(id)
    }
}

impl<T> Default for IndexedStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "serde")]
mod serde_impl {
    use super::{Id, IndexedStore};
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    #[derive(Serialize)]
    struct StoreRef<'a, T> {
        next_id: Id,
        elements: Vec<ElementRef<'a, T>>,
    }

    #[derive(Serialize)]
    struct ElementRef<'a, T> {
        index: usize,
        id: Id,
        value: &'a T,
    }

    #[derive(Deserialize)]
    struct StoreRepr<T> {
        next_id: Id,
        elements: Vec<ElementRepr<T>>,
    }

    #[derive(Deserialize)]
    struct ElementRepr<T> {
        index: usize,
        id: Id,
        value: T,
    }

    impl<T: Serialize> Serialize for IndexedStore<T> {
        fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
            StoreRef {
                next_id: self.next_id,
                elements: self
                    .iter()
                    .map(|(index, id, value)| ElementRef { index, id, value })
                    .collect(),
            }
            .serialize(serializer)
        }
    }

    impl<'de, T: Deserialize<'de>> Deserialize<'de> for IndexedStore<T> {
        fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
            let repr = StoreRepr::<T>::deserialize(deserializer)?;
            let elements = repr
                .elements
                .into_iter()
                .map(|e| (e.index, e.id, e.value))
                .collect();
            IndexedStore::from_parts(repr.next_id, elements).map_err(serde::de::Error::custom)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn mapping<T>(store: &IndexedStore<T>) -> Vec<(usize, Id)> {
        store.iter().map(|(index, id, _)| (index, id)).collect()
    }

    #[test]
    fn test_ensure_by_index_creates_default() {
        let mut store: IndexedStore<i32> = IndexedStore::new();

        assert_eq!(*store.ensure_by_index(3).unwrap(), 0);
        *store.ensure_by_index(3).unwrap() = 7;

        assert_eq!(store.len(), 4);
        assert_eq!(store.count(), 1);
        assert_eq!(store.get_by_index(3), Some(&7));
        assert_eq!(store.get_by_index(2), None);
    }

    #[test]
    fn test_ids_are_minted_in_creation_order() {
        let mut store: IndexedStore<i32> = IndexedStore::new();
        store.ensure_by_index(5).unwrap();
        store.ensure_by_index(1).unwrap();

        assert_eq!(store.id_of(5), Some(0));
        assert_eq!(store.id_of(1), Some(1));
        assert_eq!(store.index_of(0), Some(5));
        assert_eq!(store.next_id(), 2);
    }

    #[test]
    fn test_ensure_by_unknown_id_fails() {
        let mut store: IndexedStore<i32> = IndexedStore::new();
        assert!(matches!(
            store.ensure_by_id(0),
            Err(Error::IndexOutOfRange(_))
        ));
        assert!(matches!(
            store.set_by_id(4, 1),
            Err(Error::IndexOutOfRange(_))
        ));
    }

    #[test]
    fn test_set_by_index_keeps_id() {
        let mut store = IndexedStore::new();
        let id = store.set_by_index(2, "a").unwrap();
        let again = store.set_by_index(2, "b").unwrap();

        assert_eq!(id, again);
        assert_eq!(store.get_by_id(id), Some(&"b"));

        store.set_by_id(id, "c").unwrap();
        assert_eq!(store.get_by_index(2), Some(&"c"));
    }

    #[test]
    fn test_limit() {
        let mut store: IndexedStore<i32> = IndexedStore::with_limit(4);
        assert!(store.ensure_by_index(3).is_ok());
        assert!(matches!(
            store.ensure_by_index(4),
            Err(Error::IndexOutOfRange(_))
        ));
        assert!(store.insert(0, 1).is_err());
        assert!(store.set_limit(2).is_err());
    }

    #[test]
    fn test_insert_shifts_indices() {
        let mut store: IndexedStore<i32> = IndexedStore::new();
        for index in 0..3 {
            *store.ensure_by_index(index).unwrap() = index as i32;
        }

        store.insert(1, 2).unwrap();

        assert_eq!(mapping(&store), vec![(0, 0), (3, 1), (4, 2)]);
        assert_eq!(store.get_by_index(1), None);
        assert_eq!(store.get_by_index(3), Some(&1));

        // Gap slots get fresh ids
        store.ensure_by_index(1).unwrap();
        assert_eq!(store.id_of(1), Some(3));
    }

    #[test]
    fn test_insert_at_end_is_noop() {
        let mut store: IndexedStore<i32> = IndexedStore::new();
        store.ensure_by_index(0).unwrap();

        store.insert(1, 3).unwrap();
        assert_eq!(store.len(), 1);

        assert!(matches!(store.insert(2, 1), Err(Error::IndexOutOfRange(_))));
        assert!(matches!(store.insert(0, 0), Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn test_delete_discards_ids() {
        let mut store: IndexedStore<i32> = IndexedStore::new();
        for index in 0..5 {
            *store.ensure_by_index(index).unwrap() = index as i32 * 10;
        }

        let removed = store.delete(1, 2).unwrap();

        assert_eq!(removed, vec![(1, 10), (2, 20)]);
        assert_eq!(mapping(&store), vec![(0, 0), (1, 3), (2, 4)]);
        assert_eq!(store.get_by_id(1), None);
        assert_eq!(store.get_by_id(2), None);
        assert_eq!(store.get_by_id(4), Some(&40));

        // Deleted ids are never reused
        store.ensure_by_index(7).unwrap();
        assert_eq!(store.id_of(7), Some(5));
    }

    #[test]
    fn test_delete_out_of_range() {
        let mut store: IndexedStore<i32> = IndexedStore::new();
        store.ensure_by_index(2).unwrap();

        assert!(matches!(store.delete(2, 2), Err(Error::IndexOutOfRange(_))));
        assert!(matches!(
            store.delete(usize::MAX, 2),
            Err(Error::IndexOutOfRange(_))
        ));

        // Deleting the tail trims trailing empty slots
        store.delete(1, 2).unwrap();
        assert_eq!(store.len(), 0);
        assert!(store.is_empty());
    }

    #[test]
    fn test_from_parts_rejects_duplicates() {
        assert!(IndexedStore::from_parts(3, vec![(0, 0, 'a'), (1, 0, 'b')]).is_err());
        assert!(IndexedStore::from_parts(3, vec![(0, 0, 'a'), (0, 1, 'b')]).is_err());
        assert!(IndexedStore::from_parts(1, vec![(0, 1, 'a')]).is_err());

        let store = IndexedStore::from_parts(9, vec![(4, 2, 'a'), (0, 8, 'b')]).unwrap();
        assert_eq!(store.index_of(2), Some(4));
        assert_eq!(store.id_of(0), Some(8));
        assert_eq!(store.next_id(), 9);
    }

    fn populated(indices: &[usize]) -> IndexedStore<usize> {
        let mut store = IndexedStore::new();
        for &index in indices {
            *store.ensure_by_index(index).unwrap() = index;
        }
        store
    }

    proptest! {
        #[test]
        fn prop_id_index_bijection(indices in prop::collection::vec(0usize..64, 1..24)) {
            let store = populated(&indices);

            for &index in &indices {
                let id = store.id_of(index).unwrap();
                prop_assert_eq!(store.index_of(id), Some(index));
                prop_assert_eq!(store.id_of(store.index_of(id).unwrap()), Some(id));
            }
        }

        #[test]
        fn prop_insert_then_delete_restores_mapping(
            indices in prop::collection::vec(0usize..64, 1..24),
            at in 0usize..64,
            count in 1usize..8,
        ) {
            let mut store = populated(&indices);
            let at = at % store.len();
            let before = mapping(&store);

            store.insert(at, count).unwrap();
            let removed = store.delete(at, count).unwrap();

            prop_assert!(removed.is_empty());
            prop_assert_eq!(mapping(&store), before);
        }

        #[test]
        fn prop_delete_shifts_survivors(
            indices in prop::collection::vec(0usize..64, 1..24),
            at in 0usize..64,
            count in 1usize..8,
        ) {
            let mut store = populated(&indices);
            let len = store.len();
            let at = at % len;
            let count = count.min(len - at);
            let before = mapping(&store);

            store.delete(at, count).unwrap();

            for (index, id) in before {
                if index < at {
                    prop_assert_eq!(store.index_of(id), Some(index));
                } else if index < at + count {
                    prop_assert!(store.get_by_id(id).is_none());
                } else {
                    prop_assert_eq!(store.index_of(id), Some(index - count));
                    prop_assert_eq!(store.get_by_id(id), Some(&index));
                }
            }
        }
    }
}
