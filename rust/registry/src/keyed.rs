// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Ordered, multi-indexed entity storage.
//!
//! [`KeyedRegistry`] owns its entities in a slot map and keeps three views
//! over them in step:
//!
//! - a backing sequence of keys sorted by a caller-supplied comparator,
//! - hash maps from guid, name and numeric id to key.
//!
//! Every mutation updates all views or none of them.

use std::cmp::Ordering;

use rustc_hash::{FxHashMap, FxHashSet};
use slotmap::{Key, SlotMap};

use crate::entity::Entity;
use crate::error::{Error, IdentityKey, Result};

/// Total order used to position entities in the backing sequence.
pub type Comparator<T> = fn(&T, &T) -> Ordering;

/// A sorted collection of entities with O(1) lookup by guid, name and
/// numeric id.
///
/// # Example
///
/// ```
/// use fem_lite_registry::{Entity, KeyedRegistry, MemberKey};
///
/// struct Beam { guid: String, name: String }
///
/// impl Entity for Beam {
///     fn guid(&self) -> &str { &self.guid }
///     fn name(&self) -> Option<&str> { Some(&self.name) }
/// }
///
/// let mut beams: KeyedRegistry<MemberKey, Beam> =
///     KeyedRegistry::new(|a, b| a.name.cmp(&b.name));
/// beams.insert(Beam { guid: "b2".into(), name: "bm2".into() }).unwrap();
/// beams.insert(Beam { guid: "b1".into(), name: "bm1".into() }).unwrap();
///
/// assert!(beams.get_by_name("bm1").is_some());
/// let names: Vec<_> = beams.iter().map(|(_, b)| b.name.as_str()).collect();
/// assert_eq!(names, ["bm1", "bm2"]);
/// ```
#[derive(Debug)]
pub struct KeyedRegistry<K: Key, T> {
    items: SlotMap<K, T>,
    order: Vec<K>,
    compare: Comparator<T>,
    by_guid: FxHashMap<String, K>,
    by_name: FxHashMap<String, K>,
    by_numeric_id: FxHashMap<u32, K>,
}

impl<K: Key, T: Entity> KeyedRegistry<K, T> {
    /// Creates an empty registry ordered by `compare`.
    pub fn new(compare: Comparator<T>) -> Self {
        Self {
            items: SlotMap::with_key(),
            order: Vec::new(),
            compare,
            by_guid: FxHashMap::default(),
            by_name: FxHashMap::default(),
            by_numeric_id: FxHashMap::default(),
        }
    }

    /// Inserts `item` at its sorted position and indexes all of its keys.
    ///
    /// Among entities that compare equal, the new one goes last. Fails with
    /// [`Error::DuplicateIdentity`] if any key of `item` is already taken, in
    /// which case nothing changes.
    pub fn insert(&mut self, item: T) -> Result<K> {
        self.check_vacant(&item)?;

        let position = self.upper_bound(&item);
        let guid = item.guid().to_string();
        let name = indexed_name(&item).map(str::to_string);
        let numeric_id = item.numeric_id();

        let key = self.items.insert(item);
        self.order.insert(position, key);
        self.by_guid.insert(guid, key);
        if let Some(name) = name {
            self.by_name.insert(name, key);
        }
        if let Some(id) = numeric_id {
            self.by_numeric_id.insert(id, key);
        }
        Ok(key)
    }

    /// Fails if any key of `item` is already registered.
    pub fn check_vacant(&self, item: &T) -> Result<()> {
        if self.by_guid.contains_key(item.guid()) {
            return Err(Error::DuplicateIdentity(IdentityKey::Guid(
                item.guid().to_string(),
            )));
        }
        if let Some(name) = indexed_name(item) {
            if self.by_name.contains_key(name) {
                return Err(Error::DuplicateIdentity(IdentityKey::Name(
                    name.to_string(),
                )));
            }
        }
        if let Some(id) = item.numeric_id() {
            if self.by_numeric_id.contains_key(&id) {
                return Err(Error::DuplicateIdentity(IdentityKey::NumericId(id)));
            }
        }
        Ok(())
    }

    /// Removes the entity at `position` in the sorted sequence.
    pub fn delete_at(&mut self, position: usize) -> Option<T> {
        let key = *self.order.get(position)?;
        self.order.remove(position);
        let item = self.items.remove(key)?;
        self.unindex(key, &item);
        Some(item)
    }

    /// Removes the entity behind `key`.
    pub fn remove(&mut self, key: K) -> Result<T> {
        let position = self
            .position(key)
            .ok_or_else(|| Error::NotFound(IdentityKey::handle(key)))?;
        self.delete_at(position)
            .ok_or_else(|| Error::NotFound(IdentityKey::handle(key)))
    }

    /// Removes every key in `keys` with one pass over the sequence.
    ///
    /// All keys must resolve; otherwise nothing is removed.
    pub fn remove_many(&mut self, keys: &[K]) -> Result<Vec<T>> {
        if let Some(&missing) = keys.iter().find(|&&k| !self.items.contains_key(k)) {
            return Err(Error::NotFound(IdentityKey::handle(missing)));
        }

        let doomed: FxHashSet<K> = keys.iter().copied().collect();
        self.order.retain(|k| !doomed.contains(k));

        let mut removed = Vec::with_capacity(doomed.len());
        for &key in keys {
            if let Some(item) = self.items.remove(key) {
                self.unindex(key, &item);
                removed.push(item);
            }
        }
        Ok(removed)
    }

    /// Returns the position of `key` in the sorted sequence.
    pub fn position(&self, key: K) -> Option<usize> {
        let item = self.items.get(key)?;
        let compare = self.compare;
        let start = self
            .order
            .partition_point(|&k| compare(&self.items[k], item) == Ordering::Less);
        self.order[start..]
            .iter()
            .position(|&k| k == key)
            .map(|offset| start + offset)
    }

    pub fn get(&self, key: K) -> Option<&T> {
        self.items.get(key)
    }

    /// Mutable access that bypasses the indices. Callers must not change a
    /// key field without calling [`Self::rebuild_indices`] afterwards.
    pub(crate) fn get_mut(&mut self, key: K) -> Option<&mut T> {
        self.items.get_mut(key)
    }

    pub fn get_by_id(&self, guid: &str) -> Option<&T> {
        self.key_by_id(guid).and_then(|k| self.items.get(k))
    }

    pub fn get_by_name(&self, name: &str) -> Option<&T> {
        self.key_by_name(name).and_then(|k| self.items.get(k))
    }

    pub fn get_by_numeric_id(&self, id: u32) -> Option<&T> {
        self.key_by_numeric_id(id).and_then(|k| self.items.get(k))
    }

    pub fn key_by_id(&self, guid: &str) -> Option<K> {
        self.by_guid.get(guid).copied()
    }

    pub fn key_by_name(&self, name: &str) -> Option<K> {
        self.by_name.get(name).copied()
    }

    pub fn key_by_numeric_id(&self, id: u32) -> Option<K> {
        self.by_numeric_id.get(&id).copied()
    }

    /// Like [`Self::get_by_id`], but a miss is an error.
    pub fn require_by_id(&self, guid: &str) -> Result<&T> {
        self.get_by_id(guid)
            .ok_or_else(|| Error::NotFound(IdentityKey::Guid(guid.to_string())))
    }

    /// Like [`Self::get_by_name`], but a miss is an error.
    pub fn require_by_name(&self, name: &str) -> Result<&T> {
        self.get_by_name(name)
            .ok_or_else(|| Error::NotFound(IdentityKey::Name(name.to_string())))
    }

    /// Returns `true` if an entity with the same guid as `item` is registered.
    pub fn contains(&self, item: &T) -> bool {
        self.by_guid.contains_key(item.guid())
    }

    pub fn contains_key(&self, key: K) -> bool {
        self.items.contains_key(key)
    }

    /// Keys in sorted order.
    pub fn keys(&self) -> &[K] {
        &self.order
    }

    /// Entities in sorted order.
    pub fn iter(&self) -> impl Iterator<Item = (K, &T)> + '_ {
        self.order.iter().map(move |&k| (k, &self.items[k]))
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn clear(&mut self) {
        self.items.clear();
        self.order.clear();
        self.by_guid.clear();
        self.by_name.clear();
        self.by_numeric_id.clear();
    }

    pub(crate) fn comparator(&self) -> Comparator<T> {
        self.compare
    }

    /// Re-sorts the sequence (stable) and rebuilds the name and numeric-id
    /// maps after entities were changed in place.
    pub(crate) fn rebuild_indices(&mut self) {
        let compare = self.compare;
        let items = &self.items;
        self.order.sort_by(|&a, &b| compare(&items[a], &items[b]));

        self.by_name.clear();
        self.by_numeric_id.clear();
        for &key in &self.order {
            let item = &self.items[key];
            if let Some(name) = indexed_name(item) {
                self.by_name.insert(name.to_string(), key);
            }
            if let Some(id) = item.numeric_id() {
                self.by_numeric_id.insert(id, key);
            }
        }
    }

    fn upper_bound(&self, item: &T) -> usize {
        let compare = self.compare;
        self.order
            .partition_point(|&k| compare(&self.items[k], item) != Ordering::Greater)
    }

    fn unindex(&mut self, key: K, item: &T) {
        if self.by_guid.get(item.guid()) == Some(&key) {
            self.by_guid.remove(item.guid());
        }
        if let Some(name) = indexed_name(item) {
            if self.by_name.get(name) == Some(&key) {
                self.by_name.remove(name);
            }
        }
        if let Some(id) = item.numeric_id() {
            if self.by_numeric_id.get(&id) == Some(&key) {
                self.by_numeric_id.remove(&id);
            }
        }
    }
}

impl<K: Key, T> std::ops::Index<K> for KeyedRegistry<K, T> {
    type Output = T;

    /// Panics if `key` does not resolve, like indexing a `SlotMap`.
    fn index(&self, key: K) -> &T {
        &self.items[key]
    }
}

/// Empty names are not indexed.
fn indexed_name<T: Entity>(item: &T) -> Option<&str> {
    item.name().filter(|n| !n.is_empty())
}
