// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Name-keyed registry with dense numeric ids.
//!
//! Used for named engineering properties (materials, cross-sections) that
//! export formats address by number. Registering a second entity under an
//! existing name does not create anything: its referrers are folded into the
//! entity already registered under that name.

use std::cmp::Ordering;
use std::collections::hash_map::Entry;

use rustc_hash::FxHashMap;
use slotmap::Key;

use crate::entity::{union_referrers, Entity, NumberedEntity};
use crate::error::{Error, IdentityKey, Result};
use crate::keyed::KeyedRegistry;
use crate::properties::PropertyValue;

/// A [`KeyedRegistry`] sorted by name that owns numeric id assignment.
#[derive(Debug)]
pub struct NumericIdentityRegistry<K: Key, T> {
    inner: KeyedRegistry<K, T>,
    max_id: u32,
}

fn by_name<T: Entity>(a: &T, b: &T) -> Ordering {
    a.name()
        .cmp(&b.name())
        .then_with(|| a.guid().cmp(b.guid()))
}

impl<K: Key, T: NumberedEntity> NumericIdentityRegistry<K, T> {
    pub fn new() -> Self {
        Self {
            inner: KeyedRegistry::new(by_name::<T>),
            max_id: 0,
        }
    }

    /// Registers `item`, or merges it into the entity that already has its
    /// name.
    ///
    /// A fresh id (`max_id + 1`) is assigned when `item` has no id, id 0, or
    /// an id already taken. Returns the key of the registered entity, which is
    /// the pre-existing one on a name match.
    pub fn add(&mut self, mut item: T) -> Result<K> {
        let name = match item.name() {
            Some(n) if !n.is_empty() => n.to_string(),
            _ => {
                return Err(Error::InvalidIdentity(format!(
                    "entity {:?} has no name",
                    item.guid()
                )))
            }
        };

        if let Some(existing) = self.inner.key_by_name(&name) {
            if let Some(target) = self.inner.get_mut(existing) {
                let added = union_referrers(target.referrers_mut(), item.referrers());
                tracing::trace!(name = %name, added, "merged referrers into existing entity");
            }
            return Ok(existing);
        }

        let id = match item.numeric_id() {
            Some(id) if id != 0 && self.inner.key_by_numeric_id(id).is_none() => id,
            _ => self.next_id()?,
        };
        item.set_numeric_id(id);

        let key = self.inner.insert(item)?;
        self.max_id = self.max_id.max(id);
        Ok(key)
    }

    /// Reassigns ids `start, start + 1, ...` in name order.
    pub fn renumber(&mut self, start: u32) -> Result<()> {
        if start == 0 {
            return Err(Error::InvalidIdentity("numeric ids start at 1".into()));
        }
        let count = self.inner.len() as u32;
        if start.checked_add(count).is_none() {
            return Err(Error::InvalidIdentity(format!(
                "cannot number {count} entities from {start}"
            )));
        }

        let keys = self.inner.keys().to_vec();
        for (offset, key) in keys.into_iter().enumerate() {
            if let Some(item) = self.inner.get_mut(key) {
                item.set_numeric_id(start + offset as u32);
            }
        }
        self.inner.rebuild_indices();
        self.max_id = start - 1 + count;

        tracing::debug!(start, count, "renumbered named entities");
        Ok(())
    }

    /// Collapses entities whose `signature` is equal into one canonical
    /// entity per signature and returns how many were removed.
    ///
    /// The first entity of each group in name order is kept. Every referrer of
    /// a dropped duplicate is handed to `redirect(referrer, duplicate,
    /// canonical)` and added to the canonical entity's referrers. Ids of the
    /// survivors are left as they are; call [`Self::renumber`] to close gaps.
    pub fn merge_by_unique_properties<S, R>(&mut self, signature: S, mut redirect: R) -> usize
    where
        S: Fn(&T) -> PropertyValue,
        R: FnMut(&T::Referrer, K, K),
    {
        let mut canonical_by_signature: FxHashMap<PropertyValue, K> = FxHashMap::default();
        let mut duplicates: Vec<(K, K)> = Vec::new();

        for (key, item) in self.inner.iter() {
            match canonical_by_signature.entry(signature(item)) {
                Entry::Occupied(e) => duplicates.push((key, *e.get())),
                Entry::Vacant(e) => {
                    e.insert(key);
                }
            }
        }

        if duplicates.is_empty() {
            return 0;
        }

        for &(duplicate, canonical) in &duplicates {
            let moved = self
                .inner
                .get(duplicate)
                .map(|d| d.referrers().to_vec())
                .unwrap_or_default();
            for referrer in &moved {
                redirect(referrer, duplicate, canonical);
            }
            if let Some(target) = self.inner.get_mut(canonical) {
                union_referrers(target.referrers_mut(), &moved);
            }
        }

        let doomed: Vec<K> = duplicates.iter().map(|&(d, _)| d).collect();
        let removed = self.inner.remove_many(&doomed).map_or(0, |v| v.len());

        tracing::debug!(
            removed,
            remaining = self.inner.len(),
            "merged entities with identical properties"
        );
        removed
    }

    /// Removes the entity behind `key`. Its id is not reused until the next
    /// renumber.
    pub fn remove(&mut self, key: K) -> Result<T> {
        self.inner.remove(key)
    }

    /// Records that `referrer` depends on the entity behind `key`. Returns
    /// `false` if it was already recorded.
    pub fn add_referrer(&mut self, key: K, referrer: T::Referrer) -> Result<bool> {
        let item = self
            .inner
            .get_mut(key)
            .ok_or_else(|| Error::NotFound(IdentityKey::handle(key)))?;
        Ok(union_referrers(item.referrers_mut(), std::slice::from_ref(&referrer)) == 1)
    }

    pub fn referrers(&self, key: K) -> Option<&[T::Referrer]> {
        self.inner.get(key).map(|item| item.referrers())
    }

    pub fn get(&self, key: K) -> Option<&T> {
        self.inner.get(key)
    }

    pub fn get_by_id(&self, guid: &str) -> Option<&T> {
        self.inner.get_by_id(guid)
    }

    pub fn get_by_name(&self, name: &str) -> Option<&T> {
        self.inner.get_by_name(name)
    }

    pub fn get_by_numeric_id(&self, id: u32) -> Option<&T> {
        self.inner.get_by_numeric_id(id)
    }

    pub fn key_by_name(&self, name: &str) -> Option<K> {
        self.inner.key_by_name(name)
    }

    pub fn key_by_numeric_id(&self, id: u32) -> Option<K> {
        self.inner.key_by_numeric_id(id)
    }

    pub fn require_by_name(&self, name: &str) -> Result<&T> {
        self.inner.require_by_name(name)
    }

    pub fn contains(&self, item: &T) -> bool {
        self.inner.contains(item)
    }

    /// Entities in name order.
    pub fn iter(&self) -> impl Iterator<Item = (K, &T)> + '_ {
        self.inner.iter()
    }

    pub fn keys(&self) -> &[K] {
        self.inner.keys()
    }

    /// Highest id handed out so far.
    pub fn max_id(&self) -> u32 {
        self.max_id
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    fn next_id(&self) -> Result<u32> {
        self.max_id
            .checked_add(1)
            .ok_or_else(|| Error::InvalidIdentity("numeric id space exhausted".into()))
    }
}

impl<K: Key, T: NumberedEntity> Default for NumericIdentityRegistry<K, T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::{MaterialKey, MemberKey};
    use slotmap::SlotMap;

    #[derive(Debug, Clone)]
    struct Material {
        guid: String,
        name: String,
        id: Option<u32>,
        youngs_modulus: f64,
        stress_strain: Vec<f64>,
        refs: Vec<MemberKey>,
    }

    impl Material {
        fn new(name: &str, e: f64) -> Self {
            Self {
                guid: format!("guid-{name}"),
                name: name.to_string(),
                id: None,
                youngs_modulus: e,
                stress_strain: vec![0.0, 355.0e6],
                refs: Vec::new(),
            }
        }
    }

    impl Entity for Material {
        fn guid(&self) -> &str {
            &self.guid
        }
        fn name(&self) -> Option<&str> {
            Some(&self.name)
        }
        fn numeric_id(&self) -> Option<u32> {
            self.id
        }
    }

    impl NumberedEntity for Material {
        type Referrer = MemberKey;

        fn set_numeric_id(&mut self, id: u32) {
            self.id = Some(id);
        }
        fn referrers(&self) -> &[MemberKey] {
            &self.refs
        }
        fn referrers_mut(&mut self) -> &mut Vec<MemberKey> {
            &mut self.refs
        }
    }

    fn signature(m: &Material) -> PropertyValue {
        PropertyValue::List(vec![
            PropertyValue::Float(m.youngs_modulus),
            PropertyValue::floats(&m.stress_strain),
        ])
    }

    struct Beam {
        material: MaterialKey,
    }

    #[test]
    fn add_assigns_dense_ids() {
        let mut reg: NumericIdentityRegistry<MaterialKey, Material> = NumericIdentityRegistry::new();
        let a = reg.add(Material::new("S355", 210e9)).unwrap();
        let b = reg.add(Material::new("S235", 210e9)).unwrap();

        assert_eq!(reg.get(a).unwrap().id, Some(1));
        assert_eq!(reg.get(b).unwrap().id, Some(2));
        assert_eq!(reg.max_id(), 2);
        assert_eq!(reg.key_by_numeric_id(2), Some(b));
    }

    #[test]
    fn same_name_merges_referrers() {
        let mut members: SlotMap<MemberKey, ()> = SlotMap::with_key();
        let (m1, m2, m3) = (members.insert(()), members.insert(()), members.insert(()));

        let mut reg: NumericIdentityRegistry<MaterialKey, Material> = NumericIdentityRegistry::new();
        let mut first = Material::new("S355", 210e9);
        first.refs = vec![m1, m2];
        let key = reg.add(first).unwrap();

        let mut second = Material::new("S355", 1.0);
        second.guid = "another-guid".into();
        second.refs = vec![m3, m1];
        let again = reg.add(second).unwrap();

        assert_eq!(again, key);
        assert_eq!(reg.len(), 1);
        assert_eq!(reg.referrers(key).unwrap(), &[m1, m2, m3]);
        assert_eq!(reg.get(key).unwrap().youngs_modulus, 210e9);
        assert!(reg.get_by_id("another-guid").is_none());
    }

    #[test]
    fn missing_name_is_invalid() {
        let mut reg: NumericIdentityRegistry<MaterialKey, Material> = NumericIdentityRegistry::new();
        let err = reg.add(Material::new("", 1.0)).unwrap_err();
        assert!(matches!(err, Error::InvalidIdentity(_)));
        assert!(reg.is_empty());
        assert_eq!(reg.max_id(), 0);
    }

    #[test]
    fn supplied_ids_are_kept_unless_taken() {
        let mut reg: NumericIdentityRegistry<MaterialKey, Material> = NumericIdentityRegistry::new();

        let mut m = Material::new("A", 1.0);
        m.id = Some(10);
        let a = reg.add(m).unwrap();

        let mut m = Material::new("B", 2.0);
        m.id = Some(10);
        let b = reg.add(m).unwrap();

        let mut m = Material::new("C", 3.0);
        m.id = Some(0);
        let c = reg.add(m).unwrap();

        assert_eq!(reg.get(a).unwrap().id, Some(10));
        assert_eq!(reg.get(b).unwrap().id, Some(11));
        assert_eq!(reg.get(c).unwrap().id, Some(12));
    }

    #[test]
    fn duplicate_guid_fails_cleanly() {
        let mut reg: NumericIdentityRegistry<MaterialKey, Material> = NumericIdentityRegistry::new();
        reg.add(Material::new("A", 1.0)).unwrap();

        let mut clash = Material::new("B", 1.0);
        clash.guid = "guid-A".into();
        assert!(matches!(
            reg.add(clash),
            Err(Error::DuplicateIdentity(IdentityKey::Guid(_)))
        ));
        assert_eq!(reg.len(), 1);
        assert_eq!(reg.max_id(), 1);
    }

    #[test]
    fn renumber_follows_name_order() {
        let mut reg: NumericIdentityRegistry<MaterialKey, Material> = NumericIdentityRegistry::new();
        let c = reg.add(Material::new("C", 1.0)).unwrap();
        let a = reg.add(Material::new("A", 1.0)).unwrap();
        let b = reg.add(Material::new("B", 1.0)).unwrap();

        reg.renumber(1).unwrap();
        assert_eq!(reg.get(a).unwrap().id, Some(1));
        assert_eq!(reg.get(b).unwrap().id, Some(2));
        assert_eq!(reg.get(c).unwrap().id, Some(3));
        assert_eq!(reg.key_by_numeric_id(3), Some(c));
        assert_eq!(reg.max_id(), 3);

        let next = reg.add(Material::new("D", 1.0)).unwrap();
        assert_eq!(reg.get(next).unwrap().id, Some(4));

        assert!(matches!(reg.renumber(0), Err(Error::InvalidIdentity(_))));
    }

    #[test]
    fn merge_by_properties_redirects_referrers() {
        let mut beams: SlotMap<MemberKey, Beam> = SlotMap::with_key();
        let mut reg: NumericIdentityRegistry<MaterialKey, Material> = NumericIdentityRegistry::new();

        let steel = reg.add(Material::new("Steel", 210e9)).unwrap();
        let steel_copy = reg.add(Material::new("SteelCopy", 210e9)).unwrap();
        let alu = reg.add(Material::new("Aluminium", 70e9)).unwrap();

        let b1 = beams.insert(Beam { material: steel });
        let b2 = beams.insert(Beam { material: steel_copy });
        let b3 = beams.insert(Beam { material: alu });
        reg.add_referrer(steel, b1).unwrap();
        reg.add_referrer(steel_copy, b2).unwrap();
        reg.add_referrer(alu, b3).unwrap();

        let removed = reg.merge_by_unique_properties(signature, |&member, from, to| {
            let beam = &mut beams[member];
            assert_eq!(beam.material, from);
            beam.material = to;
        });

        assert_eq!(removed, 1);
        assert_eq!(reg.len(), 2);
        assert!(reg.get(steel_copy).is_none());
        assert_eq!(beams[b2].material, steel);
        assert_eq!(beams[b3].material, alu);
        assert_eq!(reg.referrers(steel).unwrap(), &[b1, b2]);
    }

    #[test]
    fn merge_compares_nested_sequences_by_value() {
        let mut reg: NumericIdentityRegistry<MaterialKey, Material> = NumericIdentityRegistry::new();
        reg.add(Material::new("A", 210e9)).unwrap();
        let mut b = Material::new("B", 210e9);
        b.stress_strain = vec![0.0, 235.0e6];
        reg.add(b).unwrap();
        let mut c = Material::new("C", 210e9);
        c.stress_strain = vec![0.0, 235.0e6];
        reg.add(c).unwrap();

        let removed = reg.merge_by_unique_properties(signature, |_, _, _| {});
        assert_eq!(removed, 1);
        assert!(reg.get_by_name("A").is_some());
        assert!(reg.get_by_name("B").is_some());
        assert!(reg.get_by_name("C").is_none());
    }

    #[test]
    fn add_referrer_on_stale_key() {
        let mut reg: NumericIdentityRegistry<MaterialKey, Material> = NumericIdentityRegistry::new();
        let key = reg.add(Material::new("A", 1.0)).unwrap();
        reg.remove(key).unwrap();

        let mut members: SlotMap<MemberKey, ()> = SlotMap::with_key();
        let m = members.insert(());
        assert!(matches!(reg.add_referrer(key, m), Err(Error::NotFound(_))));
    }
}
