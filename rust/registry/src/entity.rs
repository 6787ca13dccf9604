// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Identity traits implemented by registry entities.

use std::hash::Hash;

/// A uniquely identified domain object that can live in a registry.
///
/// The guid is mandatory. A name and a numeric id are optional; a registry
/// indexes whichever of them an entity reports.
pub trait Entity {
    /// Opaque unique identity key.
    fn guid(&self) -> &str;

    /// Unique human-readable name, if the entity has one.
    fn name(&self) -> Option<&str> {
        None
    }

    /// Dense numeric id, if one has been assigned.
    fn numeric_id(&self) -> Option<u32> {
        None
    }
}

/// An entity whose numeric id is owned by its registry and which keeps track
/// of the external entities that depend on it.
pub trait NumberedEntity: Entity {
    /// Handle type of the entities referring to this one.
    type Referrer: Clone + Eq + Hash;

    fn set_numeric_id(&mut self, id: u32);

    fn referrers(&self) -> &[Self::Referrer];

    fn referrers_mut(&mut self) -> &mut Vec<Self::Referrer>;
}

/// Appends every referrer of `incoming` not already in `target`, keeping
/// first-seen order.
pub(crate) fn union_referrers<R: Clone + Eq + Hash>(target: &mut Vec<R>, incoming: &[R]) -> usize {
    let mut seen: rustc_hash::FxHashSet<R> = target.iter().cloned().collect();
    let before = target.len();
    for r in incoming {
        if seen.insert(r.clone()) {
            target.push(r.clone());
        }
    }
    target.len() - before
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn union_keeps_order_and_skips_known() {
        let mut target = vec![3, 1];
        let added = union_referrers(&mut target, &[1, 4, 2, 4, 3]);
        assert_eq!(added, 2);
        assert_eq!(target, vec![3, 1, 4, 2]);
    }

    #[test]
    fn union_into_empty() {
        let mut target: Vec<u8> = Vec::new();
        union_referrers(&mut target, &[5, 5, 6]);
        assert_eq!(target, vec![5, 6]);
    }
}
