// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Handle types for registry-owned entities.
//!
//! Registries own their entities; everything else in a model holds one of
//! these keys. Keys are created by `slotmap::SlotMap` and are generational:
//! once an entity is removed or merged away its key stops resolving, even if
//! the slot is later reused.

use slotmap::new_key_type;

new_key_type! {
    /// Key for a node (point entity) in a [`Nodes`](crate::Nodes) index.
    pub struct NodeKey;

    /// Key for a material in a named-property registry.
    pub struct MaterialKey;

    /// Key for a cross-section in a named-property registry.
    pub struct SectionKey;

    /// Key for a structural member (beam, plate, ...) owned by the caller.
    pub struct MemberKey;
}

/// A key that can reference any kind of model entity.
///
/// Used as the referrer type of named properties: a material is referenced by
/// sections and members, a section by members.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityRef {
    Node(NodeKey),
    Material(MaterialKey),
    Section(SectionKey),
    Member(MemberKey),
}

impl EntityRef {
    /// Returns the kind of entity this key refers to.
    pub fn kind(&self) -> EntityKind {
        match self {
            EntityRef::Node(_) => EntityKind::Node,
            EntityRef::Material(_) => EntityKind::Material,
            EntityRef::Section(_) => EntityKind::Section,
            EntityRef::Member(_) => EntityKind::Member,
        }
    }
}

/// Discriminant for model entity kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EntityKind {
    Node = 0,
    Material = 1,
    Section = 2,
    Member = 3,
}

impl EntityKind {
    /// Returns the kind name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Node => "Node",
            EntityKind::Material => "Material",
            EntityKind::Section => "Section",
            EntityKind::Member => "Member",
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<NodeKey> for EntityRef {
    fn from(k: NodeKey) -> Self {
        EntityRef::Node(k)
    }
}

impl From<MaterialKey> for EntityRef {
    fn from(k: MaterialKey) -> Self {
        EntityRef::Material(k)
    }
}

impl From<SectionKey> for EntityRef {
    fn from(k: SectionKey) -> Self {
        EntityRef::Section(k)
    }
}

impl From<MemberKey> for EntityRef {
    fn from(k: MemberKey) -> Self {
        EntityRef::Member(k)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slotmap::SlotMap;

    #[test]
    fn kind_names() {
        assert_eq!(EntityKind::Node.as_str(), "Node");
        assert_eq!(EntityKind::Material.as_str(), "Material");
        assert_eq!(EntityKind::Section.to_string(), "Section");
        assert_eq!(EntityKind::Member.to_string(), "Member");
    }

    #[test]
    fn entity_ref_kind_discrimination() {
        let mut members: SlotMap<MemberKey, ()> = SlotMap::with_key();
        let mk = members.insert(());
        let r: EntityRef = mk.into();
        assert_eq!(r.kind(), EntityKind::Member);
        assert_eq!(r, EntityRef::Member(mk));
    }
}
