// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! # FEM-Lite Registry
//!
//! In-memory entity registries for structural and finite element models.
//!
//! - [`KeyedRegistry`] stores entities in a caller-defined sort order with
//!   O(1) lookup by guid, name and numeric id.
//! - [`NumericIdentityRegistry`] adds dense numeric ids and name-based
//!   get-or-create for named properties such as materials and sections,
//!   plus a merge of entities with identical properties.
//! - [`Nodes`] is the spatial index for point entities: a coordinate-sorted
//!   sequence for range queries and a voxel grid for constant-time
//!   coincidence checks, so two beam ends at the same location resolve to one
//!   node.
//!
//! Entities are owned by their registry. The rest of a model holds slotmap
//! keys ([`NodeKey`], [`MaterialKey`], ...) which stop resolving once the
//! entity is removed or merged away.

pub mod config;
pub mod entity;
pub mod error;
pub mod geometry;
pub mod keyed;
pub mod keys;
mod merge;
pub mod node;
pub mod nodes;
pub mod numbered;
pub mod properties;
mod query;
pub mod voxel;

pub use config::RegistryConfig;
pub use entity::{Entity, NumberedEntity};
pub use error::{Error, IdentityKey, Result};
pub use geometry::{BoundingBox, Cylinder, VolumeQuery};
pub use keyed::KeyedRegistry;
pub use keys::{EntityKind, EntityRef, MaterialKey, MemberKey, NodeKey, SectionKey};
pub use node::Node;
pub use nodes::Nodes;
pub use numbered::NumericIdentityRegistry;
pub use properties::PropertyValue;

// Re-export nalgebra types for convenience
pub use nalgebra::{Point3, Vector3};
