// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Point entities stored in a [`Nodes`](crate::Nodes) index.

use nalgebra::Point3;

use crate::entity::Entity;

/// A point in model space.
///
/// A node gets its numeric id from the index it is added to; until then
/// [`Node::id`] is `None`. `ref_count` counts the external entities (beam
/// ends, element corners, ...) attached to the node and decides which node
/// survives a coincident merge.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    guid: String,
    id: Option<u32>,
    position: Point3<f64>,
    ref_count: usize,
}

impl Node {
    /// Creates an unregistered node with a random guid.
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self::with_guid(uuid::Uuid::new_v4().to_string(), x, y, z)
    }

    pub fn with_guid(guid: impl Into<String>, x: f64, y: f64, z: f64) -> Self {
        // Adding 0.0 folds -0.0 into 0.0 so sorting and bucketing agree.
        Self {
            guid: guid.into(),
            id: None,
            position: Point3::new(x + 0.0, y + 0.0, z + 0.0),
            ref_count: 0,
        }
    }

    pub fn from_point(p: Point3<f64>) -> Self {
        Self::new(p.x, p.y, p.z)
    }

    /// Sets the initial reference count.
    pub fn with_refs(mut self, ref_count: usize) -> Self {
        self.ref_count = ref_count;
        self
    }

    pub fn guid(&self) -> &str {
        &self.guid
    }

    pub fn id(&self) -> Option<u32> {
        self.id
    }

    pub fn x(&self) -> f64 {
        self.position.x
    }

    pub fn y(&self) -> f64 {
        self.position.y
    }

    pub fn z(&self) -> f64 {
        self.position.z
    }

    pub fn position(&self) -> Point3<f64> {
        self.position
    }

    pub fn coords(&self) -> [f64; 3] {
        [self.position.x, self.position.y, self.position.z]
    }

    pub fn ref_count(&self) -> usize {
        self.ref_count
    }

    pub fn distance_to(&self, p: &Point3<f64>) -> f64 {
        nalgebra::distance(&self.position, p)
    }

    /// `true` if `other` lies within `tolerance` of this node.
    pub fn is_coincident(&self, other: &Node, tolerance: f64) -> bool {
        self.distance_to(&other.position) <= tolerance
    }

    pub(crate) fn is_finite(&self) -> bool {
        self.position.iter().all(|c| c.is_finite())
    }

    pub(crate) fn set_id(&mut self, id: u32) {
        self.id = Some(id);
    }

    pub(crate) fn ref_count_mut(&mut self) -> &mut usize {
        &mut self.ref_count
    }
}

impl Entity for Node {
    fn guid(&self) -> &str {
        &self.guid
    }

    fn numeric_id(&self) -> Option<u32> {
        self.id
    }
}
