// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The node index: a proximity-aware registry of point entities.
//!
//! [`Nodes`] keeps three structures in step:
//!
//! - a [`KeyedRegistry`] whose backing sequence is sorted by `(x, y, z)`, used
//!   for binary-search range queries and lookup by guid or numeric id,
//! - a [`VoxelGrid`] with the point tolerance as cell size, used for the
//!   get-or-create check in [`Nodes::add`],
//! - lazily computed bounding box and centroid.
//!
//! Numeric ids stay dense: every removal renumbers the survivors from 1.

use std::cell::OnceCell;
use std::cmp::Ordering;

use nalgebra::Point3;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::config::RegistryConfig;
use crate::error::{check_tolerance, Error, IdentityKey, Result};
use crate::geometry::BoundingBox;
use crate::keyed::KeyedRegistry;
use crate::keys::NodeKey;
use crate::node::Node;
use crate::voxel::VoxelGrid;

/// Lexicographic `(x, y, z)` order, ties broken by numeric id.
fn by_position(a: &Node, b: &Node) -> Ordering {
    a.x()
        .total_cmp(&b.x())
        .then_with(|| a.y().total_cmp(&b.y()))
        .then_with(|| a.z().total_cmp(&b.z()))
        .then_with(|| a.id().cmp(&b.id()))
}

/// Spatial index and owner of a model's nodes.
///
/// # Example
///
/// ```
/// use fem_lite_registry::{Node, Nodes};
///
/// let mut nodes = Nodes::new(1e-3).unwrap();
/// let a = nodes.add(Node::new(0.0, 0.0, 0.0)).unwrap();
/// let b = nodes.add(Node::new(1.0, 0.0, 0.0)).unwrap();
/// let again = nodes.add(Node::new(0.0, 0.0, 0.0001)).unwrap();
///
/// assert_eq!(a, again);
/// assert_ne!(a, b);
/// assert_eq!(nodes.len(), 2);
/// assert_eq!(nodes[a].id(), Some(1));
/// ```
#[derive(Debug)]
pub struct Nodes {
    pub(crate) registry: KeyedRegistry<NodeKey, Node>,
    pub(crate) grid: VoxelGrid,
    tolerance: f64,
    max_id: u32,
    bbox: OnceCell<Option<BoundingBox>>,
    centroid: OnceCell<Option<Point3<f64>>>,
}

impl Nodes {
    /// Creates an empty index whose point tolerance (and voxel cell size) is
    /// `tolerance`.
    pub fn new(tolerance: f64) -> Result<Self> {
        check_tolerance(tolerance)?;
        Ok(Self {
            registry: KeyedRegistry::new(by_position),
            grid: VoxelGrid::new(tolerance),
            tolerance,
            max_id: 0,
            bbox: OnceCell::new(),
            centroid: OnceCell::new(),
        })
    }

    pub fn with_config(config: &RegistryConfig) -> Result<Self> {
        Self::new(config.point_tolerance)
    }

    /// The point tolerance this index was built with.
    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    /// Adds `node`, or returns the node already within the index tolerance
    /// of it.
    pub fn add(&mut self, node: Node) -> Result<NodeKey> {
        self.add_with(node, self.tolerance, false)
    }

    /// Adds `node` using an explicit `tolerance`.
    ///
    /// Unless `allow_coincident` is set, an existing node closer than
    /// `tolerance` is returned instead and nothing is inserted. Otherwise the
    /// node gets id `max_id + 1`.
    pub fn add_with(
        &mut self,
        mut node: Node,
        tolerance: f64,
        allow_coincident: bool,
    ) -> Result<NodeKey> {
        check_tolerance(tolerance)?;
        if !node.is_finite() {
            return Err(Error::DegenerateInput(format!(
                "node coordinates must be finite, got {:?}",
                node.coords()
            )));
        }

        let position = node.position();
        if !allow_coincident {
            if let Some(existing) = self.closest(&position, tolerance, |d| d < tolerance) {
                tracing::trace!(?position, id = ?self.registry[existing].id(), "reusing coincident node");
                return Ok(existing);
            }
        }

        let id = self
            .max_id
            .checked_add(1)
            .ok_or_else(|| Error::InvalidIdentity("node id space exhausted".into()))?;
        node.set_id(id);

        let key = self.registry.insert(node)?;
        self.grid.insert(key, &position);
        self.max_id = id;
        self.invalidate_derived();
        Ok(key)
    }

    /// Adds every node in `nodes` with the index tolerance.
    pub fn extend<I>(&mut self, nodes: I) -> Result<Vec<NodeKey>>
    where
        I: IntoIterator<Item = Node>,
    {
        nodes.into_iter().map(|n| self.add(n)).collect()
    }

    /// Closest node within `tolerance` of `point`, ties going to the lowest
    /// id.
    pub fn nearest(&self, point: &Point3<f64>, tolerance: f64) -> Result<Option<NodeKey>> {
        check_tolerance(tolerance)?;
        Ok(self.closest(point, tolerance, |d| d <= tolerance))
    }

    fn closest<F>(&self, point: &Point3<f64>, reach: f64, accept: F) -> Option<NodeKey>
    where
        F: Fn(f64) -> bool,
    {
        self.grid
            .candidates(point, reach)
            .into_iter()
            .filter_map(|key| {
                let node = self.registry.get(key)?;
                let d = node.distance_to(point);
                accept(d).then_some((d, node.id(), key))
            })
            .min_by(|a, b| a.0.total_cmp(&b.0).then_with(|| a.1.cmp(&b.1)))
            .map(|(_, _, key)| key)
    }

    /// Removes the given nodes and renumbers the survivors from 1.
    ///
    /// Every key must resolve; otherwise nothing changes.
    pub fn remove(&mut self, keys: &[NodeKey]) -> Result<Vec<Node>> {
        let removed = self.detach(keys)?;
        self.renumber(1)?;
        tracing::debug!(removed = removed.len(), remaining = self.len(), "removed nodes");
        Ok(removed)
    }

    /// Removes every node nothing refers to. Returns how many were removed.
    pub fn remove_standalones(&mut self) -> Result<usize> {
        let standalone: Vec<NodeKey> = self
            .registry
            .iter()
            .filter(|(_, n)| n.ref_count() == 0)
            .map(|(k, _)| k)
            .collect();
        if standalone.is_empty() {
            return Ok(0);
        }
        Ok(self.remove(&standalone)?.len())
    }

    /// Drops nodes from the registry and the voxel grid without renumbering.
    pub(crate) fn detach(&mut self, keys: &[NodeKey]) -> Result<Vec<Node>> {
        let located: Vec<(NodeKey, Point3<f64>)> = keys
            .iter()
            .filter_map(|&k| self.registry.get(k).map(|n| (k, n.position())))
            .collect();
        let removed = self.registry.remove_many(keys)?;
        for (key, position) in &located {
            self.grid.remove(*key, position);
        }
        self.invalidate_derived();
        Ok(removed)
    }

    /// Reassigns ids `start, start + 1, ...` in current id order.
    pub fn renumber(&mut self, start: u32) -> Result<()> {
        if start == 0 {
            return Err(Error::InvalidIdentity("node ids start at 1".into()));
        }
        let count = self.len() as u32;
        if start.checked_add(count).is_none() {
            return Err(Error::InvalidIdentity(format!(
                "cannot number {count} nodes from {start}"
            )));
        }

        for (offset, key) in self.keys_by_id().into_iter().enumerate() {
            if let Some(node) = self.registry.get_mut(key) {
                node.set_id(start + offset as u32);
            }
        }
        self.max_id = start - 1 + count;
        self.rebuild();
        tracing::debug!(start, count, "renumbered nodes");
        Ok(())
    }

    /// Applies an old id → new id table. Ids missing from the table keep
    /// their value.
    ///
    /// The resulting ids must be positive and distinct; otherwise nothing
    /// changes.
    pub fn renumber_from_map(&mut self, remap: &FxHashMap<u32, u32>) -> Result<()> {
        let mut assignments = Vec::with_capacity(self.len());
        let mut seen = FxHashSet::default();
        for key in self.keys_by_id() {
            let Some(old) = self.registry[key].id() else {
                continue;
            };
            let new = remap.get(&old).copied().unwrap_or(old);
            if new == 0 {
                return Err(Error::InvalidIdentity(format!(
                    "node {old} would be renumbered to 0"
                )));
            }
            if !seen.insert(new) {
                return Err(Error::DuplicateIdentity(IdentityKey::NumericId(new)));
            }
            assignments.push((key, new));
        }

        for &(key, new) in &assignments {
            if let Some(node) = self.registry.get_mut(key) {
                node.set_id(new);
            }
        }
        self.max_id = seen.into_iter().max().unwrap_or(0);
        self.rebuild();
        tracing::debug!(count = assignments.len(), "applied node id remap");
        Ok(())
    }

    /// Re-sorts the sequence and rebuilds the id map and voxel grid.
    fn rebuild(&mut self) {
        self.registry.rebuild_indices();
        self.grid.clear();
        for &key in self.registry.keys() {
            self.grid.insert(key, &self.registry[key].position());
        }
    }

    pub(crate) fn invalidate_derived(&mut self) {
        self.bbox.take();
        self.centroid.take();
    }

    /// Increments the reference count of a node.
    pub fn add_ref(&mut self, key: NodeKey) -> Result<usize> {
        let node = self
            .registry
            .get_mut(key)
            .ok_or_else(|| Error::NotFound(IdentityKey::handle(key)))?;
        *node.ref_count_mut() += 1;
        Ok(node.ref_count())
    }

    /// Decrements the reference count of a node, stopping at zero.
    pub fn release_ref(&mut self, key: NodeKey) -> Result<usize> {
        let node = self
            .registry
            .get_mut(key)
            .ok_or_else(|| Error::NotFound(IdentityKey::handle(key)))?;
        let count = node.ref_count_mut();
        *count = count.saturating_sub(1);
        Ok(*count)
    }

    /// Smallest box containing every node, or `None` when empty.
    pub fn bounding_box(&self) -> Option<BoundingBox> {
        *self
            .bbox
            .get_or_init(|| BoundingBox::from_points(self.registry.iter().map(|(_, n)| n.position())))
    }

    /// Mean position of all nodes, or `None` when empty.
    pub fn centroid(&self) -> Option<Point3<f64>> {
        *self.centroid.get_or_init(|| {
            if self.is_empty() {
                return None;
            }
            let sum = self
                .registry
                .iter()
                .fold(nalgebra::Vector3::<f64>::zeros(), |acc, (_, n)| acc + n.position().coords);
            Some(Point3::from(sum / self.len() as f64))
        })
    }

    pub fn get(&self, key: NodeKey) -> Option<&Node> {
        self.registry.get(key)
    }

    pub fn get_by_id(&self, guid: &str) -> Option<&Node> {
        self.registry.get_by_id(guid)
    }

    pub fn get_by_numeric_id(&self, id: u32) -> Option<&Node> {
        self.registry.get_by_numeric_id(id)
    }

    pub fn key_by_id(&self, guid: &str) -> Option<NodeKey> {
        self.registry.key_by_id(guid)
    }

    pub fn key_by_numeric_id(&self, id: u32) -> Option<NodeKey> {
        self.registry.key_by_numeric_id(id)
    }

    /// Like [`Self::get_by_numeric_id`], but a miss is an error.
    pub fn require_by_numeric_id(&self, id: u32) -> Result<&Node> {
        self.get_by_numeric_id(id)
            .ok_or(Error::NotFound(IdentityKey::NumericId(id)))
    }

    pub fn contains_key(&self, key: NodeKey) -> bool {
        self.registry.contains_key(key)
    }

    /// Keys in `(x, y, z)` order.
    pub fn keys(&self) -> &[NodeKey] {
        self.registry.keys()
    }

    /// Keys in ascending numeric id order.
    pub fn keys_by_id(&self) -> Vec<NodeKey> {
        let mut keys = self.registry.keys().to_vec();
        keys.sort_by_key(|&k| self.registry[k].id());
        keys
    }

    /// Nodes in `(x, y, z)` order.
    pub fn iter(&self) -> impl Iterator<Item = (NodeKey, &Node)> + '_ {
        self.registry.iter()
    }

    pub fn len(&self) -> usize {
        self.registry.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registry.is_empty()
    }

    pub fn min_id(&self) -> Option<u32> {
        self.registry.iter().filter_map(|(_, n)| n.id()).min()
    }

    pub fn max_id(&self) -> u32 {
        self.max_id
    }

    /// `true` if the voxel grid holds exactly the registered nodes, each in
    /// the cell its coordinates map to.
    pub fn is_grid_consistent(&self) -> bool {
        self.grid.len() == self.len()
            && self
                .registry
                .iter()
                .all(|(k, n)| self.grid.contains(k, &n.position()))
    }
}

impl std::ops::Index<NodeKey> for Nodes {
    type Output = Node;

    fn index(&self, key: NodeKey) -> &Node {
        &self.registry[key]
    }
}
