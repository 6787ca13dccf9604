// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Volume queries over a node index.
//!
//! Box queries narrow the candidate set one axis at a time: the x range is
//! cut out of the `(x, y, z)`-sorted sequence by binary search, the survivors
//! are sorted by y and cut again, then by z. Cylinder queries run the same
//! box pass over the cylinder's enclosing box and test the rest exactly.

use crate::error::{check_tolerance, Result};
use crate::geometry::{BoundingBox, Shape, VolumeQuery};
use crate::keys::NodeKey;
use crate::nodes::Nodes;

impl Nodes {
    /// Returns every node inside the queried volume, widened by
    /// `tolerance`, in sequence order.
    ///
    /// Fails with [`Error::InvalidQuery`](crate::Error::InvalidQuery) when
    /// the query names no shape.
    pub fn get_by_volume(&self, query: &VolumeQuery, tolerance: f64) -> Result<Vec<NodeKey>> {
        check_tolerance(tolerance)?;
        match query.shape()? {
            Shape::Box(bounds) => Ok(self.keys_in_box(&bounds.expanded(tolerance))),
            Shape::Cylinder(cylinder) => {
                let candidates = self.keys_in_box(&cylinder.enclosing_box().expanded(tolerance));
                Ok(candidates
                    .into_iter()
                    .filter(|&k| cylinder.contains(&self.registry[k].position(), tolerance))
                    .collect())
            }
        }
    }

    /// Single-member form of [`Self::get_by_volume`]: the first match in
    /// sequence order, with a warning if there was more than one.
    pub fn get_single_by_volume(
        &self,
        query: &VolumeQuery,
        tolerance: f64,
    ) -> Result<Option<NodeKey>> {
        let found = self.get_by_volume(query, tolerance)?;
        if found.len() > 1 {
            tracing::warn!(
                matches = found.len(),
                ?query,
                "volume query matched several nodes, using the first"
            );
        }
        Ok(found.first().copied())
    }

    /// Keys of all nodes inside the closed box `bounds`.
    fn keys_in_box(&self, bounds: &BoundingBox) -> Vec<NodeKey> {
        let order = self.registry.keys();
        let lo = order.partition_point(|&k| self.registry[k].x() < bounds.min.x);
        let hi = order.partition_point(|&k| self.registry[k].x() <= bounds.max.x);
        if lo >= hi {
            return Vec::new();
        }

        let mut keys = order[lo..hi].to_vec();
        self.narrow(&mut keys, 1, bounds.min.y, bounds.max.y);
        self.narrow(&mut keys, 2, bounds.min.z, bounds.max.z);

        let compare = self.registry.comparator();
        keys.sort_by(|&a, &b| compare(&self.registry[a], &self.registry[b]));
        keys
    }

    /// Keeps the keys whose coordinate on `axis` lies in `[min, max]`.
    fn narrow(&self, keys: &mut Vec<NodeKey>, axis: usize, min: f64, max: f64) {
        let coord = |k: NodeKey| self.registry[k].position()[axis];
        keys.sort_by(|&a, &b| coord(a).total_cmp(&coord(b)));
        let lo = keys.partition_point(|&k| coord(k) < min);
        let hi = keys.partition_point(|&k| coord(k) <= max);
        if lo >= hi {
            keys.clear();
        } else {
            keys.truncate(hi);
            keys.drain(..lo);
        }
    }
}
