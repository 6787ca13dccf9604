// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Uniform spatial hash for tolerance-based node lookup.
//!
//! Space is divided into cubic cells of side `cell_size`. A proximity query
//! with a reach no larger than the cell size only has to look at the 3x3x3
//! block of cells around the query point.

use nalgebra::{Point3, Vector3};
use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::keys::NodeKey;

/// Integer coordinates of a grid cell.
pub type Cell = (i64, i64, i64);

type Bucket = SmallVec<[NodeKey; 4]>;

/// A voxel grid mapping cells to the nodes whose coordinates fall in them.
#[derive(Debug, Clone)]
pub struct VoxelGrid {
    cell_size: f64,
    cells: FxHashMap<Cell, Bucket>,
    len: usize,
}

impl VoxelGrid {
    /// Creates an empty grid. `cell_size` should equal the point tolerance.
    pub fn new(cell_size: f64) -> Self {
        Self {
            cell_size,
            cells: FxHashMap::default(),
            len: 0,
        }
    }

    pub fn cell_size(&self) -> f64 {
        self.cell_size
    }

    /// Number of nodes in the grid.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of non-empty cells.
    pub fn occupied_cells(&self) -> usize {
        self.cells.len()
    }

    pub fn cell_of(&self, p: &Point3<f64>) -> Cell {
        (
            (p.x / self.cell_size).floor() as i64,
            (p.y / self.cell_size).floor() as i64,
            (p.z / self.cell_size).floor() as i64,
        )
    }

    pub fn insert(&mut self, key: NodeKey, p: &Point3<f64>) {
        let cell = self.cell_of(p);
        self.cells.entry(cell).or_default().push(key);
        self.len += 1;
    }

    /// Removes `key` from the cell of `p`, dropping the cell when it empties.
    pub fn remove(&mut self, key: NodeKey, p: &Point3<f64>) -> bool {
        let cell = self.cell_of(p);
        let Some(bucket) = self.cells.get_mut(&cell) else {
            return false;
        };
        let Some(slot) = bucket.iter().position(|&k| k == key) else {
            return false;
        };
        bucket.swap_remove(slot);
        if bucket.is_empty() {
            self.cells.remove(&cell);
        }
        self.len -= 1;
        true
    }

    /// `true` if `key` is stored in the cell of `p`.
    pub fn contains(&self, key: NodeKey, p: &Point3<f64>) -> bool {
        self.cells
            .get(&self.cell_of(p))
            .is_some_and(|bucket| bucket.contains(&key))
    }

    pub fn clear(&mut self) {
        self.cells.clear();
        self.len = 0;
    }

    /// Returns every node stored in a cell that can hold a point within
    /// `reach` of `p`.
    ///
    /// Callers still have to check the actual distance.
    pub fn candidates(&self, p: &Point3<f64>, reach: f64) -> Vec<NodeKey> {
        // Counted in f64: a huge reach would overflow any integer cell count.
        let radius = (reach / self.cell_size).ceil().max(1.0);
        let span = 2.0 * radius + 1.0;

        // A very wide reach touches more cells than exist; scan them all.
        if radius > 1.0 && span.powi(3) > self.cells.len() as f64 {
            let margin = Vector3::repeat(reach);
            let lo = self.cell_of(&(p - margin));
            let hi = self.cell_of(&(p + margin));
            return self
                .cells
                .iter()
                .filter(|(c, _)| {
                    (lo.0..=hi.0).contains(&c.0)
                        && (lo.1..=hi.1).contains(&c.1)
                        && (lo.2..=hi.2).contains(&c.2)
                })
                .flat_map(|(_, bucket)| bucket.iter().copied())
                .collect();
        }

        // Here span^3 <= cells.len(), so the radius fits an i64.
        let radius = radius as i64;
        let (cx, cy, cz) = self.cell_of(p);
        // Saturated cells at the edge of the i64 range have no neighbour beyond.
        let axis = |c: i64| (-radius..=radius).filter_map(move |d| c.checked_add(d));
        let mut result = Vec::new();
        for x in axis(cx) {
            for y in axis(cy) {
                for z in axis(cz) {
                    if let Some(bucket) = self.cells.get(&(x, y, z)) {
                        result.extend(bucket.iter().copied());
                    }
                }
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slotmap::SlotMap;

    fn keys(n: usize) -> Vec<NodeKey> {
        let mut map: SlotMap<NodeKey, ()> = SlotMap::with_key();
        (0..n).map(|_| map.insert(())).collect()
    }

    #[test]
    fn cell_coordinates_floor() {
        let grid = VoxelGrid::new(0.5);
        assert_eq!(grid.cell_of(&Point3::new(0.0, 0.49, 0.5)), (0, 0, 1));
        assert_eq!(grid.cell_of(&Point3::new(-0.1, -0.5, -0.51)), (-1, -1, -2));
    }

    #[test]
    fn neighbours_across_cell_boundary() {
        let k = keys(2);
        let mut grid = VoxelGrid::new(0.01);
        grid.insert(k[0], &Point3::new(0.0099, 0.0, 0.0));
        grid.insert(k[1], &Point3::new(10.0, 10.0, 10.0));

        let near = grid.candidates(&Point3::new(0.0101, 0.0, 0.0), 0.001);
        assert_eq!(near, vec![k[0]]);
    }

    #[test]
    fn remove_prunes_empty_cells() {
        let k = keys(2);
        let mut grid = VoxelGrid::new(1.0);
        let p = Point3::new(0.5, 0.5, 0.5);
        grid.insert(k[0], &p);
        grid.insert(k[1], &p);
        assert_eq!(grid.occupied_cells(), 1);

        assert!(grid.remove(k[0], &p));
        assert!(!grid.contains(k[0], &p));
        assert!(grid.contains(k[1], &p));
        assert_eq!(grid.occupied_cells(), 1);

        assert!(grid.remove(k[1], &p));
        assert!(!grid.remove(k[1], &p));
        assert_eq!(grid.occupied_cells(), 0);
        assert!(grid.is_empty());
    }

    #[test]
    fn wide_reach_scans_more_cells() {
        let k = keys(2);
        let mut grid = VoxelGrid::new(0.1);
        grid.insert(k[0], &Point3::new(0.0, 0.0, 0.0));
        grid.insert(k[1], &Point3::new(0.45, 0.0, 0.0));

        let narrow = grid.candidates(&Point3::origin(), 0.1);
        assert_eq!(narrow, vec![k[0]]);

        let mut wide = grid.candidates(&Point3::origin(), 0.5);
        wide.sort();
        let mut expected = k.clone();
        expected.sort();
        assert_eq!(wide, expected);
    }

    #[test]
    fn far_coordinates_share_the_edge_cell() {
        let k = keys(2);
        let mut grid = VoxelGrid::new(1e-4);
        // Both saturate to the last representable cell.
        let far = Point3::new(1e15, 0.0, -1e15);
        grid.insert(k[0], &far);
        grid.insert(k[1], &Point3::new(2e15, 0.0, -2e15));
        assert_eq!(grid.cell_of(&far), (i64::MAX, 0, i64::MIN));

        let mut near = grid.candidates(&far, 1e-4);
        near.sort();
        let mut expected = k.clone();
        expected.sort();
        assert_eq!(near, expected);
    }

    #[test]
    fn unbounded_reach_scans_everything() {
        let k = keys(2);
        let mut grid = VoxelGrid::new(1e-3);
        grid.insert(k[0], &Point3::new(0.0, 0.0, 0.0));
        grid.insert(k[1], &Point3::new(1e6, -1e6, 1e6));

        for reach in [1e20, f64::MAX, f64::INFINITY] {
            assert_eq!(grid.candidates(&Point3::new(1.0, 0.0, 0.0), reach).len(), 2);
        }
    }
}
