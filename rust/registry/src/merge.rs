// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Tolerance-based merging of coincident nodes.

use crate::error::{check_tolerance, Result};
use crate::geometry::VolumeQuery;
use crate::keys::NodeKey;
use crate::nodes::Nodes;

impl Nodes {
    /// Merges nodes lying within `tolerance` of each other and returns how
    /// many were removed.
    ///
    /// Nodes are visited in ascending id order; only nodes with at least one
    /// reference start a merge. Within a group the node with the most
    /// references survives, ties going to the lowest id. For every dropped
    /// node `redirect(dropped, survivor)` is called so the caller can repoint
    /// its own handles, and the dropped node's reference count moves to the
    /// survivor. Ids are renumbered from 1 afterwards.
    pub fn merge_coincident<R>(&mut self, tolerance: f64, mut redirect: R) -> Result<usize>
    where
        R: FnMut(NodeKey, NodeKey),
    {
        check_tolerance(tolerance)?;

        let mut removed = 0;
        for key in self.keys_by_id() {
            let Some(node) = self.registry.get(key) else {
                continue;
            };
            if node.ref_count() == 0 {
                continue;
            }
            let position = node.position();

            let mut group: Vec<NodeKey> = self
                .get_by_volume(&VolumeQuery::point(position), tolerance)?
                .into_iter()
                .filter(|&k| k != key && self.registry[k].distance_to(&position) <= tolerance)
                .collect();
            if group.is_empty() {
                continue;
            }
            group.push(key);

            let Some(survivor) = group.iter().copied().max_by(|&a, &b| {
                let (na, nb) = (&self.registry[a], &self.registry[b]);
                na.ref_count()
                    .cmp(&nb.ref_count())
                    .then_with(|| nb.id().cmp(&na.id()))
            }) else {
                continue;
            };

            let duplicates: Vec<NodeKey> = group.into_iter().filter(|&k| k != survivor).collect();
            let mut moved = 0;
            for &duplicate in &duplicates {
                redirect(duplicate, survivor);
                moved += self.registry[duplicate].ref_count();
            }
            if let Some(target) = self.registry.get_mut(survivor) {
                *target.ref_count_mut() += moved;
            }

            self.detach(&duplicates)?;
            removed += duplicates.len();
        }

        if removed > 0 {
            self.renumber(1)?;
        }
        tracing::debug!(tolerance, removed, remaining = self.len(), "merged coincident nodes");
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use crate::error::Error;
    use crate::keys::NodeKey;
    use crate::node::Node;
    use crate::nodes::Nodes;

    fn add(nodes: &mut Nodes, x: f64, y: f64, z: f64, refs: usize) -> NodeKey {
        nodes
            .add_with(Node::new(x, y, z).with_refs(refs), 1e-9, true)
            .unwrap()
    }

    #[test]
    fn most_referenced_node_survives() {
        let mut nodes = Nodes::new(1e-3).unwrap();
        let lone = add(&mut nodes, 0.0, 0.0, 0.0005, 1);
        let busy = add(&mut nodes, 0.0, 0.0, 0.0, 3);

        let mut redirected = Vec::new();
        let removed = nodes
            .merge_coincident(1e-3, |from, to| redirected.push((from, to)))
            .unwrap();

        assert_eq!(removed, 1);
        assert_eq!(redirected, vec![(lone, busy)]);
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[busy].ref_count(), 4);
        assert_eq!(nodes[busy].id(), Some(1));
        assert!(nodes.get(lone).is_none());
        assert!(nodes.get_by_numeric_id(2).is_none());
        assert!(nodes.is_grid_consistent());
    }

    #[test]
    fn equal_refs_keep_lowest_id() {
        let mut nodes = Nodes::new(1e-3).unwrap();
        let first = add(&mut nodes, 1.0, 1.0, 1.0, 2);
        let second = add(&mut nodes, 1.0, 1.0, 1.0002, 2);
        let third = add(&mut nodes, 1.0002, 1.0, 1.0, 2);

        let mut redirected = Vec::new();
        nodes
            .merge_coincident(1e-3, |from, to| redirected.push((from, to)))
            .unwrap();

        redirected.sort();
        let mut expected = vec![(second, first), (third, first)];
        expected.sort();
        assert_eq!(redirected, expected);
        assert_eq!(nodes[first].ref_count(), 6);
    }

    #[test]
    fn unreferenced_nodes_do_not_start_merges() {
        let mut nodes = Nodes::new(1e-3).unwrap();
        add(&mut nodes, 0.0, 0.0, 0.0, 0);
        add(&mut nodes, 0.0, 0.0, 0.0001, 0);

        let removed = nodes.merge_coincident(1e-3, |_, _| {}).unwrap();
        assert_eq!(removed, 0);
        assert_eq!(nodes.len(), 2);
    }

    #[test]
    fn unreferenced_duplicate_is_absorbed() {
        let mut nodes = Nodes::new(1e-3).unwrap();
        let orphan = add(&mut nodes, 0.0, 0.0, 0.0, 0);
        let used = add(&mut nodes, 0.0, 0.0, 0.0001, 1);

        let removed = nodes.merge_coincident(1e-3, |_, _| {}).unwrap();
        assert_eq!(removed, 1);
        assert!(nodes.get(orphan).is_none());
        assert_eq!(nodes[used].id(), Some(1));
    }

    #[test]
    fn distant_nodes_untouched() {
        let mut nodes = Nodes::new(1e-3).unwrap();
        add(&mut nodes, 0.0, 0.0, 0.0, 1);
        add(&mut nodes, 0.01, 0.0, 0.0, 1);
        // Inside the tolerance box but not the tolerance sphere.
        add(&mut nodes, 0.0009, 0.0009, 0.0009 + 5.0, 1);
        add(&mut nodes, 0.0, 0.0, 5.0, 1);

        let removed = nodes.merge_coincident(1e-3, |_, _| {}).unwrap();
        assert_eq!(removed, 0);
        assert_eq!(nodes.len(), 4);
    }

    #[test]
    fn rejects_bad_tolerance() {
        let mut nodes = Nodes::new(1e-3).unwrap();
        assert!(matches!(
            nodes.merge_coincident(-1.0, |_, _| {}),
            Err(Error::DegenerateInput(_))
        ));
    }
}
