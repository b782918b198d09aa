// crates/leader-election-core/src/topology.rs
//! Pure neighbor-list construction for each topology kind (spec.md Sec. 4.3).
//!
//! There is no teacher counterpart for this module — POWERLINK's DLL has no
//! analogous notion of an induced neighbor graph — so it is written fresh in
//! the corpus's plain free-function style (cf. `od/utils.rs` in the teacher
//! crate), operating on a 0-indexed ordered node list exactly as spec.md
//! describes it.

use crate::types::{NodeId, Topology};
use alloc::vec::Vec;

/// Computes the neighbor list for node index `i` within an `N`-node fleet,
/// given the chosen topology. For `Topology::General` this always returns an
/// empty list: the coordinator does not dictate neighbors for that topology,
/// workers discover each other via multicast `disc;` instead (spec.md
/// Sec. 4.3, Sec. 4.5).
pub fn neighbors_for(topology: Topology, nodes: &[NodeId], i: usize) -> Vec<NodeId> {
    let n = nodes.len();
    if i >= n {
        return Vec::new();
    }
    match topology {
        Topology::Ring => ring_neighbors(nodes, i),
        Topology::Line => line_neighbors(nodes, i),
        Topology::Tree => tree_neighbors(nodes, i),
        Topology::Mesh => mesh_neighbors(nodes, i),
        Topology::General => Vec::new(),
    }
}

/// Builds the full per-node neighbor table for the fleet.
pub fn build_topology(topology: Topology, nodes: &[NodeId]) -> Vec<Vec<NodeId>> {
    (0..nodes.len())
        .map(|i| neighbors_for(topology, nodes, i))
        .collect()
}

fn ring_neighbors(nodes: &[NodeId], i: usize) -> Vec<NodeId> {
    let n = nodes.len();
    if n <= 1 {
        return Vec::new();
    }
    let prev = (i + n - 1) % n;
    let next = (i + 1) % n;
    if n == 2 {
        // Both ring slots resolve to the same single other node; avoid
        // reporting it twice.
        return alloc::vec![nodes[next].clone()];
    }
    alloc::vec![nodes[prev].clone(), nodes[next].clone()]
}

fn line_neighbors(nodes: &[NodeId], i: usize) -> Vec<NodeId> {
    let n = nodes.len();
    let mut out = Vec::with_capacity(2);
    if i > 0 {
        out.push(nodes[i - 1].clone());
    }
    if i + 1 < n {
        out.push(nodes[i + 1].clone());
    }
    out
}

fn tree_neighbors(nodes: &[NodeId], i: usize) -> Vec<NodeId> {
    let n = nodes.len();
    let mut out = Vec::with_capacity(3);
    if i > 0 {
        out.push(nodes[(i - 1) / 2].clone());
    }
    let left = 2 * i + 1;
    let right = 2 * i + 2;
    if left < n {
        out.push(nodes[left].clone());
    }
    if right < n {
        out.push(nodes[right].clone());
    }
    out
}

/// Grid width for the mesh topology: `round(sqrt(N))`, per spec.md Sec. 4.3.
fn mesh_width(n: usize) -> usize {
    if n == 0 {
        return 1;
    }
    let width = libm_round_sqrt(n as f64);
    width.max(1)
}

/// `round(sqrt(x))` without pulling in `libm`/`std::f64` (not available in
/// `no_std` without an extra dependency): a small integer search is exact
/// and cheap for the fleet sizes this protocol targets (Sec. 1 Non-goals:
/// "more than a few hundred nodes").
fn libm_round_sqrt(x: f64) -> usize {
    let mut w = 0usize;
    while ((w + 1) * (w + 1)) as f64 <= x + 0.5 {
        w += 1;
    }
    w
}

fn mesh_neighbors(nodes: &[NodeId], i: usize) -> Vec<NodeId> {
    let n = nodes.len();
    let width = mesh_width(n);
    let mut out = Vec::with_capacity(4);
    if i >= width {
        out.push(nodes[i - width].clone());
    }
    if i % width != 0 {
        out.push(nodes[i - 1].clone());
    }
    if i % width != width - 1 && i + 1 < n {
        out.push(nodes[i + 1].clone());
    }
    if i + width < n {
        out.push(nodes[i + width].clone());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node_range(n: usize) -> Vec<NodeId> {
        (0..n)
            .map(|i| NodeId::from_short(&alloc::format!("{}", i)))
            .collect()
    }

    #[test]
    fn ring_topology_scenario_a() {
        // spec.md Sec. 8, Scenario A: 3-node ring.
        let nodes = node_range(3);
        assert_eq!(
            neighbors_for(Topology::Ring, &nodes, 0),
            alloc::vec![nodes[2].clone(), nodes[1].clone()]
        );
        assert_eq!(
            neighbors_for(Topology::Ring, &nodes, 1),
            alloc::vec![nodes[0].clone(), nodes[2].clone()]
        );
    }

    #[test]
    fn ring_single_node_has_no_neighbors() {
        let nodes = node_range(1);
        assert!(neighbors_for(Topology::Ring, &nodes, 0).is_empty());
    }

    #[test]
    fn line_topology_scenario_b() {
        // spec.md Sec. 8, Scenario B: 4-node line A-B-C-D.
        let nodes = node_range(4);
        assert_eq!(neighbors_for(Topology::Line, &nodes, 0), alloc::vec![nodes[1].clone()]);
        assert_eq!(
            neighbors_for(Topology::Line, &nodes, 1),
            alloc::vec![nodes[0].clone(), nodes[2].clone()]
        );
        assert_eq!(neighbors_for(Topology::Line, &nodes, 3), alloc::vec![nodes[2].clone()]);
    }

    #[test]
    fn tree_topology_scenario_d() {
        // spec.md Sec. 8, Scenario D: 7-node complete binary tree.
        let nodes = node_range(7);
        assert_eq!(
            neighbors_for(Topology::Tree, &nodes, 0),
            alloc::vec![nodes[1].clone(), nodes[2].clone()]
        );
        assert_eq!(
            neighbors_for(Topology::Tree, &nodes, 1),
            alloc::vec![nodes[0].clone(), nodes[3].clone(), nodes[4].clone()]
        );
        assert_eq!(neighbors_for(Topology::Tree, &nodes, 6), alloc::vec![nodes[2].clone()]);
    }

    #[test]
    fn mesh_topology_3x3_grid() {
        let nodes = node_range(9);
        // width = round(sqrt(9)) = 3, classic grid.
        assert_eq!(
            neighbors_for(Topology::Mesh, &nodes, 0),
            alloc::vec![nodes[1].clone(), nodes[3].clone()]
        );
        assert_eq!(
            neighbors_for(Topology::Mesh, &nodes, 4),
            alloc::vec![nodes[1].clone(), nodes[3].clone(), nodes[5].clone(), nodes[7].clone()]
        );
    }

    #[test]
    fn general_topology_has_no_coordinator_assigned_neighbors() {
        let nodes = node_range(5);
        assert!(neighbors_for(Topology::General, &nodes, 2).is_empty());
    }

    #[test]
    fn build_topology_matches_per_node_calls() {
        let nodes = node_range(5);
        let table = build_topology(Topology::Ring, &nodes);
        assert_eq!(table.len(), 5);
        for (i, n) in table.iter().enumerate() {
            assert_eq!(n, &neighbors_for(Topology::Ring, &nodes, i));
        }
    }
}
