//! Integration test: topology gossip across several simulated nodes.
//!
//! Every node must end up with the same edge set and, because candidate
//! edges are ranked by weight and key, the same broadcast tree.

use meshd_graph::{EdgeOrigin, NodeStatus};
use meshd_integration_tests::{id, tree_pairs, Mesh};

/// Ring 1-2-3-4-5-6-1 with a chord 2-5.
fn ring() -> Mesh {
    let mut mesh = Mesh::new(&["1", "2", "3", "4", "5", "6"]);
    for (a, b, w) in [
        ("1", "2", 1),
        ("2", "3", 2),
        ("3", "4", 1),
        ("4", "5", 3),
        ("5", "6", 1),
        ("6", "1", 2),
        ("2", "5", 1),
    ] {
        mesh.connect(a, b, w);
    }
    mesh
}

// =========================================================================
// Convergence
// =========================================================================

#[test]
fn test_all_nodes_learn_every_edge() {
    let mesh = ring();
    let sets = mesh.edge_sets();
    let reference = &sets[&id("1")];
    assert_eq!(reference.len(), 7);
    for (node, set) in &sets {
        assert_eq!(set, reference, "node {} diverged", node);
    }
}

#[test]
fn test_gossip_terminates_without_loops() {
    let mut mesh = ring();
    let before = mesh.delivered;
    // Nothing new to say: settling again delivers nothing.
    assert_eq!(mesh.settle(), 0);
    assert_eq!(mesh.delivered, before);
}

#[test]
fn test_broadcast_tree_identical_everywhere() {
    let mut mesh = ring();
    let reference = tree_pairs(mesh.graph("1"));
    assert_eq!(reference.len(), 5);
    for name in mesh.names() {
        let tree = tree_pairs(mesh.graph(name.as_str()));
        assert_eq!(tree, reference, "node {} built a different tree", name);
    }
}

#[test]
fn test_next_hops_are_neighbors() {
    let mut mesh = ring();
    for name in mesh.names() {
        let graph = mesh.graph(name.as_str());
        for target in graph.nodes().ids() {
            let hop = graph.next_hop(&target).expect("ring is connected");
            if hop != name {
                assert!(graph.is_neighbor(&hop), "{} routes via non-neighbor {}", name, hop);
            }
        }
    }
}

// =========================================================================
// Churn
// =========================================================================

#[test]
fn test_tunnel_loss_propagates() {
    let mut mesh = ring();
    mesh.disconnect("3", "4");

    let sets = mesh.edge_sets();
    for set in sets.values() {
        assert_eq!(set.len(), 6);
        assert!(!set.contains(&(id("3"), id("4"), 1)));
    }
    // Still connected the long way round.
    assert_eq!(mesh.graph("3").next_hop(&id("4")), Some(id("2")));
}

#[test]
fn test_partition_marks_far_side_unreachable() {
    let mut mesh = Mesh::new(&["1", "2", "3"]);
    mesh.connect("1", "2", 1);
    mesh.connect("2", "3", 1);
    assert!(mesh.graph("1").is_reachable(&id("3")));

    mesh.disconnect("2", "3");
    let node = mesh.graph("1");
    assert!(!node.is_reachable(&id("3")));
    assert_eq!(node.node(&id("3")).unwrap().status(), NodeStatus::Unreachable);
    assert_eq!(node.next_hop(&id("3")), None);
}

#[test]
fn test_late_joiner_receives_full_topology() {
    let mut mesh = Mesh::new(&["1", "2", "3", "9"]);
    mesh.connect("1", "2", 1);
    mesh.connect("2", "3", 1);

    mesh.connect("9", "3", 1);
    let joiner = mesh.graph("9");
    assert_eq!(joiner.edges().len(), 3);
    assert_eq!(joiner.next_hop(&id("1")), Some(id("3")));
    assert_eq!(joiner.node(&id("1")).unwrap().distance(), Some(3));
}

#[test]
fn test_weight_change_reroutes() {
    let mut mesh = Mesh::new(&["1", "2", "3"]);
    mesh.connect("1", "2", 1);
    mesh.connect("2", "3", 1);
    mesh.connect("1", "3", 5);
    assert_eq!(mesh.graph("1").next_hop(&id("3")), Some(id("2")));

    // Re-establishing the direct tunnel with a lower weight.
    mesh.graph("1")
        .add_edge(&id("1"), &id("3"), 1, EdgeOrigin::Local)
        .unwrap();
    mesh.graph("3")
        .add_edge(&id("3"), &id("1"), 1, EdgeOrigin::Local)
        .unwrap();
    mesh.settle();

    assert_eq!(mesh.graph("1").next_hop(&id("3")), Some(id("3")));
    assert_eq!(mesh.graph("2").edge(&id("1"), &id("3")).unwrap().weight, 1);
}

#[test]
fn test_healed_partition_drops_stale_edges() {
    let mut mesh = Mesh::new(&["a", "b", "c", "d"]);
    mesh.connect("a", "b", 1);
    mesh.connect("b", "c", 1);
    mesh.connect("c", "d", 1);

    // a is cut off, then c-d goes away while a cannot hear about it.
    mesh.disconnect("a", "b");
    mesh.disconnect("c", "d");
    assert!(mesh.graph("a").edge(&id("c"), &id("d")).is_some());

    // a re-floods its stale copy of c-d; c corrects it.
    mesh.connect("a", "b", 1);
    assert!(mesh.refused > 0);
    for name in ["a", "b", "c"] {
        let graph = mesh.graph(name);
        assert!(
            graph.edge(&id("c"), &id("d")).is_none(),
            "{} kept the stale edge",
            name
        );
        assert_eq!(graph.next_hop(&id("d")), None);
    }
    assert_eq!(mesh.graph("a").next_hop(&id("c")), Some(id("b")));
}
