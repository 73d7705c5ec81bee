//! Integration test: routing decisions for the reference scenarios.

use meshd_core::RoutingMode;
use meshd_device::ConfigError;
use meshd_graph::{EdgeOrigin, Graph, NodeStatus, SharedGraph};
use meshd_integration_tests::id;
use meshd_node::{MeshConfig, MeshNode};

fn add(graph: &mut Graph, a: &str, b: &str, weight: u32) {
    let origin = if a == graph.self_id().as_str() || b == graph.self_id().as_str() {
        EdgeOrigin::Local
    } else {
        EdgeOrigin::Gossiped
    };
    graph.add_edge(&id(a), &id(b), weight, origin).unwrap();
}

// =========================================================================
// Scenario A: chain
// =========================================================================

#[test]
fn test_chain_reaches_far_end_through_neighbor() {
    let mut graph = Graph::new(id("1"));
    add(&mut graph, "1", "2", 1);
    add(&mut graph, "2", "3", 1);

    assert!(graph.is_reachable(&id("3")));
    assert_eq!(graph.next_hop(&id("3")), Some(id("2")));
    let node = graph.node(&id("3")).unwrap();
    assert_eq!(node.status(), NodeStatus::Reachable);
    assert_eq!(node.distance(), Some(2));
}

// =========================================================================
// Scenario B: losing the far edge
// =========================================================================

#[test]
fn test_removed_edge_makes_node_unreachable() {
    let mut graph = Graph::new(id("1"));
    add(&mut graph, "1", "2", 1);
    add(&mut graph, "2", "3", 1);
    graph.recompute();

    graph.remove_edge(&id("2"), &id("3")).unwrap();
    assert!(graph.is_dirty());
    assert_eq!(graph.next_hop(&id("3")), None);
    assert_eq!(
        graph.node(&id("3")).unwrap().status(),
        NodeStatus::Unreachable
    );
    // 2 is unaffected.
    assert_eq!(graph.next_hop(&id("2")), Some(id("2")));
}

// =========================================================================
// Scenario C: equal-cost paths
// =========================================================================

#[test]
fn test_equal_cost_tie_goes_to_lower_id() {
    // Insert in an order that favors 3 if ties were broken by arrival.
    let mut graph = Graph::new(id("1"));
    add(&mut graph, "1", "3", 1);
    add(&mut graph, "3", "4", 1);
    add(&mut graph, "1", "2", 1);
    add(&mut graph, "2", "4", 1);

    assert_eq!(graph.next_hop(&id("4")), Some(id("2")));
    assert_eq!(graph.node(&id("4")).unwrap().distance(), Some(2));
}

// =========================================================================
// Scenario D: unsupported device
// =========================================================================

#[test]
fn test_unsupported_device_type_aborts_startup() {
    let mut config = MeshConfig::default();
    config.node.name = "1".into();
    config.device.device_type = Some("tun".into());

    let err = MeshNode::new(config).err().expect("startup must fail");
    let config_err = err
        .downcast_ref::<ConfigError>()
        .expect("failure is a configuration error");
    assert_eq!(config_err, &ConfigError::UnknownDeviceType("tun".into()));
}

#[test]
fn test_router_mode_without_device_aborts_startup() {
    let mut config = MeshConfig::default();
    config.routing.mode = RoutingMode::Router;

    let err = MeshNode::new(config).err().expect("startup must fail");
    assert!(matches!(
        err.downcast_ref::<ConfigError>(),
        Some(ConfigError::RouterModeUnsupported)
    ));
}

// =========================================================================
// Edge removal
// =========================================================================

/// 1-2 (1), 1-3 (1), 2-3 (4), 3-4 (1), 2-5 (2), 4-5 (1)
fn meshy() -> Graph {
    let mut graph = Graph::new(id("1"));
    for (a, b, w) in [
        ("1", "2", 1),
        ("1", "3", 1),
        ("2", "3", 4),
        ("3", "4", 1),
        ("2", "5", 2),
        ("4", "5", 1),
    ] {
        add(&mut graph, a, b, w);
    }
    graph
}

#[test]
fn test_removing_non_tree_edge_changes_nothing() {
    let mut graph = meshy();
    let before = graph.snapshot();
    assert!(!before.broadcast_edges.contains(&(id("2"), id("3"))));

    graph.remove_edge(&id("2"), &id("3")).unwrap();
    let after = graph.snapshot();
    assert_eq!(before.nodes, after.nodes);
}

#[test]
fn test_removing_tree_edge_selects_cheapest_alternative() {
    let mut graph = meshy();
    assert_eq!(graph.next_hop(&id("5")), Some(id("3")));

    graph.remove_edge(&id("3"), &id("4")).unwrap();

    // 4 and 5 now hang off 2 through 2-5 (2), the cheapest remaining link.
    assert_eq!(graph.next_hop(&id("5")), Some(id("2")));
    assert_eq!(graph.next_hop(&id("4")), Some(id("2")));
    let five = graph.node(&id("5")).unwrap();
    assert_eq!(five.distance(), Some(3));
    assert_eq!(five.mst_edge().unwrap().to_string(), "2-5");
}

#[test]
fn test_self_eviction_refused() {
    let mut graph = meshy();
    assert!(graph.evict_node(&id("1")).is_err());
    assert!(graph.is_reachable(&id("1")));
}

#[test]
fn test_shared_graph_serves_other_threads() {
    let shared = SharedGraph::new(meshy());
    let reader = shared.clone();
    let hop = std::thread::spawn(move || reader.next_hop(&id("4")).unwrap())
        .join()
        .unwrap();
    assert_eq!(hop, Some(id("3")));
}
