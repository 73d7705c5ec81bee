//! Integration test: structural properties of the computed tree on
//! randomly generated topologies.

use std::collections::{BTreeSet, HashMap, VecDeque};

use meshd_core::NodeId;
use meshd_graph::{EdgeOrigin, Graph};
use meshd_integration_tests::id;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

const SEEDS: u64 = 40;

/// Random edge list over nodes n00..n{size}, self is n00.
fn random_edges(rng: &mut StdRng, size: usize) -> Vec<(NodeId, NodeId, u32)> {
    let names: Vec<NodeId> = (0..size).map(|i| id(&format!("n{:02}", i))).collect();
    let mut edges = Vec::new();
    for i in 0..size {
        for j in (i + 1)..size {
            if rng.gen_bool(0.2) {
                edges.push((names[i].clone(), names[j].clone(), rng.gen_range(1..=5)));
            }
        }
    }
    edges
}

fn build(edges: &[(NodeId, NodeId, u32)]) -> Graph {
    let me = id("n00");
    let mut graph = Graph::new(me.clone());
    for (a, b, w) in edges {
        let origin = if *a == me || *b == me {
            EdgeOrigin::Local
        } else {
            EdgeOrigin::Gossiped
        };
        graph.add_edge(a, b, *w, origin).unwrap();
    }
    graph
}

/// Plain BFS over the edge list, ignoring weights.
fn component(edges: &[(NodeId, NodeId, u32)], root: &NodeId) -> BTreeSet<NodeId> {
    let mut adjacency: HashMap<&NodeId, Vec<&NodeId>> = HashMap::new();
    for (a, b, _) in edges {
        adjacency.entry(a).or_default().push(b);
        adjacency.entry(b).or_default().push(a);
    }
    let mut seen = BTreeSet::from([root.clone()]);
    let mut queue = VecDeque::from([root]);
    while let Some(node) = queue.pop_front() {
        for next in adjacency.get(node).into_iter().flatten() {
            if seen.insert((*next).clone()) {
                queue.push_back(*next);
            }
        }
    }
    seen
}

fn reachable(graph: &mut Graph) -> BTreeSet<NodeId> {
    graph.recompute();
    graph
        .nodes()
        .iter()
        .filter(|n| n.is_reachable())
        .map(|n| n.id().clone())
        .collect()
}

#[test]
fn test_reachable_set_is_connected_component() {
    for seed in 0..SEEDS {
        let mut rng = StdRng::seed_from_u64(seed);
        let edges = random_edges(&mut rng, 14);
        let mut graph = build(&edges);

        assert_eq!(
            reachable(&mut graph),
            component(&edges, &id("n00")),
            "seed {}",
            seed
        );
    }
}

#[test]
fn test_via_chains_terminate_at_neighbors() {
    for seed in 0..SEEDS {
        let mut rng = StdRng::seed_from_u64(seed);
        let edges = random_edges(&mut rng, 14);
        let mut graph = build(&edges);
        let me = id("n00");
        let reached = reachable(&mut graph);

        for start in &reached {
            let mut current = start.clone();
            let mut steps = 0;
            loop {
                let via = graph.next_hop(&current).expect("reachable node has a next hop");
                if via == current {
                    // Only the root and direct neighbors route to themselves.
                    assert!(current == me || graph.is_neighbor(&current), "seed {}", seed);
                    break;
                }
                assert!(graph.is_neighbor(&via), "seed {}: {} is not a neighbor", seed, via);
                current = via;
                steps += 1;
                assert!(steps <= reached.len(), "seed {}: via cycle from {}", seed, start);
            }
        }
    }
}

#[test]
fn test_distance_is_sum_of_tree_weights() {
    for seed in 0..SEEDS {
        let mut rng = StdRng::seed_from_u64(seed);
        let edges = random_edges(&mut rng, 12);
        let mut graph = build(&edges);
        let tree = graph.broadcast_edges();
        let me = id("n00");

        for (parent, child) in tree {
            let weight = graph.edge(&parent, &child).unwrap().weight;
            let parent_distance = graph.node(&parent).unwrap().distance().unwrap();
            let child_distance = graph.node(&child).unwrap().distance().unwrap();
            assert_eq!(child_distance, parent_distance + u64::from(weight), "seed {}", seed);
            assert_ne!(child, me);
        }
    }
}

#[test]
fn test_insertion_order_does_not_matter() {
    for seed in 0..SEEDS {
        let mut rng = StdRng::seed_from_u64(seed);
        let edges = random_edges(&mut rng, 14);
        let mut shuffled = edges.clone();
        shuffled.shuffle(&mut rng);

        let first = build(&edges).snapshot();
        let second = build(&shuffled).snapshot();
        assert_eq!(first.nodes, second.nodes, "seed {}", seed);
        assert_eq!(first.broadcast_edges, second.broadcast_edges, "seed {}", seed);
    }
}

#[test]
fn test_recompute_idempotent() {
    let mut rng = StdRng::seed_from_u64(7);
    let edges = random_edges(&mut rng, 16);
    let mut graph = build(&edges);

    graph.recompute();
    assert!(!graph.is_dirty());
    let first = graph.snapshot();
    graph.recompute();
    graph.recompute();
    let third = graph.snapshot();
    assert_eq!(first.nodes, third.nodes);
    assert!(!graph.is_dirty());
}

#[test]
fn test_removing_non_tree_edges_keeps_routes() {
    for seed in 0..SEEDS {
        let mut rng = StdRng::seed_from_u64(seed);
        let edges = random_edges(&mut rng, 12);
        let mut graph = build(&edges);
        let tree: BTreeSet<(NodeId, NodeId)> = graph
            .broadcast_edges()
            .into_iter()
            .map(|(a, b)| if a < b { (a, b) } else { (b, a) })
            .collect();
        let before = graph.snapshot();

        for (a, b, _) in &edges {
            if !tree.contains(&(a.clone(), b.clone())) {
                graph.remove_edge(a, b).unwrap();
            }
        }
        assert_eq!(graph.snapshot().nodes, before.nodes, "seed {}", seed);
    }
}

#[test]
fn test_removing_tree_edge_matches_fresh_build() {
    for seed in 0..SEEDS {
        let mut rng = StdRng::seed_from_u64(seed);
        let edges = random_edges(&mut rng, 12);
        let mut graph = build(&edges);
        let Some((parent, child)) = graph.broadcast_edges().into_iter().last() else {
            continue;
        };

        graph.remove_edge(&parent, &child).unwrap();
        let remaining: Vec<_> = edges
            .iter()
            .filter(|(a, b, _)| !((*a == parent && *b == child) || (*a == child && *b == parent)))
            .cloned()
            .collect();

        // Same registry contents, so the same tree as building from scratch,
        // with nodes only mentioned by the removed edge still registered.
        let mut fresh = build(&remaining);
        for node in [&parent, &child] {
            fresh.node_seen(node);
        }
        assert_eq!(graph.snapshot().nodes, fresh.snapshot().nodes, "seed {}", seed);
        assert_eq!(
            reachable(&mut graph),
            component(&remaining, &id("n00")),
            "seed {}",
            seed
        );
    }
}
