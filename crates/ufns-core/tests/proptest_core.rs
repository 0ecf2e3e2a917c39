//! Property-based tests for the UFNS decoding core.
//!
//! Uses proptest to generate random error patterns and union sequences,
//! then verify structural invariants hold.

use proptest::prelude::*;
use std::collections::HashMap;
use ufns_core::batch::ErrorPattern;
use ufns_core::cluster::ClusterForest;
use ufns_core::config::{DecoderConfig, GrowthPolicy};
use ufns_core::decoder::Decoder;
use ufns_core::id::*;
use ufns_core::lattice::LatticeGraph;
use ufns_core::test_utils::*;

// ===========================================================================
// Generators
// ===========================================================================

fn arb_kind() -> impl Strategy<Value = StabKind> {
    prop_oneof![Just(StabKind::Primal), Just(StabKind::Dual)]
}

fn arb_policy() -> impl Strategy<Value = GrowthPolicy> {
    prop_oneof![
        Just(GrowthPolicy::Uniform),
        Just(GrowthPolicy::Balanced),
        Just(GrowthPolicy::NodeSuspension),
    ]
}

/// Random flips on a toric lattice of `size`; every coordinate exists.
fn arb_toric_pattern(size: i32, max_flips: usize) -> impl Strategy<Value = ErrorPattern> {
    proptest::collection::vec((0..size, 0..size, any::<bool>(), arb_kind()), 0..=max_flips).prop_map(
        |flips| ErrorPattern {
            flips: flips
                .into_iter()
                .map(|(row, col, vert, kind)| {
                    let coord = if vert { vertical(row, col) } else { horizontal(row, col) };
                    (coord, kind)
                })
                .collect(),
        },
    )
}

/// Random flips on a planar lattice of `size`. Vertical qubits only exist
/// away from the last row and the first column.
fn arb_planar_pattern(size: i32, max_flips: usize) -> impl Strategy<Value = ErrorPattern> {
    proptest::collection::vec((0..size, 0..size, any::<bool>(), arb_kind()), 0..=max_flips).prop_map(
        move |flips| ErrorPattern {
            flips: flips
                .into_iter()
                .map(|(row, col, vert, kind)| {
                    let coord = if vert {
                        vertical(row % (size - 1), 1 + col % (size - 1))
                    } else {
                        horizontal(row, col)
                    };
                    (coord, kind)
                })
                .collect(),
        },
    )
}

fn arb_unions(max_ops: usize) -> impl Strategy<Value = Vec<(usize, usize)>> {
    proptest::collection::vec((0..64usize, 0..64usize), 0..=max_ops)
}

fn decoded(template: &LatticeGraph, pattern: &ErrorPattern, policy: GrowthPolicy) -> (LatticeGraph, Decoder) {
    let mut graph = template.clone();
    pattern.apply(&mut graph).unwrap();
    let mut decoder = Decoder::new(DecoderConfig::with_policy(policy));
    decoder.decode(&mut graph);
    (graph, decoder)
}

// ===========================================================================
// Properties
// ===========================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// find is idempotent, union joins, and each root's size equals the
    /// number of vertices resolving to it.
    #[test]
    fn union_find_invariants(ops in arb_unions(80)) {
        let mut graph = LatticeGraph::toric(4).unwrap();
        let vertices: Vec<VertexId> = graph.vertices().map(|(id, _)| id).collect();
        let mut forest = ClusterForest::new();
        let ids: Vec<ClusterId> = vertices
            .iter()
            .map(|&v| {
                let id = forest.create();
                forest.add_vertex(&mut graph, id, v);
                id
            })
            .collect();

        for (a, b) in ops {
            let a = ids[a % ids.len()];
            let b = ids[b % ids.len()];
            let root = forest.union(a, b);
            prop_assert_eq!(forest.find(a), root);
            prop_assert_eq!(forest.find(b), root);
            let again = forest.find(root);
            prop_assert_eq!(again, root);
        }

        let mut members: HashMap<ClusterId, u32> = HashMap::new();
        for &v in &vertices {
            let root = forest.find_vertex(&graph, v).unwrap();
            *members.entry(root).or_default() += 1;
        }
        for root in forest.roots() {
            let cluster = forest.get(root).unwrap();
            prop_assert_eq!(cluster.size, members.get(&root).copied().unwrap_or(0));
            prop_assert_eq!(cluster.vertices.len() as u32, cluster.size);
        }
    }

    /// Every defect ends up in exactly one root, and the defect counts of
    /// the roots add up to the measured syndrome weight.
    #[test]
    fn defects_are_conserved(pattern in arb_toric_pattern(5, 12), policy in arb_policy()) {
        let template = LatticeGraph::toric(5).unwrap();
        let (graph, mut decoder) = decoded(&template, &pattern, policy);

        let defects: Vec<VertexId> = graph.defects().collect();
        let total: u32 = decoder
            .forest()
            .iter()
            .filter(|c| c.is_root())
            .map(|c| c.parity)
            .sum();
        prop_assert_eq!(total as usize, defects.len());
        for v in defects {
            prop_assert!(decoder.cluster_of(&graph, v).is_some());
        }
    }

    /// A toric lattice has no boundary, so every cluster must pair up its
    /// defects.
    #[test]
    fn toric_decoding_neutralizes(pattern in arb_toric_pattern(6, 10), policy in arb_policy()) {
        let mut graph = LatticeGraph::toric(6).unwrap();
        pattern.apply(&mut graph).unwrap();
        let outcome = Decoder::new(DecoderConfig::with_policy(policy)).decode(&mut graph);
        prop_assert!(outcome.is_success(), "{:?}", outcome.failed);
        for cluster in &outcome.clusters {
            prop_assert_eq!(cluster.parity, 0);
        }
    }

    /// On a planar lattice odd clusters are neutralized by the boundary.
    #[test]
    fn planar_decoding_neutralizes(pattern in arb_planar_pattern(5, 8), policy in arb_policy()) {
        let mut graph = LatticeGraph::planar(5).unwrap();
        pattern.apply(&mut graph).unwrap();
        let outcome = Decoder::new(DecoderConfig::with_policy(policy)).decode(&mut graph);
        prop_assert!(outcome.is_success(), "{:?}", outcome.failed);
        for cluster in outcome.clusters.iter().filter(|c| c.parity == 1) {
            prop_assert!(cluster.on_boundary);
        }
    }

    /// The node-tree's structural parity matches a direct count of the
    /// cluster's defects, and normalized delays bottom out at zero.
    #[test]
    fn node_tree_parity_and_delay(pattern in arb_toric_pattern(5, 10)) {
        let template = LatticeGraph::toric(5).unwrap();
        let (mut graph, mut decoder) = decoded(&template, &pattern, GrowthPolicy::NodeSuspension);

        for root in decoder.forest().roots() {
            let naive = decoder.forest().get(root).unwrap().parity_bit() as u8;
            let tree = decoder.node_tree(&mut graph, root).unwrap();
            prop_assert_eq!(tree.defect_parity().unwrap(), naive);
            let min = tree.nodes().map(|(_, n)| n.delay).min();
            prop_assert_eq!(min, Some(0));
        }
    }

    /// reset restores a decoded lattice to its freshly built state.
    #[test]
    fn reset_round_trip(pattern in arb_planar_pattern(4, 8)) {
        let template = LatticeGraph::planar(4).unwrap();
        let (mut graph, _) = decoded(&template, &pattern, GrowthPolicy::NodeSuspension);
        graph.reset();

        for (_, vertex) in graph.vertices() {
            prop_assert!(!vertex.state);
            prop_assert!(vertex.cluster.is_none());
            prop_assert!(vertex.node.is_none());
            prop_assert!(!vertex.visited);
        }
        for (_, edge) in graph.edges() {
            prop_assert!(!edge.state);
            prop_assert_eq!(edge.support, 0);
            prop_assert!(edge.cluster.is_none());
        }
        let outcome = Decoder::default().decode(&mut graph);
        prop_assert!(outcome.clusters.is_empty());
    }
}
