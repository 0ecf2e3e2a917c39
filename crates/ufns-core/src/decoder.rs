//! Round loop of the union-find decoder.
//!
//! # Round Pipeline
//!
//! [`Decoder::decode`] measures the stabilizers, seeds one cluster per
//! defect and then pops buckets in non-decreasing order. Each bucket runs:
//!
//! 1. **Grow** -- every root placed in the bucket adds a half-step of support
//!    to its frontier (node-suspended edges excepted).
//! 2. **Merge** -- fully grown edges absorb new vertices or union clusters.
//! 3. **Place** -- surviving non-neutral roots get their next bucket from the
//!    growth policy; under [`GrowthPolicy::NodeSuspension`] clusters whose
//!    membership changed rebuild and reschedule their node-tree first.
//!
//! The loop ends when no bucket is left or the round limit is passed. A
//! cluster that is still not neutral is a decoding failure, reported in the
//! [`DecodeOutcome`] rather than as an error.

use crate::cluster::ClusterForest;
use crate::config::{DecoderConfig, GrowthPolicy};
use crate::id::{ClusterId, VertexId};
use crate::lattice::LatticeGraph;
use crate::node_tree::{NodeTree, NodeTreeError};
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use tracing::{debug, warn};

// ---------------------------------------------------------------------------
// Outcome
// ---------------------------------------------------------------------------

/// Final state of one root cluster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClusterSummary {
    pub id: ClusterId,
    pub size: u32,
    /// Number of defect members.
    pub defects: u32,
    /// `defects % 2`.
    pub parity: u32,
    pub on_boundary: bool,
    pub neutral: bool,
    pub stalled: bool,
}

/// Counters accumulated over a decode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RoundStats {
    /// Buckets that ran.
    pub rounds: u32,
    pub last_bucket: Option<u32>,
    pub edges_grown: usize,
    pub suspended: usize,
    pub absorbed: usize,
    pub unions: usize,
    pub tree_rebuilds: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct DecodeOutcome {
    /// Every root cluster, in creation order.
    pub clusters: Vec<ClusterSummary>,
    /// Roots that never became neutral.
    pub failed: Vec<ClusterId>,
    /// False when the round limit cut the loop short.
    pub converged: bool,
    pub stats: RoundStats,
}

impl DecodeOutcome {
    pub fn is_success(&self) -> bool {
        self.converged && self.failed.is_empty()
    }

    pub fn cluster(&self, id: ClusterId) -> Option<&ClusterSummary> {
        self.clusters.iter().find(|c| c.id == id)
    }
}

// ---------------------------------------------------------------------------
// Decoder
// ---------------------------------------------------------------------------

/// Clustering engine for one lattice at a time.
#[derive(Debug, Clone, Default)]
pub struct Decoder {
    config: DecoderConfig,
    forest: ClusterForest,
    buckets: BTreeMap<u32, Vec<ClusterId>>,
    stats: RoundStats,

    /// Timing profile for the most recent decode (profiling feature only).
    #[cfg(feature = "profiling")]
    profile: crate::profiling::DecodeProfile,
}

impl Decoder {
    pub fn new(config: DecoderConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    pub fn config(&self) -> &DecoderConfig {
        &self.config
    }

    /// Clusters left by the last decode.
    pub fn forest(&self) -> &ClusterForest {
        &self.forest
    }

    pub fn forest_mut(&mut self) -> &mut ClusterForest {
        &mut self.forest
    }

    /// Phase timing of the last decode.
    #[cfg(feature = "profiling")]
    pub fn last_profile(&self) -> Option<&crate::profiling::DecodeProfile> {
        (self.profile.rounds > 0 || !self.profile.total.is_zero()).then_some(&self.profile)
    }

    /// Root cluster that absorbed `vertex` in the last decode.
    pub fn cluster_of(&mut self, graph: &LatticeGraph, vertex: VertexId) -> Option<ClusterId> {
        self.forest.find_vertex(graph, vertex)
    }

    /// Measure the stabilizers from the current edge states, then cluster.
    pub fn decode(&mut self, graph: &mut LatticeGraph) -> DecodeOutcome {
        graph.measure_stabilizers();
        self.cluster(graph)
    }

    /// Cluster the defects already recorded on the vertices.
    pub fn cluster(&mut self, graph: &mut LatticeGraph) -> DecodeOutcome {
        graph.grow_reset();
        self.forest.clear();
        self.buckets.clear();
        self.stats = RoundStats::default();

        #[cfg(feature = "profiling")]
        let decode_start = std::time::Instant::now();
        #[cfg(feature = "profiling")]
        {
            self.profile = crate::profiling::DecodeProfile::default();
        }

        self.seed(graph);

        #[cfg(feature = "profiling")]
        {
            self.profile.seed = decode_start.elapsed();
        }

        let limit = self.config.round_limit(graph);
        let mut converged = true;
        while let Some((bucket, members)) = self.buckets.pop_first() {
            if bucket > limit {
                self.buckets.insert(bucket, members);
                converged = false;
                break;
            }
            self.run_round(graph, bucket, members);
        }

        #[cfg(feature = "profiling")]
        {
            self.profile.total = decode_start.elapsed();
            self.profile.rounds = self.stats.rounds;
        }

        let outcome = self.outcome(converged);
        if !outcome.is_success() {
            warn!(
                failed = outcome.failed.len(),
                converged,
                rounds = outcome.stats.rounds,
                "decoding did not neutralize every cluster"
            );
        }
        debug!(
            clusters = outcome.clusters.len(),
            rounds = outcome.stats.rounds,
            unions = outcome.stats.unions,
            "clustering finished"
        );
        outcome
    }

    /// Build and schedule a fresh node-tree for the cluster holding `cluster`.
    ///
    /// Overwrites the `node` keys of its vertices, so call it only after a
    /// decode has finished.
    pub fn node_tree(
        &mut self,
        graph: &mut LatticeGraph,
        cluster: ClusterId,
    ) -> Result<NodeTree, NodeTreeError> {
        let root = self.forest.find(cluster);
        let cluster = self
            .forest
            .get(root)
            .ok_or(NodeTreeError::EmptyCluster(root))?;
        let mut tree = NodeTree::build(graph, cluster)?;
        tree.schedule()?;
        Ok(tree)
    }

    // -----------------------------------------------------------------------
    // Internal: phases
    // -----------------------------------------------------------------------

    fn seed(&mut self, graph: &mut LatticeGraph) {
        let defects: Vec<VertexId> = graph.defects().collect();
        for vertex in defects {
            if graph.vertices[vertex].cluster.is_some() {
                continue;
            }
            let id = self.forest.create();
            self.forest.add_vertex(graph, id, vertex);
        }
        for root in self.forest.roots() {
            self.place(graph, root, -1, true);
        }
    }

    fn run_round(&mut self, graph: &mut LatticeGraph, bucket: u32, members: Vec<ClusterId>) {
        let round = i64::from(bucket);

        // Phase 1: Grow.
        #[cfg(feature = "profiling")]
        let phase_start = std::time::Instant::now();
        let mut grown = Vec::with_capacity(members.len());
        for id in members {
            let root = self.forest.find(id);
            let Some(cluster) = self.forest.get_mut(root) else {
                continue;
            };
            if cluster.bucket != Some(bucket) || cluster.is_neutral() {
                continue;
            }
            cluster.bucket = None;
            let anchor = cluster.anchor_round;
            if let Some(tree) = cluster.tree.as_mut() {
                tree.advance_to((round - anchor - 1).max(0) as u32);
            }

            let step = self.forest.grow_cluster(graph, root);
            self.stats.edges_grown += step.grown;
            self.stats.suspended += step.suspended;
            grown.push(root);
        }

        #[cfg(feature = "profiling")]
        {
            self.profile.grow += phase_start.elapsed();
        }

        // Phase 2: Merge.
        #[cfg(feature = "profiling")]
        let phase_start = std::time::Instant::now();
        let mut changed = Vec::new();
        for &root in &grown {
            let step = self.forest.merge_full_frontier(graph, root);
            self.stats.absorbed += step.absorbed;
            self.stats.unions += step.unions;
            if step.changed_membership() {
                changed.push(root);
            }
        }
        let changed: HashSet<ClusterId> = changed.into_iter().map(|c| self.forest.find(c)).collect();

        #[cfg(feature = "profiling")]
        {
            self.profile.merge += phase_start.elapsed();
        }

        // Phase 3: Place.
        #[cfg(feature = "profiling")]
        let phase_start = std::time::Instant::now();
        let mut placed = HashSet::new();
        for root in grown {
            let root = self.forest.find(root);
            if placed.insert(root) {
                self.place(graph, root, round, changed.contains(&root));
            }
        }

        #[cfg(feature = "profiling")]
        {
            self.profile.place += phase_start.elapsed();
        }

        self.stats.rounds += 1;
        self.stats.last_bucket = Some(bucket);
        debug!(bucket, clusters = placed.len(), changed = changed.len(), "growth round");
    }

    /// Put `root` in the bucket of its next growth step, or retire it if it
    /// is neutral or has nothing left to grow.
    fn place(&mut self, graph: &mut LatticeGraph, root: ClusterId, round: i64, rebuild: bool) {
        let Some(cluster) = self.forest.get_mut(root) else {
            return;
        };
        if cluster.is_neutral() {
            cluster.bucket = None;
            cluster.tree = None;
            return;
        }
        if cluster.frontier.is_empty() {
            cluster.bucket = None;
            cluster.stalled = true;
            warn!(cluster = root.0, size = cluster.size, "odd cluster has no frontier left");
            return;
        }

        let next = match self.config.policy {
            GrowthPolicy::Uniform => round + 1,
            GrowthPolicy::Balanced => {
                let weight = 2 * (i64::from(cluster.size) - 1) + i64::from(cluster.support);
                (round + 1).max(weight)
            }
            GrowthPolicy::NodeSuspension => {
                if rebuild || cluster.tree.is_none() {
                    if let Err(err) = self.rebuild_tree(graph, root, round) {
                        warn!(cluster = root.0, %err, "node-tree rebuild failed; growing unsuspended");
                    }
                }
                let Some(cluster) = self.forest.get(root) else {
                    return;
                };
                let earliest = cluster
                    .tree()
                    .and_then(|tree| {
                        cluster
                            .frontier
                            .half
                            .iter()
                            .filter_map(|entry| graph.vertices[entry.vertex].node)
                            .filter_map(|node| tree.node(node))
                            .map(|node| node.delay)
                            .min()
                    })
                    .unwrap_or(0);
                (round + 1).max(cluster.anchor_round + 1 + earliest)
            }
        };

        let next = next.max(0) as u32;
        if let Some(cluster) = self.forest.get_mut(root) {
            cluster.bucket = Some(next);
        }
        self.buckets.entry(next).or_default().push(root);
    }

    fn rebuild_tree(
        &mut self,
        graph: &mut LatticeGraph,
        root: ClusterId,
        round: i64,
    ) -> Result<(), NodeTreeError> {
        let cluster = self
            .forest
            .get(root)
            .ok_or(NodeTreeError::EmptyCluster(root))?;
        let mut tree = NodeTree::build(graph, cluster)?;
        tree.schedule()?;

        if let Some(cluster) = self.forest.get_mut(root) {
            cluster.tree = Some(tree);
            cluster.anchor_round = round;
        }
        self.stats.tree_rebuilds += 1;
        Ok(())
    }

    fn outcome(&self, converged: bool) -> DecodeOutcome {
        let clusters: Vec<ClusterSummary> = self
            .forest
            .iter()
            .filter(|c| c.is_root())
            .map(|c| ClusterSummary {
                id: c.id,
                size: c.size,
                defects: c.parity,
                parity: c.parity_bit(),
                on_boundary: c.on_boundary,
                neutral: c.is_neutral(),
                stalled: c.stalled,
            })
            .collect();
        let failed = clusters
            .iter()
            .filter(|c| !c.neutral)
            .map(|c| c.id)
            .collect();
        DecodeOutcome {
            clusters,
            failed,
            converged,
            stats: self.stats,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::{Orientation, QubitCoord, StabCoord, StabKind};
    use crate::lattice::Topology;

    const POLICIES: [GrowthPolicy; 3] = [
        GrowthPolicy::Uniform,
        GrowthPolicy::Balanced,
        GrowthPolicy::NodeSuspension,
    ];

    fn flip(graph: &mut LatticeGraph, row: i32, col: i32, orientation: Orientation, kind: StabKind) {
        graph
            .flip_edge(QubitCoord::new(row, col, orientation), kind)
            .unwrap();
    }

    fn primal(graph: &LatticeGraph, row: i32, col: i32) -> VertexId {
        graph
            .vertex_id(StabCoord::new(StabKind::Primal, row, col))
            .unwrap()
    }

    #[test]
    fn no_defects_no_clusters() {
        for policy in POLICIES {
            let mut graph = LatticeGraph::toric(4).unwrap();
            let outcome = Decoder::new(DecoderConfig::with_policy(policy)).decode(&mut graph);
            assert!(outcome.clusters.is_empty());
            assert!(outcome.is_success());
            assert_eq!(outcome.stats.rounds, 0);
        }
    }

    #[test]
    fn adjacent_pair_merges_in_one_round() {
        for policy in POLICIES {
            let mut graph = LatticeGraph::toric(3).unwrap();
            flip(&mut graph, 1, 0, Orientation::Horizontal, StabKind::Primal);
            let mut decoder = Decoder::new(DecoderConfig::with_policy(policy));
            let outcome = decoder.decode(&mut graph);

            assert!(outcome.is_success(), "{policy:?}");
            assert_eq!(outcome.stats.rounds, 1, "{policy:?}");
            assert_eq!(outcome.clusters.len(), 1);
            let cluster = &outcome.clusters[0];
            assert_eq!(cluster.size, 2);
            assert_eq!(cluster.parity, 0);
            assert!(cluster.neutral);
            let a = decoder.cluster_of(&graph, primal(&graph, 1, 0));
            let b = decoder.cluster_of(&graph, primal(&graph, 1, 1));
            assert_eq!(a, b);
        }
    }

    #[test]
    fn distant_pair_takes_more_rounds() {
        for policy in POLICIES {
            let mut graph = LatticeGraph::toric(8).unwrap();
            for col in 0..3 {
                flip(&mut graph, 4, col, Orientation::Horizontal, StabKind::Primal);
            }
            let outcome = Decoder::new(DecoderConfig::with_policy(policy)).decode(&mut graph);
            assert!(outcome.is_success(), "{policy:?}");
            assert!(outcome.stats.rounds >= 3, "{policy:?}");
            assert_eq!(outcome.clusters.len(), 1);
            assert_eq!(outcome.clusters[0].defects, 2);
        }
    }

    #[test]
    fn round_limit_reports_failure() {
        let mut graph = LatticeGraph::toric(8).unwrap();
        for col in 0..3 {
            flip(&mut graph, 4, col, Orientation::Horizontal, StabKind::Primal);
        }
        let config = DecoderConfig {
            policy: GrowthPolicy::Uniform,
            max_rounds: Some(1),
        };
        let outcome = Decoder::new(config).decode(&mut graph);
        assert!(!outcome.converged);
        assert_eq!(outcome.failed.len(), 2);
        assert!(!outcome.is_success());
    }

    #[test]
    fn isolated_defect_stalls() {
        let mut graph = LatticeGraph::new(2, Topology::Toric);
        let v = graph
            .add_vertex(StabCoord::new(StabKind::Primal, 0, 0))
            .unwrap();
        graph.vertex_mut(v).unwrap().state = true;

        let outcome = Decoder::default().cluster(&mut graph);
        assert_eq!(outcome.failed.len(), 1);
        assert!(outcome.clusters[0].stalled);
        assert!(outcome.converged);
    }

    #[test]
    fn boundary_absorbs_single_defect() {
        for policy in POLICIES {
            let mut graph = LatticeGraph::planar(3).unwrap();
            flip(&mut graph, 1, 0, Orientation::Horizontal, StabKind::Primal);
            let outcome = Decoder::new(DecoderConfig::with_policy(policy)).decode(&mut graph);

            assert!(outcome.is_success(), "{policy:?}");
            assert_eq!(outcome.clusters.len(), 1);
            let cluster = &outcome.clusters[0];
            assert_eq!(cluster.parity, 1);
            assert!(cluster.on_boundary);
            assert!(cluster.neutral);
        }
    }

    #[test]
    fn suspension_rebuilds_trees_on_merge() {
        let mut graph = LatticeGraph::toric(8).unwrap();
        for col in 0..3 {
            flip(&mut graph, 4, col, Orientation::Horizontal, StabKind::Primal);
        }
        let outcome = Decoder::default().decode(&mut graph);
        // One tree per seed, then one per membership change.
        assert!(outcome.stats.tree_rebuilds >= 3);
    }

    #[test]
    fn node_tree_of_finished_cluster() {
        let mut graph = LatticeGraph::toric(5).unwrap();
        flip(&mut graph, 2, 2, Orientation::Horizontal, StabKind::Primal);
        let mut decoder = Decoder::default();
        let outcome = decoder.decode(&mut graph);
        let id = outcome.clusters[0].id;

        let tree = decoder.node_tree(&mut graph, id).unwrap();
        assert_eq!(tree.defect_parity().unwrap(), 0);
        assert_eq!(tree.nodes().map(|(_, n)| n.delay).min(), Some(0));
    }

    #[test]
    fn decoding_twice_gives_the_same_outcome() {
        let mut graph = LatticeGraph::planar(5).unwrap();
        flip(&mut graph, 1, 1, Orientation::Horizontal, StabKind::Primal);
        flip(&mut graph, 3, 2, Orientation::Vertical, StabKind::Primal);
        flip(&mut graph, 2, 2, Orientation::Horizontal, StabKind::Dual);

        let mut decoder = Decoder::default();
        let first = decoder.decode(&mut graph);
        let second = decoder.decode(&mut graph);
        assert_eq!(first.clusters, second.clusters);
        assert_eq!(first.stats, second.stats);
    }

    #[test]
    fn outcome_serializes() {
        let mut graph = LatticeGraph::toric(3).unwrap();
        flip(&mut graph, 0, 0, Orientation::Vertical, StabKind::Dual);
        let outcome = Decoder::default().decode(&mut graph);
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["converged"], true);
        assert_eq!(json["clusters"].as_array().unwrap().len(), 1);
    }
}
