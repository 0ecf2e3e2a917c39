//! Union-find cluster engine.
//!
//! Clusters live in an arena indexed by [`ClusterId`]; `parent` is stored as
//! an id, so the forest never owns itself. `size`, `parity` and the member
//! and frontier lists are authoritative only on roots.
//!
//! Growth happens in half-edge steps. Each call to
//! [`ClusterForest::grow_cluster`] adds one step of support to every
//! frontier edge; edges that reach [`FULL_SUPPORT`] move to the full
//! frontier, and [`ClusterForest::merge_full_frontier`] then absorbs the
//! vertices behind them or unions the clusters they touch.

use crate::id::{ClusterId, EdgeId, VertexId};
use crate::lattice::{FULL_SUPPORT, LatticeGraph};
use crate::node_tree::NodeTree;
use serde::Serialize;
use std::fmt;
use tracing::trace;

// ---------------------------------------------------------------------------
// Frontier
// ---------------------------------------------------------------------------

/// An edge on the growth frontier: `vertex` is inside the cluster,
/// `neighbor` on the far side of `edge`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FrontierEntry {
    pub vertex: VertexId,
    pub edge: EdgeId,
    pub neighbor: VertexId,
}

/// The two stages of a cluster's boundary.
#[derive(Debug, Clone, Default)]
pub struct Frontier {
    /// Edges still growing.
    pub half: Vec<FrontierEntry>,
    /// Fully grown edges waiting for the merge phase.
    pub full: Vec<FrontierEntry>,
}

impl Frontier {
    pub fn is_empty(&self) -> bool {
        self.half.is_empty() && self.full.is_empty()
    }

    fn append(&mut self, other: &mut Frontier) {
        self.half.append(&mut other.half);
        self.full.append(&mut other.full);
    }
}

// ---------------------------------------------------------------------------
// Cluster
// ---------------------------------------------------------------------------

/// A connected region grown around one or more defects.
#[derive(Debug, Clone)]
pub struct Cluster {
    pub id: ClusterId,
    /// Member vertex count.
    pub size: u32,
    /// Number of defect members. Only `parity % 2` matters for growth.
    pub parity: u32,
    pub parent: ClusterId,
    pub vertices: Vec<VertexId>,
    pub frontier: Frontier,
    /// Round at which the cluster is next eligible to grow.
    pub bucket: Option<u32>,
    /// Half-step toggle, flipped on every growth step.
    pub support: u8,
    /// Growth steps in which at least one edge grew.
    pub radius: u32,
    /// Whether an open-boundary vertex has been absorbed.
    pub on_boundary: bool,
    /// Set when a non-neutral root has nothing left to grow.
    pub stalled: bool,
    pub(crate) tree: Option<NodeTree>,
    /// Round at which `tree`'s schedule was computed (-1 before round 0).
    pub(crate) anchor_round: i64,
}

impl Cluster {
    fn new(id: ClusterId) -> Self {
        Self {
            id,
            size: 0,
            parity: 0,
            parent: id,
            vertices: Vec::new(),
            frontier: Frontier::default(),
            bucket: None,
            support: 0,
            radius: 0,
            on_boundary: false,
            stalled: false,
            tree: None,
            anchor_round: -1,
        }
    }

    pub fn is_root(&self) -> bool {
        self.parent == self.id
    }

    /// Defect parity: 0 when the cluster holds an even number of defects.
    pub fn parity_bit(&self) -> u32 {
        self.parity % 2
    }

    /// A neutral cluster needs no further growth: it is even, or an open
    /// boundary can absorb its unmatched defect.
    pub fn is_neutral(&self) -> bool {
        self.parity_bit() == 0 || self.on_boundary
    }

    pub fn members(&self) -> &[VertexId] {
        &self.vertices
    }

    /// The node-tree scheduling this cluster's growth, if one is built.
    pub fn tree(&self) -> Option<&NodeTree> {
        self.tree.as_ref()
    }
}

impl fmt::Display for Cluster {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "C{}({}:{})", self.id.0, self.size, self.parity)
    }
}

// ---------------------------------------------------------------------------
// Step reports
// ---------------------------------------------------------------------------

/// What a single growth step did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GrowthStep {
    /// Edges that received one half-step of support.
    pub grown: usize,
    /// Frontier edges held back by the node-tree schedule.
    pub suspended: usize,
    /// Edges that became fully grown.
    pub completed: usize,
}

/// What draining the full frontier did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeStep {
    pub absorbed: usize,
    pub unions: usize,
}

impl MergeStep {
    pub fn changed_membership(&self) -> bool {
        self.absorbed > 0 || self.unions > 0
    }
}

// ---------------------------------------------------------------------------
// ClusterForest
// ---------------------------------------------------------------------------

/// Arena of clusters for one decoding round.
#[derive(Debug, Clone, Default)]
pub struct ClusterForest {
    clusters: Vec<Cluster>,
}

impl ClusterForest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop every cluster. Ids restart at zero.
    pub fn clear(&mut self) {
        self.clusters.clear();
    }

    pub fn len(&self) -> usize {
        self.clusters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clusters.is_empty()
    }

    /// Create an empty root cluster.
    pub fn create(&mut self) -> ClusterId {
        let id = ClusterId(self.clusters.len() as u32);
        self.clusters.push(Cluster::new(id));
        id
    }

    pub fn get(&self, id: ClusterId) -> Option<&Cluster> {
        self.clusters.get(id.index())
    }

    pub fn get_mut(&mut self, id: ClusterId) -> Option<&mut Cluster> {
        self.clusters.get_mut(id.index())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Cluster> {
        self.clusters.iter()
    }

    /// Ids of all root clusters, in creation order.
    pub fn roots(&self) -> Vec<ClusterId> {
        self.clusters
            .iter()
            .filter(|c| c.is_root())
            .map(|c| c.id)
            .collect()
    }

    // -----------------------------------------------------------------------
    // Union-find
    // -----------------------------------------------------------------------

    /// Follow `parent` links to the root, then point every cluster on the
    /// path straight at it.
    pub fn find(&mut self, id: ClusterId) -> ClusterId {
        let mut root = id;
        while self.clusters[root.index()].parent != root {
            root = self.clusters[root.index()].parent;
        }

        let mut current = id;
        while current != root {
            let next = self.clusters[current.index()].parent;
            self.clusters[current.index()].parent = root;
            current = next;
        }
        root
    }

    /// Root cluster owning `vertex`, if it has been absorbed.
    pub fn find_vertex(&mut self, graph: &LatticeGraph, vertex: VertexId) -> Option<ClusterId> {
        let cluster = graph.vertices.get(vertex)?.cluster?;
        Some(self.find(cluster))
    }

    /// Merge the clusters containing `a` and `b` and return the surviving
    /// root. The larger cluster survives; on equal sizes the older id does.
    /// Merging a cluster with itself is a no-op.
    pub fn union(&mut self, a: ClusterId, b: ClusterId) -> ClusterId {
        let ra = self.find(a);
        let rb = self.find(b);
        if ra == rb {
            return ra;
        }

        let (big, small) = {
            let (ca, cb) = (&self.clusters[ra.index()], &self.clusters[rb.index()]);
            if ca.size > cb.size || (ca.size == cb.size && ra < rb) {
                (ra, rb)
            } else {
                (rb, ra)
            }
        };

        let absorbed = &mut self.clusters[small.index()];
        absorbed.parent = big;
        absorbed.bucket = None;
        absorbed.tree = None;
        let size = absorbed.size;
        let parity = absorbed.parity;
        let radius = absorbed.radius;
        let on_boundary = absorbed.on_boundary;
        let mut vertices = std::mem::take(&mut absorbed.vertices);
        let mut frontier = std::mem::take(&mut absorbed.frontier);

        let survivor = &mut self.clusters[big.index()];
        survivor.size += size;
        survivor.parity += parity;
        survivor.radius = survivor.radius.max(radius);
        survivor.on_boundary |= on_boundary;
        survivor.stalled = false;
        survivor.tree = None;
        survivor.vertices.append(&mut vertices);
        survivor.frontier.append(&mut frontier);

        trace!(survivor = big.0, absorbed = small.0, size = survivor.size, "union");
        big
    }

    // -----------------------------------------------------------------------
    // Membership
    // -----------------------------------------------------------------------

    /// Add `vertex` to root cluster `root` and push its ungrown edges onto
    /// the half frontier.
    pub fn add_vertex(&mut self, graph: &mut LatticeGraph, root: ClusterId, vertex: VertexId) {
        let Some(v) = graph.vertices.get_mut(vertex) else {
            return;
        };
        v.cluster = Some(root);
        let is_defect = v.state;
        let is_boundary = v.is_boundary();
        let neighbors: Vec<_> = v.neighbors().map(|(_, n, e)| (n, e)).collect();

        let cluster = &mut self.clusters[root.index()];
        cluster.size += 1;
        if is_defect {
            cluster.parity += 1;
        }
        cluster.on_boundary |= is_boundary;
        cluster.vertices.push(vertex);
        for (neighbor, edge) in neighbors {
            if graph.edges[edge].support < FULL_SUPPORT {
                cluster.frontier.half.push(FrontierEntry {
                    vertex,
                    edge,
                    neighbor,
                });
            }
        }
    }

    // -----------------------------------------------------------------------
    // Growth
    // -----------------------------------------------------------------------

    /// Grow every frontier edge of root `root` by one half-step.
    ///
    /// If the cluster carries a node-tree, edges leaving a vertex whose node
    /// is still waiting out its delay are left untouched.
    pub fn grow_cluster(&mut self, graph: &mut LatticeGraph, root: ClusterId) -> GrowthStep {
        let cluster = &mut self.clusters[root.index()];
        cluster.support = 1 - cluster.support;

        let tree = cluster.tree.as_ref();
        let pending = std::mem::take(&mut cluster.frontier.half);
        let mut remaining = Vec::with_capacity(pending.len());
        let mut step = GrowthStep::default();

        for entry in pending {
            if graph.edges[entry.edge].support >= FULL_SUPPORT {
                continue;
            }
            let eligible = match (tree, graph.vertices[entry.vertex].node) {
                (Some(tree), Some(node)) => tree.is_eligible(node),
                _ => true,
            };
            if !eligible {
                step.suspended += 1;
                remaining.push(entry);
                continue;
            }

            let edge = &mut graph.edges[entry.edge];
            edge.support += 1;
            step.grown += 1;
            if edge.support >= FULL_SUPPORT {
                edge.cluster = Some(root);
                cluster.frontier.full.push(entry);
                step.completed += 1;
            } else {
                remaining.push(entry);
            }
        }

        cluster.frontier.half = remaining;
        if step.grown > 0 {
            cluster.radius += 1;
        }
        step
    }

    /// Drain the full frontier of the cluster containing `cluster`: absorb
    /// unclustered vertices across grown edges and union any foreign cluster
    /// they reach.
    pub fn merge_full_frontier(&mut self, graph: &mut LatticeGraph, cluster: ClusterId) -> MergeStep {
        let mut step = MergeStep::default();
        loop {
            let root = self.find(cluster);
            let Some(entry) = self.clusters[root.index()].frontier.full.pop() else {
                break;
            };
            match graph.vertices[entry.neighbor].cluster {
                None => {
                    self.add_vertex(graph, root, entry.neighbor);
                    step.absorbed += 1;
                    trace!(cluster = root.0, "absorbed vertex");
                }
                Some(other) => {
                    let other = self.find(other);
                    if other != root {
                        self.union(root, other);
                        step.unions += 1;
                    }
                }
            }
        }
        step
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
