//! Node-tree scheduling for a single cluster.
//!
//! The node-tree partitions a spanning tree of the cluster (its ancilla
//! tree) into nodes. Each node is anchored on a *primer* vertex: defects,
//! open-boundary vertices, branch points and dangling leaves. Degree-two
//! vertices in between belong to the nearest primer. Tree edges carry the
//! graph distance between neighboring primers.
//!
//! Parity flows bottom-up and must be complete before delays flow top-down:
//!
//! ```text
//! Syndrome:  p = ( sum over children (1 - child.p) ) mod 2
//! Junction:  p = 1 - ( sum over children (1 - child.p) ) mod 2
//! Boundary:  p = 1
//! Filler:    p = 1
//!
//! delay = parent.delay + frac(r/2 - parent.r/2) - length * (-1)^parent.p
//! ```
//!
//! Radius and delay are counted in half-edge growth steps, so the formula
//! above is evaluated as
//! `parent.delay + (r - parent.r) mod 2 - 2 * length * (-1)^parent.p`.
//! After the delay pass every delay is shifted so the smallest one is 0.

use crate::cluster::Cluster;
use crate::id::{ClusterId, NodeId, VertexId};
use crate::lattice::{FULL_SUPPORT, LatticeGraph};
use slotmap::SlotMap;
use std::collections::VecDeque;
use std::fmt;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NodeTreeError {
    #[error("cluster {0:?} has no vertices")]
    EmptyCluster(ClusterId),
    #[error("cluster {0:?} is not a root")]
    NotARoot(ClusterId),
    #[error("delays requested before parities were computed")]
    ParityNotComputed,
}

// ---------------------------------------------------------------------------
// Node variants
// ---------------------------------------------------------------------------

/// The four node variants. They share every field and differ only in how
/// parity is derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    /// Node over a real defect.
    Syndrome,
    /// Branch point of the ancilla tree without a defect.
    Junction,
    /// Growth reached an open lattice boundary.
    Boundary,
    /// Dangling leaf without a defect.
    Filler,
}

impl NodeKind {
    pub fn short(self) -> char {
        match self {
            NodeKind::Syndrome => 'S',
            NodeKind::Junction => 'J',
            NodeKind::Boundary => 'B',
            NodeKind::Filler => 'F',
        }
    }

    /// Parity that never changes, for terminal variants.
    pub fn fixed_parity(self) -> Option<u8> {
        match self {
            NodeKind::Boundary | NodeKind::Filler => Some(1),
            NodeKind::Syndrome | NodeKind::Junction => None,
        }
    }

    /// Parity from `flips`, the sum of `1 - child.parity` over children.
    fn combine(self, flips: u32) -> u8 {
        let odd = (flips % 2) as u8;
        match self {
            NodeKind::Syndrome => odd,
            NodeKind::Junction => 1 - odd,
            NodeKind::Boundary | NodeKind::Filler => 1,
        }
    }
}

/// An element of the node-tree.
#[derive(Debug, Clone)]
pub struct Node {
    pub kind: NodeKind,
    pub primer: VertexId,
    /// Half-edge steps between the primer and the node's outermost extent.
    pub radius: u32,
    parity: u8,
    /// Half-edge rounds to wait before this node may grow.
    pub delay: i64,
    /// Rounds already waited since the schedule was computed.
    pub waited: u32,
    /// Adjacent nodes and the primer-to-primer distance to each.
    pub neighbors: Vec<(NodeId, u32)>,
    /// Even-parity subroots hanging off this node.
    pub root_list: Vec<NodeId>,
}

impl Node {
    fn new(kind: NodeKind, primer: VertexId) -> Self {
        Self {
            kind,
            primer,
            radius: 0,
            parity: kind.fixed_parity().unwrap_or(0),
            delay: 0,
            waited: 0,
            neighbors: Vec::new(),
            root_list: Vec::new(),
        }
    }

    /// 1 when the subtree below this node holds an even number of defects.
    pub fn parity(&self) -> u8 {
        self.parity
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parity = if self.parity == 1 { 'o' } else { 'e' };
        write!(
            f,
            "{}N{}{}{}/{}",
            self.kind.short(),
            self.radius,
            parity,
            self.waited,
            self.delay
        )
    }
}

// ---------------------------------------------------------------------------
// NodeTree
// ---------------------------------------------------------------------------

/// Node-tree built over one cluster. Rebuilt from scratch whenever the
/// cluster's membership changes.
#[derive(Debug, Clone)]
pub struct NodeTree {
    cluster: ClusterId,
    nodes: SlotMap<NodeId, Node>,
    root: NodeId,
    parity_ready: bool,
    raw_min_delay: i64,
}

impl NodeTree {
    /// Build the node-tree of root cluster `cluster`.
    ///
    /// Walks the grown edges breadth-first from the primer (the defect with
    /// the smallest coordinate), so tree distances are graph distances
    /// within the cluster. Members the walk cannot reach are linked below
    /// the root at length 1. Every member vertex gets its `node` key set and
    /// is marked `visited`.
    pub fn build(graph: &mut LatticeGraph, cluster: &Cluster) -> Result<Self, NodeTreeError> {
        if !cluster.is_root() {
            return Err(NodeTreeError::NotARoot(cluster.id));
        }
        for &v in &cluster.vertices {
            if let Some(vertex) = graph.vertices.get_mut(v) {
                vertex.visited = false;
                vertex.node = None;
            }
        }

        let primer = cluster
            .vertices
            .iter()
            .copied()
            .filter(|&v| graph.vertices[v].state)
            .min_by_key(|&v| graph.vertices[v].coord)
            .or_else(|| {
                cluster
                    .vertices
                    .iter()
                    .copied()
                    .min_by_key(|&v| graph.vertices[v].coord)
            })
            .ok_or(NodeTreeError::EmptyCluster(cluster.id))?;

        // Breadth-first ancilla tree over fully grown edges.
        let mut order: Vec<VertexId> = Vec::with_capacity(cluster.vertices.len());
        let mut parent: Vec<Option<usize>> = Vec::with_capacity(cluster.vertices.len());
        let mut children: Vec<u32> = Vec::with_capacity(cluster.vertices.len());
        let mut first_child: Vec<Option<usize>> = Vec::with_capacity(cluster.vertices.len());
        let mut queue = VecDeque::new();

        // Members not reached over grown edges (clusters joined by a union
        // before the edge between them is grown) hang off the root as
        // detached sub-trees.
        let mut detached: Vec<bool> = Vec::with_capacity(cluster.vertices.len());
        let seeds = std::iter::once(primer).chain(cluster.vertices.iter().copied());
        for seed in seeds {
            if graph.vertices[seed].visited {
                continue;
            }
            graph.vertices[seed].visited = true;
            let s = order.len();
            order.push(seed);
            children.push(0);
            first_child.push(None);
            detached.push(s > 0);
            if s == 0 {
                parent.push(None);
            } else {
                parent.push(Some(0));
                children[0] += 1;
                first_child[0].get_or_insert(s);
            }
            queue.push_back(s);

            while let Some(i) = queue.pop_front() {
                let neighbors: Vec<_> = graph.vertices[order[i]]
                    .neighbors()
                    .map(|(_, n, e)| (n, e))
                    .collect();
                for (n, e) in neighbors {
                    if graph.edges[e].support < FULL_SUPPORT || graph.vertices[n].visited {
                        continue;
                    }
                    graph.vertices[n].visited = true;
                    let j = order.len();
                    order.push(n);
                    parent.push(Some(i));
                    children.push(0);
                    first_child.push(None);
                    detached.push(false);
                    children[i] += 1;
                    first_child[i].get_or_insert(j);
                    queue.push_back(j);
                }
            }
        }

        // Pick primers by local topology.
        let kinds: Vec<Option<NodeKind>> = order
            .iter()
            .enumerate()
            .map(|(i, &v)| {
                let vertex = &graph.vertices[v];
                let degree = children[i] + u32::from(parent[i].is_some());
                if vertex.state {
                    Some(NodeKind::Syndrome)
                } else if vertex.is_boundary() {
                    Some(NodeKind::Boundary)
                } else if degree >= 3 {
                    Some(NodeKind::Junction)
                } else if degree <= 1 {
                    Some(NodeKind::Filler)
                } else if i == 0 || detached[i] {
                    Some(NodeKind::Junction)
                } else {
                    None
                }
            })
            .collect();

        // Top-down: create nodes and link each to its nearest primer ancestor.
        let mut nodes: SlotMap<NodeId, Node> = SlotMap::with_key();
        let mut node_of: Vec<Option<NodeId>> = vec![None; order.len()];
        let mut anchor: Vec<usize> = vec![0; order.len()];
        let mut dist_up: Vec<u32> = vec![0; order.len()];

        for i in 0..order.len() {
            if let Some(p) = parent[i] {
                if kinds[p].is_some() {
                    anchor[i] = p;
                    dist_up[i] = 1;
                } else {
                    anchor[i] = anchor[p];
                    dist_up[i] = dist_up[p] + 1;
                }
            }
            if let Some(kind) = kinds[i] {
                let id = nodes.insert(Node::new(kind, order[i]));
                node_of[i] = Some(id);
                if parent[i].is_some() {
                    if let Some(up) = node_of[anchor[i]] {
                        nodes[up].neighbors.push((id, dist_up[i]));
                        nodes[id].neighbors.push((up, dist_up[i]));
                    }
                }
            }
        }

        // Bottom-up: distance from each path vertex to the primer below it.
        let mut below: Vec<(usize, u32)> = (0..order.len()).map(|i| (i, 0)).collect();
        for i in (0..order.len()).rev() {
            if kinds[i].is_none() {
                if let Some(c) = first_child[i] {
                    below[i] = if kinds[c].is_some() {
                        (c, 1)
                    } else {
                        (below[c].0, below[c].1 + 1)
                    };
                }
            }
        }

        // Assign every vertex to a node and derive node radii.
        for i in 0..order.len() {
            let (owner, dist) = if kinds[i].is_some() {
                (i, 0)
            } else if dist_up[i] <= below[i].1 {
                (anchor[i], dist_up[i])
            } else {
                (below[i].0, below[i].1)
            };
            let Some(node) = node_of[owner] else {
                continue;
            };
            let vertex = &graph.vertices[order[i]];
            let half_grown = vertex
                .neighbors()
                .any(|(_, _, e)| graph.edges[e].support > 0 && graph.edges[e].support < FULL_SUPPORT);
            let extent = 2 * dist + u32::from(half_grown);
            nodes[node].radius = nodes[node].radius.max(extent);
            graph.vertices[order[i]].node = Some(node);
        }

        let root = node_of[0].ok_or(NodeTreeError::EmptyCluster(cluster.id))?;
        Ok(Self {
            cluster: cluster.id,
            nodes,
            root,
            parity_ready: false,
            raw_min_delay: 0,
        })
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    pub fn cluster(&self) -> ClusterId {
        self.cluster
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    #[cfg(test)]
    pub(crate) fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id)
    }

    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &Node)> {
        self.nodes.iter()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Smallest delay seen by the last delay pass, before normalization.
    pub fn raw_min_delay(&self) -> i64 {
        self.raw_min_delay
    }

    /// Number of defects in the whole tree, mod 2.
    pub fn defect_parity(&self) -> Result<u8, NodeTreeError> {
        if !self.parity_ready {
            return Err(NodeTreeError::ParityNotComputed);
        }
        Ok(1 - self.nodes[self.root].parity)
    }

    /// Whether `node` has waited out its delay. Unknown nodes may grow.
    pub fn is_eligible(&self, node: NodeId) -> bool {
        self.nodes
            .get(node)
            .is_none_or(|n| i64::from(n.waited) >= n.delay)
    }

    /// Record that every node has now waited `waited` rounds.
    pub fn advance_to(&mut self, waited: u32) {
        for node in self.nodes.values_mut() {
            node.waited = waited;
        }
    }

    /// Nodes in pre-order from the root, each with its parent and the
    /// length of the edge to it.
    fn preorder(&self) -> Vec<(NodeId, Option<(NodeId, u32)>)> {
        let mut order = Vec::with_capacity(self.nodes.len());
        let mut stack = vec![(self.root, None)];
        while let Some((node, parent)) = stack.pop() {
            order.push((node, parent));
            let from: Option<NodeId> = parent.map(|(p, _)| p);
            for &(child, length) in self.nodes[node].neighbors.iter().rev() {
                if Some(child) != from {
                    stack.push((child, Some((node, length))));
                }
            }
        }
        order
    }

    // -----------------------------------------------------------------------
    // Parity and delay
    // -----------------------------------------------------------------------

    /// Compute every node's parity, children before parents. Returns the
    /// root parity.
    pub fn compute_parity(&mut self) -> u8 {
        for (node, parent) in self.preorder().into_iter().rev() {
            let kind = self.nodes[node].kind;
            let parity = match kind.fixed_parity() {
                Some(p) => p,
                None => {
                    let from = parent.map(|(p, _)| p);
                    let flips: u32 = self.nodes[node]
                        .neighbors
                        .iter()
                        .filter(|(n, _)| Some(*n) != from)
                        .map(|(n, _)| 1 - u32::from(self.nodes[*n].parity))
                        .sum();
                    kind.combine(flips)
                }
            };
            self.nodes[node].parity = parity;
        }
        self.parity_ready = true;
        self.nodes[self.root].parity
    }

    /// Compute every node's delay, parents before children, and return the
    /// smallest delay in the tree. Clears `root_list` and `waited` on every
    /// node.
    pub fn compute_delay(&mut self) -> Result<i64, NodeTreeError> {
        if !self.parity_ready {
            return Err(NodeTreeError::ParityNotComputed);
        }

        let mut min_delay = self.nodes[self.root].delay;
        for (node, parent) in self.preorder() {
            if let Some((p, length)) = parent {
                let (p_delay, p_radius, p_parity) = {
                    let p = &self.nodes[p];
                    (p.delay, i64::from(p.radius), p.parity)
                };
                let radius = i64::from(self.nodes[node].radius);
                let sign = if p_parity % 2 == 0 { 1 } else { -1 };
                let delay = p_delay + (radius - p_radius).rem_euclid(2) - 2 * i64::from(length) * sign;
                self.nodes[node].delay = delay;
                min_delay = min_delay.min(delay);
            }
            let n = &mut self.nodes[node];
            n.root_list.clear();
            n.waited = 0;
        }

        self.raw_min_delay = min_delay;
        Ok(min_delay)
    }

    /// Shift every delay by the tree minimum so the earliest node waits 0.
    pub fn normalize_delays(&mut self) {
        let min = self.nodes.values().map(|n| n.delay).min().unwrap_or(0);
        for node in self.nodes.values_mut() {
            node.delay -= min;
        }
    }

    /// Fill the root's `root_list` with its even-parity child subtrees.
    pub fn collect_even_subroots(&mut self) -> &[NodeId] {
        let root = self.root;
        let even: Vec<NodeId> = self.nodes[root]
            .neighbors
            .iter()
            .map(|&(n, _)| n)
            .filter(|&n| self.nodes[n].parity == 1)
            .collect();
        self.nodes[root].root_list = even;
        &self.nodes[root].root_list
    }

    /// Parity, then delay, then normalization.
    pub fn schedule(&mut self) -> Result<(), NodeTreeError> {
        self.compute_parity();
        self.compute_delay()?;
        self.normalize_delays();
        self.collect_even_subroots();
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
