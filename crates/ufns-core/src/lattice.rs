//! The lattice graph: stabilizer vertices, open-boundary vertices and qubits.
//!
//! Each qubit sits where a primal and a dual check meet, so it owns two
//! sub-edges: one joining primal (X-type) vertices and one joining dual
//! (Z-type) vertices. Topology is wired once at construction; [`reset`] and
//! [`grow_reset`] only clear the mutable iteration fields.
//!
//! [`reset`]: LatticeGraph::reset
//! [`grow_reset`]: LatticeGraph::grow_reset

use crate::id::*;
use serde::{Deserialize, Serialize};
use slotmap::SlotMap;
use std::collections::HashMap;
use std::fmt;

/// Number of half-edge growth steps after which an edge is fully grown.
pub const FULL_SUPPORT: u8 = 2;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Precondition violations raised while building a lattice.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LatticeError {
    #[error("lattice size must be at least 2, got {0}")]
    InvalidSize(usize),
    #[error("duplicate vertex at {0}")]
    DuplicateVertex(StabCoord),
    #[error("duplicate qubit at {0:?}")]
    DuplicateQubit(QubitCoord),
    #[error("vertex not found: {0:?}")]
    VertexNotFound(VertexId),
    #[error("no stabilizer at {0}")]
    UnknownStabilizer(StabCoord),
    #[error("no qubit at {0:?}")]
    UnknownQubit(QubitCoord),
}

// ---------------------------------------------------------------------------
// Topology
// ---------------------------------------------------------------------------

/// Boundary conditions of the lattice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Topology {
    /// Periodic in both directions; no boundary vertices.
    #[default]
    Toric,
    /// Open on all four sides; boundary vertices close every dangling edge.
    Planar,
}

impl fmt::Display for Topology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Topology::Toric => write!(f, "toric"),
            Topology::Planar => write!(f, "planar"),
        }
    }
}

// ---------------------------------------------------------------------------
// Vertices
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VertexKind {
    Stabilizer,
    /// An open lattice boundary. Never carries a defect.
    Boundary,
}

/// A stabilizer (or boundary) vertex.
#[derive(Debug, Clone)]
pub struct Vertex {
    pub coord: StabCoord,
    pub kind: VertexKind,
    neighbors: [Option<(VertexId, EdgeId)>; 4],

    // -- Iteration state --
    /// Defect flag: did this check fire?
    pub state: bool,
    /// Cluster that absorbed this vertex during the current round.
    pub cluster: Option<ClusterId>,
    /// Set while the owning cluster's node-tree is being traversed.
    pub visited: bool,
    /// Lookup key of the node this vertex belongs to in its cluster's
    /// node-tree. The tree owns the node; this is only a key.
    pub node: Option<NodeId>,
}

impl Vertex {
    fn new(coord: StabCoord, kind: VertexKind) -> Self {
        Self {
            coord,
            kind,
            neighbors: [None; 4],
            state: false,
            cluster: None,
            visited: false,
            node: None,
        }
    }

    pub fn is_boundary(&self) -> bool {
        self.kind == VertexKind::Boundary
    }

    /// The vertex and connecting edge in direction `dir`, if wired.
    pub fn neighbor(&self, dir: Direction) -> Option<(VertexId, EdgeId)> {
        self.neighbors[dir.slot()]
    }

    /// All wired neighbors in up/down/left/right order.
    pub fn neighbors(&self) -> impl Iterator<Item = (Direction, VertexId, EdgeId)> + '_ {
        Direction::ALL
            .into_iter()
            .filter_map(|dir| self.neighbor(dir).map(|(v, e)| (dir, v, e)))
    }

    pub fn degree(&self) -> usize {
        self.neighbors.iter().flatten().count()
    }

    fn reset(&mut self) {
        self.state = false;
        self.grow_reset();
    }

    fn grow_reset(&mut self) {
        self.cluster = None;
        self.visited = false;
        self.node = None;
    }
}

impl fmt::Display for Vertex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let prefix = if self.is_boundary() { 'b' } else { 'v' };
        write!(f, "{}{}", prefix, self.coord)
    }
}

// ---------------------------------------------------------------------------
// Edges and qubits
// ---------------------------------------------------------------------------

/// One directional sub-edge of a qubit.
#[derive(Debug, Clone)]
pub struct Edge {
    /// Which lattice the edge connects.
    pub kind: StabKind,
    pub orientation: Orientation,
    pub qubit: QubitId,

    // -- Iteration state --
    /// Growth progress in half-edge steps, up to [`FULL_SUPPORT`].
    pub support: u8,
    /// Whether the edge is part of the error (or correction) chain.
    pub state: bool,
    /// Set by a downstream peeling pass.
    pub peeled: bool,
    /// Set by a downstream matching pass.
    pub matching: bool,
    /// Cluster that fully grew this edge.
    pub cluster: Option<ClusterId>,
}

impl Edge {
    fn new(kind: StabKind, orientation: Orientation, qubit: QubitId) -> Self {
        Self {
            kind,
            orientation,
            qubit,
            support: 0,
            state: false,
            peeled: false,
            matching: false,
            cluster: None,
        }
    }

    pub fn is_grown(&self) -> bool {
        self.support >= FULL_SUPPORT
    }

    fn reset(&mut self) {
        self.state = false;
        self.matching = false;
        self.grow_reset();
    }

    fn grow_reset(&mut self) {
        self.cluster = None;
        self.support = 0;
        self.peeled = false;
    }
}

impl fmt::Display for Edge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let glyph = match self.orientation {
            Orientation::Horizontal => '-',
            Orientation::Vertical => '|',
        };
        write!(f, "e{}{}", self.kind.letter(), glyph)
    }
}

/// A physical qubit with its primal and dual sub-edges.
#[derive(Debug, Clone)]
pub struct Qubit {
    pub coord: QubitCoord,
    pub primal: EdgeId,
    pub dual: EdgeId,
    /// Erasure flag supplied by the error model; cleared on reset.
    pub erasure: bool,
}

impl Qubit {
    pub fn edge(&self, kind: StabKind) -> EdgeId {
        match kind {
            StabKind::Primal => self.primal,
            StabKind::Dual => self.dual,
        }
    }
}

impl fmt::Display for Qubit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "q({},{}:{})",
            self.coord.row,
            self.coord.col,
            self.coord.orientation.flag()
        )
    }
}

// ---------------------------------------------------------------------------
// LatticeGraph
// ---------------------------------------------------------------------------

/// Vertices, boundary vertices and qubits of one lattice instance.
///
/// A graph is owned by exactly one simulation run; clone it to decode
/// independent patterns side by side.
#[derive(Debug, Clone)]
pub struct LatticeGraph {
    size: usize,
    topology: Topology,
    pub(crate) vertices: SlotMap<VertexId, Vertex>,
    pub(crate) edges: SlotMap<EdgeId, Edge>,
    qubits: SlotMap<QubitId, Qubit>,
    stabilizer_index: HashMap<StabCoord, VertexId>,
    boundary_index: HashMap<StabCoord, VertexId>,
    qubit_index: HashMap<QubitCoord, QubitId>,
}

impl LatticeGraph {
    /// Create an empty graph to be wired by hand.
    pub fn new(size: usize, topology: Topology) -> Self {
        Self {
            size,
            topology,
            vertices: SlotMap::with_key(),
            edges: SlotMap::with_key(),
            qubits: SlotMap::with_key(),
            stabilizer_index: HashMap::new(),
            boundary_index: HashMap::new(),
            qubit_index: HashMap::new(),
        }
    }

    /// Periodic lattice: every neighbor index wraps modulo `size`.
    pub fn toric(size: usize) -> Result<Self, LatticeError> {
        if size < 2 {
            return Err(LatticeError::InvalidSize(size));
        }
        let mut graph = Self::new(size, Topology::Toric);
        let n = size as i32;

        for kind in StabKind::ALL {
            for y in 0..n {
                for x in 0..n {
                    graph.add_vertex(StabCoord::new(kind, y, x))?;
                }
            }
        }

        for y in 0..n {
            for x in 0..n {
                let left = graph.stab(StabKind::Primal, y, x)?;
                let right = graph.stab(StabKind::Primal, y, (x + 1).rem_euclid(n))?;
                let up = graph.stab(StabKind::Dual, (y - 1).rem_euclid(n), x)?;
                let down = graph.stab(StabKind::Dual, y, x)?;
                graph.add_edge(
                    QubitCoord::new(y, x, Orientation::Horizontal),
                    left,
                    right,
                    up,
                    down,
                )?;

                let up = graph.stab(StabKind::Primal, y, x)?;
                let down = graph.stab(StabKind::Primal, (y + 1).rem_euclid(n), x)?;
                let left = graph.stab(StabKind::Dual, y, (x - 1).rem_euclid(n))?;
                let right = graph.stab(StabKind::Dual, y, x)?;
                graph.add_edge(
                    QubitCoord::new(y, x, Orientation::Vertical),
                    left,
                    right,
                    up,
                    down,
                )?;
            }
        }

        Ok(graph)
    }

    /// Open lattice. Primal boundaries close the left and right sides
    /// (columns 0 and `size`), dual boundaries the top and bottom
    /// (rows -1 and `size - 1`).
    pub fn planar(size: usize) -> Result<Self, LatticeError> {
        if size < 2 {
            return Err(LatticeError::InvalidSize(size));
        }
        let mut graph = Self::new(size, Topology::Planar);
        let n = size as i32;

        for a in 0..n {
            for b in 0..n - 1 {
                graph.add_vertex(StabCoord::new(StabKind::Primal, a, b + 1))?;
                graph.add_vertex(StabCoord::new(StabKind::Dual, b, a))?;
            }
            graph.add_boundary_vertex(StabCoord::new(StabKind::Primal, a, 0))?;
            graph.add_boundary_vertex(StabCoord::new(StabKind::Primal, a, n))?;
            graph.add_boundary_vertex(StabCoord::new(StabKind::Dual, -1, a))?;
            graph.add_boundary_vertex(StabCoord::new(StabKind::Dual, n - 1, a))?;
        }

        for y in 0..n {
            for x in 0..n {
                let (left, right) = if x == 0 {
                    (
                        graph.bound(StabKind::Primal, y, x)?,
                        graph.stab(StabKind::Primal, y, x + 1)?,
                    )
                } else if x == n - 1 {
                    (
                        graph.stab(StabKind::Primal, y, x)?,
                        graph.bound(StabKind::Primal, y, x + 1)?,
                    )
                } else {
                    (
                        graph.stab(StabKind::Primal, y, x)?,
                        graph.stab(StabKind::Primal, y, x + 1)?,
                    )
                };
                let (up, down) = if y == 0 {
                    (
                        graph.bound(StabKind::Dual, y - 1, x)?,
                        graph.stab(StabKind::Dual, y, x)?,
                    )
                } else if y == n - 1 {
                    (
                        graph.stab(StabKind::Dual, y - 1, x)?,
                        graph.bound(StabKind::Dual, y, x)?,
                    )
                } else {
                    (
                        graph.stab(StabKind::Dual, y - 1, x)?,
                        graph.stab(StabKind::Dual, y, x)?,
                    )
                };
                graph.add_edge(
                    QubitCoord::new(y, x, Orientation::Horizontal),
                    left,
                    right,
                    up,
                    down,
                )?;

                if y != n - 1 && x != n - 1 {
                    let up = graph.stab(StabKind::Primal, y, x + 1)?;
                    let down = graph.stab(StabKind::Primal, y + 1, x + 1)?;
                    let left = graph.stab(StabKind::Dual, y, x)?;
                    let right = graph.stab(StabKind::Dual, y, x + 1)?;
                    graph.add_edge(
                        QubitCoord::new(y, x + 1, Orientation::Vertical),
                        left,
                        right,
                        up,
                        down,
                    )?;
                }
            }
        }

        Ok(graph)
    }

    fn stab(&self, kind: StabKind, row: i32, col: i32) -> Result<VertexId, LatticeError> {
        let coord = StabCoord::new(kind, row, col);
        self.stabilizer_index
            .get(&coord)
            .copied()
            .ok_or(LatticeError::UnknownStabilizer(coord))
    }

    fn bound(&self, kind: StabKind, row: i32, col: i32) -> Result<VertexId, LatticeError> {
        let coord = StabCoord::new(kind, row, col);
        self.boundary_index
            .get(&coord)
            .copied()
            .ok_or(LatticeError::UnknownStabilizer(coord))
    }

    // -----------------------------------------------------------------------
    // Construction
    // -----------------------------------------------------------------------

    /// Add a stabilizer vertex at `coord`.
    pub fn add_vertex(&mut self, coord: StabCoord) -> Result<VertexId, LatticeError> {
        if self.stabilizer_index.contains_key(&coord) || self.boundary_index.contains_key(&coord) {
            return Err(LatticeError::DuplicateVertex(coord));
        }
        let id = self.vertices.insert(Vertex::new(coord, VertexKind::Stabilizer));
        self.stabilizer_index.insert(coord, id);
        Ok(id)
    }

    /// Add an open-boundary vertex at `coord`.
    pub fn add_boundary_vertex(&mut self, coord: StabCoord) -> Result<VertexId, LatticeError> {
        if self.stabilizer_index.contains_key(&coord) || self.boundary_index.contains_key(&coord) {
            return Err(LatticeError::DuplicateVertex(coord));
        }
        let id = self.vertices.insert(Vertex::new(coord, VertexKind::Boundary));
        self.boundary_index.insert(coord, id);
        Ok(id)
    }

    /// Add a qubit and wire its two sub-edges.
    ///
    /// For a horizontal qubit the primal edge joins `left`/`right` and the
    /// dual edge joins `up`/`down`; a vertical qubit swaps the roles.
    pub fn add_edge(
        &mut self,
        coord: QubitCoord,
        left: VertexId,
        right: VertexId,
        up: VertexId,
        down: VertexId,
    ) -> Result<QubitId, LatticeError> {
        if self.qubit_index.contains_key(&coord) {
            return Err(LatticeError::DuplicateQubit(coord));
        }
        for v in [left, right, up, down] {
            if !self.vertices.contains_key(v) {
                return Err(LatticeError::VertexNotFound(v));
            }
        }

        let orientation = coord.orientation;
        let qubit = self.qubits.insert(Qubit {
            coord,
            primal: EdgeId::default(),
            dual: EdgeId::default(),
            erasure: false,
        });
        let primal = self
            .edges
            .insert(Edge::new(StabKind::Primal, orientation, qubit));
        let dual = self
            .edges
            .insert(Edge::new(StabKind::Dual, orientation.flipped(), qubit));
        self.qubits[qubit].primal = primal;
        self.qubits[qubit].dual = dual;
        self.qubit_index.insert(coord, qubit);

        let (horizontal, vertical) = match orientation {
            Orientation::Horizontal => (primal, dual),
            Orientation::Vertical => (dual, primal),
        };
        self.vertices[left].neighbors[Direction::Right.slot()] = Some((right, horizontal));
        self.vertices[right].neighbors[Direction::Left.slot()] = Some((left, horizontal));
        self.vertices[up].neighbors[Direction::Down.slot()] = Some((down, vertical));
        self.vertices[down].neighbors[Direction::Up.slot()] = Some((up, vertical));

        Ok(qubit)
    }

    // -----------------------------------------------------------------------
    // Iteration state
    // -----------------------------------------------------------------------

    /// Restore every vertex, edge and qubit to its pre-simulation state.
    /// Neighbor wiring is untouched.
    pub fn reset(&mut self) {
        for vertex in self.vertices.values_mut() {
            vertex.reset();
        }
        for edge in self.edges.values_mut() {
            edge.reset();
        }
        for qubit in self.qubits.values_mut() {
            qubit.erasure = false;
        }
    }

    /// Clear growth state only: measured defects, edge states and matching
    /// flags survive so the same syndrome can be decoded again.
    pub fn grow_reset(&mut self) {
        for vertex in self.vertices.values_mut() {
            vertex.grow_reset();
        }
        for edge in self.edges.values_mut() {
            edge.grow_reset();
        }
    }

    /// Derive each stabilizer's defect flag from the parity of its incident
    /// edges. Boundary vertices are skipped.
    pub fn measure_stabilizers(&mut self) {
        let edges = &self.edges;
        for vertex in self.vertices.values_mut() {
            if vertex.is_boundary() {
                continue;
            }
            vertex.state = vertex
                .neighbors
                .iter()
                .flatten()
                .fold(false, |acc, &(_, e)| acc ^ edges[e].state);
        }
    }

    /// Toggle the error state of one sub-edge of the qubit at `coord`.
    pub fn flip_edge(&mut self, coord: QubitCoord, kind: StabKind) -> Result<EdgeId, LatticeError> {
        let qubit = self
            .qubit_index
            .get(&coord)
            .copied()
            .ok_or(LatticeError::UnknownQubit(coord))?;
        let edge = self.qubits[qubit].edge(kind);
        self.edges[edge].state = !self.edges[edge].state;
        Ok(edge)
    }

    /// Flip every listed sub-edge. Stops at the first unknown qubit; flips
    /// applied before it are kept.
    pub fn apply_errors<I>(&mut self, flips: I) -> Result<(), LatticeError>
    where
        I: IntoIterator<Item = (QubitCoord, StabKind)>,
    {
        for (coord, kind) in flips {
            self.flip_edge(coord, kind)?;
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn topology(&self) -> Topology {
        self.topology
    }

    pub fn vertex(&self, id: VertexId) -> Option<&Vertex> {
        self.vertices.get(id)
    }

    pub fn vertex_mut(&mut self, id: VertexId) -> Option<&mut Vertex> {
        self.vertices.get_mut(id)
    }

    pub fn edge(&self, id: EdgeId) -> Option<&Edge> {
        self.edges.get(id)
    }

    pub fn edge_mut(&mut self, id: EdgeId) -> Option<&mut Edge> {
        self.edges.get_mut(id)
    }

    pub fn qubit(&self, id: QubitId) -> Option<&Qubit> {
        self.qubits.get(id)
    }

    pub fn qubit_mut(&mut self, id: QubitId) -> Option<&mut Qubit> {
        self.qubits.get_mut(id)
    }

    /// Stabilizer vertex at `coord` (boundaries excluded).
    pub fn vertex_id(&self, coord: StabCoord) -> Option<VertexId> {
        self.stabilizer_index.get(&coord).copied()
    }

    /// Boundary vertex at `coord`.
    pub fn boundary_id(&self, coord: StabCoord) -> Option<VertexId> {
        self.boundary_index.get(&coord).copied()
    }

    pub fn qubit_id(&self, coord: QubitCoord) -> Option<QubitId> {
        self.qubit_index.get(&coord).copied()
    }

    /// The sub-edge of kind `kind` belonging to the qubit at `coord`.
    pub fn edge_id(&self, coord: QubitCoord, kind: StabKind) -> Option<EdgeId> {
        self.qubit_id(coord).map(|q| self.qubits[q].edge(kind))
    }

    pub fn vertices(&self) -> impl Iterator<Item = (VertexId, &Vertex)> {
        self.vertices.iter()
    }

    pub fn edges(&self) -> impl Iterator<Item = (EdgeId, &Edge)> {
        self.edges.iter()
    }

    /// Neighbors of `vertex` with the connecting sub-edge. Empty for an
    /// unknown id.
    pub fn neighbors(&self, vertex: VertexId) -> impl Iterator<Item = (Direction, VertexId, EdgeId)> + '_ {
        self.vertices
            .get(vertex)
            .into_iter()
            .flat_map(|v| v.neighbors())
    }

    pub fn qubits(&self) -> impl Iterator<Item = (QubitId, &Qubit)> {
        self.qubits.iter()
    }

    /// Stabilizers whose measured state is set.
    pub fn defects(&self) -> impl Iterator<Item = VertexId> + '_ {
        self.vertices
            .iter()
            .filter(|(_, v)| v.state)
            .map(|(id, _)| id)
    }

    pub fn stabilizer_count(&self) -> usize {
        self.stabilizer_index.len()
    }

    pub fn boundary_count(&self) -> usize {
        self.boundary_index.len()
    }

    pub fn qubit_count(&self) -> usize {
        self.qubits.len()
    }
}

impl fmt::Display for LatticeGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} lattice of size {} with {} stabilizers, {} qubits and {} boundaries",
            self.topology,
            self.size,
            self.stabilizer_count(),
            self.qubit_count(),
            self.boundary_count()
        )
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
