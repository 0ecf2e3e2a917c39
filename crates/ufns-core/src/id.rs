use serde::{Deserialize, Serialize};
use slotmap::new_key_type;
use std::fmt;

new_key_type! {
    /// Identifies a vertex (stabilizer or open boundary) in the lattice graph.
    pub struct VertexId;

    /// Identifies one of the two directional sub-edges owned by a qubit.
    pub struct EdgeId;

    /// Identifies a qubit (physical data site) in the lattice graph.
    pub struct QubitId;

    /// Identifies a node inside a single node-tree.
    pub struct NodeId;
}

/// Identifies a cluster in the union-find arena. Assigned in creation order,
/// so comparing two ids gives a stable tie-break.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ClusterId(pub u32);

impl ClusterId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

// ---------------------------------------------------------------------------
// Check families
// ---------------------------------------------------------------------------

/// The two stabilizer families of the surface code. Primal checks are the
/// X-type vertex checks, dual checks the Z-type plaquettes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum StabKind {
    Primal,
    Dual,
}

impl StabKind {
    pub const ALL: [StabKind; 2] = [StabKind::Primal, StabKind::Dual];

    /// Single-letter Pauli label used in printable representations.
    pub fn letter(self) -> char {
        match self {
            StabKind::Primal => 'X',
            StabKind::Dual => 'Z',
        }
    }
}

/// Qubit orientation flag: horizontal qubits have orientation 0, vertical 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Orientation {
    Horizontal,
    Vertical,
}

impl Orientation {
    pub fn flag(self) -> u8 {
        match self {
            Orientation::Horizontal => 0,
            Orientation::Vertical => 1,
        }
    }

    pub fn flipped(self) -> Self {
        match self {
            Orientation::Horizontal => Orientation::Vertical,
            Orientation::Vertical => Orientation::Horizontal,
        }
    }
}

/// Direction token for a vertex's neighbor slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

impl Direction {
    pub const ALL: [Direction; 4] = [
        Direction::Up,
        Direction::Down,
        Direction::Left,
        Direction::Right,
    ];

    pub fn opposite(self) -> Self {
        match self {
            Direction::Up => Direction::Down,
            Direction::Down => Direction::Up,
            Direction::Left => Direction::Right,
            Direction::Right => Direction::Left,
        }
    }

    pub(crate) fn slot(self) -> usize {
        match self {
            Direction::Up => 0,
            Direction::Down => 1,
            Direction::Left => 2,
            Direction::Right => 3,
        }
    }
}

// ---------------------------------------------------------------------------
// Coordinates
// ---------------------------------------------------------------------------

/// Position of a stabilizer: `(kind, row, col)`. Planar dual boundaries sit
/// on row -1, hence the signed components.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct StabCoord {
    pub kind: StabKind,
    pub row: i32,
    pub col: i32,
}

impl StabCoord {
    pub fn new(kind: StabKind, row: i32, col: i32) -> Self {
        Self { kind, row, col }
    }
}

impl fmt::Display for StabCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({},{})", self.kind.letter(), self.row, self.col)
    }
}

/// Position of a qubit: `(row, col, orientation)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct QubitCoord {
    pub row: i32,
    pub col: i32,
    pub orientation: Orientation,
}

impl QubitCoord {
    pub fn new(row: i32, col: i32, orientation: Orientation) -> Self {
        Self {
            row,
            col,
            orientation,
        }
    }
}
