//! Lattice and error-pattern builders for the unit tests, the integration
//! scenarios and the decode benchmark. Compiled under `cfg(test)` or with
//! the `test-utils` feature.

use crate::batch::ErrorPattern;
use crate::cluster::ClusterForest;
use crate::id::*;
use crate::lattice::LatticeGraph;

// ===========================================================================
// Coordinates
// ===========================================================================

pub fn primal(row: i32, col: i32) -> StabCoord {
    StabCoord::new(StabKind::Primal, row, col)
}

pub fn dual(row: i32, col: i32) -> StabCoord {
    StabCoord::new(StabKind::Dual, row, col)
}

pub fn horizontal(row: i32, col: i32) -> QubitCoord {
    QubitCoord::new(row, col, Orientation::Horizontal)
}

pub fn vertical(row: i32, col: i32) -> QubitCoord {
    QubitCoord::new(row, col, Orientation::Vertical)
}

// ===========================================================================
// Graph builders
// ===========================================================================

/// Toric lattice with the given sub-edges flipped and stabilizers measured.
pub fn toric_with_errors(size: usize, flips: &[(QubitCoord, StabKind)]) -> LatticeGraph {
    let mut graph = LatticeGraph::toric(size).unwrap();
    graph.apply_errors(flips.iter().copied()).unwrap();
    graph.measure_stabilizers();
    graph
}

/// Planar lattice with the given sub-edges flipped and stabilizers measured.
pub fn planar_with_errors(size: usize, flips: &[(QubitCoord, StabKind)]) -> LatticeGraph {
    let mut graph = LatticeGraph::planar(size).unwrap();
    graph.apply_errors(flips.iter().copied()).unwrap();
    graph.measure_stabilizers();
    graph
}

/// Mark the stabilizers at `coords` as defects without touching any edge.
pub fn set_defects(graph: &mut LatticeGraph, coords: &[StabCoord]) {
    for &coord in coords {
        let id = graph.vertex_id(coord).unwrap();
        graph.vertex_mut(id).unwrap().state = true;
    }
}

/// A horizontal primal error chain along `row` covering `len` qubits from
/// column `start`.
pub fn primal_chain(row: i32, start: i32, len: i32) -> ErrorPattern {
    (start..start + len).fold(ErrorPattern::new(), |pattern, col| {
        pattern.with_flip(horizontal(row, col), StabKind::Primal)
    })
}

// ===========================================================================
// Lookups
// ===========================================================================

/// Root cluster owning the stabilizer at `coord`.
pub fn cluster_of(forest: &mut ClusterForest, graph: &LatticeGraph, coord: StabCoord) -> ClusterId {
    let id = graph
        .vertex_id(coord)
        .or_else(|| graph.boundary_id(coord))
        .unwrap();
    forest.find_vertex(graph, id).unwrap()
}
