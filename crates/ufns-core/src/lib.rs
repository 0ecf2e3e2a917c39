//! UFNS Core -- union-find decoding with node-suspension growth for surface
//! codes.
//!
//! This crate provides the lattice graph of a toric or planar code, the
//! union-find cluster engine, the node-tree scheduler that delays growth of
//! cluster parts which are already ahead, and the round loop tying them
//! together.
//!
//! # Decoding Pipeline
//!
//! Each call to [`decoder::Decoder::decode`] runs:
//!
//! 1. **Measure** -- Derive defects from the flipped edges.
//! 2. **Seed** -- One cluster per defect, placed in bucket 0.
//! 3. **Grow** -- Clusters in the current bucket add half an edge of support.
//! 4. **Merge** -- Fully grown edges absorb vertices or union clusters.
//! 5. **Schedule** -- Changed clusters rebuild their node-tree (parity, then
//!    delay, then normalization) and move to their next bucket.
//!
//! Steps 3 to 5 repeat until every cluster is neutral or the round limit is
//! reached.
//!
//! ```rust,ignore
//! let mut graph = LatticeGraph::toric(5)?;
//! graph.flip_edge(QubitCoord::new(1, 0, Orientation::Horizontal), StabKind::Primal)?;
//! let outcome = Decoder::new(DecoderConfig::default()).decode(&mut graph);
//! assert!(outcome.is_success());
//! ```
//!
//! # Key Types
//!
//! - [`lattice::LatticeGraph`] -- Vertices, sub-edges and qubits with O(1)
//!   neighbor lookup by direction.
//! - [`cluster::ClusterForest`] -- Cluster arena with path-compressing
//!   `find` and size-ranked `union`.
//! - [`node_tree::NodeTree`] -- Per-cluster tree of syndrome, junction,
//!   boundary and filler nodes carrying parity and delay.
//! - [`decoder::Decoder`] -- Bucketed round loop under a
//!   [`config::GrowthPolicy`].
//! - [`batch`] -- Independent decoding of many error patterns, parallel with
//!   the `parallel` feature.

pub mod batch;
pub mod cluster;
pub mod config;
pub mod decoder;
pub mod id;
pub mod lattice;
pub mod node_tree;
pub mod profiling;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
