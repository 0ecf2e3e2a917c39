//! Independent decoding of many error patterns on one lattice layout.
//!
//! Each pattern is decoded on its own clone of the template graph, so
//! patterns share nothing. With the `parallel` feature the batch is spread
//! over rayon's thread pool; results keep the input order either way.

use crate::config::DecoderConfig;
use crate::decoder::{DecodeOutcome, Decoder};
use crate::id::{QubitCoord, StabKind};
use crate::lattice::{LatticeError, LatticeGraph};
use serde::{Deserialize, Serialize};
use tracing::debug;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Sub-edge flips making up one sampled error.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorPattern {
    pub flips: Vec<(QubitCoord, StabKind)>,
}

impl ErrorPattern {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_flip(mut self, coord: QubitCoord, kind: StabKind) -> Self {
        self.flips.push((coord, kind));
        self
    }

    pub fn push(&mut self, coord: QubitCoord, kind: StabKind) {
        self.flips.push((coord, kind));
    }

    pub fn len(&self) -> usize {
        self.flips.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flips.is_empty()
    }

    pub fn apply(&self, graph: &mut LatticeGraph) -> Result<(), LatticeError> {
        graph.apply_errors(self.flips.iter().copied())
    }
}

/// Decode `pattern` on a fresh copy of `template`.
pub fn decode_pattern(
    template: &LatticeGraph,
    pattern: &ErrorPattern,
    config: &DecoderConfig,
) -> Result<DecodeOutcome, LatticeError> {
    let mut graph = template.clone();
    graph.reset();
    pattern.apply(&mut graph)?;
    Ok(Decoder::new(config.clone()).decode(&mut graph))
}

/// Decode every pattern independently. Output order matches `patterns`.
pub fn decode_batch(
    template: &LatticeGraph,
    patterns: &[ErrorPattern],
    config: &DecoderConfig,
) -> Vec<Result<DecodeOutcome, LatticeError>> {
    debug!(patterns = patterns.len(), policy = ?config.policy, "decoding batch");

    #[cfg(feature = "parallel")]
    let results = patterns
        .par_iter()
        .map(|pattern| decode_pattern(template, pattern, config))
        .collect();

    #[cfg(not(feature = "parallel"))]
    let results = patterns
        .iter()
        .map(|pattern| decode_pattern(template, pattern, config))
        .collect();

    results
}

/// Tally of a decoded batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub decoded: usize,
    /// Patterns left with a non-neutral cluster or cut off by the round limit.
    pub failures: usize,
    /// Patterns that named a qubit the lattice lacks.
    pub invalid: usize,
}

impl BatchSummary {
    pub fn from_results(results: &[Result<DecodeOutcome, LatticeError>]) -> Self {
        let mut summary = Self::default();
        for result in results {
            match result {
                Ok(outcome) => {
                    summary.decoded += 1;
                    if !outcome.is_success() {
                        summary.failures += 1;
                    }
                }
                Err(_) => summary.invalid += 1,
            }
        }
        summary
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
