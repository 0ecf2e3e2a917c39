//! Criterion benchmarks for the UFNS decoder.
//!
//! Two benchmark groups:
//! - `policies`: one fixed pattern on a toric lattice of size 16 under each
//!   growth policy
//! - `lattice_size`: scattered error chains on toric lattices of growing size

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use ufns_core::batch::ErrorPattern;
use ufns_core::config::{DecoderConfig, GrowthPolicy};
use ufns_core::decoder::Decoder;
use ufns_core::id::*;
use ufns_core::lattice::LatticeGraph;
use ufns_core::test_utils::*;

// ===========================================================================
// Pattern builders
// ===========================================================================

/// Short primal and dual chains spread evenly over the lattice.
fn scattered_chains(size: i32) -> ErrorPattern {
    let mut pattern = ErrorPattern::new();
    let mut row = 1;
    while row < size {
        let mut col = (row * 3) % size;
        while col < size {
            pattern.push(horizontal(row, col), StabKind::Primal);
            pattern.push(vertical(row, (col + 1) % size), StabKind::Primal);
            pattern.push(horizontal((row + 2) % size, col), StabKind::Dual);
            col += 5;
        }
        row += 4;
    }
    pattern
}

fn prepared(size: usize) -> LatticeGraph {
    let mut graph = LatticeGraph::toric(size).unwrap();
    scattered_chains(size as i32).apply(&mut graph).unwrap();
    graph.measure_stabilizers();
    graph
}

// ===========================================================================
// Benchmarks
// ===========================================================================

fn bench_policies(c: &mut Criterion) {
    let mut group = c.benchmark_group("policies");
    let template = prepared(16);

    for policy in [
        GrowthPolicy::Uniform,
        GrowthPolicy::Balanced,
        GrowthPolicy::NodeSuspension,
    ] {
        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{policy:?}")),
            &policy,
            |b, &policy| {
                let mut decoder = Decoder::new(DecoderConfig::with_policy(policy));
                let mut graph = template.clone();
                b.iter(|| decoder.cluster(&mut graph));
            },
        );
    }
    group.finish();
}

fn bench_lattice_size(c: &mut Criterion) {
    let mut group = c.benchmark_group("lattice_size");

    for size in [8usize, 16, 32] {
        let template = prepared(size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &template, |b, template| {
            let mut decoder = Decoder::default();
            let mut graph = template.clone();
            b.iter(|| decoder.cluster(&mut graph));
        });
    }
    group.finish();
}

criterion_group!(benches, bench_policies, bench_lattice_size);
criterion_main!(benches);
