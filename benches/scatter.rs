use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use sxgraph::{Graph, NodeId, ScatterDescriptor, ScatterMode, Slice, Sparsity};

/// Every other position of a length-`n` target written from a source of
/// length `n / 2`, addressed by an index list.
fn strided(n: usize, mode: ScatterMode) -> (Graph, NodeId, NodeId, NodeId) {
    let mut g = Graph::new();
    let target = g.symbol("t", Sparsity::column(n));
    let source = g.symbol("s", Sparsity::column(n / 2));
    let idx = g.column((0..n / 2).map(|k| (2 * k) as f64).collect());
    let r = g
        .scatter(target, source, ScatterDescriptor::IndexList { indices: idx }, mode)
        .unwrap();
    (g, target, source, r)
}

fn bench_evaluate(c: &mut Criterion) {
    let mut group = c.benchmark_group("scatter_evaluate");
    for n in [100, 10_000] {
        for mode in [ScatterMode::Overwrite, ScatterMode::Accumulate] {
            let (g, t, s, r) = strided(n, mode);
            let bindings = vec![(t, vec![1.0; n]), (s, vec![2.0; n / 2])];
            group.bench_with_input(
                BenchmarkId::new(format!("{mode:?}"), n),
                &bindings,
                |b, bindings| b.iter(|| black_box(g.evaluate(&[r], bindings).unwrap())),
            );
        }
    }
    group.finish();
}

fn bench_slice_vs_index_list(c: &mut Criterion) {
    let mut group = c.benchmark_group("slice_vs_index_list");
    for n in [100, 10_000] {
        let (g, t, s, r) = strided(n, ScatterMode::Overwrite);
        let bindings = vec![(t, vec![1.0; n]), (s, vec![2.0; n / 2])];
        group.bench_with_input(BenchmarkId::new("index_list", n), &bindings, |b, bindings| {
            b.iter(|| black_box(g.evaluate(&[r], bindings).unwrap()))
        });

        let mut g = Graph::new();
        let t = g.symbol("t", Sparsity::column(n));
        let s = g.symbol("s", Sparsity::column(n / 2));
        let offset = g.column(vec![0.0]);
        let slice = Slice::new(0, n as i64, 2).unwrap();
        let r = g
            .scatter(
                t,
                s,
                ScatterDescriptor::Slice { slice, offset },
                ScatterMode::Overwrite,
            )
            .unwrap();
        let bindings = vec![(t, vec![1.0; n]), (s, vec![2.0; n / 2])];
        group.bench_with_input(BenchmarkId::new("slice", n), &bindings, |b, bindings| {
            b.iter(|| black_box(g.evaluate(&[r], bindings).unwrap()))
        });
    }
    group.finish();
}

/// Building adjoint nodes and evaluating them.
fn bench_reverse(c: &mut Criterion) {
    let mut group = c.benchmark_group("scatter_reverse");
    for n in [100, 10_000] {
        let (g, t, s, r) = strided(n, ScatterMode::Overwrite);
        let bindings = vec![(t, vec![1.0; n]), (s, vec![2.0; n / 2])];
        group.bench_with_input(BenchmarkId::from_parameter(n), &bindings, |b, bindings| {
            b.iter(|| {
                let mut g = g.clone();
                let seed = g.column(vec![1.0; n]);
                let adj = g.reverse_ad(r, seed, &[t, s]).unwrap();
                black_box(g.evaluate(&adj, bindings).unwrap())
            })
        });
    }
    group.finish();
}

fn bench_dependency(c: &mut Criterion) {
    let (g, t, s, r) = strided(1000, ScatterMode::Accumulate);
    c.bench_function("scatter_jacobian_sparsity_1000", |b| {
        b.iter(|| {
            black_box(g.jacobian_sparsity(r, t));
            black_box(g.jacobian_sparsity(r, s))
        })
    });
}

criterion_group!(
    benches,
    bench_evaluate,
    bench_slice_vs_index_list,
    bench_reverse,
    bench_dependency
);
criterion_main!(benches);
