//! Benchmarks for the panel reconciliation pass.
//!
//! Run with: cargo bench -p gridmux-web

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use gridmux_web::{Document, MountPointSink, NodeId, PanelReconciler};
use std::hint::black_box;

struct Fixture {
    doc: Document,
    rec: PanelReconciler<u32>,
}

fn fixture(cells: usize, sessions: u32) -> Fixture {
    let mut doc = Document::new();
    let root = doc.root();
    let pool = doc.create_element("div");
    doc.append_child(root, pool).expect("pool attaches");
    doc.set_hidden(pool, true);
    let mut rec = PanelReconciler::new(pool);
    for index in 0..cells {
        let mount_point = doc.create_element("div");
        doc.append_child(root, mount_point).expect("mount point attaches");
        rec.mount_point_attached(index, mount_point);
    }
    for key in 0..sessions {
        let wrapper: NodeId = doc.create_element("div");
        doc.append_child(pool, wrapper).expect("wrapper attaches");
        rec.pool_node_attached(key, wrapper);
    }
    Fixture { doc, rec }
}

fn bench_reaffirm(c: &mut Criterion) {
    let mut group = c.benchmark_group("reconcile/reaffirm");
    for cells in [1usize, 4, 9] {
        let mut f = fixture(cells, 16);
        let assignments: Vec<Option<u32>> = (0..cells as u32).map(Some).collect();
        group.bench_with_input(BenchmarkId::from_parameter(cells), &assignments, |b, a| {
            b.iter(|| black_box(f.rec.reconcile(&mut f.doc, a)))
        });
    }
    group.finish();
}

fn bench_rotate(c: &mut Criterion) {
    let mut group = c.benchmark_group("reconcile/rotate");
    for cells in [4usize, 9] {
        let mut f = fixture(cells, 16);
        let frames: Vec<Vec<Option<u32>>> = (0..16u32)
            .map(|shift| {
                (0..cells as u32)
                    .map(|i| Some((i + shift) % 16))
                    .collect()
            })
            .collect();
        group.bench_with_input(BenchmarkId::from_parameter(cells), &frames, |b, frames| {
            let mut step = 0;
            b.iter(|| {
                step = (step + 1) % frames.len();
                black_box(f.rec.reconcile(&mut f.doc, &frames[step]))
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_reaffirm, bench_rotate);
criterion_main!(benches);
