//! Criterion benchmarks for the panoptic accumulator.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use polar_core::{PanopticEval, PanopticLabel};

/// Deterministic synthetic scan with `n` points, 20 classes and a few instances per class.
fn make_scan(n: usize) -> (Vec<u32>, Vec<u32>, Vec<u32>, Vec<u32>) {
    let mut state = 0x9E37_79B9_7F4A_7C15u64;
    let mut next = || {
        state = state.wrapping_mul(6364136223846793005).wrapping_add(1);
        (state >> 33) as u32
    };

    let mut gt_sem = Vec::with_capacity(n);
    let mut gt_inst = Vec::with_capacity(n);
    let mut pred_sem = Vec::with_capacity(n);
    let mut pred_inst = Vec::with_capacity(n);
    for _ in 0..n {
        let sem = next() % 20;
        let inst = if sem < 9 { next() % 8 } else { 0 };
        gt_sem.push(sem);
        gt_inst.push(inst);
        // 90% of points predicted correctly.
        let p = if next() % 10 == 0 { next() % 20 } else { sem };
        pred_sem.push(p);
        pred_inst.push(PanopticLabel::pack(p, inst).code());
    }
    (pred_sem, pred_inst, gt_sem, gt_inst)
}

fn bench_add_batch(c: &mut Criterion) {
    let mut group = c.benchmark_group("add_batch");
    for n in [10_000usize, 120_000] {
        let (ps, pi, gs, gi) = make_scan(n);
        group.throughput(Throughput::Elements(n as u64));
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, _| {
            b.iter(|| {
                let mut eval = PanopticEval::new(20, &[0], 50);
                eval.add_batch(black_box(&ps), black_box(&pi), black_box(&gs), black_box(&gi))
                    .unwrap();
                eval
            })
        });
    }
    group.finish();
}

fn bench_metrics(c: &mut Criterion) {
    let (ps, pi, gs, gi) = make_scan(120_000);
    let mut eval = PanopticEval::new(20, &[0], 50);
    eval.add_batch(&ps, &pi, &gs, &gi).unwrap();

    c.bench_function("get_pq", |b| b.iter(|| black_box(&eval).get_pq()));
    c.bench_function("get_sem_iou", |b| b.iter(|| black_box(&eval).get_sem_iou()));
    c.bench_function("merge", |b| {
        b.iter(|| eval.clone().merged(black_box(&eval)).unwrap())
    });
}

criterion_group!(benches, bench_add_batch, bench_metrics);
criterion_main!(benches);
