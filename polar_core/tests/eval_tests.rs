//! Property tests for the panoptic accumulator and label packing.

use polar_core::{
    semantic_of, ForegroundMask, GridShape, PanopticEval, PanopticGrid, PanopticLabel, VoxelCoord,
};
use proptest::prelude::*;

const N_CLASSES: usize = 4;

/// One synthetic scan: (pred_sem, pred_inst, gt_sem, gt_inst).
type Scan = (Vec<u32>, Vec<u32>, Vec<u32>, Vec<u32>);

fn scan_strategy() -> impl Strategy<Value = Scan> {
    (1usize..60).prop_flat_map(|n| {
        (
            prop::collection::vec(0u32..N_CLASSES as u32, n),
            prop::collection::vec(0u32..4, n),
            prop::collection::vec(0u32..N_CLASSES as u32, n),
            prop::collection::vec(0u32..4, n),
        )
    })
}

fn accumulate(scans: &[Scan]) -> PanopticEval {
    let mut eval = PanopticEval::new(N_CLASSES, &[0], 2);
    for (ps, pi, gs, gi) in scans {
        eval.add_batch(ps, pi, gs, gi).unwrap();
    }
    eval
}

fn metric_bits(eval: &PanopticEval) -> [u64; 4] {
    let pq = eval.get_pq();
    let iou = eval.get_sem_iou();
    [
        pq.pq.to_bits(),
        pq.sq.to_bits(),
        pq.rq.to_bits(),
        iou.miou.to_bits(),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Merging [A, B, C] in any order and grouping yields bit-identical metrics.
    #[test]
    fn merge_is_commutative_and_associative(
        a in prop::collection::vec(scan_strategy(), 1..3),
        b in prop::collection::vec(scan_strategy(), 1..3),
        c in prop::collection::vec(scan_strategy(), 1..3),
    ) {
        let (ea, eb, ec) = (accumulate(&a), accumulate(&b), accumulate(&c));

        let abc = ea.clone().merged(&eb).unwrap().merged(&ec).unwrap();
        let cba = ec.clone().merged(&eb).unwrap().merged(&ea).unwrap();
        let a_bc = ea.clone().merged(&eb.clone().merged(&ec).unwrap()).unwrap();
        let bac = eb.clone().merged(&ea).unwrap().merged(&ec).unwrap();

        prop_assert_eq!(metric_bits(&abc), metric_bits(&cba));
        prop_assert_eq!(metric_bits(&abc), metric_bits(&a_bc));
        prop_assert_eq!(metric_bits(&abc), metric_bits(&bac));
        prop_assert_eq!(&abc, &cba);
    }

    /// Metrics always stay within [0, 1].
    #[test]
    fn metrics_are_bounded(scans in prop::collection::vec(scan_strategy(), 1..4)) {
        let eval = accumulate(&scans);
        let pq = eval.get_pq();
        let iou = eval.get_sem_iou();
        for v in [pq.pq, pq.sq, pq.rq, iou.miou] {
            prop_assert!((0.0..=1.0).contains(&v), "metric out of range: {}", v);
        }
    }

    /// The semantic part of every gathered panoptic code equals the class packed into it.
    #[test]
    fn panoptic_code_low_bits_are_semantic(
        labels in prop::collection::vec((0u32..20, 0u32..1000), 1..64),
    ) {
        let shape = GridShape::new([8, 8, 1]);
        let coords: Vec<VoxelCoord> = (0..labels.len())
            .map(|i| VoxelCoord::new((i / 8) as u32, (i % 8) as u32, 0))
            .collect();

        let mut grid = PanopticGrid::zeros(shape);
        for (coord, &(sem, inst)) in coords.iter().zip(&labels) {
            grid.set(*coord, PanopticLabel::pack(sem, inst)).unwrap();
        }
        let codes = grid.gather(&coords).unwrap();
        let sems = semantic_of(&codes);
        for (code, (&sem, &(expected, _))) in codes.iter().zip(sems.iter().zip(&labels)) {
            prop_assert_eq!(code & 0xFFFF, sem);
            prop_assert_eq!(sem, expected);
        }
    }
}

#[test]
fn test_two_scans_with_one_thing_class() {
    // Class 1 is a thing class, class 2 is stuff.
    let mut eval = PanopticEval::new(3, &[0], 5);

    // Scan 1: two cars of 6 points each plus road, predicted perfectly.
    let gt_sem: Vec<u32> = [vec![1; 12], vec![2; 8]].concat();
    let gt_inst: Vec<u32> = [vec![1; 6], vec![2; 6], vec![0; 8]].concat();
    let pred_inst: Vec<u32> = gt_inst
        .iter()
        .zip(&gt_sem)
        .map(|(&i, &s)| PanopticLabel::pack(s, i).code())
        .collect();
    eval.add_batch(&gt_sem, &pred_inst, &gt_sem, &gt_inst).unwrap();

    // Scan 2: one car, the prediction misses it entirely (predicted as road).
    let gt_sem2: Vec<u32> = [vec![1; 6], vec![2; 6]].concat();
    let gt_inst2: Vec<u32> = [vec![3; 6], vec![0; 6]].concat();
    let pred_sem2 = vec![2u32; 12];
    eval.add_batch(&pred_sem2, &pred_sem2, &gt_sem2, &gt_inst2).unwrap();

    assert_eq!(eval.true_positives(1), 2);
    assert_eq!(eval.false_negatives(1), 1);

    let pq = eval.get_pq();
    let iou = eval.get_sem_iou();
    for v in [pq.pq, pq.sq, pq.rq, iou.miou] {
        assert!((0.0..=1.0).contains(&v));
    }
    assert!(pq.class_pq[1] < 1.0);
    assert!((pq.class_sq[1] - 1.0).abs() < 1e-12);
}

#[test]
fn test_mask_gather_roundtrip() {
    let shape = GridShape::new([3, 3, 3]);
    let coords = vec![VoxelCoord::new(0, 1, 2), VoxelCoord::new(2, 2, 2)];
    let mask = ForegroundMask::from_coords(shape, &coords).unwrap();

    let mut grid = PanopticGrid::from_codes(shape, vec![PanopticLabel::pack(4, 9).code(); 27]).unwrap();
    grid.restrict_to(&mask).unwrap();

    assert_eq!(grid.as_slice().iter().filter(|&&c| c != 0).count(), 2);
    assert_eq!(grid.gather(&coords).unwrap(), vec![PanopticLabel::pack(4, 9).code(); 2]);
}
