//! Panoptic quality and semantic IoU accumulation.
//!
//! Points are accumulated scan by scan. Matching follows the usual panoptic
//! rule: a predicted and a ground-truth segment of the same class match when
//! their IoU exceeds 0.5. Unmatched segments count as false positives or false
//! negatives only when they hold at least `min_points` points.
//!
//! All state is integral. Matched IoU values are summed in 32.32 fixed point,
//! so merging accumulators in any order produces bit-identical metrics.

use std::collections::{HashMap, HashSet};

use crate::error::{PolarCoreError, Result};

/// Fixed-point scale for matched IoU sums.
const IOU_SCALE: f64 = 4_294_967_296.0;

/// Guard for divisions by empty counts.
const EPS: f64 = 1e-15;

/// Panoptic metrics: means plus per-class values (indexed by class id).
#[derive(Debug, Clone, PartialEq)]
pub struct PanopticQuality {
    /// Mean panoptic quality.
    pub pq: f64,
    /// Mean segmentation quality.
    pub sq: f64,
    /// Mean recognition quality.
    pub rq: f64,
    /// Per-class PQ.
    pub class_pq: Vec<f64>,
    /// Per-class SQ.
    pub class_sq: Vec<f64>,
    /// Per-class RQ.
    pub class_rq: Vec<f64>,
}

/// Semantic metrics: mean IoU plus per-class IoU (indexed by class id).
#[derive(Debug, Clone, PartialEq)]
pub struct SemanticIou {
    /// Mean intersection over union.
    pub miou: f64,
    /// Per-class IoU.
    pub class_iou: Vec<f64>,
}

/// Confusion accumulator for panoptic and semantic evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PanopticEval {
    n_classes: usize,
    ignore: Vec<u32>,
    min_points: u64,
    /// Semantic contingency matrix, `conf[pred * n_classes + gt]`.
    conf: Vec<u64>,
    pan_tp: Vec<u64>,
    pan_fp: Vec<u64>,
    pan_fn: Vec<u64>,
    pan_iou: Vec<u64>,
}

impl PanopticEval {
    /// Create an empty accumulator.
    ///
    /// `ignore` lists class ids excluded from evaluation (typically `[0]`,
    /// unlabeled). Points whose ground-truth class is ignored do not take part
    /// in panoptic matching.
    pub fn new(n_classes: usize, ignore: &[u32], min_points: u64) -> Self {
        Self {
            n_classes,
            ignore: ignore.to_vec(),
            min_points,
            conf: vec![0; n_classes * n_classes],
            pan_tp: vec![0; n_classes],
            pan_fp: vec![0; n_classes],
            pan_fn: vec![0; n_classes],
            pan_iou: vec![0; n_classes],
        }
    }

    /// Number of classes.
    #[inline]
    pub fn n_classes(&self) -> usize {
        self.n_classes
    }

    /// Ignored class ids.
    #[inline]
    pub fn ignore(&self) -> &[u32] {
        &self.ignore
    }

    /// Minimum segment size for unmatched segments to count.
    #[inline]
    pub fn min_points(&self) -> u64 {
        self.min_points
    }

    /// Whether no point has been accumulated yet.
    pub fn is_empty(&self) -> bool {
        self.conf.iter().all(|&c| c == 0)
    }

    /// Clear all accumulated counts.
    pub fn reset(&mut self) {
        self.conf.iter_mut().for_each(|c| *c = 0);
        self.pan_tp.iter_mut().for_each(|c| *c = 0);
        self.pan_fp.iter_mut().for_each(|c| *c = 0);
        self.pan_fn.iter_mut().for_each(|c| *c = 0);
        self.pan_iou.iter_mut().for_each(|c| *c = 0);
    }

    /// True-positive count for a class.
    pub fn true_positives(&self, class: u32) -> u64 {
        self.pan_tp.get(class as usize).copied().unwrap_or(0)
    }

    /// False-positive count for a class.
    pub fn false_positives(&self, class: u32) -> u64 {
        self.pan_fp.get(class as usize).copied().unwrap_or(0)
    }

    /// False-negative count for a class.
    pub fn false_negatives(&self, class: u32) -> u64 {
        self.pan_fn.get(class as usize).copied().unwrap_or(0)
    }

    fn is_ignored(&self, class: u32) -> bool {
        self.ignore.contains(&class)
    }

    fn included(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.n_classes).filter(move |&c| !self.is_ignored(c as u32))
    }

    fn check_class(&self, class: u32) -> Result<()> {
        if class as usize >= self.n_classes {
            return Err(PolarCoreError::ClassOutOfRange {
                class,
                n_classes: self.n_classes,
            });
        }
        Ok(())
    }

    /// Accumulate one scan.
    ///
    /// `pred_inst` and `gt_inst` are instance identifiers; any value works as
    /// long as it is unique per segment (full panoptic codes are typical).
    pub fn add_batch(
        &mut self,
        pred_sem: &[u32],
        pred_inst: &[u32],
        gt_sem: &[u32],
        gt_inst: &[u32],
    ) -> Result<()> {
        let n = pred_sem.len();
        for len in [pred_inst.len(), gt_sem.len(), gt_inst.len()] {
            if len != n {
                return Err(PolarCoreError::LengthMismatch { expected: n, got: len });
            }
        }
        for (&p, &g) in pred_sem.iter().zip(gt_sem) {
            self.check_class(p)?;
            self.check_class(g)?;
        }

        self.add_semantic(pred_sem, gt_sem);
        self.add_panoptic(pred_sem, pred_inst, gt_sem, gt_inst);
        Ok(())
    }

    fn add_semantic(&mut self, pred_sem: &[u32], gt_sem: &[u32]) {
        for (&p, &g) in pred_sem.iter().zip(gt_sem) {
            self.conf[p as usize * self.n_classes + g as usize] += 1;
        }
    }

    fn add_panoptic(&mut self, pred_sem: &[u32], pred_inst: &[u32], gt_sem: &[u32], gt_inst: &[u32]) {
        // Segment areas keyed by (class, instance + 1).
        let mut pred_area: HashMap<(u32, u64), u64> = HashMap::new();
        let mut gt_area: HashMap<(u32, u64), u64> = HashMap::new();
        // Intersections keyed by (class, pred instance + 1, gt instance + 1).
        let mut overlap: HashMap<(u32, u64, u64), u64> = HashMap::new();

        for i in 0..pred_sem.len() {
            let (ps, gs) = (pred_sem[i], gt_sem[i]);
            if self.is_ignored(gs) {
                continue;
            }
            let pi = pred_inst[i] as u64 + 1;
            let gi = gt_inst[i] as u64 + 1;

            if !self.is_ignored(ps) {
                *pred_area.entry((ps, pi)).or_insert(0) += 1;
            }
            *gt_area.entry((gs, gi)).or_insert(0) += 1;
            if ps == gs {
                *overlap.entry((gs, pi, gi)).or_insert(0) += 1;
            }
        }

        let mut matched_pred: HashSet<(u32, u64)> = HashSet::new();
        let mut matched_gt: HashSet<(u32, u64)> = HashSet::new();

        for (&(class, pi, gi), &inter) in &overlap {
            let union = gt_area[&(class, gi)] + pred_area[&(class, pi)] - inter;
            let iou = inter as f64 / union as f64;
            if iou > 0.5 {
                let c = class as usize;
                self.pan_tp[c] += 1;
                self.pan_iou[c] += (iou * IOU_SCALE).round() as u64;
                matched_pred.insert((class, pi));
                matched_gt.insert((class, gi));
            }
        }

        for (&key, &area) in &gt_area {
            if area >= self.min_points && !matched_gt.contains(&key) {
                self.pan_fn[key.0 as usize] += 1;
            }
        }
        for (&key, &area) in &pred_area {
            if area >= self.min_points && !matched_pred.contains(&key) {
                self.pan_fp[key.0 as usize] += 1;
            }
        }
    }

    /// Panoptic, segmentation and recognition quality.
    ///
    /// Means run over non-ignored classes that have at least one ground-truth
    /// segment (`tp + fn > 0`); the mean is 0 when no class qualifies.
    pub fn get_pq(&self) -> PanopticQuality {
        let mut class_pq = vec![0.0; self.n_classes];
        let mut class_sq = vec![0.0; self.n_classes];
        let mut class_rq = vec![0.0; self.n_classes];

        for c in 0..self.n_classes {
            let tp = self.pan_tp[c] as f64;
            let fp = self.pan_fp[c] as f64;
            let fn_ = self.pan_fn[c] as f64;
            let iou = self.pan_iou[c] as f64 / IOU_SCALE;

            let sq = iou / tp.max(EPS);
            let rq = tp / (tp + 0.5 * fp + 0.5 * fn_).max(EPS);
            class_sq[c] = sq;
            class_rq[c] = rq;
            class_pq[c] = sq * rq;
        }

        let evaluated: Vec<usize> = self
            .included()
            .filter(|&c| self.pan_tp[c] + self.pan_fn[c] > 0)
            .collect();

        PanopticQuality {
            pq: mean_over(&class_pq, &evaluated),
            sq: mean_over(&class_sq, &evaluated),
            rq: mean_over(&class_rq, &evaluated),
            class_pq,
            class_sq,
            class_rq,
        }
    }

    /// Semantic IoU per class and its mean.
    ///
    /// Points whose ground truth is ignored are dropped. The mean runs over
    /// non-ignored classes with at least one ground-truth point.
    pub fn get_sem_iou(&self) -> SemanticIou {
        let n = self.n_classes;
        let mut class_iou = vec![0.0; n];
        let mut gt_points = vec![0u64; n];

        for c in 0..n {
            if self.is_ignored(c as u32) {
                continue;
            }
            let tp = self.conf[c * n + c];
            // Row sum over non-ignored ground-truth columns.
            let row: u64 = (0..n)
                .filter(|&g| !self.is_ignored(g as u32))
                .map(|g| self.conf[c * n + g])
                .sum();
            let col: u64 = (0..n).map(|p| self.conf[p * n + c]).sum();
            gt_points[c] = col;

            let union = (row + col - tp) as f64;
            class_iou[c] = tp as f64 / union.max(EPS);
        }

        let evaluated: Vec<usize> = self.included().filter(|&c| gt_points[c] > 0).collect();

        SemanticIou {
            miou: mean_over(&class_iou, &evaluated),
            class_iou,
        }
    }

    /// Add another accumulator's counts into this one.
    pub fn merge(&mut self, other: &PanopticEval) -> Result<()> {
        if other.n_classes != self.n_classes {
            return Err(PolarCoreError::ClassCountMismatch {
                expected: self.n_classes,
                got: other.n_classes,
            });
        }
        add_into(&mut self.conf, &other.conf);
        add_into(&mut self.pan_tp, &other.pan_tp);
        add_into(&mut self.pan_fp, &other.pan_fp);
        add_into(&mut self.pan_fn, &other.pan_fn);
        add_into(&mut self.pan_iou, &other.pan_iou);
        Ok(())
    }

    /// Consuming form of [`merge`](Self::merge).
    pub fn merged(mut self, other: &PanopticEval) -> Result<Self> {
        self.merge(other)?;
        Ok(self)
    }
}

fn add_into(dst: &mut [u64], src: &[u64]) {
    for (d, s) in dst.iter_mut().zip(src) {
        *d += *s;
    }
}

fn mean_over(values: &[f64], classes: &[usize]) -> f64 {
    if classes.is_empty() {
        return 0.0;
    }
    classes.iter().map(|&c| values[c]).sum::<f64>() / classes.len() as f64
}
