//! Running averages of loss terms.

/// Values of the three panoptic loss terms.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LossComponents {
    /// Semantic cross-entropy.
    pub semantic: f64,
    /// Center heatmap term.
    pub heatmap: f64,
    /// Offset term.
    pub offset: f64,
}

impl LossComponents {
    /// Create from the three terms.
    pub fn new(semantic: f64, heatmap: f64, offset: f64) -> Self {
        Self {
            semantic,
            heatmap,
            offset,
        }
    }

    /// Sum of the terms.
    pub fn total(&self) -> f64 {
        self.semantic + self.heatmap + self.offset
    }

    /// Log the terms.
    pub fn log(&self, prefix: &str) {
        log::info!(
            "{} loss: {:.3}, semantic loss: {:.3}, heatmap loss: {:.3}, offset loss: {:.3}",
            prefix,
            self.total(),
            self.semantic,
            self.heatmap,
            self.offset,
        );
    }
}

/// Running mean of each loss term.
#[derive(Debug, Clone, Default)]
pub struct LossTracker {
    sums: LossComponents,
    steps: usize,
}

impl LossTracker {
    /// Create an empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one step.
    pub fn add(&mut self, components: &LossComponents) {
        self.sums.semantic += components.semantic;
        self.sums.heatmap += components.heatmap;
        self.sums.offset += components.offset;
        self.steps += 1;
    }

    /// Number of recorded steps.
    pub fn steps(&self) -> usize {
        self.steps
    }

    /// Mean of each term; zero before the first step.
    pub fn averages(&self) -> LossComponents {
        if self.steps == 0 {
            return LossComponents::default();
        }
        let n = self.steps as f64;
        LossComponents::new(
            self.sums.semantic / n,
            self.sums.heatmap / n,
            self.sums.offset / n,
        )
    }

    /// Forget every recorded step.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
