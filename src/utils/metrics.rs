//! Metrics Module
//!
//! Evaluation metrics for the two pipelines:
//! - Per-pixel weighted Matthews correlation coefficient for the
//!   cultivated-land classification task
//! - Running averages for epoch-level loss aggregation
//!
//! All metric computation happens on CPU `f32` slices detached from the
//! backend, so results do not depend on which tensor path produced them.

use serde::{Deserialize, Serialize};

/// Weighted Matthews correlation coefficient over binarized predictions.
///
/// Predictions are binarized at `threshold`; targets are treated as positive
/// when `>= 0.5`. Each pixel contributes its weight to the confusion sums.
///
/// Returns 0.0 when the coefficient is undefined (constant predictions or
/// constant targets give a zero denominator), never NaN.
pub fn weighted_matthews(
    predictions: &[f32],
    targets: &[f32],
    weights: &[f32],
    threshold: f32,
) -> f64 {
    assert_eq!(
        predictions.len(),
        targets.len(),
        "predictions and targets must have the same length"
    );
    assert_eq!(
        predictions.len(),
        weights.len(),
        "predictions and weights must have the same length"
    );

    let mut tp = 0.0f64;
    let mut fp = 0.0f64;
    let mut tn = 0.0f64;
    let mut fn_ = 0.0f64;

    for ((&p, &t), &w) in predictions.iter().zip(targets.iter()).zip(weights.iter()) {
        let p = p >= threshold;
        let t = t >= 0.5;
        let w = w as f64;
        match (p, t) {
            (true, true) => tp += w,
            (true, false) => fp += w,
            (false, false) => tn += w,
            (false, true) => fn_ += w,
        }
    }

    let denom = ((tp + fp) * (tp + fn_) * (tn + fp) * (tn + fn_)).sqrt();
    if denom == 0.0 {
        return 0.0;
    }

    (tp * tn - fp * fn_) / denom
}

/// Running average for tracking losses during training
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunningAverage {
    sum: f64,
    count: usize,
}

impl RunningAverage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, value: f64) {
        self.sum += value;
        self.count += 1;
    }

    pub fn average(&self) -> f64 {
        if self.count > 0 {
            self.sum / self.count as f64
        } else {
            0.0
        }
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn reset(&mut self) {
        self.sum = 0.0;
        self.count = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_perfect_agreement() {
        let target = [1.0, 1.0, 0.0, 0.0];
        let pred = [1.0, 1.0, 0.0, 0.0];
        let weight = [1.0, 1.0, 1.0, 1.0];

        let score = weighted_matthews(&pred, &target, &weight, 0.5);
        assert!((score - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_perfect_disagreement() {
        let target = [1.0, 1.0, 0.0, 0.0];
        let pred = [0.0, 0.0, 1.0, 1.0];
        let weight = [1.0, 1.0, 1.0, 1.0];

        let score = weighted_matthews(&pred, &target, &weight, 0.5);
        assert!((score + 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_constant_prediction_is_zero_not_nan() {
        let target = [1.0, 1.0, 0.0, 0.0];
        let pred = [1.0, 1.0, 1.0, 1.0];
        let weight = [1.0, 1.0, 1.0, 1.0];

        let score = weighted_matthews(&pred, &target, &weight, 0.5);
        assert_eq!(score, 0.0);
    }

    #[test]
    fn test_constant_target_is_zero_not_nan() {
        let target = [0.0, 0.0, 0.0, 0.0];
        let pred = [1.0, 0.0, 1.0, 0.0];
        let weight = [1.0, 1.0, 1.0, 1.0];

        let score = weighted_matthews(&pred, &target, &weight, 0.5);
        assert_eq!(score, 0.0);
    }

    #[test]
    fn test_zero_weight_pixels_are_ignored() {
        // Last two pixels disagree but carry no weight
        let target = [1.0, 0.0, 1.0, 1.0];
        let pred = [1.0, 0.0, 0.0, 0.0];
        let weight = [1.0, 1.0, 0.0, 0.0];

        let score = weighted_matthews(&pred, &target, &weight, 0.5);
        assert!((score - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_running_average() {
        let mut avg = RunningAverage::new();
        avg.add(1.0);
        avg.add(2.0);
        avg.add(3.0);

        assert_eq!(avg.count(), 3);
        assert!((avg.average() - 2.0).abs() < 1e-9);

        avg.reset();
        assert_eq!(avg.count(), 0);
        assert_eq!(avg.average(), 0.0);
    }
}
