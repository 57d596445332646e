//! C6 — isotonic calibrator (spec §4.6).
//!
//! Per-outcome monotone calibration curves fitted with the
//! pool-adjacent-violators algorithm (PAVA), plus the evaluation trio
//! (Brier, log-loss, reliability bins) the teacher's `calibration.rs`
//! already computes — generalized here from a fixed grid-search-over-rho
//! evaluation into real, monotone, data-fitted curves.

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};
use crate::types::{Outcome, Triplet};

/// Log-loss floor (spec §4.6), applied to the probability assigned to the
/// realized outcome before taking its logarithm.
const LOG_LOSS_FLOOR: f64 = 1e-3;

/// Calibration fitting fails outright below this many (prediction, outcome)
/// pairs (spec §7: "fails only if total samples < 200").
const CALIBRATION_MIN_SAMPLES: usize = 200;

/// Reliability bins are merged with a neighbour until each holds at least
/// this many samples (spec §7: "merging adjacent bins until each has >= 20
/// samples").
const MIN_BIN_SAMPLES: usize = 20;

/// A single monotone calibration curve: breakpoints spanning [0, 1] with
/// non-decreasing, [0, 1]-clipped values, fitted by PAVA.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalibrationCurve {
    /// Sorted, strictly increasing x-coordinates (raw predicted probabilities).
    pub breakpoints: Vec<f64>,
    /// Calibrated value at each breakpoint, non-decreasing, clipped to [0, 1].
    pub values: Vec<f64>,
}

impl CalibrationCurve {
    /// Piecewise-constant application: the calibrated value at the last
    /// breakpoint not greater than `x`, or the first value if `x` is below
    /// every breakpoint (spec §4.6 "piecewise-constant interpolated value").
    pub fn apply(&self, x: f64) -> f64 {
        if self.breakpoints.is_empty() {
            return x.clamp(0.0, 1.0);
        }
        match self.breakpoints.partition_point(|&bp| bp <= x) {
            0 => self.values[0],
            idx => self.values[idx - 1],
        }
    }
}

/// One curve per outcome, fitted jointly over the same (prediction, outcome)
/// pairs. Produced by `fit_calibrators` and stored on a `TrainedParameters`
/// bundle (I5: immutable after a fit publishes).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalibrationSet {
    pub home: CalibrationCurve,
    pub draw: CalibrationCurve,
    pub away: CalibrationCurve,
}

/// Pool-adjacent-violators: fits the monotone non-decreasing step function
/// minimizing squared error over `(x_k, y_k)` pairs, y_k typically in
/// {0, 1}. Ties in x are broken by input order (spec §4.6), so callers must
/// pre-sort by x and must not rely on a stable sort across equal x's beyond
/// that input order.
///
/// Returns `(breakpoints, values)` with one entry per input, already
/// monotone and clipped to [0, 1] (adjacent equal-x points collapse to the
/// same breakpoint with the last one winning, matching a plain PAVA pass
/// over the sorted input).
fn pool_adjacent_violators(xs: &[f64], ys: &[f64]) -> (Vec<f64>, Vec<f64>) {
    // Each block holds (weight, sum_y, representative_x) for a contiguous
    // run of the input that has been pooled together.
    struct Block {
        weight: f64,
        sum_y: f64,
        x: f64,
    }

    let mut blocks: Vec<Block> = Vec::with_capacity(xs.len());
    for (&x, &y) in xs.iter().zip(ys) {
        blocks.push(Block {
            weight: 1.0,
            sum_y: y,
            x,
        });
        // Merge backwards while the pooled means violate monotonicity.
        while blocks.len() >= 2 {
            let n = blocks.len();
            let mean_last = blocks[n - 1].sum_y / blocks[n - 1].weight;
            let mean_prev = blocks[n - 2].sum_y / blocks[n - 2].weight;
            if mean_prev > mean_last {
                let last = blocks.pop().unwrap();
                let prev = blocks.last_mut().unwrap();
                prev.weight += last.weight;
                prev.sum_y += last.sum_y;
                prev.x = last.x; // keep the rightmost x as the block's breakpoint
            } else {
                break;
            }
        }
    }

    let mut breakpoints = Vec::with_capacity(blocks.len());
    let mut values = Vec::with_capacity(blocks.len());
    for block in &blocks {
        breakpoints.push(block.x);
        values.push((block.sum_y / block.weight).clamp(0.0, 1.0));
    }
    (breakpoints, values)
}

fn fit_one_curve(mut pairs: Vec<(f64, f64)>) -> CalibrationCurve {
    // Stable sort preserves input order among ties, satisfying spec §4.6's
    // tie-break rule.
    pairs.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));
    let xs: Vec<f64> = pairs.iter().map(|p| p.0).collect();
    let ys: Vec<f64> = pairs.iter().map(|p| p.1).collect();
    let (breakpoints, values) = pool_adjacent_violators(&xs, &ys);
    CalibrationCurve { breakpoints, values }
}

fn one_hot(outcome: Outcome, class: Outcome) -> f64 {
    if outcome == class {
        1.0
    } else {
        0.0
    }
}

/// `fit_calibrators(predictions, outcomes) -> {H, D, A}` (spec §4.6).
pub fn fit_calibrators(predictions: &[Triplet], outcomes: &[Outcome]) -> Result<CalibrationSet> {
    if predictions.len() != outcomes.len() || predictions.len() < CALIBRATION_MIN_SAMPLES {
        return Err(EngineError::InsufficientData {
            matches: predictions.len().min(outcomes.len()),
            min_required: CALIBRATION_MIN_SAMPLES,
        });
    }

    let home_pairs = predictions
        .iter()
        .zip(outcomes)
        .map(|(p, &o)| (p.home, one_hot(o, Outcome::Home)))
        .collect();
    let draw_pairs = predictions
        .iter()
        .zip(outcomes)
        .map(|(p, &o)| (p.draw, one_hot(o, Outcome::Draw)))
        .collect();
    let away_pairs = predictions
        .iter()
        .zip(outcomes)
        .map(|(p, &o)| (p.away, one_hot(o, Outcome::Away)))
        .collect();

    Ok(CalibrationSet {
        home: fit_one_curve(home_pairs),
        draw: fit_one_curve(draw_pairs),
        away: fit_one_curve(away_pairs),
    })
}

/// Draw-only calibrator (spec §4.6): identical PAVA procedure restricted to
/// `(p_D, 1[outcome=D])`. Diagnostic only — never re-enters the predictor.
pub fn fit_draw_calibrator(predictions: &[Triplet], outcomes: &[Outcome]) -> Result<CalibrationCurve> {
    if predictions.len() != outcomes.len() || predictions.len() < CALIBRATION_MIN_SAMPLES {
        return Err(EngineError::InsufficientData {
            matches: predictions.len().min(outcomes.len()),
            min_required: CALIBRATION_MIN_SAMPLES,
        });
    }
    let pairs = predictions
        .iter()
        .zip(outcomes)
        .map(|(p, &o)| (p.draw, one_hot(o, Outcome::Draw)))
        .collect();
    Ok(fit_one_curve(pairs))
}

/// Applies a fitted `CalibrationSet` to a raw triplet, then renormalizes to
/// restore I1 (spec §4.6 "Application").
pub fn apply_calibration_set(set: &CalibrationSet, raw: Triplet) -> Result<Triplet> {
    let home = set.home.apply(raw.home);
    let draw = set.draw.apply(raw.draw);
    let away = set.away.apply(raw.away);
    Triplet::from_unnormalized(home, draw, away)
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct EvaluationMetrics {
    pub samples: usize,
    pub brier: f64,
    pub log_loss: f64,
}

/// Brier + log-loss over the three outcomes (spec §4.6 "Evaluation").
pub fn evaluate(predictions: &[Triplet], outcomes: &[Outcome]) -> EvaluationMetrics {
    if predictions.is_empty() || predictions.len() != outcomes.len() {
        return EvaluationMetrics {
            samples: 0,
            brier: 0.0,
            log_loss: 0.0,
        };
    }

    let mut brier_sum = 0.0_f64;
    let mut log_loss_sum = 0.0_f64;
    for (p, &outcome) in predictions.iter().zip(outcomes) {
        brier_sum += (p.home - one_hot(outcome, Outcome::Home)).powi(2)
            + (p.draw - one_hot(outcome, Outcome::Draw)).powi(2)
            + (p.away - one_hot(outcome, Outcome::Away)).powi(2);

        let realized = p.component(outcome).max(LOG_LOSS_FLOOR);
        log_loss_sum += -realized.ln();
    }

    let n = predictions.len() as f64;
    EvaluationMetrics {
        samples: predictions.len(),
        brier: brier_sum / n,
        log_loss: log_loss_sum / n,
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ReliabilityBin {
    pub bucket_start: f64,
    pub bucket_end: f64,
    pub count: usize,
    pub mean_predicted: f64,
    pub mean_actual: f64,
}

/// Equal-width reliability bucketing for one outcome class (spec §4.6:
/// "bucket predictions into >= 10 bins ... report (mean predicted, mean
/// actual, count) per bin"), with sparse neighbours merged per spec §7
/// ("tolerates per-bin sparsity by merging adjacent bins until each has
/// >= 20 samples").
pub fn reliability_bins(predictions: &[Triplet], outcomes: &[Outcome], class: Outcome, bins: usize) -> Vec<ReliabilityBin> {
    let bins = bins.max(10);
    let mut counts = vec![0usize; bins];
    let mut pred_sum = vec![0.0_f64; bins];
    let mut actual_sum = vec![0.0_f64; bins];

    for (p, &outcome) in predictions.iter().zip(outcomes) {
        let class_prob = p.component(class).clamp(0.0, 1.0);
        let idx = ((class_prob * bins as f64) as usize).min(bins - 1);
        counts[idx] += 1;
        pred_sum[idx] += class_prob;
        actual_sum[idx] += one_hot(outcome, class);
    }

    let raw: Vec<ReliabilityBin> = (0..bins)
        .map(|i| {
            let count = counts[i];
            let (mean_predicted, mean_actual) = if count > 0 {
                (pred_sum[i] / count as f64, actual_sum[i] / count as f64)
            } else {
                (0.0, 0.0)
            };
            ReliabilityBin {
                bucket_start: i as f64 / bins as f64,
                bucket_end: (i + 1) as f64 / bins as f64,
                count,
                mean_predicted,
                mean_actual,
            }
        })
        .collect();

    merge_sparse_bins(raw, MIN_BIN_SAMPLES)
}

/// Accumulates consecutive bins left-to-right until a merged run reaches
/// `min_samples`, then flushes it as a single wider bin. A trailing run
/// that never reaches the threshold is folded into the last flushed bin
/// (or kept alone if there was no earlier bin to absorb it into).
fn merge_sparse_bins(raw: Vec<ReliabilityBin>, min_samples: usize) -> Vec<ReliabilityBin> {
    let mut merged: Vec<ReliabilityBin> = Vec::new();
    let mut run: Option<ReliabilityBin> = None;

    for bin in raw {
        run = Some(match run {
            None => bin,
            Some(acc) => combine_bins(acc, bin),
        });
        if run.as_ref().unwrap().count >= min_samples {
            merged.push(run.take().unwrap());
        }
    }

    if let Some(leftover) = run {
        if let Some(last) = merged.pop() {
            merged.push(combine_bins(last, leftover));
        } else {
            merged.push(leftover);
        }
    }

    merged
}

fn combine_bins(a: ReliabilityBin, b: ReliabilityBin) -> ReliabilityBin {
    let count = a.count + b.count;
    let (mean_predicted, mean_actual) = if count > 0 {
        (
            (a.mean_predicted * a.count as f64 + b.mean_predicted * b.count as f64) / count as f64,
            (a.mean_actual * a.count as f64 + b.mean_actual * b.count as f64) / count as f64,
        )
    } else {
        (0.0, 0.0)
    };
    ReliabilityBin {
        bucket_start: a.bucket_start.min(b.bucket_start),
        bucket_end: a.bucket_end.max(b.bucket_end),
        count,
        mean_predicted,
        mean_actual,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pava_produces_monotone_curve_from_violating_input() {
        // A deliberately non-monotone y sequence; PAVA must pool it into a
        // non-decreasing step function.
        let xs = vec![0.1, 0.2, 0.3, 0.4, 0.5];
        let ys = vec![0.0, 1.0, 0.0, 1.0, 1.0];
        let (_bp, values) = pool_adjacent_violators(&xs, &ys);
        for window in values.windows(2) {
            assert!(window[0] <= window[1] + 1e-12);
        }
    }

    /// Tiles a small base set of (prediction, outcome) pairs until the
    /// total reaches the `CALIBRATION_MIN_SAMPLES` floor (spec §7).
    fn tile_pairs(base: &[(Triplet, Outcome)]) -> (Vec<Triplet>, Vec<Outcome>) {
        let repeats = CALIBRATION_MIN_SAMPLES.div_ceil(base.len());
        let mut predictions = Vec::with_capacity(repeats * base.len());
        let mut outcomes = Vec::with_capacity(repeats * base.len());
        for _ in 0..repeats {
            for &(p, o) in base {
                predictions.push(p);
                outcomes.push(o);
            }
        }
        (predictions, outcomes)
    }

    #[test]
    fn fit_calibrators_on_perfectly_separated_data_is_close_to_identity_at_extremes() {
        let (predictions, outcomes) = tile_pairs(&[
            (Triplet::new(0.90, 0.05, 0.05).unwrap(), Outcome::Home),
            (Triplet::new(0.05, 0.90, 0.05).unwrap(), Outcome::Draw),
            (Triplet::new(0.05, 0.05, 0.90).unwrap(), Outcome::Away),
            (Triplet::new(0.80, 0.10, 0.10).unwrap(), Outcome::Home),
        ]);
        let set = fit_calibrators(&predictions, &outcomes).unwrap();
        // The home curve's highest breakpoint corresponds to an actual home win.
        assert!(set.home.apply(0.80) >= set.home.apply(0.05));
    }

    #[test]
    fn apply_calibration_set_restores_probability_invariant() {
        let (predictions, outcomes) = tile_pairs(&[
            (Triplet::new(0.50, 0.25, 0.25).unwrap(), Outcome::Home),
            (Triplet::new(0.20, 0.30, 0.50).unwrap(), Outcome::Away),
            (Triplet::new(0.40, 0.40, 0.20).unwrap(), Outcome::Draw),
        ]);
        let set = fit_calibrators(&predictions, &outcomes).unwrap();
        let calibrated = apply_calibration_set(&set, Triplet::new(0.45, 0.30, 0.25).unwrap()).unwrap();
        assert!((calibrated.sum() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn fit_calibrators_rejects_below_the_sample_floor() {
        let predictions = vec![Triplet::new(0.5, 0.3, 0.2).unwrap(); 199];
        let outcomes = vec![Outcome::Home; 199];
        let result = fit_calibrators(&predictions, &outcomes);
        assert!(matches!(result, Err(EngineError::InsufficientData { .. })));
    }

    #[test]
    fn evaluate_perfect_predictions_have_zero_brier_and_floor_log_loss() {
        let predictions = vec![
            Triplet::new(1.0 - 2e-9, 1e-9, 1e-9).unwrap(),
            Triplet::new(1e-9, 1.0 - 2e-9, 1e-9).unwrap(),
        ];
        let outcomes = vec![Outcome::Home, Outcome::Draw];
        let metrics = evaluate(&predictions, &outcomes);
        assert!(metrics.brier < 1e-6);
        assert!(metrics.log_loss < 1e-6);
    }

    #[test]
    fn reliability_bins_conserve_counts_and_span_the_unit_interval() {
        // Too sparse per-bin (3 samples across 10 bins) to clear the
        // MIN_BIN_SAMPLES floor, so every bin must have merged into one.
        let predictions = vec![
            Triplet::new(0.05, 0.10, 0.85).unwrap(),
            Triplet::new(0.55, 0.20, 0.25).unwrap(),
            Triplet::new(0.95, 0.03, 0.02).unwrap(),
        ];
        let outcomes = vec![Outcome::Away, Outcome::Home, Outcome::Home];
        let bins = reliability_bins(&predictions, &outcomes, Outcome::Home, 10);
        assert_eq!(bins.len(), 1);
        assert_eq!(bins.iter().map(|b| b.count).sum::<usize>(), 3);
        assert!((bins.first().unwrap().bucket_start - 0.0).abs() < 1e-12);
        assert!((bins.last().unwrap().bucket_end - 1.0).abs() < 1e-12);
    }

    #[test]
    fn reliability_bins_split_when_every_bin_clears_the_sparsity_floor() {
        // 10 bins x 25 samples each comfortably clears MIN_BIN_SAMPLES, so
        // merging should leave all 10 bins distinct.
        let mut predictions = Vec::new();
        let mut outcomes = Vec::new();
        for bin in 0..10 {
            let p = (bin as f64 + 0.5) / 10.0;
            for _ in 0..25 {
                predictions.push(Triplet::new(p, (1.0 - p) / 2.0, (1.0 - p) / 2.0).unwrap());
                outcomes.push(Outcome::Away);
            }
        }
        let bins = reliability_bins(&predictions, &outcomes, Outcome::Home, 10);
        assert_eq!(bins.len(), 10);
        assert_eq!(bins.iter().map(|b| b.count).sum::<usize>(), 250);
    }

    #[test]
    fn insufficient_data_is_rejected() {
        let result = fit_calibrators(&[], &[]);
        assert!(matches!(result, Err(EngineError::InsufficientData { .. })));
    }
}
