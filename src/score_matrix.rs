//! C1 — score-matrix engine (spec §4.1).
//!
//! Builds the (N_max+1)×(N_max+1) joint goal-count matrix from
//! (λ_H, λ_A, ρ) and aggregates it into a 1X2 triplet. Generalizes the
//! teacher's `calibration.rs::outcome_probs_poisson_dc` (which hard-coded
//! max_goals=10 and only served the grid-search rho fit) into the
//! reusable, error-checked contract spec §4.1 defines.

use crate::config::MAX_GOALS_CEILING;
use crate::error::{EngineError, Result};
use crate::poisson::{pmf, tau};
use crate::types::Triplet;

/// `score_triplet(λ_H, λ_A, ρ, N_max) -> (p_H, p_D, p_A)` (spec §4.1).
///
/// `n_max` is clamped to the absolute ceiling of 12 to bound work at
/// O((N_max+1)^2), per spec §4.1/§9.
pub fn score_triplet(lambda_home: f64, lambda_away: f64, rho: f64, n_max: u32) -> Result<Triplet> {
    if !(lambda_home > 0.0) || !(lambda_away > 0.0) {
        return Err(EngineError::InvalidModelParameters {
            reason: format!(
                "expected goals must be strictly positive, got lambda_home={lambda_home}, lambda_away={lambda_away}"
            ),
        });
    }
    if rho <= -1.0 {
        return Err(EngineError::InvalidModelParameters {
            reason: format!("rho must be > -1, got {rho}"),
        });
    }
    let n_max = n_max.min(MAX_GOALS_CEILING).max(8);

    let mut p_home = 0.0_f64;
    let mut p_draw = 0.0_f64;
    let mut p_away = 0.0_f64;

    for h in 0..=n_max {
        let p_h = pmf(h, lambda_home);
        for a in 0..=n_max {
            let p_a = pmf(a, lambda_away);
            let mass = p_h * p_a * tau(h, a, lambda_home, lambda_away, rho);
            if !mass.is_finite() {
                return Err(EngineError::InvalidModelParameters {
                    reason: format!("non-finite mass at (h={h}, a={a})"),
                });
            }
            let mass = mass.max(0.0);
            if h > a {
                p_home += mass;
            } else if h < a {
                p_away += mass;
            } else {
                p_draw += mass;
            }
        }
    }

    // Truncation/rho can make the unnormalized sum != 1; renormalize, which
    // absorbs the residual tail mass above N_max proportionally (spec §4.1).
    Triplet::from_unnormalized(p_home, p_draw, p_away)
}

/// Full (N_max+1)×(N_max+1) score matrix, for callers that need the raw
/// correct-score grid (e.g. explain-records or downstream markets beyond
/// 1X2). Kept separate from `score_triplet` so the common 1X2 path never
/// pays for the full matrix allocation.
pub fn score_matrix(lambda_home: f64, lambda_away: f64, rho: f64, n_max: u32) -> Result<Vec<Vec<f64>>> {
    if !(lambda_home > 0.0) || !(lambda_away > 0.0) || rho <= -1.0 {
        return Err(EngineError::InvalidModelParameters {
            reason: "invalid (lambda_home, lambda_away, rho) for score matrix".to_string(),
        });
    }
    let n_max = n_max.min(MAX_GOALS_CEILING).max(8) as usize;
    let mut grid = vec![vec![0.0; n_max + 1]; n_max + 1];
    let mut total = 0.0;
    for h in 0..=n_max {
        let p_h = pmf(h as u32, lambda_home);
        for a in 0..=n_max {
            let p_a = pmf(a as u32, lambda_away);
            let mass = (p_h * p_a * tau(h as u32, a as u32, lambda_home, lambda_away, rho)).max(0.0);
            grid[h][a] = mass;
            total += mass;
        }
    }
    if total > 0.0 {
        for row in grid.iter_mut() {
            for cell in row.iter_mut() {
                *cell /= total;
            }
        }
    }
    Ok(grid)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_non_positive_lambda() {
        assert!(score_triplet(0.0, 1.0, -0.1, 8).is_err());
        assert!(score_triplet(1.0, -1.0, -0.1, 8).is_err());
    }

    #[test]
    fn rejects_rho_at_or_below_minus_one() {
        assert!(score_triplet(1.0, 1.0, -1.0, 8).is_err());
    }

    #[test]
    fn sums_to_one() {
        let t = score_triplet(1.50, 1.20, -0.13, 8).unwrap();
        assert!((t.sum() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn n_max_is_clamped_to_ceiling() {
        // A wildly oversized n_max must not panic or blow past the ceiling.
        let t = score_triplet(1.2, 1.2, -0.1, 10_000).unwrap();
        assert!((t.sum() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn scenario_1_minimal_base_triplet() {
        // spec §8 scenario 1, literal values.
        let t = score_triplet(1.50, 1.20, -0.13, 8).unwrap();
        assert!((t.home - 0.4488).abs() < 1e-3, "home={}", t.home);
        assert!((t.draw - 0.2609).abs() < 1e-3, "draw={}", t.draw);
        assert!((t.away - 0.2903).abs() < 1e-3, "away={}", t.away);
    }

    #[test]
    fn scenario_2_symmetric_match() {
        // spec §8 scenario 2.
        let t = score_triplet(1.30, 1.30, 0.0, 8).unwrap();
        assert!((t.home - t.away).abs() < 1e-9, "home and away must match exactly at rho=0");
        assert!((t.home - 0.355).abs() < 5e-3, "home={}", t.home);
        assert!((t.draw - 0.290).abs() < 5e-3, "draw={}", t.draw);
    }
}
