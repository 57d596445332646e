//! Low-level Poisson helpers shared by the score-matrix engine (C1) and
//! the fitter (C2).
//!
//! Grounded on the teacher's `calibration.rs::poisson_pmf` /
//! `win_prob.rs::poisson_pmf`, generalized into a shared module instead of
//! being duplicated per call site.

/// Poisson pmf P(k; λ), computed without an explicit factorial to avoid
/// overflow for larger k (k! grows faster than λ^k for realistic λ).
pub fn pmf(k: u32, lambda: f64) -> f64 {
    if lambda <= 0.0 {
        return if k == 0 { 1.0 } else { 0.0 };
    }
    let log_p = -lambda + (k as f64) * lambda.ln() - log_factorial(k);
    log_p.exp()
}

/// ln(λ) is undefined at λ=0, callers must guard lambda>0 themselves for
/// k>0; this helper exists for the log-likelihood accumulation in the
/// fitter where λ is already known positive.
pub fn log_pmf(k: u32, lambda: f64) -> f64 {
    -lambda + (k as f64) * lambda.ln() - log_factorial(k)
}

fn log_factorial(n: u32) -> f64 {
    (1..=n).map(|i| (i as f64).ln()).sum()
}

/// Dixon-Coles low-score correction τ(h, a) (spec §4.1).
pub fn tau(h: u32, a: u32, lambda_home: f64, lambda_away: f64, rho: f64) -> f64 {
    match (h, a) {
        (0, 0) => 1.0 - lambda_home * lambda_away * rho,
        (0, 1) => 1.0 + lambda_home * rho,
        (1, 0) => 1.0 + lambda_away * rho,
        (1, 1) => 1.0 - rho,
        _ => 1.0,
    }
}

/// ln τ(h, a), used by the fitter's log-likelihood objective. τ can in
/// principle be non-positive for pathological (λ, ρ) combinations; callers
/// must ensure it stays positive (the fitter clamps ρ to (-0.25, 0.25)
/// which keeps τ positive for realistic λ).
pub fn log_tau(h: u32, a: u32, lambda_home: f64, lambda_away: f64, rho: f64) -> f64 {
    tau(h, a, lambda_home, lambda_away, rho).max(1e-12).ln()
}
