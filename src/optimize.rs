//! A small deterministic coordinate/univariate-descent optimizer used by
//! the Dixon-Coles fitter (C2).
//!
//! No dependency in the teacher's or pack's manifests performs MLE for a
//! bespoke likelihood like this one, so this is a from-scratch, in-house
//! optimizer rather than an imported crate — following the shape of
//! coordinate descent (one parameter at a time, shrinking step on
//! overshoot) that the pack's `brumby` reference implementation uses for
//! its own scoregrid fitting, without depending on that crate.

/// Descends a single scalar parameter to minimize `objective`, by
/// repeatedly stepping and halving the step on overshoot. Deterministic:
/// no randomness, a fixed step schedule, a fixed iteration cap.
pub struct UnivariateDescentConfig {
    pub init_value: f64,
    pub init_step: f64,
    pub min_step: f64,
    pub max_steps: usize,
}

pub struct UnivariateDescentOutcome {
    pub optimal_value: f64,
    pub optimal_residual: f64,
    pub steps_taken: usize,
}

pub fn univariate_descent(
    config: &UnivariateDescentConfig,
    mut objective: impl FnMut(f64) -> f64,
) -> UnivariateDescentOutcome {
    let mut value = config.init_value;
    let mut step = config.init_step;
    let mut residual = objective(value);
    let mut steps_taken = 0usize;

    while step.abs() > config.min_step && steps_taken < config.max_steps {
        let candidate = value + step;
        let candidate_residual = objective(candidate);
        if candidate_residual < residual {
            value = candidate;
            residual = candidate_residual;
        } else {
            step = -step / 2.0;
        }
        steps_taken += 1;
    }

    UnivariateDescentOutcome {
        optimal_value: value,
        optimal_residual: residual,
        steps_taken,
    }
}

/// Coordinate descent over a vector of parameters: repeatedly sweeps every
/// coordinate with `univariate_descent`, holding the rest fixed, until the
/// objective stops improving meaningfully or `max_sweeps` is reached.
///
/// Returns `(final_params, final_objective, sweeps_taken)`.
pub fn coordinate_descent(
    mut params: Vec<f64>,
    init_steps: &[f64],
    min_step: f64,
    max_sweeps: usize,
    convergence_tol: f64,
    mut objective: impl FnMut(&[f64]) -> f64,
) -> (Vec<f64>, f64, usize) {
    let mut current_objective = objective(&params);
    let mut sweeps_taken = 0usize;

    for sweep in 0..max_sweeps {
        sweeps_taken = sweep + 1;
        let prev_objective = current_objective;

        for idx in 0..params.len() {
            let init_value = params[idx];
            let init_step = init_steps[idx];
            let outcome = univariate_descent(
                &UnivariateDescentConfig {
                    init_value,
                    init_step,
                    min_step,
                    max_steps: 60,
                },
                |candidate| {
                    params[idx] = candidate;
                    let v = objective(&params);
                    params[idx] = init_value;
                    v
                },
            );
            params[idx] = outcome.optimal_value;
            current_objective = outcome.optimal_residual;
        }

        if (prev_objective - current_objective).abs() < convergence_tol {
            break;
        }
    }

    (params, current_objective, sweeps_taken)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn univariate_descent_finds_minimum_of_parabola() {
        let outcome = univariate_descent(
            &UnivariateDescentConfig {
                init_value: 10.0,
                init_step: 1.0,
                min_step: 1e-9,
                max_steps: 200,
            },
            |x| (x - 3.0).powi(2),
        );
        assert!((outcome.optimal_value - 3.0).abs() < 1e-3);
    }

    #[test]
    fn coordinate_descent_finds_minimum_of_bowl() {
        let (params, objective, _sweeps) = coordinate_descent(
            vec![5.0, -5.0],
            &[1.0, 1.0],
            1e-9,
            50,
            1e-12,
            |p| (p[0] - 1.0).powi(2) + (p[1] + 2.0).powi(2),
        );
        assert!((params[0] - 1.0).abs() < 1e-2);
        assert!((params[1] + 2.0).abs() < 1e-2);
        assert!(objective < 1e-3);
    }
}
