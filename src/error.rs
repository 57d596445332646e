use thiserror::Error;

/// Semantic error taxonomy for the probability core (spec §7).
///
/// Variants are grouped by the kind of failure, not by which component
/// raised them, so callers can apply a uniform policy (retry, refuse,
/// surface) per group.
#[derive(Debug, Error)]
pub enum EngineError {
    // --- Validation: reported to caller, no state change ---
    #[error("odds {odds:?} out of range [1.01, 100] or overround {overround:.4} out of [0.90, 1.30]")]
    OddsOutOfRange { odds: (f64, f64, f64), overround: f64 },

    #[error("team not found: {query:?} in league {league_code}")]
    TeamNotFound { query: String, league_code: String },

    #[error("unknown league: {league_code}")]
    UnknownLeague { league_code: String },

    #[error("fixture {fixture_id} is in the past and has no recorded result")]
    FixtureInPastWithoutResult { fixture_id: String },

    #[error("invalid fingerprint inputs: {reason}")]
    InvalidFingerprintInputs { reason: String },

    // --- Model: reported, prediction refused ---
    #[error("no active model for type {model_type}")]
    NoActiveModel { model_type: String },

    #[error("model version mismatch: expected {expected}, found {found}")]
    ModelVersionMismatch { expected: String, found: String },

    #[error("invalid model parameters: {reason}")]
    InvalidModelParameters { reason: String },

    // --- Numerical: one remediation attempt, then reported ---
    #[error("probability invariant violated after remediation: sum={sum:.9}")]
    ProbabilityInvariantViolation { sum: f64 },

    #[error("degenerate base triplet: p_home + p_away == 0")]
    DegenerateBaseTriplet,

    // --- Training: abort, no partial model version persisted ---
    #[error("training failed: {reason}")]
    TrainingFailed { reason: String },

    #[error("insufficient training data: {matches} matches, need at least {min_required}")]
    InsufficientData { matches: usize, min_required: usize },

    #[error("optimizer diverged after {iterations} iterations (last delta {last_delta:.6e})")]
    OptimizerDiverged { iterations: usize, last_delta: f64 },

    // --- Concurrency: retryable with backoff by caller ---
    #[error("activation race lost for model type {model_type}: expected prior {expected_prior}")]
    ActivationRaceLost {
        model_type: String,
        expected_prior: String,
    },
}

pub type Result<T> = std::result::Result<T, EngineError>;
