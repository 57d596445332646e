//! Engine configuration (spec §6).
//!
//! Mirrors the teacher's `LeagueParams`/`EloConfig` pattern: a plain,
//! `serde`-derived struct with an explicit `Default` impl so every knob
//! has a documented neutral value.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Exponential decay rate ξ per day; smaller = longer memory.
    pub decay_rate: f64,
    /// Home-advantage prior γ₀ on the log-γ scale.
    pub home_advantage_prior: f64,
    /// Inclusive bounds on the Dixon-Coles low-score correlation ρ.
    pub rho_bounds: (f64, f64),
    /// Score-matrix truncation bound; hard ceiling enforced separately.
    pub max_goals: u32,
    /// Blend weight β for Set B (market-aware, balanced).
    pub blend_alpha_b: f64,
    /// Blend weight β for Set C (market-dominant).
    pub blend_alpha_c: f64,
    /// Per-component clamp for the seven draw multipliers.
    pub draw_component_cap: (f64, f64),
    /// Clamp on the multiplier product before it is applied.
    pub draw_total_cap: (f64, f64),
    /// Bounds on the adjusted draw probability p_D'.
    pub draw_prob_bounds: (f64, f64),
    /// Minimum matches per league for a fit to be trusted.
    pub min_training_matches: usize,
    /// Minimum string-similarity score for fuzzy team resolution.
    pub fuzzy_match_threshold: f64,
    /// Head-to-head window size for the h2h draw component.
    pub h2h_window: usize,
    /// Number of reliability bins for calibration reporting.
    pub reliability_bins: usize,
}

/// Hard ceiling on N_max independent of configuration (spec §4.1, §9).
pub const MAX_GOALS_CEILING: u32 = 12;

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            decay_rate: 0.0065,
            home_advantage_prior: 0.35,
            rho_bounds: (-0.25, 0.25),
            max_goals: 8,
            blend_alpha_b: 0.60,
            blend_alpha_c: 0.25,
            draw_component_cap: (0.85, 1.20),
            draw_total_cap: (0.75, 1.35),
            draw_prob_bounds: (0.12, 0.38),
            min_training_matches: 500,
            fuzzy_match_threshold: 0.85,
            h2h_window: 6,
            reliability_bins: 10,
        }
    }
}

impl EngineConfig {
    pub fn effective_max_goals(&self) -> u32 {
        self.max_goals.min(MAX_GOALS_CEILING).max(8)
    }
}
