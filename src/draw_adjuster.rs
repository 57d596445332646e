//! C4 — draw-structural adjuster (spec §4.4).
//!
//! Seven bounded multiplicative components, combined into a bounded
//! product, applied to p_D and renormalized into p_H/p_A without
//! reordering them (I3). Missing side-data is neutral (1.0) but kept
//! distinct from "present and 1.0" in the recorded components (spec §9).

use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::types::{DrawComponentRecord, Signal, Triplet};

/// Raw side-data inputs for the seven components (spec §4.4). Every field
/// is `Signal::Missing` when the upstream ingestion layer could not
/// resolve it; the adjuster never treats that as an error.
#[derive(Debug, Clone, Copy, Default)]
pub struct SideData {
    /// League long-run draw rate, as a fraction in [0, 1].
    pub league_draw_rate: Option<f64>,
    /// |Elo(home) - Elo(away)|.
    pub elo_diff_abs: Option<f64>,
    /// Observed draw rate over the last `h2h_window` head-to-head matches,
    /// plus how many were available.
    pub h2h_draw_rate: Option<(f64, usize)>,
    /// Rain/wind indices, each already normalized to [0, 1] (spec §9 open
    /// question: default identity-with-caps mapping happens upstream; see
    /// `normalize_weather`).
    pub rain_index: Option<f64>,
    pub wind_index: Option<f64>,
    /// Rest-days advantage for one side, signed (positive favours home).
    pub rest_days_diff: Option<f64>,
    /// Referee's historical draw rate minus the league mean.
    pub referee_draw_rate_delta: Option<f64>,
    /// Normalized narrowing of the draw odds in [-1, 1] (positive = narrowing).
    pub odds_drift_narrowing: Option<f64>,
}

/// Global reference draw rate used by the `league_prior` component.
const GLOBAL_REFERENCE_DRAW_RATE: f64 = 0.26;

/// Maps raw rain (mm) / wind (m/s) measurements to the [0, 1] indices the
/// `weather` component expects — spec §9's "identity with caps" default.
pub fn normalize_weather(rain_mm: f64, wind_ms: f64) -> (f64, f64) {
    ((rain_mm / 50.0).clamp(0.0, 1.0), (wind_ms / 15.0).clamp(0.0, 1.0))
}

fn clamp_component(value: f64, cap: (f64, f64)) -> f64 {
    value.clamp(cap.0, cap.1)
}

fn league_prior(side: &SideData, cap: (f64, f64)) -> Signal {
    match side.league_draw_rate {
        Some(rate) => Signal::Present(clamp_component(rate / GLOBAL_REFERENCE_DRAW_RATE, cap)),
        None => Signal::Missing,
    }
}

fn elo_symmetry(side: &SideData, cap: (f64, f64)) -> Signal {
    match side.elo_diff_abs {
        Some(diff) => {
            // exp(-|delta elo| / 160), scaled into [0.9, 1.15] before the
            // shared per-component cap is applied.
            let raw = (-diff.abs() / 160.0).exp();
            let scaled = 0.9 + raw * (1.15 - 0.9);
            Signal::Present(clamp_component(scaled, cap))
        }
        None => Signal::Missing,
    }
}

fn h2h(side: &SideData, min_window: usize, cap: (f64, f64)) -> Signal {
    match side.h2h_draw_rate {
        Some((rate, count)) if count >= min_window => {
            let scaled = 0.9 + rate.clamp(0.0, 1.0) * (1.15 - 0.9);
            Signal::Present(clamp_component(scaled, cap))
        }
        _ => Signal::Missing,
    }
}

fn weather(side: &SideData, cap: (f64, f64)) -> Signal {
    match (side.rain_index, side.wind_index) {
        (None, None) => Signal::Missing,
        (rain, wind) => {
            let rain = rain.unwrap_or(0.0).clamp(0.0, 1.0);
            let wind = wind.unwrap_or(0.0).clamp(0.0, 1.0);
            Signal::Present(clamp_component(1.0 + 0.07 * rain + 0.05 * wind, cap))
        }
    }
}

fn fatigue(side: &SideData, cap: (f64, f64)) -> Signal {
    match side.rest_days_diff {
        Some(diff) => {
            let bump = (0.02 * diff.abs()).min(0.10);
            Signal::Present(clamp_component(1.0 + bump, cap))
        }
        None => Signal::Missing,
    }
}

fn referee(side: &SideData, cap: (f64, f64)) -> Signal {
    match side.referee_draw_rate_delta {
        Some(delta) => {
            let scaled = 1.0 + delta.clamp(-1.0, 1.0) * 0.15;
            Signal::Present(clamp_component(scaled, cap))
        }
        None => Signal::Missing,
    }
}

fn odds_drift(side: &SideData, cap: (f64, f64)) -> Signal {
    match side.odds_drift_narrowing {
        Some(narrowing) => {
            let scaled = 1.0 - 0.15 * narrowing.clamp(-1.0, 1.0);
            Signal::Present(clamp_component(scaled, cap))
        }
        None => Signal::Missing,
    }
}

/// `adjust_draw(base_triplet, side_data) -> (adjusted_triplet, components_record)` (spec §4.4).
pub fn adjust_draw(
    base: Triplet,
    side: &SideData,
    config: &EngineConfig,
) -> Result<(Triplet, DrawComponentRecord)> {
    let cap = config.draw_component_cap;

    let league_prior = league_prior(side, cap);
    let elo_symmetry = elo_symmetry(side, cap);
    let h2h = h2h(side, config.h2h_window, cap);
    let weather = weather(side, cap);
    let fatigue = fatigue(side, cap);
    let referee = referee(side, cap);
    let odds_drift = odds_drift(side, cap);

    let values = [
        league_prior.value_or_neutral(),
        elo_symmetry.value_or_neutral(),
        h2h.value_or_neutral(),
        weather.value_or_neutral(),
        fatigue.value_or_neutral(),
        referee.value_or_neutral(),
        odds_drift.value_or_neutral(),
    ];
    let (adjusted, total_product) = apply_component_product(base, values, config)?;

    let record = DrawComponentRecord {
        league_prior,
        elo_symmetry,
        h2h,
        weather,
        fatigue,
        referee,
        odds_drift,
        total_product,
    };

    Ok((adjusted, record))
}

/// The pure product/clamp/renormalize step (spec §4.4's formula block),
/// factored out so it can be driven directly by the seven literal
/// component doubles in spec §8's end-to-end scenarios, independent of
/// how those doubles were derived from side-data.
pub fn apply_component_product(
    base: Triplet,
    components: [f64; 7],
    config: &EngineConfig,
) -> Result<(Triplet, f64)> {
    if base.home + base.away == 0.0 {
        return Err(EngineError::DegenerateBaseTriplet);
    }

    let product: f64 = components.iter().product();
    let total_product = product.clamp(config.draw_total_cap.0, config.draw_total_cap.1);

    let p_draw_adjusted = (base.draw * total_product).clamp(config.draw_prob_bounds.0, config.draw_prob_bounds.1);
    let scale = (1.0 - p_draw_adjusted) / (base.home + base.away);
    let p_home_adjusted = base.home * scale;
    let p_away_adjusted = base.away * scale;

    let adjusted = Triplet::new(p_home_adjusted, p_draw_adjusted, p_away_adjusted)?;

    // I3: draw adjustment must never flip the home/away ordering.
    debug_assert_eq!(
        (base.home - base.away).signum() as i8,
        (adjusted.home - adjusted.away).signum() as i8
    );

    Ok((adjusted, total_product))
}
