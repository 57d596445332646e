//! C8 — failure/validation layer (spec §4.8/§7).
//!
//! Input sanity gates odds/overround/date/team-resolvability before a
//! fixture ever reaches the predictor; output sanity re-checks I1/I2/I3 on
//! every emitted triplet, with exactly one renormalization attempt before
//! escalating to a hard error (spec §7's "renormalize once, then fail").

use chrono::{DateTime, Utc};

use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::types::{MarketOdds, Triplet};

const MIN_ODDS: f64 = 1.01;
const MAX_ODDS: f64 = 100.0;
const MIN_OVERROUND: f64 = 0.90;
const MAX_OVERROUND: f64 = 1.30;
const MAX_FUTURE_DAYS: i64 = 365;

/// Validates market odds against spec §4.8's input-sanity bounds.
pub fn validate_odds(odds: MarketOdds) -> Result<()> {
    let in_range = |o: f64| (MIN_ODDS..=MAX_ODDS).contains(&o);
    let overround = odds.overround();
    if !in_range(odds.home) || !in_range(odds.draw) || !in_range(odds.away) || !(MIN_OVERROUND..=MAX_OVERROUND).contains(&overround) {
        return Err(EngineError::OddsOutOfRange {
            odds: (odds.home, odds.draw, odds.away),
            overround,
        });
    }
    Ok(())
}

/// Validates that a fixture's scheduled date is not absurdly far in the
/// future (spec §4.8: "not more than one year in the future").
pub fn validate_scheduled_date(scheduled_at: DateTime<Utc>, now: DateTime<Utc>) -> Result<()> {
    if scheduled_at > now + chrono::Duration::days(MAX_FUTURE_DAYS) {
        return Err(EngineError::InvalidModelParameters {
            reason: format!("fixture scheduled at {scheduled_at} is more than {MAX_FUTURE_DAYS} days in the future"),
        });
    }
    Ok(())
}

/// Validates a fixture that is already in the past has a recorded result,
/// since a past, unresolved fixture cannot be meaningfully predicted.
pub fn validate_past_fixture_has_result(fixture_id: &str, scheduled_at: DateTime<Utc>, now: DateTime<Utc>, has_result: bool) -> Result<()> {
    if scheduled_at < now && !has_result {
        return Err(EngineError::FixtureInPastWithoutResult {
            fixture_id: fixture_id.to_string(),
        });
    }
    Ok(())
}

/// I3: the draw adjustment (or any set transform) must never flip the
/// sign of `p_H - p_A`.
fn ordering_preserved(before: Triplet, after: Triplet) -> bool {
    (before.home - before.away).signum() == (after.home - after.away).signum() || before.home == before.away
}

/// Output-sanity gate (spec §4.8/§7): checks I1 on `triplet` and, when a
/// `before` reference triplet is supplied, I3's ordering-preservation.
/// On an I1 violation, attempts exactly one renormalization; a second
/// failure escalates to `ProbabilityInvariantViolation`.
pub fn validate_output_triplet(triplet: Triplet, before: Option<Triplet>) -> Result<Triplet> {
    let validated = match Triplet::new(triplet.home, triplet.draw, triplet.away) {
        Ok(t) => t,
        Err(_) => triplet.renormalize()?,
    };

    if let Some(before) = before {
        if !ordering_preserved(before, validated) {
            return Err(EngineError::ProbabilityInvariantViolation { sum: validated.sum() });
        }
    }

    Ok(validated)
}

/// I2: a draw-adjusted triplet's draw component must remain within the
/// configured bounds.
pub fn validate_draw_bounds(triplet: Triplet, config: &EngineConfig) -> Result<()> {
    let (lo, hi) = config.draw_prob_bounds;
    if triplet.draw < lo - 1e-9 || triplet.draw > hi + 1e-9 {
        return Err(EngineError::ProbabilityInvariantViolation { sum: triplet.draw });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn odds_within_bounds_pass() {
        let odds = MarketOdds {
            home: 2.10,
            draw: 3.40,
            away: 3.60,
        };
        assert!(validate_odds(odds).is_ok());
    }

    #[test]
    fn odds_with_excessive_overround_are_rejected() {
        let odds = MarketOdds {
            home: 1.10,
            draw: 1.10,
            away: 1.10,
        };
        assert!(validate_odds(odds).is_err());
    }

    #[test]
    fn odds_out_of_numeric_range_are_rejected() {
        let odds = MarketOdds {
            home: 0.50,
            draw: 3.0,
            away: 3.0,
        };
        assert!(validate_odds(odds).is_err());
    }

    #[test]
    fn far_future_date_is_rejected() {
        let now = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let far = now + chrono::Duration::days(400);
        assert!(validate_scheduled_date(far, now).is_err());
    }

    #[test]
    fn near_future_date_passes() {
        let now = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let soon = now + chrono::Duration::days(10);
        assert!(validate_scheduled_date(soon, now).is_ok());
    }

    #[test]
    fn past_fixture_without_result_is_rejected() {
        let now = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let past = now - chrono::Duration::days(1);
        assert!(validate_past_fixture_has_result("fx-1", past, now, false).is_err());
        assert!(validate_past_fixture_has_result("fx-1", past, now, true).is_ok());
    }

    #[test]
    fn output_triplet_renormalizes_once_before_failing() {
        let slightly_off = Triplet {
            home: 0.45,
            draw: 0.26,
            away: 0.2900001,
        };
        let result = validate_output_triplet(slightly_off, None).unwrap();
        assert!((result.sum() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn output_triplet_rejects_ordering_flip() {
        let before = Triplet::new(0.50, 0.26, 0.24).unwrap();
        let after = Triplet::new(0.24, 0.26, 0.50).unwrap();
        assert!(validate_output_triplet(after, Some(before)).is_err());
    }

    #[test]
    fn draw_bounds_reject_out_of_range_draw() {
        let config = EngineConfig::default();
        let triplet = Triplet::new(0.41, 0.09, 0.50).unwrap();
        assert!(validate_draw_bounds(triplet, &config).is_err());
    }
}
