//! C3 — predictor (spec §4.3).
//!
//! `predict(fixture, trained_parameters) -> (lambda_H, lambda_A, base_triplet)`.
//!
//! Team resolution follows spec §4.3: exact canonical-name equality first,
//! then fuzzy match above `fuzzy_match_threshold` constrained to the same
//! league. Grounded on the teacher's `win_prob.rs::normalize_team_key`
//! (canonicalization) generalized with `strsim::jaro_winkler` as the
//! practical stand-in for Ratcliff similarity (see DESIGN.md).

use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::score_matrix::score_triplet;
use crate::types::{Team, Triplet, TrainedParameters};

#[derive(Debug, Clone, Copy)]
pub struct ExpectedGoals {
    pub home: f64,
    pub away: f64,
}

/// Resolves `query` against `roster` (teams already filtered to one
/// league), exact canonical match first, then fuzzy.
pub fn resolve_team<'a>(
    query: &str,
    league_code: &str,
    roster: &'a [Team],
    config: &EngineConfig,
) -> Result<&'a Team> {
    let canonical_query = crate::types::canonicalize_name(query);
    if let Some(team) = roster
        .iter()
        .find(|t| t.league_code == league_code && t.canonical_name == canonical_query)
    {
        return Ok(team);
    }

    let mut best: Option<(&Team, f64)> = None;
    for team in roster.iter().filter(|t| t.league_code == league_code) {
        let score = strsim::jaro_winkler(&canonical_query, &team.canonical_name);
        if best.map(|(_, best_score)| score > best_score).unwrap_or(true) {
            best = Some((team, score));
        }
    }

    match best {
        Some((team, score)) if score >= config.fuzzy_match_threshold => Ok(team),
        _ => Err(EngineError::TeamNotFound {
            query: query.to_string(),
            league_code: league_code.to_string(),
        }),
    }
}

/// Computes expected goals for a fixture from trained parameters (spec §4.2/§4.3):
/// λ_H = α_home · β_away · γ, λ_A = α_away · β_home.
pub fn expected_goals(
    home_team_id: u64,
    away_team_id: u64,
    params: &TrainedParameters,
) -> Result<ExpectedGoals> {
    let home = params.teams.get(&home_team_id).ok_or_else(|| EngineError::InvalidModelParameters {
        reason: format!("no trained parameters for team {home_team_id}"),
    })?;
    let away = params.teams.get(&away_team_id).ok_or_else(|| EngineError::InvalidModelParameters {
        reason: format!("no trained parameters for team {away_team_id}"),
    })?;

    Ok(ExpectedGoals {
        home: home.attack * away.defence * params.home_advantage,
        away: away.attack * home.defence,
    })
}

/// Full predictor contract: expected goals + calibrated base triplet.
///
/// Applies the active model version's per-outcome calibration curves (if
/// any) in the order p_H, p_D, p_A, then renormalizes to restore I1, as
/// spec §4.3 requires.
pub fn predict(
    home_team_id: u64,
    away_team_id: u64,
    params: &TrainedParameters,
    config: &EngineConfig,
) -> Result<(ExpectedGoals, Triplet)> {
    let goals = expected_goals(home_team_id, away_team_id, params)?;
    let raw = score_triplet(goals.home, goals.away, params.rho, config.effective_max_goals())?;

    let calibrated = match &params.calibration {
        Some(calibration_set) => crate::calibrator::apply_calibration_set(calibration_set, raw)?,
        None => raw,
    };

    Ok((goals, calibrated))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roster() -> Vec<Team> {
        vec![
            Team::new(1, "EPL", "Manchester United"),
            Team::new(2, "EPL", "Manchester City"),
            Team::new(3, "EPL", "Arsenal"),
        ]
    }

    #[test]
    fn exact_canonical_match_wins() {
        let config = EngineConfig::default();
        let r = roster();
        let team = resolve_team("manchester united", "EPL", &r, &config).unwrap();
        assert_eq!(team.id, 1);
    }

    #[test]
    fn fuzzy_match_above_threshold_resolves() {
        let config = EngineConfig::default();
        let r = roster();
        // Single missing letter vs "arsenal" should still clear the 0.85 bar.
        let team = resolve_team("Arsenl", "EPL", &r, &config).unwrap();
        assert_eq!(team.id, 3);
    }

    #[test]
    fn unresolvable_name_errors() {
        let config = EngineConfig::default();
        let r = roster();
        let result = resolve_team("Totally Unrelated FC", "EPL", &r, &config);
        assert!(matches!(result, Err(EngineError::TeamNotFound { .. })));
    }

    #[test]
    fn league_constraint_is_enforced() {
        let config = EngineConfig::default();
        let r = roster();
        // "Manchester United" exists only in EPL, not in this other league.
        let result = resolve_team("Manchester United", "LaLiga", &r, &config);
        assert!(matches!(result, Err(EngineError::TeamNotFound { .. })));
    }
}
