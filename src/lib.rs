//! Football jackpot probability core.
//!
//! Wires the eight components (C1-C8) behind the six language-neutral
//! operations named in spec §6, against the collaborator traits in
//! [`store`]. Persistence, HTTP ingestion, auth, wire framing, CLI/UI and
//! schedulers stay out of this crate (spec §1's non-goals) — callers
//! supply a [`store::MatchSource`]/[`store::SideDataSource`]/
//! [`store::ModelVersionStore`]/[`store::JackpotStore`] and get back pure,
//! in-process predictions.

pub mod calibrator;
pub mod config;
pub mod draw_adjuster;
pub mod error;
pub mod fingerprint;
pub mod fitter;
pub mod optimize;
pub mod poisson;
pub mod predictor;
pub mod score_matrix;
pub mod sets;
pub mod store;
pub mod types;
pub mod validation;

use std::collections::BTreeMap;

use chrono::Utc;
use rayon::prelude::*;

use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::fingerprint::ExplainRecord;
use crate::sets::SetContext;
use crate::store::{JackpotStore, MatchSource, ModelVersionStore, SideDataSource};
use crate::types::{Fixture, JackpotStatus, JackpotTicket, SetTag, Team, Triplet};

/// The default model type this crate's predictor pipeline fits and serves.
pub const DIXON_COLES_MODEL_TYPE: &str = "dixon_coles";

/// Every set tag produced for a fixture, keyed by `SetTag`.
pub type FixtureSets = BTreeMap<SetTag, Triplet>;

/// The full `predict_jackpot` response shape from spec §6.
pub type JackpotPrediction = BTreeMap<String, FixtureSets>;

/// Wires C1-C8 together against caller-supplied collaborators (spec §6).
/// Generic over the four trait boundaries rather than trait objects so
/// callers pay no dynamic-dispatch cost on the hot prediction path; an
/// `Engine<Arc<dyn ...>, ...>` instantiation works identically when dynamic
/// dispatch is preferred.
pub struct Engine<M, S, V, J>
where
    M: MatchSource,
    S: SideDataSource,
    V: ModelVersionStore,
    J: JackpotStore,
{
    pub match_source: M,
    pub side_data_source: S,
    pub version_store: V,
    pub jackpot_store: J,
    pub config: EngineConfig,
}

impl<M, S, V, J> Engine<M, S, V, J>
where
    M: MatchSource,
    S: SideDataSource,
    V: ModelVersionStore,
    J: JackpotStore,
{
    pub fn new(match_source: M, side_data_source: S, version_store: V, jackpot_store: J, config: EngineConfig) -> Self {
        Engine {
            match_source,
            side_data_source,
            version_store,
            jackpot_store,
            config,
        }
    }

    /// `create_jackpot(fixtures[]) -> jackpot_id` (spec §6): pure metadata,
    /// no probability computed here.
    pub fn create_jackpot(&self, id: String, owner: String, fixtures: Vec<Fixture>) -> Result<String> {
        let ticket = JackpotTicket {
            id: id.clone(),
            owner,
            status: JackpotStatus::Draft,
            created_at: Utc::now(),
            fixtures,
        };
        self.jackpot_store.create(ticket)?;
        Ok(id)
    }

    /// Resolves a team by display name within a league (spec §4.3), given
    /// a caller-supplied roster lookup.
    pub fn resolve_team<'a>(&self, query: &str, league_code: &str, roster: &'a [Team]) -> Result<&'a Team> {
        crate::predictor::resolve_team(query, league_code, roster, &self.config)
    }

    /// `predict_jackpot(jackpot_id) -> {fixture_id -> {set_tag -> triplet}}`
    /// (spec §6), using the currently active Dixon-Coles model version.
    /// Each fixture is predicted independently (spec §5: "safe to invoke
    /// from many workers concurrently"), fanned out over rayon's global
    /// pool.
    pub fn predict_jackpot(&self, jackpot_id: &str) -> Result<JackpotPrediction> {
        let jackpot = self.jackpot_store.get(jackpot_id)?;
        let active = self.version_store.active(DIXON_COLES_MODEL_TYPE)?;

        let results: Vec<Result<(String, FixtureSets)>> = jackpot
            .fixtures
            .par_iter()
            .map(|fixture| {
                let sets = self.predict_fixture(fixture, &active.parameters)?;
                Ok((fixture.id.clone(), sets))
            })
            .collect();

        let mut out = BTreeMap::new();
        for result in results {
            let (fixture_id, sets) = result?;
            out.insert(fixture_id, sets);
        }
        Ok(out)
    }

    fn predict_fixture(&self, fixture: &Fixture, params: &crate::types::TrainedParameters) -> Result<FixtureSets> {
        if let Some(odds) = fixture.market_odds {
            validation::validate_odds(odds)?;
        }
        let (_goals, base) = crate::predictor::predict(fixture.home_team, fixture.away_team, params, &self.config)?;
        let base = validation::validate_output_triplet(base, None)?;

        let market_triplet = fixture.market_odds.map(|odds| odds.implied_triplet()).transpose()?;
        let side_data = self.side_data_source.side_data_for_fixture(&fixture.id);

        let ctx = SetContext {
            market_triplet,
            market_odds: fixture.market_odds.map(|o| (o.home, o.draw, o.away)),
            side_data: side_data.as_ref(),
            draw_adjustment_already_applied: false,
        };
        let sets = sets::generate_sets(base, &ctx, &self.config)?;
        for triplet in sets.values() {
            validation::validate_output_triplet(*triplet, None)?;
        }
        Ok(sets)
    }

    /// `get_prediction(jackpot_id, fixture_id, set_tag) -> triplet + explain`
    /// (spec §6).
    pub fn get_prediction(&self, jackpot_id: &str, fixture_id: &str, set_tag: SetTag) -> Result<(Triplet, ExplainRecord)> {
        let jackpot = self.jackpot_store.get(jackpot_id)?;
        let fixture = jackpot
            .fixtures
            .iter()
            .find(|f| f.id == fixture_id)
            .ok_or_else(|| EngineError::InvalidFingerprintInputs {
                reason: format!("unknown fixture {fixture_id} in jackpot {jackpot_id}"),
            })?;
        let active = self.version_store.active(DIXON_COLES_MODEL_TYPE)?;

        if let Some(odds) = fixture.market_odds {
            validation::validate_odds(odds)?;
        }
        let goals = crate::predictor::expected_goals(fixture.home_team, fixture.away_team, &active.parameters)?;
        let (_goals, base) = crate::predictor::predict(fixture.home_team, fixture.away_team, &active.parameters, &self.config)?;
        let base = validation::validate_output_triplet(base, None)?;

        let market_triplet = fixture.market_odds.map(|odds| odds.implied_triplet()).transpose()?;
        let side_data = self.side_data_source.side_data_for_fixture(&fixture.id);
        let ctx = SetContext {
            market_triplet,
            market_odds: fixture.market_odds.map(|o| (o.home, o.draw, o.away)),
            side_data: side_data.as_ref(),
            draw_adjustment_already_applied: false,
        };
        let sets = sets::generate_sets(base, &ctx, &self.config)?;
        let set_triplet = *sets.get(&set_tag).ok_or_else(|| EngineError::InvalidModelParameters {
            reason: format!("set {set_tag:?} was not generated for this fixture"),
        })?;

        // Only the draw-structural sets actually ran C4; every other set's
        // explain record carries no components_record (spec §4.7/§4.8).
        let adjustments = if matches!(set_tag, SetTag::D | SetTag::H | SetTag::I | SetTag::J) {
            sets::draw_components(base, &ctx, &self.config).ok()
        } else {
            None
        };

        let explain = fingerprint::explain(
            goals.home,
            goals.away,
            base,
            set_triplet,
            set_tag,
            adjustments,
            market_triplet,
            active.version_tag.clone(),
            Utc::now(),
        );

        Ok((set_triplet, explain))
    }

    /// `get_calibration(league?, window?) -> {H, D, A, brier, log_loss,
    /// reliability_bins[]}` (spec §6). `league`/`window` filtering is the
    /// caller's responsibility via the `predictions`/`outcomes` it passes
    /// in, since historical filtering depends entirely on the external
    /// match source's own schema.
    pub fn get_calibration(&self, predictions: &[Triplet], outcomes: &[crate::types::Outcome]) -> Result<CalibrationReport> {
        let curves = calibrator::fit_calibrators(predictions, outcomes)?;
        let metrics = calibrator::evaluate(predictions, outcomes);
        let reliability = calibrator::reliability_bins(predictions, outcomes, crate::types::Outcome::Home, self.config.reliability_bins);
        Ok(CalibrationReport {
            curves,
            metrics,
            reliability_home: reliability,
        })
    }

    /// `train_model(type, leagues[], seasons[], xi?, alpha_blend?) ->
    /// task_handle` (spec §6). Training has no external scheduler in this
    /// crate (spec's non-goal), so this runs synchronously and returns the
    /// already-completed `ModelVersion` in place of an async task handle.
    pub fn train_model(&self, leagues: &[String], training_cutoff: chrono::DateTime<Utc>, version_tag: String) -> Result<crate::types::ModelVersion> {
        let mut all_matches = Vec::new();
        for league in leagues {
            all_matches.extend(self.match_source.matches_for_league(league));
        }
        let parameters = fitter::fit(&all_matches, training_cutoff, &self.config)?;

        let version = store::build_model_version(
            version_tag,
            DIXON_COLES_MODEL_TYPE.to_string(),
            all_matches.len(),
            leagues.to_vec(),
            Vec::new(),
            self.config.decay_rate,
            self.config.blend_alpha_b,
            parameters,
            Utc::now(),
        );
        self.version_store.publish(version.clone())?;
        Ok(version)
    }

    /// `activate_model_version(version_tag) -> old_version_tag` (spec §6):
    /// atomic swap against whatever is currently active.
    pub fn activate_model_version(&self, new_version_tag: &str) -> Result<String> {
        let expected_prior = self
            .version_store
            .active(DIXON_COLES_MODEL_TYPE)
            .map(|v| v.version_tag)
            .unwrap_or_default();
        self.version_store.activate(DIXON_COLES_MODEL_TYPE, new_version_tag, &expected_prior)
    }
}

/// `get_calibration`'s response bundle (spec §6).
#[derive(Debug, Clone)]
pub struct CalibrationReport {
    pub curves: calibrator::CalibrationSet,
    pub metrics: calibrator::EvaluationMetrics,
    pub reliability_home: Vec<calibrator::ReliabilityBin>,
}
