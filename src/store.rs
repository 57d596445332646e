//! External-collaborator boundary (spec §4/§5/§6's "out of scope: external
//! collaborators" — persistence, ingestion, auth and the HTTP/CLI surface
//! are named there as things the core only talks to through typed traits).
//!
//! `ModelVersionStore` implements the single-writer compare-and-swap
//! activation scheme spec §5 describes, using a plain `std::sync::RwLock`
//! rather than `arc-swap` (see DESIGN.md) to stay aligned with the
//! teacher's dependency stack, which has no existing swap-pointer crate.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};

use crate::draw_adjuster::SideData;
use crate::error::{EngineError, Result};
use crate::types::{HistoricalMatch, JackpotTicket, ModelStatus, ModelVersion, Team};

/// Read-only access to historical match results (spec §6: "the concrete
/// transport ... is out of scope" — callers bring their own ingestion).
pub trait MatchSource: Send + Sync {
    fn matches_for_league(&self, league_code: &str) -> Vec<HistoricalMatch>;
    fn roster_for_league(&self, league_code: &str) -> Vec<Team>;
}

/// Read-only access to the draw-structural side-data C4 consumes.
pub trait SideDataSource: Send + Sync {
    fn side_data_for_fixture(&self, fixture_id: &str) -> Option<SideData>;
}

/// Model-version lifecycle: publish, look up, and atomically swap the
/// active pointer per `(model_type, expected_prior_id)` (spec §5/§6).
pub trait ModelVersionStore: Send + Sync {
    fn publish(&self, version: ModelVersion) -> Result<()>;
    fn active(&self, model_type: &str) -> Result<ModelVersion>;
    /// Atomic swap: succeeds only if the currently active version's tag
    /// equals `expected_prior`, or there is no active version and
    /// `expected_prior` is empty. Returns the previously active tag.
    fn activate(&self, model_type: &str, new_version_tag: &str, expected_prior: &str) -> Result<String>;
}

/// Jackpot ticket storage (spec §6: `create_jackpot`/predictions keyed by
/// jackpot id).
pub trait JackpotStore: Send + Sync {
    fn create(&self, jackpot: JackpotTicket) -> Result<()>;
    fn get(&self, jackpot_id: &str) -> Result<JackpotTicket>;
}

/// A simple in-memory reference implementation of all four collaborator
/// traits, sufficient for tests and for wiring `Engine` end to end without
/// a real persistence/ingestion layer (spec's explicit non-goal).
#[derive(Default)]
pub struct InMemoryStore {
    matches: RwLock<HashMap<String, Vec<HistoricalMatch>>>,
    rosters: RwLock<HashMap<String, Vec<Team>>>,
    side_data: RwLock<HashMap<String, SideData>>,
    /// Every published version, keyed by `(model_type, version_tag)`.
    versions: RwLock<BTreeMap<(String, String), ModelVersion>>,
    /// Currently active version tag per model type; single-writer CAS
    /// guards transitions (spec §5).
    active_versions: RwLock<HashMap<String, String>>,
    jackpots: RwLock<HashMap<String, JackpotTicket>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed_matches(&self, league_code: &str, matches: Vec<HistoricalMatch>) {
        self.matches.write().expect("matches lock poisoned").insert(league_code.to_string(), matches);
    }

    pub fn seed_roster(&self, league_code: &str, roster: Vec<Team>) {
        self.rosters.write().expect("rosters lock poisoned").insert(league_code.to_string(), roster);
    }

    pub fn seed_side_data(&self, fixture_id: &str, side: SideData) {
        self.side_data.write().expect("side data lock poisoned").insert(fixture_id.to_string(), side);
    }
}

impl MatchSource for InMemoryStore {
    fn matches_for_league(&self, league_code: &str) -> Vec<HistoricalMatch> {
        self.matches.read().expect("matches lock poisoned").get(league_code).cloned().unwrap_or_default()
    }

    fn roster_for_league(&self, league_code: &str) -> Vec<Team> {
        self.rosters.read().expect("rosters lock poisoned").get(league_code).cloned().unwrap_or_default()
    }
}

impl SideDataSource for InMemoryStore {
    fn side_data_for_fixture(&self, fixture_id: &str) -> Option<SideData> {
        self.side_data.read().expect("side data lock poisoned").get(fixture_id).copied()
    }
}

impl ModelVersionStore for InMemoryStore {
    fn publish(&self, version: ModelVersion) -> Result<()> {
        let model_type = version.model_type.clone();
        let tag = version.version_tag.clone();
        self.versions.write().expect("versions lock poisoned").insert((model_type, tag), version);
        Ok(())
    }

    fn active(&self, model_type: &str) -> Result<ModelVersion> {
        let active_tag = self
            .active_versions
            .read()
            .expect("active versions lock poisoned")
            .get(model_type)
            .cloned()
            .ok_or_else(|| EngineError::NoActiveModel {
                model_type: model_type.to_string(),
            })?;
        self.versions
            .read()
            .expect("versions lock poisoned")
            .get(&(model_type.to_string(), active_tag))
            .cloned()
            .ok_or_else(|| EngineError::NoActiveModel {
                model_type: model_type.to_string(),
            })
    }

    fn activate(&self, model_type: &str, new_version_tag: &str, expected_prior: &str) -> Result<String> {
        {
            let versions = self.versions.read().expect("versions lock poisoned");
            let key = (model_type.to_string(), new_version_tag.to_string());
            let candidate = versions.get(&key).ok_or_else(|| EngineError::ModelVersionMismatch {
                expected: new_version_tag.to_string(),
                found: "not published".to_string(),
            })?;
            if candidate.status == ModelStatus::Failed {
                return Err(EngineError::ModelVersionMismatch {
                    expected: new_version_tag.to_string(),
                    found: "failed".to_string(),
                });
            }
        }

        let mut active_versions = self.active_versions.write().expect("active versions lock poisoned");
        let current = active_versions.get(model_type).cloned().unwrap_or_default();
        if current != expected_prior {
            return Err(EngineError::ActivationRaceLost {
                model_type: model_type.to_string(),
                expected_prior: expected_prior.to_string(),
            });
        }
        active_versions.insert(model_type.to_string(), new_version_tag.to_string());
        Ok(current)
    }
}

impl JackpotStore for InMemoryStore {
    fn create(&self, jackpot: JackpotTicket) -> Result<()> {
        self.jackpots.write().expect("jackpots lock poisoned").insert(jackpot.id.clone(), jackpot);
        Ok(())
    }

    fn get(&self, jackpot_id: &str) -> Result<JackpotTicket> {
        self.jackpots
            .read()
            .expect("jackpots lock poisoned")
            .get(jackpot_id)
            .cloned()
            .ok_or_else(|| EngineError::InvalidFingerprintInputs {
                reason: format!("unknown jackpot {jackpot_id}"),
            })
    }
}

// Blanket impls so an `Arc<InMemoryStore>` (or any `Arc<dyn MatchSource>`
// etc.) can be shared across multiple collaborator roles, or handed to
// several `Engine`s at once, without re-deriving the trait at each call
// site.
impl<T: MatchSource + ?Sized> MatchSource for Arc<T> {
    fn matches_for_league(&self, league_code: &str) -> Vec<HistoricalMatch> {
        (**self).matches_for_league(league_code)
    }

    fn roster_for_league(&self, league_code: &str) -> Vec<Team> {
        (**self).roster_for_league(league_code)
    }
}

impl<T: SideDataSource + ?Sized> SideDataSource for Arc<T> {
    fn side_data_for_fixture(&self, fixture_id: &str) -> Option<SideData> {
        (**self).side_data_for_fixture(fixture_id)
    }
}

impl<T: ModelVersionStore + ?Sized> ModelVersionStore for Arc<T> {
    fn publish(&self, version: ModelVersion) -> Result<()> {
        (**self).publish(version)
    }

    fn active(&self, model_type: &str) -> Result<ModelVersion> {
        (**self).active(model_type)
    }

    fn activate(&self, model_type: &str, new_version_tag: &str, expected_prior: &str) -> Result<String> {
        (**self).activate(model_type, new_version_tag, expected_prior)
    }
}

impl<T: JackpotStore + ?Sized> JackpotStore for Arc<T> {
    fn create(&self, jackpot: JackpotTicket) -> Result<()> {
        (**self).create(jackpot)
    }

    fn get(&self, jackpot_id: &str) -> Result<JackpotTicket> {
        (**self).get(jackpot_id)
    }
}

/// Helper used by `Engine::train_model` to stamp a freshly fitted
/// parameter bundle into a publishable `ModelVersion`.
pub fn build_model_version(
    version_tag: String,
    model_type: String,
    training_match_count: usize,
    training_leagues: Vec<String>,
    training_seasons: Vec<String>,
    decay_rate: f64,
    blend_weight: f64,
    parameters: crate::types::TrainedParameters,
    trained_at: DateTime<Utc>,
) -> ModelVersion {
    ModelVersion {
        version_tag,
        model_type,
        status: ModelStatus::Archived,
        trained_at,
        training_match_count,
        training_leagues,
        training_seasons,
        decay_rate,
        blend_weight,
        parameters,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TrainedParameters;
    use chrono::TimeZone;
    use std::collections::BTreeMap as Map;

    fn dummy_params() -> TrainedParameters {
        TrainedParameters {
            rho: -0.05,
            home_advantage: 1.3,
            teams: Map::new(),
            calibration: None,
        }
    }

    fn dummy_version(tag: &str, status: ModelStatus) -> ModelVersion {
        ModelVersion {
            version_tag: tag.to_string(),
            model_type: "dixon_coles".to_string(),
            status,
            trained_at: Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap(),
            training_match_count: 1000,
            training_leagues: vec!["EPL".to_string()],
            training_seasons: vec!["2025-26".to_string()],
            decay_rate: 0.0065,
            blend_weight: 0.60,
            parameters: dummy_params(),
        }
    }

    #[test]
    fn activation_requires_matching_prior() {
        let store = InMemoryStore::new();
        store.publish(dummy_version("v1", ModelStatus::Archived)).unwrap();
        assert!(store.activate("dixon_coles", "v1", "").is_ok());
        assert_eq!(store.active("dixon_coles").unwrap().version_tag, "v1");

        store.publish(dummy_version("v2", ModelStatus::Archived)).unwrap();
        let result = store.activate("dixon_coles", "v2", "not-v1");
        assert!(matches!(result, Err(EngineError::ActivationRaceLost { .. })));

        assert!(store.activate("dixon_coles", "v2", "v1").is_ok());
        assert_eq!(store.active("dixon_coles").unwrap().version_tag, "v2");
    }

    #[test]
    fn activating_a_failed_version_is_rejected() {
        let store = InMemoryStore::new();
        store.publish(dummy_version("v1", ModelStatus::Failed)).unwrap();
        let result = store.activate("dixon_coles", "v1", "");
        assert!(result.is_err());
    }

    #[test]
    fn no_active_model_before_first_activation() {
        let store = InMemoryStore::new();
        assert!(matches!(store.active("dixon_coles"), Err(EngineError::NoActiveModel { .. })));
    }
}
