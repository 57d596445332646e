//! Core data-model entities (spec §3).
//!
//! Matches, leagues and model versions are immutable once built; a
//! `Prediction` is a derived artifact, never mutated after creation (I7).

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};

/// Tolerance for the probability-sum invariant I1.
pub const PROB_SUM_TOLERANCE: f64 = 1e-6;
/// Tolerance for exact-recompute reproducibility, I7/P5.
pub const REPRODUCIBILITY_TOLERANCE: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Outcome {
    Home,
    Draw,
    Away,
}

impl Outcome {
    pub fn from_goals(home_goals: u16, away_goals: u16) -> Self {
        use std::cmp::Ordering::*;
        match home_goals.cmp(&away_goals) {
            Greater => Outcome::Home,
            Less => Outcome::Away,
            Equal => Outcome::Draw,
        }
    }
}

/// A validated, normalized (home, draw, away) probability triplet (I1).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Triplet {
    pub home: f64,
    pub draw: f64,
    pub away: f64,
}

impl Triplet {
    /// Builds a triplet from unnormalized masses, renormalizing by their
    /// sum (spec §4.1's "residual tail mass ... absorbed proportionally").
    pub fn from_unnormalized(home: f64, draw: f64, away: f64) -> Result<Self> {
        let sum = home + draw + away;
        if !sum.is_finite() || sum <= 0.0 {
            return Err(EngineError::DegenerateBaseTriplet);
        }
        Ok(Triplet {
            home: home / sum,
            draw: draw / sum,
            away: away / sum,
        })
    }

    /// Constructs directly from already-normalized components, checking I1.
    pub fn new(home: f64, draw: f64, away: f64) -> Result<Self> {
        let sum = home + draw + away;
        if (sum - 1.0).abs() > PROB_SUM_TOLERANCE
            || home < 0.0
            || draw < 0.0
            || away < 0.0
            || home > 1.0
            || draw > 1.0
            || away > 1.0
        {
            return Err(EngineError::ProbabilityInvariantViolation { sum });
        }
        Ok(Triplet { home, draw, away })
    }

    pub fn uniform() -> Self {
        Triplet {
            home: 1.0 / 3.0,
            draw: 1.0 / 3.0,
            away: 1.0 / 3.0,
        }
    }

    pub fn sum(&self) -> f64 {
        self.home + self.draw + self.away
    }

    /// Renormalizes in place; used by C8's single remediation attempt.
    pub fn renormalize(self) -> Result<Self> {
        Triplet::from_unnormalized(self.home, self.draw, self.away)
    }

    pub fn argmax(&self) -> Outcome {
        if self.home >= self.draw && self.home >= self.away {
            Outcome::Home
        } else if self.draw >= self.away {
            Outcome::Draw
        } else {
            Outcome::Away
        }
    }

    pub fn confidence(&self) -> f64 {
        self.home.max(self.draw).max(self.away)
    }

    pub fn component(&self, outcome: Outcome) -> f64 {
        match outcome {
            Outcome::Home => self.home,
            Outcome::Draw => self.draw,
            Outcome::Away => self.away,
        }
    }

    /// Shannon entropy in nats, used by Set E.
    pub fn entropy(&self) -> f64 {
        [self.home, self.draw, self.away]
            .iter()
            .map(|&p| if p > 0.0 { -p * p.ln() } else { 0.0 })
            .sum()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct League {
    pub code: String,
    pub country: String,
    pub tier: u8,
    pub average_draw_rate: f64,
    pub home_advantage_prior: f64,
    pub active: bool,
}

/// Canonicalizes a display name the way spec §3 defines "canonical name":
/// lowercased, punctuation-stripped.
pub fn canonicalize_name(raw: &str) -> String {
    raw.trim()
        .to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

#[derive(Debug, Clone, PartialEq)]
pub struct Team {
    pub id: u64,
    pub league_code: String,
    pub display_name: String,
    pub canonical_name: String,
    /// Attack strength, strictly positive.
    pub attack: f64,
    /// Defence strength, strictly positive.
    pub defence: f64,
}

impl Team {
    pub fn new(id: u64, league_code: impl Into<String>, display_name: impl Into<String>) -> Self {
        let display_name = display_name.into();
        let canonical_name = canonicalize_name(&display_name);
        Team {
            id,
            league_code: league_code.into(),
            display_name,
            canonical_name,
            attack: 1.0,
            defence: 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MarketOdds {
    pub home: f64,
    pub draw: f64,
    pub away: f64,
}

impl MarketOdds {
    pub fn overround(&self) -> f64 {
        1.0 / self.home + 1.0 / self.draw + 1.0 / self.away
    }

    /// Converts closing odds into a market-implied triplet (spec §4.5).
    pub fn implied_triplet(&self) -> Result<Triplet> {
        Triplet::from_unnormalized(1.0 / self.home, 1.0 / self.draw, 1.0 / self.away)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HistoricalMatch {
    pub league_code: String,
    pub season: String,
    pub date: DateTime<Utc>,
    pub home_team: u64,
    pub away_team: u64,
    pub home_goals: u16,
    pub away_goals: u16,
    pub closing_odds: Option<MarketOdds>,
}

impl HistoricalMatch {
    pub fn outcome(&self) -> Outcome {
        Outcome::from_goals(self.home_goals, self.away_goals)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModelStatus {
    Active,
    Archived,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeamParams {
    pub attack: f64,
    pub defence: f64,
}

/// The immutable, serialized parameter bundle produced by a fit (I5).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainedParameters {
    pub rho: f64,
    pub home_advantage: f64,
    pub teams: BTreeMap<u64, TeamParams>,
    pub calibration: Option<crate::calibrator::CalibrationSet>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelVersion {
    pub version_tag: String,
    pub model_type: String,
    pub status: ModelStatus,
    pub trained_at: DateTime<Utc>,
    pub training_match_count: usize,
    pub training_leagues: Vec<String>,
    pub training_seasons: Vec<String>,
    pub decay_rate: f64,
    pub blend_weight: f64,
    pub parameters: TrainedParameters,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JackpotStatus {
    Draft,
    Submitted,
    Settled,
}

#[derive(Debug, Clone)]
pub struct Fixture {
    pub id: String,
    pub ordinal: u32,
    pub home_team: u64,
    pub away_team: u64,
    pub scheduled_at: DateTime<Utc>,
    pub venue_lat_lon: Option<(f64, f64)>,
    pub market_odds: Option<MarketOdds>,
    pub settled_outcome: Option<Outcome>,
}

#[derive(Debug, Clone)]
pub struct JackpotTicket {
    pub id: String,
    pub owner: String,
    pub status: JackpotStatus,
    pub created_at: DateTime<Utc>,
    pub fixtures: Vec<Fixture>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SetTag {
    A,
    B,
    C,
    D,
    E,
    F,
    G,
    H,
    I,
    J,
}

impl SetTag {
    /// Sets D, E, F, H, I, J carry no calibration meaning and must not feed
    /// back into calibration training. A, B, C, G are canonical sets.
    pub fn is_heuristic(self) -> bool {
        matches!(self, SetTag::D | SetTag::E | SetTag::F | SetTag::H | SetTag::I | SetTag::J)
    }
}

/// Which of the seven draw-structural multipliers a value came from, kept
/// distinct from "present and equal to 1.0" (spec §9 graceful-missing-data
/// pattern).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Signal {
    Present(f64),
    Missing,
}

impl Signal {
    pub fn value_or_neutral(self) -> f64 {
        match self {
            Signal::Present(v) => v,
            Signal::Missing => 1.0,
        }
    }

    pub fn is_missing(self) -> bool {
        matches!(self, Signal::Missing)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DrawComponentRecord {
    pub league_prior: Signal,
    pub elo_symmetry: Signal,
    pub h2h: Signal,
    pub weather: Signal,
    pub fatigue: Signal,
    pub referee: Signal,
    pub odds_drift: Signal,
    pub total_product: f64,
}

#[derive(Debug, Clone)]
pub struct Prediction {
    pub fixture_id: String,
    pub model_version: String,
    pub set_tag: SetTag,
    pub triplet: Triplet,
    pub expected_goals: (f64, f64),
    pub draw_components: Option<DrawComponentRecord>,
    pub market_triplet: Option<Triplet>,
    pub created_at: DateTime<Utc>,
}

impl Prediction {
    pub fn argmax_outcome(&self) -> Outcome {
        self.triplet.argmax()
    }

    pub fn confidence(&self) -> f64 {
        self.triplet.confidence()
    }
}
