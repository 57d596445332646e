//! C7 — fingerprint & audit (spec §4.7).
//!
//! `fingerprint(jackpot) -> opaque id`; `explain(prediction) -> record`.
//! Reuses the teacher's existing `sha2` dependency (previously reached for
//! in an encrypted-export path that is out of scope here) to produce a
//! stable, canonicalized hash over a jackpot's fixture sequence.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::types::{DrawComponentRecord, JackpotTicket, MarketOdds, SetTag, Triplet};

/// Canonicalizes one fixture's auxiliary fields into the exact string
/// fingerprinted: `home|away|scheduled_iso8601|odds_or_dash`. Team names
/// are lowercased/canonical (spec §4.7), datetimes are UTC ISO-8601, odds
/// are rounded to 4 decimals.
fn canonicalize_fixture_line(home_name: &str, away_name: &str, scheduled_at: DateTime<Utc>, odds: Option<MarketOdds>) -> String {
    let home = crate::types::canonicalize_name(home_name);
    let away = crate::types::canonicalize_name(away_name);
    let scheduled = scheduled_at.to_rfc3339();
    let odds_part = match odds {
        Some(o) => format!("{:.4}/{:.4}/{:.4}", o.home, o.draw, o.away),
        None => "-".to_string(),
    };
    format!("{home}|{away}|{scheduled}|{odds_part}")
}

/// `fingerprint(jackpot) -> opaque id` (spec §4.7).
///
/// Fixture order is significant (two jackpots with the same fixtures in a
/// different order hash differently); every other auxiliary field is
/// folded in per-fixture in a fixed, documented order, so permuting
/// irrelevant metadata on a fixture never changes the hash.
pub fn fingerprint(jackpot: &JackpotTicket, team_names: impl Fn(u64) -> String) -> String {
    let mut hasher = Sha256::new();
    for fixture in &jackpot.fixtures {
        let home_name = team_names(fixture.home_team);
        let away_name = team_names(fixture.away_team);
        let line = canonicalize_fixture_line(&home_name, &away_name, fixture.scheduled_at, fixture.market_odds);
        hasher.update(line.as_bytes());
        hasher.update(b"\n");
    }
    let digest = hasher.finalize();
    hex_encode(&digest)
}

fn hex_encode(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        out.push_str(&format!("{byte:02x}"));
    }
    out
}

/// Explain-record structure required by spec §4.7 (and I7: every
/// prediction must be exactly reproducible from its inputs).
#[derive(Debug, Clone, Serialize)]
pub struct ExplainRecord {
    pub lambda_home: f64,
    pub lambda_away: f64,
    pub base_triplet: Triplet,
    pub set_triplet: Triplet,
    pub set_tag: SetTag,
    pub adjustments: Option<DrawComponentRecord>,
    pub market_triplet: Option<Triplet>,
    pub model_version_id: String,
    pub created_at: DateTime<Utc>,
}

/// `explain(prediction) -> record` (spec §4.7), assembled from the pieces
/// already computed along the prediction pipeline rather than recomputed,
/// since recomputation would risk silently diverging from what was
/// actually returned to the caller.
pub fn explain(
    lambda_home: f64,
    lambda_away: f64,
    base_triplet: Triplet,
    set_triplet: Triplet,
    set_tag: SetTag,
    adjustments: Option<DrawComponentRecord>,
    market_triplet: Option<Triplet>,
    model_version_id: String,
    created_at: DateTime<Utc>,
) -> ExplainRecord {
    ExplainRecord {
        lambda_home,
        lambda_away,
        base_triplet,
        set_triplet,
        set_tag,
        adjustments,
        market_triplet,
        model_version_id,
        created_at,
    }
}
