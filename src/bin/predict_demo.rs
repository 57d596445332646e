use std::sync::Arc;

use chrono::{Duration, TimeZone, Utc};
use jackpot_core::config::EngineConfig;
use jackpot_core::store::InMemoryStore;
use jackpot_core::types::{Fixture, HistoricalMatch, MarketOdds, Team};
use jackpot_core::Engine;

/// Minimal end-to-end demo: fits a tiny four-team league, activates the
/// fitted version, creates a one-fixture jackpot and prints every
/// canonical set's triplet as JSON. Intentionally simple, like the
/// teacher's own `bin/backtest.rs` — no network calls, meant for quick
/// manual sanity checks rather than production use.
fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::try_init().ok();

    let store = Arc::new(InMemoryStore::new());
    store.seed_roster(
        "EPL",
        vec![
            Team::new(1, "EPL", "Northgate United"),
            Team::new(2, "EPL", "Southwick Rovers"),
            Team::new(3, "EPL", "Eastfield Town"),
            Team::new(4, "EPL", "Westbridge City"),
        ],
    );

    let mut matches = Vec::new();
    let mut day = Utc.with_ymd_and_hms(2025, 8, 1, 15, 0, 0).unwrap();
    for round in 0..150u16 {
        for (home, away, gh, ga) in [(1u64, 2u64, 2u16, 0u16), (3, 4, 1, 1), (2, 3, 1, 2), (4, 1, 0, 2)] {
            matches.push(HistoricalMatch {
                league_code: "EPL".to_string(),
                season: "2025-26".to_string(),
                date: day,
                home_team: home,
                away_team: away,
                home_goals: gh + round % 2,
                away_goals: ga,
                closing_odds: None,
            });
            day += Duration::days(1);
        }
    }
    store.seed_matches("EPL", matches);

    let engine = Engine::new(
        Arc::clone(&store),
        Arc::clone(&store),
        Arc::clone(&store),
        Arc::clone(&store),
        EngineConfig::default(),
    );

    let training_cutoff = day;
    engine.train_model(&["EPL".to_string()], training_cutoff, "v1".to_string())?;
    engine.activate_model_version("v1")?;

    let fixtures = vec![Fixture {
        id: "demo-fixture".to_string(),
        ordinal: 1,
        home_team: 1,
        away_team: 2,
        scheduled_at: training_cutoff + Duration::days(7),
        venue_lat_lon: None,
        market_odds: Some(MarketOdds {
            home: 2.05,
            draw: 3.40,
            away: 3.60,
        }),
        settled_outcome: None,
    }];
    engine.create_jackpot("demo-jackpot".to_string(), "demo".to_string(), fixtures)?;

    let prediction = engine.predict_jackpot("demo-jackpot")?;
    println!("{}", serde_json::to_string_pretty(&prediction)?);

    Ok(())
}
