use std::hint::black_box;

use chrono::{Duration, TimeZone, Utc};
use criterion::{criterion_group, criterion_main, Criterion};

use jackpot_core::config::EngineConfig;
use jackpot_core::fitter;
use jackpot_core::score_matrix::{score_matrix, score_triplet};
use jackpot_core::types::HistoricalMatch;

fn bench_score_triplet(c: &mut Criterion) {
    c.bench_function("score_triplet_n8", |b| {
        b.iter(|| {
            let t = score_triplet(black_box(1.50), black_box(1.20), black_box(-0.13), black_box(8)).unwrap();
            black_box(t.sum());
        })
    });
}

fn bench_score_matrix_ceiling(c: &mut Criterion) {
    c.bench_function("score_matrix_n12", |b| {
        b.iter(|| {
            let grid = score_matrix(black_box(1.50), black_box(1.20), black_box(-0.13), black_box(12)).unwrap();
            black_box(grid.len());
        })
    });
}

fn sample_matches(n_teams: u64, rounds: u16) -> Vec<HistoricalMatch> {
    let mut matches = Vec::with_capacity(n_teams as usize * rounds as usize);
    let mut day = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    for round in 0..rounds {
        for home in 0..n_teams {
            let away = (home + 1) % n_teams;
            matches.push(HistoricalMatch {
                league_code: "BENCH".to_string(),
                season: "2024".to_string(),
                date: day,
                home_team: home,
                away_team: away,
                home_goals: (round % 3) as u16,
                away_goals: ((round + 1) % 3) as u16,
                closing_odds: None,
            });
            day += Duration::days(1);
        }
    }
    matches
}

fn bench_fitter(c: &mut Criterion) {
    let matches = sample_matches(20, 60);
    let cutoff = matches.iter().map(|m| m.date).max().unwrap() + Duration::days(1);
    let mut config = EngineConfig::default();
    config.min_training_matches = 100;

    c.bench_function("fit_dixon_coles_20_teams", |b| {
        b.iter(|| {
            let fitted = fitter::fit(black_box(&matches), black_box(cutoff), black_box(&config)).unwrap();
            black_box(fitted.teams.len());
        })
    });
}

criterion_group!(perf, bench_score_triplet, bench_score_matrix_ceiling, bench_fitter);
criterion_main!(perf);
