//! C5 — set generator (spec §4.5).
//!
//! `generate_sets(base_triplet, market_triplet, context) -> map<SetTag, Triplet>`.
//!
//! Implemented as a dispatch table keyed by `SetTag` rather than a trait
//! hierarchy (see DESIGN.md): every set is a small pure function over the
//! same `SetContext`, which keeps the heuristic/market-derived sets
//! (D, E, F, G, H, I, J) next to the two calibration-meaningful blends
//! (B, C) without forcing a shared trait object for what is, in the end,
//! seven different formulas over the same two triplets.

use std::collections::BTreeMap;

use crate::config::EngineConfig;
use crate::draw_adjuster::{self, SideData};
use crate::error::{EngineError, Result};
use crate::types::{DrawComponentRecord, SetTag, Triplet};

/// Everything a set formula might need beyond the base/market triplets.
/// Optional fields reflect that not every jackpot has market odds or
/// draw-structural side-data available.
#[derive(Debug, Clone)]
pub struct SetContext<'a> {
    pub market_triplet: Option<Triplet>,
    pub market_odds: Option<(f64, f64, f64)>,
    pub side_data: Option<&'a SideData>,
    /// True once C4 has already been applied upstream to this base triplet
    /// (spec §4.5: Set D's second-pass guard).
    pub draw_adjustment_already_applied: bool,
}

fn convex_blend(base: Triplet, market: Triplet, beta: f64) -> Result<Triplet> {
    Triplet::from_unnormalized(
        beta * base.home + (1.0 - beta) * market.home,
        beta * base.draw + (1.0 - beta) * market.draw,
        beta * base.away + (1.0 - beta) * market.away,
    )
}

fn set_a(base: Triplet) -> Result<Triplet> {
    Ok(base)
}

fn set_b(base: Triplet, ctx: &SetContext, config: &EngineConfig) -> Result<Triplet> {
    let market = ctx.market_triplet.ok_or(EngineError::InvalidModelParameters {
        reason: "set B requires a market triplet".to_string(),
    })?;
    convex_blend(base, market, config.blend_alpha_b)
}

fn set_c(base: Triplet, ctx: &SetContext, config: &EngineConfig) -> Result<Triplet> {
    let market = ctx.market_triplet.ok_or(EngineError::InvalidModelParameters {
        reason: "set C requires a market triplet".to_string(),
    })?;
    convex_blend(base, market, config.blend_alpha_c)
}

/// Set D — draw-boosted: runs the full seven-component C4 adjuster (falling
/// back to neutral side-data when none is supplied), forbidding a second
/// structural pass and otherwise guaranteeing at least a 1.05 effective
/// product on the draw (spec §4.5: "a minimum effective M >= 1.05 ... up to
/// the total cap"). Returns the triplet alongside the component record so
/// callers can carry it into an explain record.
fn set_d(base: Triplet, ctx: &SetContext, config: &EngineConfig) -> Result<(Triplet, DrawComponentRecord)> {
    if ctx.draw_adjustment_already_applied {
        return Err(EngineError::InvalidModelParameters {
            reason: "set D: draw-structural adjustment already applied upstream".to_string(),
        });
    }
    let side = ctx.side_data.copied().unwrap_or_default();
    let (adjusted, mut record) = draw_adjuster::adjust_draw(base, &side, config)?;
    if record.total_product >= 1.05 {
        return Ok((adjusted, record));
    }
    let floored_product = 1.05_f64.min(config.draw_total_cap.1).max(config.draw_total_cap.0);
    let (boosted, total_product) = draw_adjuster::apply_component_product(base, [floored_product, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0], config)?;
    record.total_product = total_product;
    Ok((boosted, record))
}

/// Set E — entropy-penalized: temperature-scales the base triplet toward
/// higher entropy when it is unusually peaked, via bisection on T in
/// [0.5, 2.0] (the optimizer's style of a small, deterministic, in-house
/// root-finder, rather than a general numerical-solver dependency).
fn set_e(base: Triplet) -> Result<Triplet> {
    const H_LOW_FACTOR: f64 = 0.85;
    const H_TARGET_FACTOR: f64 = 0.95;
    let log3 = 3.0_f64.ln();
    let h_low = H_LOW_FACTOR * log3;
    let h_target = H_TARGET_FACTOR * log3;

    if base.entropy() >= h_low {
        return Ok(base);
    }

    let temperature_scale = |t: f64| -> Result<Triplet> {
        let powered = [base.home.powf(1.0 / t), base.draw.powf(1.0 / t), base.away.powf(1.0 / t)];
        Triplet::from_unnormalized(powered[0], powered[1], powered[2])
    };

    // Entropy increases monotonically with T over [0.5, 2.0] for a peaked
    // triplet; bisect for the T that hits h_target, accepting T=2.0 as the
    // answer if the target is unreachable within the bound.
    let mut lo = 0.5_f64;
    let mut hi = 2.0_f64;
    let mut best = temperature_scale(hi)?;
    for _ in 0..40 {
        let mid = (lo + hi) / 2.0;
        let candidate = temperature_scale(mid)?;
        if candidate.entropy() < h_target {
            lo = mid;
        } else {
            hi = mid;
            best = candidate;
        }
        if (hi - lo) < 1e-6 {
            break;
        }
    }
    Ok(best)
}

/// Set F — Kelly-weighted: outcomes get weight proportional to the edge
/// `max(0, p_base - q_market) * o_market`, renormalized; falls back to the
/// base triplet if no outcome carries positive edge.
fn set_f(base: Triplet, ctx: &SetContext) -> Result<Triplet> {
    let market = ctx.market_triplet.ok_or(EngineError::InvalidModelParameters {
        reason: "set F requires a market triplet".to_string(),
    })?;
    let odds = ctx.market_odds.ok_or(EngineError::InvalidModelParameters {
        reason: "set F requires market odds".to_string(),
    })?;

    let weight_home = (base.home - market.home).max(0.0) * odds.0;
    let weight_draw = (base.draw - market.draw).max(0.0) * odds.1;
    let weight_away = (base.away - market.away).max(0.0) * odds.2;

    if weight_home + weight_draw + weight_away <= 0.0 {
        return Ok(base);
    }
    Triplet::from_unnormalized(weight_home, weight_draw, weight_away)
}

/// Set G — ensemble: uniform average of {A, B, D, E}, renormalized.
fn set_g(base: Triplet, ctx: &SetContext, config: &EngineConfig) -> Result<Triplet> {
    let a = set_a(base)?;
    let members: Vec<Triplet> = [
        Some(a),
        set_b(base, ctx, config).ok(),
        set_d(base, ctx, config).ok().map(|(triplet, _)| triplet),
        set_e(base).ok(),
    ]
    .into_iter()
    .flatten()
    .collect();

    if members.is_empty() {
        return Ok(base);
    }
    let n = members.len() as f64;
    let home = members.iter().map(|t| t.home).sum::<f64>() / n;
    let draw = members.iter().map(|t| t.draw).sum::<f64>() / n;
    let away = members.iter().map(|t| t.away).sum::<f64>() / n;
    Triplet::from_unnormalized(home, draw, away)
}

/// Alternative draw-structural weightings for the optional H/I/J sets
/// (spec §4.5: "market-consensus draw, formula-based draw, system-selected
/// draw"). H leans on the market's implied draw probability; I leans on
/// the formula-only components already in `components`; J picks whichever
/// of H/I is closer to the base draw probability (the "system-selected"
/// variant).
fn draw_focused_variant(base: Triplet, ctx: &SetContext, config: &EngineConfig, tag: SetTag) -> Result<Triplet> {
    let (formula_draw, _) = set_d(base, ctx, config)?;

    let market_draw = match ctx.market_triplet {
        Some(market) => Triplet::from_unnormalized(
            base.home,
            market.draw.clamp(config.draw_prob_bounds.0, config.draw_prob_bounds.1),
            base.away,
        )?,
        None => formula_draw,
    };

    match tag {
        SetTag::H => Ok(market_draw),
        SetTag::I => Ok(formula_draw),
        SetTag::J => {
            let dist_h = (market_draw.draw - base.draw).abs();
            let dist_i = (formula_draw.draw - base.draw).abs();
            if dist_h <= dist_i {
                Ok(market_draw)
            } else {
                Ok(formula_draw)
            }
        }
        _ => unreachable!("draw_focused_variant only handles H, I, J"),
    }
}

/// `generate_sets(base_triplet, market_triplet, context) -> map<SetTag, Triplet>` (spec §4.5).
///
/// H/I/J are included only when `ctx.market_triplet` or `ctx.side_data` is
/// available at all (spec §9: "implementer MAY omit H/I/J").
pub fn generate_sets(base: Triplet, ctx: &SetContext, config: &EngineConfig) -> Result<BTreeMap<SetTag, Triplet>> {
    let mut sets = BTreeMap::new();
    sets.insert(SetTag::A, set_a(base)?);

    if let Ok(b) = set_b(base, ctx, config) {
        sets.insert(SetTag::B, b);
    }
    if let Ok(c) = set_c(base, ctx, config) {
        sets.insert(SetTag::C, c);
    }
    let (d, _) = set_d(base, ctx, config)?;
    sets.insert(SetTag::D, d);
    sets.insert(SetTag::E, set_e(base)?);
    if let Ok(f) = set_f(base, ctx) {
        sets.insert(SetTag::F, f);
    }
    sets.insert(SetTag::G, set_g(base, ctx, config)?);

    if ctx.market_triplet.is_some() || ctx.side_data.is_some() {
        for tag in [SetTag::H, SetTag::I, SetTag::J] {
            if let Ok(v) = draw_focused_variant(base, ctx, config, tag) {
                sets.insert(tag, v);
            }
        }
    }

    Ok(sets)
}

/// The seven-component draw-structural record behind Set D/I/J's draw
/// probability, for callers that need to carry it into an explain record
/// (spec §4.7/§4.8). Mirrors the same guard and neutral-fallback behaviour
/// `set_d` applies internally.
pub fn draw_components(base: Triplet, ctx: &SetContext, config: &EngineConfig) -> Result<DrawComponentRecord> {
    set_d(base, ctx, config).map(|(_, record)| record)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_ctx() -> SetContext<'static> {
        SetContext {
            market_triplet: Some(Triplet::new(0.42, 0.27, 0.31).unwrap()),
            market_odds: Some((2.10, 3.60, 3.20)),
            side_data: None,
            draw_adjustment_already_applied: false,
        }
    }

    #[test]
    fn set_a_is_base_unchanged() {
        let base = Triplet::new(0.45, 0.26, 0.29).unwrap();
        assert_eq!(set_a(base).unwrap(), base);
    }

    #[test]
    fn set_b_and_c_satisfy_i1_and_are_between_base_and_market() {
        let base = Triplet::new(0.45, 0.26, 0.29).unwrap();
        let ctx = base_ctx();
        let config = EngineConfig::default();
        let b = set_b(base, &ctx, &config).unwrap();
        let c = set_c(base, &ctx, &config).unwrap();
        assert!((b.sum() - 1.0).abs() < 1e-9);
        assert!((c.sum() - 1.0).abs() < 1e-9);
        let market = ctx.market_triplet.unwrap();
        assert!(b.home <= base.home.max(market.home) && b.home >= base.home.min(market.home));
    }

    #[test]
    fn set_d_forbids_double_application() {
        let base = Triplet::new(0.45, 0.26, 0.29).unwrap();
        let mut ctx = base_ctx();
        ctx.draw_adjustment_already_applied = true;
        let config = EngineConfig::default();
        assert!(set_d(base, &ctx, &config).is_err());
    }

    #[test]
    fn set_d_floors_the_effective_product_at_1_05_with_no_side_data() {
        let base = Triplet::new(0.45, 0.26, 0.29).unwrap();
        let ctx = base_ctx();
        let config = EngineConfig::default();
        let (adjusted, record) = set_d(base, &ctx, &config).unwrap();
        assert!((record.total_product - 1.05).abs() < 1e-9);
        assert!(adjusted.draw > base.draw);
        assert!((adjusted.sum() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn set_d_uses_all_seven_components_when_side_data_is_present() {
        let base = Triplet::new(0.45, 0.26, 0.29).unwrap();
        let mut ctx = base_ctx();
        let side = SideData {
            league_draw_rate: Some(0.26),
            elo_diff_abs: Some(0.0),
            h2h_draw_rate: Some((0.60, 8)),
            rain_index: Some(0.0),
            wind_index: Some(0.0),
            rest_days_diff: Some(0.0),
            referee_draw_rate_delta: Some(0.05),
            odds_drift_narrowing: Some(0.10),
        };
        ctx.side_data = Some(&side);
        let config = EngineConfig::default();
        let (_, record) = set_d(base, &ctx, &config).unwrap();
        // With h2h/referee/odds-drift signals pushing the product up, it
        // should clear the 1.05 floor on its own rather than being boosted
        // to exactly the floor value.
        assert!(record.total_product > 1.05);
        assert!(!matches!(record.h2h, crate::types::Signal::Missing));
    }

    #[test]
    fn set_e_raises_entropy_of_a_peaked_triplet() {
        let peaked = Triplet::new(0.90, 0.06, 0.04).unwrap();
        let adjusted = set_e(peaked).unwrap();
        assert!(adjusted.entropy() >= peaked.entropy());
        assert!((adjusted.sum() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn set_e_leaves_already_diffuse_triplet_untouched() {
        let diffuse = Triplet::new(0.36, 0.32, 0.32).unwrap();
        let adjusted = set_e(diffuse).unwrap();
        assert_eq!(adjusted, diffuse);
    }

    #[test]
    fn set_f_falls_back_to_base_when_no_positive_edge() {
        let base = Triplet::new(0.30, 0.30, 0.40).unwrap();
        let ctx = SetContext {
            market_triplet: Some(Triplet::new(0.50, 0.25, 0.25).unwrap()),
            market_odds: Some((2.0, 3.0, 3.0)),
            side_data: None,
            draw_adjustment_already_applied: false,
        };
        let f = set_f(base, &ctx).unwrap();
        assert_eq!(f, base);
    }

    #[test]
    fn generate_sets_includes_all_canonical_tags_with_full_context() {
        let base = Triplet::new(0.45, 0.26, 0.29).unwrap();
        let ctx = base_ctx();
        let config = EngineConfig::default();
        let sets = generate_sets(base, &ctx, &config).unwrap();
        for tag in [SetTag::A, SetTag::B, SetTag::C, SetTag::D, SetTag::E, SetTag::F, SetTag::G] {
            assert!(sets.contains_key(&tag), "missing {tag:?}");
            assert!((sets[&tag].sum() - 1.0).abs() < 1e-6);
        }
    }

    #[test]
    fn heuristic_sets_are_flagged_correctly() {
        assert!(!SetTag::A.is_heuristic());
        assert!(!SetTag::B.is_heuristic());
        assert!(!SetTag::C.is_heuristic());
        assert!(!SetTag::G.is_heuristic());
        for tag in [SetTag::D, SetTag::E, SetTag::F, SetTag::H, SetTag::I, SetTag::J] {
            assert!(tag.is_heuristic());
        }
    }

    #[test]
    fn draw_components_matches_set_d_and_is_reachable_from_generate_sets() {
        let base = Triplet::new(0.45, 0.26, 0.29).unwrap();
        let ctx = base_ctx();
        let config = EngineConfig::default();
        let record = draw_components(base, &ctx, &config).unwrap();
        let sets = generate_sets(base, &ctx, &config).unwrap();
        let (direct, direct_record) = set_d(base, &ctx, &config).unwrap();
        assert_eq!(sets[&SetTag::D], direct);
        assert!((record.total_product - direct_record.total_product).abs() < 1e-12);
    }
}
