//! Adaptive poll interval computation.
//!
//! interval = base(sport, phase) * tier_multiplier
//!          * demand(subscribers) * health(provider) * quota(pressure)
//! clamped to [min, max], then jittered to de-synchronize the fleet.

use lv_model::{MatchPhase, Sport, Tier};
use rand::Rng;

/// Tempo profile keys.  Terminal phases cool down under "finished".
fn tempo_key(phase: MatchPhase) -> &'static str {
    if phase.is_terminal() {
        return "finished";
    }
    match phase {
        MatchPhase::Scheduled => "scheduled",
        MatchPhase::PreMatch => "pre_match",
        p if p.is_break() => "live_break",
        p if p.is_live() => "live_active",
        _ => "scheduled",
    }
}

/// Natural polling rate (seconds) per sport and tempo key, before any
/// demand/health adjustment.
fn base_interval(sport: Sport, phase: MatchPhase) -> f64 {
    let key = tempo_key(phase);
    match (sport, key) {
        (Sport::Basketball, "live_active") => 2.0,
        (Sport::Basketball, "live_break") => 10.0,
        (Sport::Baseball, "live_active") => 5.0,
        (Sport::Baseball, "live_break") => 20.0,
        (Sport::Hockey, "live_active") => 3.0,
        (Sport::Hockey, "live_break") => 12.0,
        (_, "live_active") => 3.0,
        (_, "live_break") => 15.0,
        (_, "pre_match") => 60.0,
        (_, "finished") => 300.0,
        _ => 120.0,
    }
}

/// Higher tiers poll less aggressively.
fn tier_multiplier(tier: Tier) -> f64 {
    match tier {
        Tier::Scoreboard => 1.0,
        Tier::Events => 1.5,
        Tier::Stats => 3.0,
    }
}

#[derive(Debug, Clone, Copy)]
pub struct IntervalInputs {
    pub sport: Sport,
    pub phase: MatchPhase,
    pub tier: Tier,
    pub subscribers: i64,
    pub provider_score: f64,
    pub quota_usage: i64,
    pub quota_limit: i64,
}

#[derive(Debug, Clone, Copy)]
pub struct IntervalLimits {
    pub min_s: f64,
    pub max_s: f64,
    pub jitter_factor: f64,
}

/// The deterministic part of the formula (clamped, no jitter).
pub fn interval_before_jitter(inputs: &IntervalInputs, limits: &IntervalLimits) -> f64 {
    let mut interval = base_interval(inputs.sport, inputs.phase) * tier_multiplier(inputs.tier);

    // Demand: ln-damped speedup under load, a 3x slowdown with no audience.
    let demand = if inputs.subscribers > 0 {
        1.0 / (1.0 + (1.0 + inputs.subscribers as f64).ln())
    } else {
        3.0
    };
    interval *= demand;

    // Degraded providers are polled slower to avoid piling onto a failure.
    interval *= 1.0 + (1.0 - inputs.provider_score) * 2.0;

    // Quota pressure ramps past 70% usage and doubles past 90%.
    if inputs.quota_limit > 0 {
        let usage_ratio = inputs.quota_usage as f64 / inputs.quota_limit as f64;
        if usage_ratio > 0.7 {
            let mut quota_factor = 1.0 + (usage_ratio - 0.7) * 5.0;
            if usage_ratio > 0.9 {
                quota_factor *= 2.0;
            }
            interval *= quota_factor;
        }
    }

    interval.clamp(limits.min_s, limits.max_s)
}

/// Full interval including jitter.
pub fn compute_interval(inputs: &IntervalInputs, limits: &IntervalLimits) -> f64 {
    let interval = interval_before_jitter(inputs, limits);
    let jitter_range = interval * limits.jitter_factor;
    let jitter = rand::thread_rng().gen_range(-jitter_range..=jitter_range);
    (interval + jitter).max(limits.min_s)
}

#[cfg(test)]
mod tests {
    use super::*;

    const LIMITS: IntervalLimits = IntervalLimits {
        min_s: 1.0,
        max_s: 120.0,
        jitter_factor: 0.15,
    };

    fn inputs(phase: MatchPhase, tier: Tier, subscribers: i64) -> IntervalInputs {
        IntervalInputs {
            sport: Sport::Soccer,
            phase,
            tier,
            subscribers,
            provider_score: 1.0,
            quota_usage: 0,
            quota_limit: 600,
        }
    }

    #[test]
    fn live_scoreboard_with_audience_polls_fast() {
        let i = interval_before_jitter(&inputs(MatchPhase::LiveFirstHalf, Tier::Scoreboard, 10), &LIMITS);
        // base 3.0 * demand 1/(1+ln(11)) ~ 0.88
        assert!(i < 3.0, "interval = {i}");
        assert!(i >= 1.0);
    }

    #[test]
    fn no_subscribers_slows_polling_threefold() {
        let with = interval_before_jitter(&inputs(MatchPhase::LiveFirstHalf, Tier::Scoreboard, 1), &LIMITS);
        let without = interval_before_jitter(&inputs(MatchPhase::LiveFirstHalf, Tier::Scoreboard, 0), &LIMITS);
        assert!(without > with * 2.0, "with={with} without={without}");
    }

    #[test]
    fn stats_tier_polls_three_times_slower() {
        let t0 = interval_before_jitter(&inputs(MatchPhase::LiveFirstHalf, Tier::Scoreboard, 5), &LIMITS);
        let t2 = interval_before_jitter(&inputs(MatchPhase::LiveFirstHalf, Tier::Stats, 5), &LIMITS);
        assert!((t2 / t0 - 3.0).abs() < 1e-9);
    }

    #[test]
    fn unhealthy_provider_triples_the_interval() {
        let healthy = interval_before_jitter(&inputs(MatchPhase::LiveFirstHalf, Tier::Scoreboard, 5), &LIMITS);
        let mut sick = inputs(MatchPhase::LiveFirstHalf, Tier::Scoreboard, 5);
        sick.provider_score = 0.0;
        let degraded = interval_before_jitter(&sick, &LIMITS);
        assert!((degraded / healthy - 3.0).abs() < 1e-9);
    }

    #[test]
    fn quota_pressure_ramps_and_doubles_near_the_limit() {
        let mut base = inputs(MatchPhase::PreMatch, Tier::Scoreboard, 5);
        base.quota_usage = 0;
        let calm = interval_before_jitter(&base, &LIMITS);

        base.quota_usage = 480; // 80%
        let pressured = interval_before_jitter(&base, &LIMITS);
        assert!(pressured > calm);

        base.quota_usage = 570; // 95% -> factor (1 + 0.25*5) * 2
        let critical = interval_before_jitter(&base, &LIMITS);
        assert!(critical > pressured);
    }

    #[test]
    fn interval_is_clamped_to_bounds() {
        // Scheduled baseball stats with no subscribers would blow past max.
        let mut sleepy = inputs(MatchPhase::Scheduled, Tier::Stats, 0);
        sleepy.sport = Sport::Baseball;
        assert!((interval_before_jitter(&sleepy, &LIMITS) - 120.0).abs() < 1e-9);

        // Basketball live with a big audience floors at min.
        let mut busy = inputs(MatchPhase::LiveQ1, Tier::Scoreboard, 100_000);
        busy.sport = Sport::Basketball;
        assert!((interval_before_jitter(&busy, &LIMITS) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn jitter_stays_within_the_band() {
        let det = interval_before_jitter(&inputs(MatchPhase::PreMatch, Tier::Scoreboard, 0), &LIMITS);
        for _ in 0..200 {
            let j = compute_interval(&inputs(MatchPhase::PreMatch, Tier::Scoreboard, 0), &LIMITS);
            assert!(j >= det * (1.0 - 0.15) - 1e-9);
            assert!(j <= det * (1.0 + 0.15) + 1e-9);
            assert!(j >= LIMITS.min_s);
        }
    }

    #[test]
    fn terminal_phases_cool_down() {
        let i = interval_before_jitter(&inputs(MatchPhase::Finished, Tier::Scoreboard, 5), &LIMITS);
        // base 300 clamps to max with few subscribers.
        assert!(i > 60.0);
    }
}
