// Adaptive polling across a match lifecycle: the interval must tighten as a
// match goes live and gains an audience, then relax after the final whistle
// or under provider/quota pressure.

use lv_model::{MatchPhase, Sport, Tier};
use scheduler::polling::{interval_before_jitter, IntervalInputs, IntervalLimits};

const LIMITS: IntervalLimits = IntervalLimits {
    min_s: 1.0,
    max_s: 120.0,
    jitter_factor: 0.15,
};

fn inputs(phase: MatchPhase, subscribers: i64, provider_score: f64, quota_usage: i64) -> IntervalInputs {
    IntervalInputs {
        sport: Sport::Soccer,
        phase,
        tier: Tier::Scoreboard,
        subscribers,
        provider_score,
        quota_usage,
        quota_limit: 600,
    }
}

#[test]
fn lifecycle_tightens_then_relaxes() {
    let scheduled = interval_before_jitter(&inputs(MatchPhase::Scheduled, 0, 1.0, 0), &LIMITS);
    let pre_match = interval_before_jitter(&inputs(MatchPhase::PreMatch, 5, 1.0, 0), &LIMITS);
    let live = interval_before_jitter(&inputs(MatchPhase::LiveFirstHalf, 200, 1.0, 0), &LIMITS);
    let halftime = interval_before_jitter(&inputs(MatchPhase::LiveHalftime, 200, 1.0, 0), &LIMITS);
    let finished = interval_before_jitter(&inputs(MatchPhase::Finished, 200, 1.0, 0), &LIMITS);

    assert!(scheduled > pre_match, "scheduled {scheduled} vs pre_match {pre_match}");
    assert!(pre_match > live, "pre_match {pre_match} vs live {live}");
    assert!(halftime > live, "halftime {halftime} vs live {live}");
    assert!(finished > halftime, "finished {finished} vs halftime {halftime}");
}

#[test]
fn audience_surge_speeds_polling_with_diminishing_returns() {
    let empty = interval_before_jitter(&inputs(MatchPhase::PreMatch, 0, 1.0, 0), &LIMITS);
    let few = interval_before_jitter(&inputs(MatchPhase::PreMatch, 10, 1.0, 0), &LIMITS);
    let many = interval_before_jitter(&inputs(MatchPhase::PreMatch, 1000, 1.0, 0), &LIMITS);

    assert!(empty > few);
    assert!(few > many);
    // Logarithmic damping: the second 100x of audience buys far less than
    // the first ten subscribers did.
    assert!((few - many) < (empty - few));
}

#[test]
fn provider_failure_streak_backs_polling_off() {
    // The failover scenario from the other side: a provider whose health
    // collapsed below the selection threshold is also polled more gently
    // wherever it is still pinned.
    let healthy = interval_before_jitter(&inputs(MatchPhase::LiveFirstHalf, 5, 1.0, 0), &LIMITS);
    let degraded = interval_before_jitter(&inputs(MatchPhase::LiveFirstHalf, 5, 0.35, 0), &LIMITS);
    let dead = interval_before_jitter(&inputs(MatchPhase::LiveFirstHalf, 5, 0.0, 0), &LIMITS);

    assert!(degraded > healthy);
    assert!(dead >= degraded);
    assert!((dead / healthy - 3.0).abs() < 1e-9, "score 0 triples the interval");
}

#[test]
fn quota_exhaustion_dominates_everything_else() {
    let calm = interval_before_jitter(&inputs(MatchPhase::LiveFirstHalf, 50, 1.0, 300), &LIMITS);
    let pressured = interval_before_jitter(&inputs(MatchPhase::LiveFirstHalf, 50, 1.0, 540), &LIMITS);
    let critical = interval_before_jitter(&inputs(MatchPhase::LiveFirstHalf, 50, 1.0, 594), &LIMITS);

    assert_eq!(calm, interval_before_jitter(&inputs(MatchPhase::LiveFirstHalf, 50, 1.0, 0), &LIMITS),
        "under 70% usage the quota term is inert");
    assert!(pressured > calm);
    assert!(critical > pressured * 1.5, "past 90% the factor doubles");
}

#[test]
fn events_and_stats_tiers_poll_progressively_slower() {
    let mut scoreboard = inputs(MatchPhase::LiveFirstHalf, 5, 1.0, 0);
    let mut events = scoreboard;
    events.tier = Tier::Events;
    let mut stats = scoreboard;
    stats.tier = Tier::Stats;
    scoreboard.tier = Tier::Scoreboard;

    let t0 = interval_before_jitter(&scoreboard, &LIMITS);
    let t1 = interval_before_jitter(&events, &LIMITS);
    let t2 = interval_before_jitter(&stats, &LIMITS);
    assert!(t0 < t1 && t1 < t2);
}
