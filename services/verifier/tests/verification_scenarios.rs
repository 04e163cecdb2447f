// Cross-source verification scenarios: when corrections fire and when they
// are held back.

use lv_model::MatchPhase;
use verifier::confidence::{
    compute_confidence, current_matches_recommended, CurrentState, Disposition, SourceState,
};

fn ours(score_home: i32, score_away: i32) -> CurrentState {
    CurrentState {
        score_home,
        score_away,
        phase: MatchPhase::LiveSecondHalf,
        clock: Some("70'".into()),
        period: None,
        version: 4,
    }
}

fn reported(source: &str, score_home: i32, score_away: i32, fetched_at: f64) -> SourceState {
    SourceState {
        score_home,
        score_away,
        phase: MatchPhase::LiveSecondHalf,
        clock: Some("70'".into()),
        period: None,
        source: source.to_owned(),
        fetched_at,
    }
}

#[test]
fn two_sources_agreeing_against_us_drive_a_correction() {
    // We believe 1-1; ESPN and TheSportsDB both say 2-1.
    let current = ours(1, 1);
    let verified = vec![
        reported("espn", 2, 1, 100.0),
        reported("thesportsdb", 2, 1, 101.0),
    ];

    let (confidence, disposition, recommended) = compute_confidence(&current, &verified);
    assert!((confidence - 0.9).abs() < f64::EPSILON);
    assert_eq!(disposition, Disposition::High);

    let recommended = recommended.expect("a recommended state");
    assert_eq!((recommended.score_home, recommended.score_away), (2, 1));
    assert!(
        !current_matches_recommended(&current, recommended),
        "mismatch means the correction path runs"
    );
}

#[test]
fn split_sources_stay_at_medium_with_no_correction() {
    // One source agrees with us, the other does not: could be their lag or
    // ours, so nothing is written this cycle.
    let current = ours(1, 1);
    let verified = vec![
        reported("espn", 2, 1, 100.0),
        reported("thesportsdb", 1, 1, 101.0),
    ];

    let (confidence, disposition, recommended) = compute_confidence(&current, &verified);
    assert!((confidence - 0.6).abs() < f64::EPSILON);
    assert_eq!(disposition, Disposition::Medium);
    // The recommended state equals ours, so even a trigger-happy caller
    // would find nothing to change.
    assert!(current_matches_recommended(&current, recommended.unwrap()));
}

#[test]
fn both_sources_confirming_us_is_high_with_nothing_to_do() {
    let current = ours(2, 1);
    let verified = vec![
        reported("espn", 2, 1, 100.0),
        reported("thesportsdb", 2, 1, 101.0),
    ];
    let (confidence, disposition, recommended) = compute_confidence(&current, &verified);
    assert!((confidence - 0.9).abs() < f64::EPSILON);
    assert_eq!(disposition, Disposition::High);
    assert!(current_matches_recommended(&current, recommended.unwrap()));
}

#[test]
fn total_disagreement_is_disputed_with_freshest_recommended() {
    let current = ours(0, 0);
    let verified = vec![
        reported("espn", 2, 1, 100.0),
        reported("thesportsdb", 3, 1, 200.0),
    ];
    let (confidence, disposition, recommended) = compute_confidence(&current, &verified);
    assert!((confidence - 0.3).abs() < f64::EPSILON);
    assert_eq!(disposition, Disposition::Disputed);
    assert_eq!(recommended.unwrap().source, "thesportsdb");
}

#[test]
fn phase_family_differences_do_not_block_agreement() {
    // A source that lags into "live_first_half" while we are in the second
    // half still counts as agreeing when the score lines up.
    let current = ours(2, 1);
    let mut lagged = reported("espn", 2, 1, 100.0);
    lagged.phase = MatchPhase::LiveFirstHalf;
    let verified = vec![lagged, reported("thesportsdb", 2, 1, 101.0)];
    let (confidence, disposition, _) = compute_confidence(&current, &verified);
    assert!((confidence - 0.9).abs() < f64::EPSILON);
    assert_eq!(disposition, Disposition::High);
}
