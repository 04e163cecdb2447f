//! Confidence arbitration across independent verification sources.
//!
//! Two or more agreeing sources make a HIGH verdict, one makes MEDIUM
//! (could be our own lag), none makes a DISPUTED with the freshest source
//! state recommended for human or next-cycle attention.

use lv_model::MatchPhase;

/// What a verification source reported for one match.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceState {
    pub score_home: i32,
    pub score_away: i32,
    pub phase: MatchPhase,
    pub clock: Option<String>,
    pub period: Option<String>,
    pub source: String,
    /// Unix seconds; freshness tie-break for disputed states.
    pub fetched_at: f64,
}

/// Our current canonical state for the same match.
#[derive(Debug, Clone)]
pub struct CurrentState {
    pub score_home: i32,
    pub score_away: i32,
    pub phase: MatchPhase,
    pub clock: Option<String>,
    pub period: Option<String>,
    pub version: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    High,
    Medium,
    Disputed,
}

/// Phases compare loosely: exact, both live-family, or both terminal.
pub fn phase_equivalent(a: MatchPhase, b: MatchPhase) -> bool {
    a == b || (a.is_live() && b.is_live()) || (a.is_terminal() && b.is_terminal())
}

fn state_matches(current: &CurrentState, verified: &SourceState) -> bool {
    current.score_home == verified.score_home
        && current.score_away == verified.score_away
        && phase_equivalent(current.phase, verified.phase)
}

fn sources_agree(a: &SourceState, b: &SourceState) -> bool {
    a.score_home == b.score_home
        && a.score_away == b.score_away
        && phase_equivalent(a.phase, b.phase)
}

/// Returns (confidence, disposition, recommended state).
///
/// Two sources confirming our state OR two sources agreeing with each other
/// on a different state both make HIGH; the latter is what drives a
/// correction.  A lone source matching us is MEDIUM (could be lag on either
/// side); anything else is DISPUTED with the freshest state recommended.
pub fn compute_confidence<'a>(
    current: &CurrentState,
    verified: &'a [SourceState],
) -> (f64, Disposition, Option<&'a SourceState>) {
    if verified.is_empty() {
        return (0.0, Disposition::Disputed, None);
    }

    let matching: Vec<&SourceState> = verified
        .iter()
        .filter(|v| state_matches(current, v))
        .collect();
    if matching.len() >= 2 {
        return (0.9, Disposition::High, Some(matching[0]));
    }

    // Largest consensus group among the sources themselves.
    let consensus = verified
        .iter()
        .map(|v| (verified.iter().filter(|o| sources_agree(v, o)).count(), v))
        .max_by_key(|(count, _)| *count);
    if let Some((count, state)) = consensus {
        if count >= 2 {
            return (0.9, Disposition::High, Some(state));
        }
    }

    if matching.len() == 1 {
        return (0.6, Disposition::Medium, Some(matching[0]));
    }

    // Every source disagrees with us and with each other; recommend the
    // freshest.
    let freshest = verified
        .iter()
        .max_by(|a, b| {
            a.fetched_at
                .partial_cmp(&b.fetched_at)
                .unwrap_or(std::cmp::Ordering::Equal)
        })
        .expect("non-empty verified list");
    (0.3, Disposition::Disputed, Some(freshest))
}

/// True when no correction is needed.
pub fn current_matches_recommended(current: &CurrentState, recommended: &SourceState) -> bool {
    state_matches(current, recommended)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source(score_home: i32, score_away: i32, phase: MatchPhase, fetched_at: f64) -> SourceState {
        SourceState {
            score_home,
            score_away,
            phase,
            clock: None,
            period: None,
            source: "espn".to_owned(),
            fetched_at,
        }
    }

    fn current(score_home: i32, score_away: i32, phase: MatchPhase) -> CurrentState {
        CurrentState {
            score_home,
            score_away,
            phase,
            clock: None,
            period: None,
            version: 1,
        }
    }

    #[test]
    fn phases_compare_by_family() {
        assert!(phase_equivalent(MatchPhase::LiveFirstHalf, MatchPhase::LiveSecondHalf));
        assert!(phase_equivalent(MatchPhase::Break, MatchPhase::LiveQ2));
        assert!(phase_equivalent(MatchPhase::Finished, MatchPhase::Postponed));
        assert!(!phase_equivalent(MatchPhase::LiveFirstHalf, MatchPhase::Finished));
        assert!(!phase_equivalent(MatchPhase::Scheduled, MatchPhase::LiveFirstHalf));
    }

    #[test]
    fn two_agreeing_sources_make_high() {
        let cur = current(2, 1, MatchPhase::LiveSecondHalf);
        let verified = vec![
            source(2, 1, MatchPhase::LiveSecondHalf, 10.0),
            source(2, 1, MatchPhase::LiveFirstHalf, 11.0),
        ];
        let (conf, disposition, recommended) = compute_confidence(&cur, &verified);
        assert!((conf - 0.9).abs() < f64::EPSILON);
        assert_eq!(disposition, Disposition::High);
        assert!(recommended.is_some());
    }

    #[test]
    fn one_agreeing_source_makes_medium() {
        let cur = current(1, 1, MatchPhase::LiveSecondHalf);
        let verified = vec![
            source(1, 1, MatchPhase::LiveSecondHalf, 10.0),
            source(2, 1, MatchPhase::LiveSecondHalf, 11.0),
        ];
        let (conf, disposition, _) = compute_confidence(&cur, &verified);
        assert!((conf - 0.6).abs() < f64::EPSILON);
        assert_eq!(disposition, Disposition::Medium);
    }

    #[test]
    fn source_consensus_against_us_makes_high_with_their_state() {
        // We say 1-1, two independent sources both say 2-1: that is a HIGH
        // verdict recommending the correction.
        let cur = current(1, 1, MatchPhase::LiveSecondHalf);
        let verified = vec![
            source(2, 1, MatchPhase::LiveSecondHalf, 10.0),
            source(2, 1, MatchPhase::LiveFirstHalf, 11.0),
        ];
        let (conf, disposition, recommended) = compute_confidence(&cur, &verified);
        assert!((conf - 0.9).abs() < f64::EPSILON);
        assert_eq!(disposition, Disposition::High);
        let recommended = recommended.unwrap();
        assert_eq!(recommended.score_home, 2);
        assert!(!current_matches_recommended(&cur, recommended));
    }

    #[test]
    fn all_disagreeing_recommends_the_freshest() {
        let cur = current(1, 1, MatchPhase::LiveSecondHalf);
        let verified = vec![
            source(2, 1, MatchPhase::LiveSecondHalf, 10.0),
            source(3, 1, MatchPhase::LiveSecondHalf, 20.0),
        ];
        let (conf, disposition, recommended) = compute_confidence(&cur, &verified);
        assert!((conf - 0.3).abs() < f64::EPSILON);
        assert_eq!(disposition, Disposition::Disputed);
        assert_eq!(recommended.unwrap().score_home, 3);
    }

    #[test]
    fn no_sources_is_disputed_with_nothing_recommended() {
        let cur = current(0, 0, MatchPhase::LiveFirstHalf);
        let (conf, disposition, recommended) = compute_confidence(&cur, &[]);
        assert!(conf.abs() < f64::EPSILON);
        assert_eq!(disposition, Disposition::Disputed);
        assert!(recommended.is_none());
    }
}
