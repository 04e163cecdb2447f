//! Synthetic event inference from scoreboard diffs.
//!
//! When a provider has no authoritative play-by-play, consecutive tier-0
//! snapshots still tell a story: phase transitions become match/period
//! boundary events, score increments become scoring events.  Everything
//! emitted here carries `synthetic = true` and a confidence score so the
//! reconciliation pass can retire it once a real event shows up.

use chrono::Utc;
use uuid::Uuid;

use lv_model::{parse_clock_minute, EventType, MatchEvent, Scoreboard, Sport};

/// Confidence floor for heavily batched score jumps.
const MIN_CONFIDENCE: f64 = 0.3;

/// Primary scoring event per sport.
fn scoring_event_type(sport: Sport) -> EventType {
    match sport {
        Sport::Soccer | Sport::Hockey => EventType::Goal,
        Sport::Basketball => EventType::Basket,
        Sport::Baseball => EventType::Run,
        Sport::Football => EventType::Generic,
    }
}

fn synthetic_event_id() -> String {
    let hex = Uuid::new_v4().simple().to_string();
    format!("synthetic:{}", &hex[..12])
}

#[allow(clippy::too_many_arguments)]
fn make_event(
    match_id: Uuid,
    event_type: EventType,
    minute: Option<i32>,
    period: Option<String>,
    team_id: Option<Uuid>,
    detail: String,
    confidence: f64,
    score_home: i32,
    score_away: i32,
) -> MatchEvent {
    MatchEvent {
        id: Uuid::new_v4(),
        match_id,
        event_type,
        minute,
        second: None,
        period,
        team_id,
        player_name: None,
        detail: Some(detail),
        score_home: Some(score_home),
        score_away: Some(score_away),
        synthetic: true,
        confidence: Some(confidence),
        source_provider: None,
        provider_event_id: Some(synthetic_event_id()),
        seq: 0,
        created_at: Utc::now(),
    }
}

/// Diff two scoreboard snapshots into synthetic events.
pub fn generate(
    match_id: Uuid,
    sport: Sport,
    previous: Option<&Scoreboard>,
    current: &Scoreboard,
) -> Vec<MatchEvent> {
    let mut events = Vec::new();

    let Some(previous) = previous else {
        // First sighting.  A match already live gets a best-effort kickoff.
        if current.phase.is_live() {
            events.push(make_event(
                match_id,
                EventType::MatchStart,
                Some(0),
                None,
                None,
                format!("Match started ({})", current.phase),
                0.9,
                current.score.home,
                current.score.away,
            ));
        }
        return events;
    };

    let minute = current.clock.as_deref().and_then(parse_clock_minute);

    if previous.phase != current.phase {
        if !previous.phase.is_live() && current.phase.is_live() {
            events.push(make_event(
                match_id,
                EventType::MatchStart,
                Some(0),
                None,
                None,
                "Match started".to_owned(),
                0.95,
                current.score.home,
                current.score.away,
            ));
        }
        if previous.phase.is_live() && current.phase.is_terminal() {
            events.push(make_event(
                match_id,
                EventType::MatchEnd,
                minute,
                None,
                None,
                format!("Match ended ({})", current.phase),
                0.95,
                current.score.home,
                current.score.away,
            ));
        }
        if previous.phase.is_live() && current.phase.is_live() {
            if current.phase.is_break() {
                // Going into an intermission: one period just ended.
                events.push(make_event(
                    match_id,
                    EventType::PeriodEnd,
                    minute,
                    Some(previous.phase.as_str().to_owned()),
                    None,
                    format!("Break: {}", current.phase),
                    0.9,
                    current.score.home,
                    current.score.away,
                ));
            } else {
                events.push(make_event(
                    match_id,
                    EventType::PeriodEnd,
                    minute,
                    Some(previous.phase.as_str().to_owned()),
                    None,
                    format!("Period ended: {}", previous.phase),
                    0.85,
                    current.score.home,
                    current.score.away,
                ));
                events.push(make_event(
                    match_id,
                    EventType::PeriodStart,
                    minute,
                    Some(current.phase.as_str().to_owned()),
                    None,
                    format!("Period started: {}", current.phase),
                    0.85,
                    current.score.home,
                    current.score.away,
                ));
            }
        }
    }

    events.extend(score_change_events(match_id, sport, previous, current, minute));
    events
}

fn score_change_events(
    match_id: Uuid,
    sport: Sport,
    previous: &Scoreboard,
    current: &Scoreboard,
    minute: Option<i32>,
) -> Vec<MatchEvent> {
    let mut events = Vec::new();
    let home_delta = current.score.home - previous.score.home;
    let away_delta = current.score.away - previous.score.away;
    if home_delta <= 0 && away_delta <= 0 {
        return events;
    }

    let event_type = scoring_event_type(sport);
    let total_delta = home_delta.max(0) + away_delta.max(0);
    // One update carrying several increments is a vaguer signal.
    let confidence = (0.7 - 0.1 * f64::from((total_delta - 1).max(0))).max(MIN_CONFIDENCE);

    for i in 0..home_delta.max(0) {
        let score_home = previous.score.home + i + 1;
        events.push(make_event(
            match_id,
            event_type,
            minute,
            None,
            Some(current.home_team.id),
            format!("Home team scored ({score_home}-{})", current.score.away),
            confidence,
            score_home,
            current.score.away,
        ));
    }
    for i in 0..away_delta.max(0) {
        let score_away = previous.score.away + i + 1;
        events.push(make_event(
            match_id,
            event_type,
            minute,
            None,
            Some(current.away_team.id),
            format!("Away team scored ({}-{score_away})", current.score.home),
            confidence,
            current.score.home,
            score_away,
        ));
    }
    events
}

#[cfg(test)]
mod tests {
    use super::*;
    use lv_model::{LeagueRef, MatchPhase, Score, ScoreboardExtra, TeamRef};

    fn board(score_home: i32, score_away: i32, phase: MatchPhase, clock: Option<&str>) -> Scoreboard {
        Scoreboard {
            match_id: Uuid::nil(),
            league: LeagueRef {
                id: Uuid::nil(),
                name: "League".into(),
                sport: Sport::Soccer,
                country: "X".into(),
                logo_url: None,
            },
            home_team: TeamRef {
                id: Uuid::from_u128(1),
                name: "Home".into(),
                short_name: "HOM".into(),
                logo_url: None,
            },
            away_team: TeamRef {
                id: Uuid::from_u128(2),
                name: "Away".into(),
                short_name: "AWA".into(),
                logo_url: None,
            },
            score: Score::new(score_home, score_away),
            phase,
            clock: clock.map(ToOwned::to_owned),
            period: None,
            start_time: Utc::now(),
            extra: ScoreboardExtra::default(),
            version: 0,
            seq: 0,
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn first_live_sighting_emits_match_start() {
        let current = board(0, 0, MatchPhase::LiveFirstHalf, Some("1'"));
        let events = generate(Uuid::nil(), Sport::Soccer, None, &current);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, EventType::MatchStart);
        assert_eq!(events[0].minute, Some(0));
        assert!(events[0].confidence.unwrap() >= 0.9);
        assert!(events[0].synthetic);
        assert!(events[0]
            .provider_event_id
            .as_deref()
            .unwrap()
            .starts_with("synthetic:"));
    }

    #[test]
    fn first_sighting_of_scheduled_match_is_silent() {
        let current = board(0, 0, MatchPhase::Scheduled, None);
        assert!(generate(Uuid::nil(), Sport::Soccer, None, &current).is_empty());
    }

    #[test]
    fn single_goal_emits_one_event_with_running_score() {
        let prev = board(0, 0, MatchPhase::LiveFirstHalf, Some("22'"));
        let curr = board(1, 0, MatchPhase::LiveFirstHalf, Some("23'"));
        let events = generate(Uuid::nil(), Sport::Soccer, Some(&prev), &curr);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, EventType::Goal);
        assert_eq!(events[0].score_home, Some(1));
        assert_eq!(events[0].score_away, Some(0));
        assert_eq!(events[0].team_id, Some(Uuid::from_u128(1)));
        assert_eq!(events[0].minute, Some(23));
        assert!((events[0].confidence.unwrap() - 0.7).abs() < 1e-9);
    }

    #[test]
    fn both_teams_scoring_emits_one_event_each_with_reduced_confidence() {
        // 1-0 -> 2-1: home crossed 1->2 and away 0->1 in one update.
        let prev = board(1, 0, MatchPhase::LiveSecondHalf, Some("60'"));
        let curr = board(2, 1, MatchPhase::LiveSecondHalf, Some("61'"));
        let events = generate(Uuid::nil(), Sport::Soccer, Some(&prev), &curr);
        assert_eq!(events.len(), 2);
        let home_goal = events.iter().find(|e| e.team_id == Some(Uuid::from_u128(1))).unwrap();
        let away_goal = events.iter().find(|e| e.team_id == Some(Uuid::from_u128(2))).unwrap();
        assert_eq!(home_goal.score_home, Some(2));
        assert_eq!(away_goal.score_away, Some(1));
        // total_delta 2 -> 0.7 - 0.1
        assert!((home_goal.confidence.unwrap() - 0.6).abs() < 1e-9);
    }

    #[test]
    fn big_score_jump_floors_confidence() {
        let prev = board(0, 0, MatchPhase::LiveQ1, None);
        let mut curr = board(6, 0, MatchPhase::LiveQ1, None);
        curr.home_team.id = Uuid::from_u128(1);
        let events = generate(Uuid::nil(), Sport::Basketball, Some(&prev), &curr);
        assert_eq!(events.len(), 6);
        assert!(events.iter().all(|e| e.event_type == EventType::Basket));
        assert!((events[0].confidence.unwrap() - MIN_CONFIDENCE).abs() < 1e-9);
    }

    #[test]
    fn kickoff_transition_emits_match_start() {
        let prev = board(0, 0, MatchPhase::PreMatch, None);
        let curr = board(0, 0, MatchPhase::LiveFirstHalf, Some("1'"));
        let events = generate(Uuid::nil(), Sport::Soccer, Some(&prev), &curr);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, EventType::MatchStart);
        assert!((events[0].confidence.unwrap() - 0.95).abs() < 1e-9);
    }

    #[test]
    fn full_time_emits_match_end() {
        let prev = board(2, 1, MatchPhase::LiveSecondHalf, Some("90+3'"));
        let curr = board(2, 1, MatchPhase::Finished, None);
        let events = generate(Uuid::nil(), Sport::Soccer, Some(&prev), &curr);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, EventType::MatchEnd);
    }

    #[test]
    fn halftime_emits_single_period_end() {
        let prev = board(1, 0, MatchPhase::LiveFirstHalf, Some("45+2'"));
        let curr = board(1, 0, MatchPhase::LiveHalftime, None);
        let events = generate(Uuid::nil(), Sport::Soccer, Some(&prev), &curr);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, EventType::PeriodEnd);
        assert!((events[0].confidence.unwrap() - 0.9).abs() < 1e-9);
    }

    #[test]
    fn quarter_rollover_emits_end_then_start() {
        let prev = board(20, 18, MatchPhase::LiveQ1, None);
        let curr = board(20, 18, MatchPhase::LiveQ2, None);
        let events = generate(Uuid::nil(), Sport::Basketball, Some(&prev), &curr);
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].event_type, EventType::PeriodEnd);
        assert_eq!(events[1].event_type, EventType::PeriodStart);
        assert_eq!(events[0].period.as_deref(), Some("live_q1"));
        assert_eq!(events[1].period.as_deref(), Some("live_q2"));
    }

    #[test]
    fn goal_during_phase_change_emits_both() {
        let prev = board(0, 0, MatchPhase::LiveFirstHalf, Some("45'"));
        let curr = board(1, 0, MatchPhase::LiveSecondHalf, Some("46'"));
        let events = generate(Uuid::nil(), Sport::Soccer, Some(&prev), &curr);
        let types: Vec<EventType> = events.iter().map(|e| e.event_type).collect();
        assert!(types.contains(&EventType::PeriodEnd));
        assert!(types.contains(&EventType::PeriodStart));
        assert!(types.contains(&EventType::Goal));
    }

    #[test]
    fn score_decrease_is_ignored() {
        // Provider corrections flow through the verifier, not the builder.
        let prev = board(2, 0, MatchPhase::LiveSecondHalf, None);
        let curr = board(1, 0, MatchPhase::LiveSecondHalf, None);
        assert!(generate(Uuid::nil(), Sport::Soccer, Some(&prev), &curr).is_empty());
    }
}
