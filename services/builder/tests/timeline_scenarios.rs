// End-to-end synthetic timeline scenarios: a match observed only through
// scoreboard deltas, later reconciled against real provider events.

use chrono::Utc;
use uuid::Uuid;

use builder::reconcile::events_match;
use builder::synthetic;
use lv_model::{
    EventType, LeagueRef, MatchEvent, MatchPhase, ProviderName, Score, Scoreboard,
    ScoreboardExtra, Sport, TeamRef,
};
use lv_store::repo::events::SyntheticEventRow;

const HOME: u128 = 0xa1;
const AWAY: u128 = 0xb2;

fn board(score_home: i32, score_away: i32, phase: MatchPhase, clock: &str) -> Scoreboard {
    Scoreboard {
        match_id: Uuid::nil(),
        league: LeagueRef {
            id: Uuid::nil(),
            name: "Premier League".into(),
            sport: Sport::Soccer,
            country: "England".into(),
            logo_url: None,
        },
        home_team: TeamRef {
            id: Uuid::from_u128(HOME),
            name: "Arsenal".into(),
            short_name: "ARS".into(),
            logo_url: None,
        },
        away_team: TeamRef {
            id: Uuid::from_u128(AWAY),
            name: "Chelsea".into(),
            short_name: "CHE".into(),
            logo_url: None,
        },
        score: Score::new(score_home, score_away),
        phase,
        clock: Some(clock.to_owned()),
        period: None,
        start_time: Utc::now(),
        extra: ScoreboardExtra::default(),
        version: 0,
        seq: 0,
        updated_at: Utc::now(),
    }
}

fn as_row(event: &MatchEvent) -> SyntheticEventRow {
    SyntheticEventRow {
        id: event.id,
        event_type: event.event_type,
        minute: event.minute,
        team_id: event.team_id,
        score_home: event.score_home,
        score_away: event.score_away,
    }
}

fn real_goal(minute: i32, team: Uuid, score_home: i32, score_away: i32) -> MatchEvent {
    MatchEvent {
        id: Uuid::new_v4(),
        match_id: Uuid::nil(),
        event_type: EventType::Goal,
        minute: Some(minute),
        second: None,
        period: None,
        team_id: Some(team),
        player_name: Some("Saka".into()),
        detail: None,
        score_home: Some(score_home),
        score_away: Some(score_away),
        synthetic: false,
        confidence: None,
        source_provider: Some(ProviderName::Espn),
        provider_event_id: Some("espn:9901".into()),
        seq: 0,
        created_at: Utc::now(),
    }
}

#[test]
fn cold_match_first_live_update_emits_match_start() {
    // Empty state, first observation arrives already live at 0-0.
    let current = board(0, 0, MatchPhase::LiveFirstHalf, "1'");
    let events = synthetic::generate(Uuid::nil(), Sport::Soccer, None, &current);

    assert_eq!(events.len(), 1);
    let start = &events[0];
    assert_eq!(start.event_type, EventType::MatchStart);
    assert!(start.confidence.unwrap() >= 0.9);
    assert!(start.synthetic);
    assert_eq!(start.minute, Some(0));
}

#[test]
fn two_consecutive_goal_updates_then_real_event_supersedes() {
    let match_id = Uuid::nil();

    // 0-0 live, then 1-0: exactly one home goal.
    let step0 = board(0, 0, MatchPhase::LiveFirstHalf, "20'");
    let step1 = board(1, 0, MatchPhase::LiveFirstHalf, "23'");
    let first = synthetic::generate(match_id, Sport::Soccer, Some(&step0), &step1);
    assert_eq!(first.len(), 1);
    assert_eq!(first[0].event_type, EventType::Goal);
    assert_eq!(first[0].team_id, Some(Uuid::from_u128(HOME)));
    assert_eq!((first[0].score_home, first[0].score_away), (Some(1), Some(0)));

    // 1-0 then 2-1: one goal each way, reduced confidence.
    let step2 = board(2, 1, MatchPhase::LiveSecondHalf, "61'");
    let second = synthetic::generate(match_id, Sport::Soccer, Some(&step1), &step2);
    let goals: Vec<&MatchEvent> = second
        .iter()
        .filter(|e| e.event_type == EventType::Goal)
        .collect();
    assert_eq!(goals.len(), 2);
    assert!(goals.iter().any(|g| g.team_id == Some(Uuid::from_u128(HOME))
        && g.score_home == Some(2)));
    assert!(goals.iter().any(|g| g.team_id == Some(Uuid::from_u128(AWAY))
        && g.score_away == Some(1)));
    assert!(goals.iter().all(|g| g.confidence.unwrap() < 0.7));

    // A real GOAL at minute 23, home, score (1,0) retires exactly the first
    // synthetic goal and none of the later ones.
    let mut synthetic_rows: Vec<SyntheticEventRow> = first
        .iter()
        .chain(second.iter())
        .filter(|e| e.event_type == EventType::Goal)
        .map(as_row)
        .collect();

    let real = real_goal(23, Uuid::from_u128(HOME), 1, 0);
    let matches: Vec<usize> = synthetic_rows
        .iter()
        .enumerate()
        .filter(|(_, s)| events_match(&real, s))
        .map(|(i, _)| i)
        .collect();
    assert_eq!(matches.len(), 1, "exactly one synthetic goal is superseded");
    let superseded = synthetic_rows.remove(matches[0]);
    assert_eq!((superseded.score_home, superseded.score_away), (Some(1), Some(0)));

    // The remaining synthetic goals survive this real event.
    assert!(synthetic_rows.iter().all(|s| !events_match(&real, s)));
}

#[test]
fn phase_rollover_and_goal_reconcile_on_minute_window() {
    let match_id = Uuid::nil();
    let prev = board(1, 0, MatchPhase::LiveFirstHalf, "45+2'");
    let curr = board(1, 0, MatchPhase::LiveHalftime, "45+3'");
    let events = synthetic::generate(match_id, Sport::Soccer, Some(&prev), &curr);
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].event_type, EventType::PeriodEnd);

    // A real PERIOD_END within five minutes matches; one far away does not.
    let row = as_row(&events[0]);
    let mut near = real_goal(46, Uuid::from_u128(HOME), 1, 0);
    near.event_type = EventType::PeriodEnd;
    near.team_id = None;
    assert!(events_match(&near, &row));

    let mut far = near.clone();
    far.minute = Some(60);
    assert!(!events_match(&far, &row));
}
