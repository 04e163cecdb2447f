//! Reconciliation of synthetic events against real provider events.
//!
//! A real event supersedes at most one synthetic event; supersedence deletes
//! the synthetic row, leaving the authoritative record as the single visible
//! event.

use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use lv_model::MatchEvent;
use lv_store::repo::events::{self, SyntheticEventRow};

/// How many of the most recent synthetic events to consider per match.
const SCAN_LIMIT: i64 = 50;
/// Maximum minute drift for phase-boundary matches.
const MINUTE_WINDOW: i32 = 5;

/// Does `real` supersede `synth`?
///
/// Scoring events must agree on the resulting score and, when both sides
/// name a team, on the team.  Phase-boundary events match on type with the
/// minutes within a small window.
pub fn events_match(real: &MatchEvent, synth: &SyntheticEventRow) -> bool {
    if real.event_type != synth.event_type {
        return false;
    }

    if real.event_type.is_scoring() {
        if real.score_home != synth.score_home || real.score_away != synth.score_away {
            return false;
        }
        if let (Some(real_team), Some(synth_team)) = (real.team_id, synth.team_id) {
            if real_team != synth_team {
                return false;
            }
        }
    }

    if real.event_type.is_phase_boundary() {
        if let (Some(real_minute), Some(synth_minute)) = (real.minute, synth.minute) {
            if (real_minute - synth_minute).abs() > MINUTE_WINDOW {
                return false;
            }
        }
    }

    true
}

pub struct ReconcileEngine {
    pool: PgPool,
}

impl ReconcileEngine {
    pub fn new(pool: PgPool) -> ReconcileEngine {
        ReconcileEngine { pool }
    }

    /// Retire synthetic events superseded by this batch of real events.
    /// Returns the number deleted.
    pub async fn reconcile(
        &self,
        match_id: Uuid,
        real_events: &[MatchEvent],
    ) -> Result<usize, sqlx::Error> {
        if real_events.is_empty() {
            return Ok(0);
        }

        let mut synthetic = events::recent_synthetic(&self.pool, match_id, SCAN_LIMIT).await?;
        if synthetic.is_empty() {
            return Ok(0);
        }

        let mut superseded = 0usize;
        for real in real_events {
            let Some(pos) = synthetic.iter().position(|s| events_match(real, s)) else {
                continue;
            };
            let victim = synthetic.remove(pos);
            if events::delete_synthetic(&self.pool, victim.id).await? {
                superseded += 1;
                info!(match_id = %match_id, synthetic_event_id = %victim.id,
                      real_event_type = %real.event_type,
                      real_provider_event_id = real.provider_event_id.as_deref().unwrap_or(""),
                      "synthetic event superseded");
            }
        }
        Ok(superseded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use lv_model::{EventType, ProviderName};

    fn real(event_type: EventType) -> MatchEvent {
        MatchEvent {
            id: Uuid::new_v4(),
            match_id: Uuid::nil(),
            event_type,
            minute: None,
            second: None,
            period: None,
            team_id: None,
            player_name: None,
            detail: None,
            score_home: None,
            score_away: None,
            synthetic: false,
            confidence: None,
            source_provider: Some(ProviderName::Espn),
            provider_event_id: Some("e1".into()),
            seq: 1,
            created_at: Utc::now(),
        }
    }

    fn synth(event_type: EventType) -> SyntheticEventRow {
        SyntheticEventRow {
            id: Uuid::new_v4(),
            event_type,
            minute: None,
            team_id: None,
            score_home: None,
            score_away: None,
        }
    }

    #[test]
    fn scoring_match_requires_same_score() {
        let mut goal = real(EventType::Goal);
        goal.score_home = Some(1);
        goal.score_away = Some(0);
        goal.minute = Some(23);
        goal.team_id = Some(Uuid::from_u128(1));

        let mut s = synth(EventType::Goal);
        s.score_home = Some(1);
        s.score_away = Some(0);
        s.team_id = Some(Uuid::from_u128(1));
        assert!(events_match(&goal, &s));

        s.score_away = Some(1);
        assert!(!events_match(&goal, &s));
    }

    #[test]
    fn scoring_match_respects_team_when_both_present() {
        let mut goal = real(EventType::Goal);
        goal.score_home = Some(2);
        goal.score_away = Some(1);
        goal.team_id = Some(Uuid::from_u128(1));

        let mut s = synth(EventType::Goal);
        s.score_home = Some(2);
        s.score_away = Some(1);
        s.team_id = Some(Uuid::from_u128(2));
        assert!(!events_match(&goal, &s));

        // A side missing its team attribution still matches on score.
        s.team_id = None;
        assert!(events_match(&goal, &s));
    }

    #[test]
    fn different_types_never_match() {
        let goal = real(EventType::Goal);
        let s = synth(EventType::Basket);
        assert!(!events_match(&goal, &s));
    }

    #[test]
    fn phase_events_match_within_five_minutes() {
        let mut end = real(EventType::PeriodEnd);
        end.minute = Some(45);

        let mut s = synth(EventType::PeriodEnd);
        s.minute = Some(48);
        assert!(events_match(&end, &s));

        s.minute = Some(52);
        assert!(!events_match(&end, &s));

        // Missing minutes fall back to a type-only match.
        s.minute = None;
        assert!(events_match(&end, &s));
    }
}
