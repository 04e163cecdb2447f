// lv-normalize: the single write path into the canonical store.
//
// Every mutation is versioned, idempotent, and transactional: the DB commit
// happens before any snapshot write or delta publish, and cache/bus failures
// after commit are logged rather than retried (consumers converge on the
// next normalization, and replay-on-subscribe covers new clients).
//
// The ingest service and the verifier both go through this crate; nothing
// else writes MatchState, Match phase, MatchStats, or appends MatchEvents.

use std::time::Duration;

use chrono::Utc;
use sqlx::PgPool;
use thiserror::Error;
use tracing::{error, info, warn};
use uuid::Uuid;

use lv_bus::Bus;
use lv_model::{keys, MatchEvent, MatchStatsPayload, ProviderName, Scoreboard, Tier};
use lv_store::repo::{events, matches, state, stats};
use lv_store::repo::state::{MatchStateRow, StateWrite};

/// Snapshot TTL; long enough to bridge poll gaps, short enough that a dead
/// match's cache entries age out on their own.
const SNAPSHOT_TTL: Duration = Duration::from_secs(300);

#[derive(Debug, Error)]
pub enum NormalizeError {
    #[error("database: {0}")]
    Db(#[from] sqlx::Error),
    #[error("invariant violation: {0}")]
    Invariant(String),
    #[error("serialization: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Why a scoreboard write was rejected, if it was.
fn scoreboard_guard(existing: &MatchStateRow, incoming: &Scoreboard) -> Result<(), String> {
    if existing.phase.is_terminal() && !incoming.phase.is_terminal() {
        return Err(format!(
            "phase regression {} -> {}",
            existing.phase, incoming.phase
        ));
    }
    if incoming.score.home < existing.score_home || incoming.score.away < existing.score_away {
        return Err(format!(
            "score decrease {}-{} -> {}-{}",
            existing.score_home, existing.score_away, incoming.score.home, incoming.score.away
        ));
    }
    Ok(())
}

/// True when the observable tier-0 tuple changed.
fn scoreboard_changed(existing: &MatchStateRow, incoming: &Scoreboard) -> bool {
    existing.score_home != incoming.score.home
        || existing.score_away != incoming.score.away
        || existing.phase != incoming.phase
        || existing.clock != incoming.clock
}

#[derive(Clone)]
pub struct Normalizer {
    pool: PgPool,
    bus: Bus,
}

impl Normalizer {
    pub fn new(pool: PgPool, bus: Bus) -> Normalizer {
        Normalizer { pool, bus }
    }

    // -- Tier 0 ------------------------------------------------------------

    /// Persist a scoreboard observation.  Returns `true` when state changed
    /// and a delta was published, `false` for a no-op.
    pub async fn normalize_scoreboard(
        &self,
        canonical_match_id: Uuid,
        scoreboard: &Scoreboard,
        provider: ProviderName,
    ) -> Result<bool, NormalizeError> {
        let mut tx = self.pool.begin().await?;

        let existing = state::get(&mut *tx, canonical_match_id).await?;
        let (new_version, new_seq) = match &existing {
            Some(row) => {
                if !scoreboard_changed(row, scoreboard) {
                    return Ok(false);
                }
                if let Err(reason) = scoreboard_guard(row, scoreboard) {
                    error!(match_id = %canonical_match_id, provider = %provider, %reason,
                           "scoreboard update rejected");
                    tx.rollback().await?;
                    return Err(NormalizeError::Invariant(reason));
                }
                (row.version + 1, row.seq + 1)
            }
            None => (1, 1),
        };

        let write = StateWrite {
            score_home: scoreboard.score.home,
            score_away: scoreboard.score.away,
            score_breakdown: serde_json::to_value(&scoreboard.score.breakdown)?,
            clock: scoreboard.clock.clone(),
            phase: scoreboard.phase,
            period: scoreboard.period.clone(),
            extra: serde_json::to_value(&scoreboard.extra)?,
            version: new_version,
            seq: new_seq,
        };
        state::upsert(&mut tx, canonical_match_id, &write).await?;
        matches::set_phase(&mut tx, canonical_match_id, scoreboard.phase, new_version).await?;
        tx.commit().await?;

        // DB is the source of truth from here on; cache/bus failures only log.
        let mut published = scoreboard.clone();
        published.match_id = canonical_match_id;
        published.version = new_version;
        published.seq = new_seq;
        published.updated_at = Utc::now();
        let json = serde_json::to_string(&published)?;

        let snap_key = keys::snapshot_key(canonical_match_id, Tier::Scoreboard);
        if let Err(err) = self.bus.set_snapshot(&snap_key, &json, SNAPSHOT_TTL).await {
            warn!(match_id = %canonical_match_id, error = %err, "scoreboard snapshot write failed");
        }
        if let Err(err) = self
            .bus
            .publish_delta(canonical_match_id, Tier::Scoreboard, &json)
            .await
        {
            warn!(match_id = %canonical_match_id, error = %err, "scoreboard delta publish failed");
        }

        info!(match_id = %canonical_match_id, provider = %provider,
              score = format!("{}-{}", scoreboard.score.home, scoreboard.score.away),
              phase = %scoreboard.phase, version = new_version, "scoreboard normalized");
        Ok(true)
    }

    // -- Tier 1 ------------------------------------------------------------

    /// Append new events.  Duplicates (by provider event identity) are
    /// dropped; accepted events get the next per-match seq.  Returns the
    /// accepted events with their assigned seqs.
    pub async fn normalize_events(
        &self,
        canonical_match_id: Uuid,
        incoming: Vec<MatchEvent>,
        provider: ProviderName,
    ) -> Result<Vec<MatchEvent>, NormalizeError> {
        if incoming.is_empty() {
            return Ok(Vec::new());
        }

        let mut tx = self.pool.begin().await?;
        let mut accepted = Vec::new();
        for mut event in incoming {
            event.match_id = canonical_match_id;
            if event.source_provider.is_none() && !event.synthetic {
                event.source_provider = Some(provider);
            }
            if event
                .provider_event_id
                .as_deref()
                .map_or(true, str::is_empty)
            {
                event.provider_event_id = Some(Uuid::new_v4().to_string());
            }
            if let Some(seq) = events::insert_if_absent(&mut tx, &event).await? {
                event.seq = seq;
                accepted.push(event);
            }
        }
        tx.commit().await?;

        if accepted.is_empty() {
            return Ok(accepted);
        }

        for event in &accepted {
            match serde_json::to_string(event) {
                Ok(json) => {
                    if let Err(err) = self.bus.append_event_stream(canonical_match_id, &json).await
                    {
                        warn!(match_id = %canonical_match_id, error = %err,
                              "event stream append failed");
                    }
                }
                Err(err) => warn!(match_id = %canonical_match_id, error = %err,
                                  "event serialization failed"),
            }
        }

        match serde_json::to_string(&accepted) {
            Ok(batch) => {
                if let Err(err) = self
                    .bus
                    .publish_delta(canonical_match_id, Tier::Events, &batch)
                    .await
                {
                    warn!(match_id = %canonical_match_id, error = %err,
                          "events delta publish failed");
                }
            }
            Err(err) => warn!(match_id = %canonical_match_id, error = %err,
                              "events batch serialization failed"),
        }

        info!(match_id = %canonical_match_id, provider = %provider,
              new_count = accepted.len(), "events normalized");
        Ok(accepted)
    }

    // -- Tier 2 ------------------------------------------------------------

    /// Persist a stats observation; no-op unless the normalized blobs differ
    /// structurally.
    pub async fn normalize_stats(
        &self,
        canonical_match_id: Uuid,
        incoming: &MatchStatsPayload,
        provider: ProviderName,
    ) -> Result<bool, NormalizeError> {
        let home = serde_json::to_value(&incoming.home_stats)?;
        let away = serde_json::to_value(&incoming.away_stats)?;

        let mut tx = self.pool.begin().await?;
        let existing = stats::get(&mut *tx, canonical_match_id).await?;
        let (new_version, new_seq) = match &existing {
            Some(row) => {
                if row.home_stats == home && row.away_stats == away {
                    return Ok(false);
                }
                (row.version + 1, row.seq + 1)
            }
            None => (1, 1),
        };
        stats::upsert(&mut tx, canonical_match_id, &home, &away, new_version, new_seq).await?;
        tx.commit().await?;

        let mut published = incoming.clone();
        published.match_id = canonical_match_id;
        published.version = new_version;
        published.seq = new_seq;
        published.updated_at = Utc::now();
        let json = serde_json::to_string(&published)?;

        let snap_key = keys::snapshot_key(canonical_match_id, Tier::Stats);
        if let Err(err) = self.bus.set_snapshot(&snap_key, &json, SNAPSHOT_TTL).await {
            warn!(match_id = %canonical_match_id, error = %err, "stats snapshot write failed");
        }
        if let Err(err) = self
            .bus
            .publish_delta(canonical_match_id, Tier::Stats, &json)
            .await
        {
            warn!(match_id = %canonical_match_id, error = %err, "stats delta publish failed");
        }

        info!(match_id = %canonical_match_id, provider = %provider, version = new_version,
              "stats normalized");
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lv_model::{MatchPhase, Score};

    fn state_row(score_home: i32, score_away: i32, phase: MatchPhase, clock: &str) -> MatchStateRow {
        MatchStateRow {
            match_id: Uuid::nil(),
            score_home,
            score_away,
            score_breakdown: serde_json::json!([]),
            clock: Some(clock.to_owned()),
            phase,
            period: None,
            extra: serde_json::json!({}),
            version: 3,
            seq: 3,
            updated_at: Utc::now(),
        }
    }

    fn board(score_home: i32, score_away: i32, phase: MatchPhase, clock: &str) -> Scoreboard {
        Scoreboard {
            match_id: Uuid::nil(),
            league: lv_model::LeagueRef {
                id: Uuid::nil(),
                name: "L".into(),
                sport: lv_model::Sport::Soccer,
                country: "X".into(),
                logo_url: None,
            },
            home_team: lv_model::TeamRef {
                id: Uuid::nil(),
                name: "H".into(),
                short_name: "H".into(),
                logo_url: None,
            },
            away_team: lv_model::TeamRef {
                id: Uuid::nil(),
                name: "A".into(),
                short_name: "A".into(),
                logo_url: None,
            },
            score: Score::new(score_home, score_away),
            phase,
            clock: Some(clock.to_owned()),
            period: None,
            start_time: Utc::now(),
            extra: lv_model::ScoreboardExtra::default(),
            version: 0,
            seq: 0,
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn unchanged_tuple_is_a_noop() {
        let row = state_row(1, 0, MatchPhase::LiveFirstHalf, "30'");
        let incoming = board(1, 0, MatchPhase::LiveFirstHalf, "30'");
        assert!(!scoreboard_changed(&row, &incoming));
        // Any component change flips it.
        assert!(scoreboard_changed(&row, &board(2, 0, MatchPhase::LiveFirstHalf, "30'")));
        assert!(scoreboard_changed(&row, &board(1, 0, MatchPhase::LiveHalftime, "30'")));
        assert!(scoreboard_changed(&row, &board(1, 0, MatchPhase::LiveFirstHalf, "31'")));
    }

    #[test]
    fn score_decrease_is_rejected() {
        let row = state_row(2, 1, MatchPhase::LiveSecondHalf, "70'");
        let incoming = board(1, 1, MatchPhase::LiveSecondHalf, "71'");
        assert!(scoreboard_guard(&row, &incoming).is_err());
        let ok = board(2, 2, MatchPhase::LiveSecondHalf, "71'");
        assert!(scoreboard_guard(&row, &ok).is_ok());
    }

    #[test]
    fn terminal_phase_never_reopens() {
        let row = state_row(2, 1, MatchPhase::Finished, "90'");
        let incoming = board(2, 1, MatchPhase::LiveSecondHalf, "85'");
        assert!(scoreboard_guard(&row, &incoming).is_err());
        // Terminal to terminal is fine (e.g. score confirmation).
        let confirm = board(2, 1, MatchPhase::Finished, "90'");
        assert!(scoreboard_guard(&row, &confirm).is_ok());
    }
}
