//! Provider status -> `MatchPhase` mapping tables.
//!
//! Each provider reports liveness in its own vocabulary; these are the
//! per-sport translations.  The clock and period act as tie-breakers where
//! the status string alone is ambiguous (soccer halves, basketball overtime).

use lv_model::{parse_clock_minute, MatchPhase, Sport};

/// ESPN `status.type.state` + `status.type.detail` to canonical phase.
///
/// `period` is ESPN's numeric period counter when present; basketball and
/// football report overtime as period > 4.
pub fn espn_phase(
    state: &str,
    detail: &str,
    sport: Sport,
    clock: Option<&str>,
    period: Option<i64>,
) -> MatchPhase {
    let state = state.to_ascii_lowercase();
    let detail = detail.to_ascii_lowercase();

    match state.as_str() {
        "pre" => return MatchPhase::Scheduled,
        "post" => {
            if detail.contains("postponed") {
                return MatchPhase::Postponed;
            }
            if detail.contains("cancel") {
                return MatchPhase::Cancelled;
            }
            return MatchPhase::Finished;
        }
        "postponed" => return MatchPhase::Postponed,
        "cancelled" | "canceled" => return MatchPhase::Cancelled,
        "suspended" | "delayed" => return MatchPhase::Suspended,
        _ => {}
    }

    if state != "in" {
        return MatchPhase::Scheduled;
    }

    match sport {
        Sport::Soccer => soccer_live_phase(&detail, clock),
        Sport::Basketball | Sport::Football => quarter_live_phase(&detail, period),
        Sport::Hockey => hockey_live_phase(&detail, period),
        Sport::Baseball => MatchPhase::LiveInning,
    }
}

fn soccer_live_phase(detail: &str, clock: Option<&str>) -> MatchPhase {
    if detail.contains("halftime") || (detail.contains("half") && detail.contains("time")) {
        return MatchPhase::LiveHalftime;
    }
    if detail.contains("2nd half") || (detail.contains("half") && detail.contains('2')) {
        return MatchPhase::LiveSecondHalf;
    }
    if detail.contains("extra") {
        return MatchPhase::LiveExtraTime;
    }
    if detail.contains("penal") {
        return MatchPhase::LivePenalties;
    }
    // Status detail is often just the clock; infer the half from the minute.
    if let Some(minute) = clock.and_then(parse_clock_minute) {
        if minute > 90 {
            return MatchPhase::LiveExtraTime;
        }
        if minute > 45 {
            return MatchPhase::LiveSecondHalf;
        }
    }
    MatchPhase::LiveFirstHalf
}

fn quarter_live_phase(detail: &str, period: Option<i64>) -> MatchPhase {
    if let Some(p) = period {
        if p > 4 {
            return MatchPhase::LiveOt;
        }
    }
    if detail.contains("ot") || detail.contains("overtime") {
        return MatchPhase::LiveOt;
    }
    if detail.contains("half") {
        return MatchPhase::Break;
    }
    match period {
        Some(1) => MatchPhase::LiveQ1,
        Some(2) => MatchPhase::LiveQ2,
        Some(3) => MatchPhase::LiveQ3,
        Some(4) => MatchPhase::LiveQ4,
        _ => {
            if detail.contains("1st") {
                MatchPhase::LiveQ1
            } else if detail.contains("2nd") {
                MatchPhase::LiveQ2
            } else if detail.contains("3rd") {
                MatchPhase::LiveQ3
            } else if detail.contains("4th") {
                MatchPhase::LiveQ4
            } else {
                MatchPhase::LiveQ1
            }
        }
    }
}

fn hockey_live_phase(detail: &str, period: Option<i64>) -> MatchPhase {
    if let Some(p) = period {
        if p > 3 {
            return MatchPhase::LiveOt;
        }
    }
    if detail.contains("ot") || detail.contains("overtime") {
        return MatchPhase::LiveOt;
    }
    match period {
        Some(1) => MatchPhase::LiveP1,
        Some(2) => MatchPhase::LiveP2,
        Some(3) => MatchPhase::LiveP3,
        _ => {
            if detail.contains("1st") {
                MatchPhase::LiveP1
            } else if detail.contains("2nd") {
                MatchPhase::LiveP2
            } else if detail.contains("3rd") {
                MatchPhase::LiveP3
            } else {
                MatchPhase::LiveP1
            }
        }
    }
}

/// TheSportsDB free-form status strings.
pub fn thesportsdb_phase(status: &str, minute: Option<i32>) -> MatchPhase {
    match status.to_ascii_lowercase().as_str() {
        "not started" | "ns" => MatchPhase::Scheduled,
        "half time" | "halftime" | "ht" => MatchPhase::LiveHalftime,
        "match finished" | "finished" | "ft" | "aet" | "pen" => MatchPhase::Finished,
        "postponed" => MatchPhase::Postponed,
        "cancelled" | "canceled" => MatchPhase::Cancelled,
        "suspended" | "interrupted" => MatchPhase::Suspended,
        _ => match minute {
            Some(m) if m > 90 => MatchPhase::LiveExtraTime,
            Some(m) if m > 45 => MatchPhase::LiveSecondHalf,
            _ => MatchPhase::LiveFirstHalf,
        },
    }
}

/// football-data.org match status values.
pub fn football_data_phase(status: &str, minute: Option<i32>) -> MatchPhase {
    match status {
        "SCHEDULED" | "TIMED" => MatchPhase::Scheduled,
        "IN_PLAY" | "LIVE" => match minute {
            Some(m) if m > 90 => MatchPhase::LiveExtraTime,
            Some(m) if m > 45 => MatchPhase::LiveSecondHalf,
            _ => MatchPhase::LiveFirstHalf,
        },
        "PAUSED" => MatchPhase::LiveHalftime,
        "FINISHED" | "AWARDED" => MatchPhase::Finished,
        "POSTPONED" => MatchPhase::Postponed,
        "SUSPENDED" => MatchPhase::Suspended,
        "CANCELLED" => MatchPhase::Cancelled,
        _ => MatchPhase::Scheduled,
    }
}

/// Sportradar sport event status values.
pub fn sportradar_phase(status: &str) -> MatchPhase {
    match status {
        "not_started" | "created" => MatchPhase::Scheduled,
        "1st_half" => MatchPhase::LiveFirstHalf,
        "halftime" => MatchPhase::LiveHalftime,
        "2nd_half" => MatchPhase::LiveSecondHalf,
        "overtime" | "1st_extra" | "2nd_extra" => MatchPhase::LiveExtraTime,
        "penalties" => MatchPhase::LivePenalties,
        "pause" => MatchPhase::Break,
        "live" => MatchPhase::LiveFirstHalf,
        "interrupted" | "suspended" | "delayed" => MatchPhase::Suspended,
        "ended" | "closed" => MatchPhase::Finished,
        "postponed" => MatchPhase::Postponed,
        "cancelled" | "abandoned" => MatchPhase::Cancelled,
        _ => MatchPhase::Scheduled,
    }
}
