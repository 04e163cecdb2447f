use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Sport
// ---------------------------------------------------------------------------

/// The sports the platform ingests.  Closed set; connectors advertise which
/// subset they support.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sport {
    Soccer,
    Basketball,
    Hockey,
    Baseball,
    Football,
}

impl Sport {
    pub const ALL: [Sport; 5] = [
        Sport::Soccer,
        Sport::Basketball,
        Sport::Hockey,
        Sport::Baseball,
        Sport::Football,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Sport::Soccer => "soccer",
            Sport::Basketball => "basketball",
            Sport::Hockey => "hockey",
            Sport::Baseball => "baseball",
            Sport::Football => "football",
        }
    }

    pub fn parse(s: &str) -> Option<Sport> {
        match s {
            "soccer" => Some(Sport::Soccer),
            "basketball" => Some(Sport::Basketball),
            "hockey" => Some(Sport::Hockey),
            "baseball" => Some(Sport::Baseball),
            "football" => Some(Sport::Football),
            _ => None,
        }
    }
}

impl std::fmt::Display for Sport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// MatchPhase
// ---------------------------------------------------------------------------

/// Lifecycle phase of a match.
///
/// Three disjoint subsets drive all scheduling and classification logic:
/// pre-live ({scheduled, pre_match}), live (`live_*` plus `break` plus
/// `suspended`), and terminal ({finished, postponed, cancelled}).  Terminal
/// phases are final for the purpose of polling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchPhase {
    Scheduled,
    PreMatch,
    LiveFirstHalf,
    LiveHalftime,
    LiveSecondHalf,
    LiveExtraTime,
    LivePenalties,
    LiveQ1,
    LiveQ2,
    LiveQ3,
    LiveQ4,
    LiveOt,
    LiveP1,
    LiveP2,
    LiveP3,
    LiveInning,
    Break,
    Suspended,
    Finished,
    Postponed,
    Cancelled,
}

impl MatchPhase {
    pub fn as_str(self) -> &'static str {
        match self {
            MatchPhase::Scheduled => "scheduled",
            MatchPhase::PreMatch => "pre_match",
            MatchPhase::LiveFirstHalf => "live_first_half",
            MatchPhase::LiveHalftime => "live_halftime",
            MatchPhase::LiveSecondHalf => "live_second_half",
            MatchPhase::LiveExtraTime => "live_extra_time",
            MatchPhase::LivePenalties => "live_penalties",
            MatchPhase::LiveQ1 => "live_q1",
            MatchPhase::LiveQ2 => "live_q2",
            MatchPhase::LiveQ3 => "live_q3",
            MatchPhase::LiveQ4 => "live_q4",
            MatchPhase::LiveOt => "live_ot",
            MatchPhase::LiveP1 => "live_p1",
            MatchPhase::LiveP2 => "live_p2",
            MatchPhase::LiveP3 => "live_p3",
            MatchPhase::LiveInning => "live_inning",
            MatchPhase::Break => "break",
            MatchPhase::Suspended => "suspended",
            MatchPhase::Finished => "finished",
            MatchPhase::Postponed => "postponed",
            MatchPhase::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<MatchPhase> {
        match s {
            "scheduled" => Some(MatchPhase::Scheduled),
            "pre_match" => Some(MatchPhase::PreMatch),
            "live_first_half" => Some(MatchPhase::LiveFirstHalf),
            "live_halftime" => Some(MatchPhase::LiveHalftime),
            "live_second_half" => Some(MatchPhase::LiveSecondHalf),
            "live_extra_time" => Some(MatchPhase::LiveExtraTime),
            "live_penalties" => Some(MatchPhase::LivePenalties),
            "live_q1" => Some(MatchPhase::LiveQ1),
            "live_q2" => Some(MatchPhase::LiveQ2),
            "live_q3" => Some(MatchPhase::LiveQ3),
            "live_q4" => Some(MatchPhase::LiveQ4),
            "live_ot" => Some(MatchPhase::LiveOt),
            "live_p1" => Some(MatchPhase::LiveP1),
            "live_p2" => Some(MatchPhase::LiveP2),
            "live_p3" => Some(MatchPhase::LiveP3),
            "live_inning" => Some(MatchPhase::LiveInning),
            "break" => Some(MatchPhase::Break),
            "suspended" => Some(MatchPhase::Suspended),
            "finished" => Some(MatchPhase::Finished),
            "postponed" => Some(MatchPhase::Postponed),
            "cancelled" => Some(MatchPhase::Cancelled),
            _ => None,
        }
    }

    /// True for every `live_*` phase plus `break` and `suspended`.
    pub fn is_live(self) -> bool {
        self.as_str().starts_with("live_")
            || matches!(self, MatchPhase::Break | MatchPhase::Suspended)
    }

    /// Terminal phases are final for the purpose of polling.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            MatchPhase::Finished | MatchPhase::Postponed | MatchPhase::Cancelled
        )
    }

    /// An intermission within a live match (halftime, period break).
    pub fn is_break(self) -> bool {
        matches!(self, MatchPhase::LiveHalftime | MatchPhase::Break)
    }
}

impl std::fmt::Display for MatchPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Tier
// ---------------------------------------------------------------------------

/// Granularity level of a match update: 0 = scoreboard, 1 = events,
/// 2 = stats.  Serialized as its integer value everywhere (commands,
/// channels, WS frames).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Tier {
    Scoreboard,
    Events,
    Stats,
}

impl Tier {
    pub const ALL: [Tier; 3] = [Tier::Scoreboard, Tier::Events, Tier::Stats];

    pub fn as_u8(self) -> u8 {
        match self {
            Tier::Scoreboard => 0,
            Tier::Events => 1,
            Tier::Stats => 2,
        }
    }

    pub fn from_u8(v: u8) -> Option<Tier> {
        match v {
            0 => Some(Tier::Scoreboard),
            1 => Some(Tier::Events),
            2 => Some(Tier::Stats),
            _ => None,
        }
    }

    /// The snapshot-key segment for this tier (`snap:match:{id}:{kind}`).
    pub fn snapshot_kind(self) -> &'static str {
        match self {
            Tier::Scoreboard => "scoreboard",
            Tier::Events => "events",
            Tier::Stats => "stats",
        }
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_u8())
    }
}

impl Serialize for Tier {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.as_u8())
    }
}

impl<'de> Deserialize<'de> for Tier {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let v = u8::deserialize(deserializer)?;
        Tier::from_u8(v).ok_or_else(|| serde::de::Error::custom(format!("invalid tier {v}")))
    }
}

// ---------------------------------------------------------------------------
// ProviderName
// ---------------------------------------------------------------------------

/// Third-party data providers in cascade order of preference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderName {
    Sportradar,
    Espn,
    FootballData,
    Thesportsdb,
}

impl ProviderName {
    pub const ALL: [ProviderName; 4] = [
        ProviderName::Sportradar,
        ProviderName::Espn,
        ProviderName::FootballData,
        ProviderName::Thesportsdb,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ProviderName::Sportradar => "sportradar",
            ProviderName::Espn => "espn",
            ProviderName::FootballData => "football_data",
            ProviderName::Thesportsdb => "thesportsdb",
        }
    }

    pub fn parse(s: &str) -> Option<ProviderName> {
        match s {
            "sportradar" => Some(ProviderName::Sportradar),
            "espn" => Some(ProviderName::Espn),
            "football_data" => Some(ProviderName::FootballData),
            "thesportsdb" => Some(ProviderName::Thesportsdb),
            _ => None,
        }
    }
}

impl std::fmt::Display for ProviderName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// EventType
// ---------------------------------------------------------------------------

/// Match event kinds across all supported sports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    Goal,
    Assist,
    YellowCard,
    RedCard,
    Substitution,
    Penalty,
    PenaltyMiss,
    OwnGoal,
    VarDecision,
    PeriodStart,
    PeriodEnd,
    MatchStart,
    MatchEnd,
    Shot,
    Foul,
    Corner,
    Offside,
    FreeKick,
    ThrowIn,
    Basket,
    ThreePointer,
    FreeThrow,
    Rebound,
    Turnover,
    Steal,
    Block,
    Hit,
    Run,
    Strikeout,
    HomeRun,
    Walk,
    Timeout,
    Generic,
}

impl EventType {
    pub fn as_str(self) -> &'static str {
        match self {
            EventType::Goal => "goal",
            EventType::Assist => "assist",
            EventType::YellowCard => "yellow_card",
            EventType::RedCard => "red_card",
            EventType::Substitution => "substitution",
            EventType::Penalty => "penalty",
            EventType::PenaltyMiss => "penalty_miss",
            EventType::OwnGoal => "own_goal",
            EventType::VarDecision => "var_decision",
            EventType::PeriodStart => "period_start",
            EventType::PeriodEnd => "period_end",
            EventType::MatchStart => "match_start",
            EventType::MatchEnd => "match_end",
            EventType::Shot => "shot",
            EventType::Foul => "foul",
            EventType::Corner => "corner",
            EventType::Offside => "offside",
            EventType::FreeKick => "free_kick",
            EventType::ThrowIn => "throw_in",
            EventType::Basket => "basket",
            EventType::ThreePointer => "three_pointer",
            EventType::FreeThrow => "free_throw",
            EventType::Rebound => "rebound",
            EventType::Turnover => "turnover",
            EventType::Steal => "steal",
            EventType::Block => "block",
            EventType::Hit => "hit",
            EventType::Run => "run",
            EventType::Strikeout => "strikeout",
            EventType::HomeRun => "home_run",
            EventType::Walk => "walk",
            EventType::Timeout => "timeout",
            EventType::Generic => "generic",
        }
    }

    pub fn parse(s: &str) -> Option<EventType> {
        serde_json::from_value(serde_json::Value::String(s.to_owned())).ok()
    }

    /// True for the primary scoring events that the reconciliation engine
    /// matches on score state.
    pub fn is_scoring(self) -> bool {
        matches!(self, EventType::Goal | EventType::Basket | EventType::Run)
    }

    /// True for the phase-boundary events matched on minute proximity.
    pub fn is_phase_boundary(self) -> bool {
        matches!(
            self,
            EventType::MatchStart
                | EventType::MatchEnd
                | EventType::PeriodStart
                | EventType::PeriodEnd
        )
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phase_classification_matches_the_three_subsets() {
        assert!(MatchPhase::LiveFirstHalf.is_live());
        assert!(MatchPhase::LiveOt.is_live());
        assert!(MatchPhase::Break.is_live());
        assert!(MatchPhase::Suspended.is_live());
        assert!(!MatchPhase::Scheduled.is_live());
        assert!(!MatchPhase::PreMatch.is_live());
        assert!(!MatchPhase::Finished.is_live());

        assert!(MatchPhase::Finished.is_terminal());
        assert!(MatchPhase::Postponed.is_terminal());
        assert!(MatchPhase::Cancelled.is_terminal());
        assert!(!MatchPhase::Break.is_terminal());
    }

    #[test]
    fn phase_round_trips_through_str_and_serde() {
        for s in [
            "scheduled",
            "pre_match",
            "live_first_half",
            "live_q4",
            "live_ot",
            "live_p3",
            "live_inning",
            "break",
            "suspended",
            "finished",
        ] {
            let phase = MatchPhase::parse(s).expect(s);
            assert_eq!(phase.as_str(), s);
            let json = serde_json::to_string(&phase).unwrap();
            assert_eq!(json, format!("\"{s}\""));
            let back: MatchPhase = serde_json::from_str(&json).unwrap();
            assert_eq!(back, phase);
        }
        assert!(MatchPhase::parse("live_q5").is_none());
    }

    #[test]
    fn tier_serializes_as_integer() {
        assert_eq!(serde_json::to_string(&Tier::Events).unwrap(), "1");
        let t: Tier = serde_json::from_str("2").unwrap();
        assert_eq!(t, Tier::Stats);
        assert!(serde_json::from_str::<Tier>("3").is_err());
    }

    #[test]
    fn provider_and_event_type_string_forms() {
        assert_eq!(ProviderName::FootballData.as_str(), "football_data");
        assert_eq!(ProviderName::parse("espn"), Some(ProviderName::Espn));
        assert_eq!(EventType::parse("yellow_card"), Some(EventType::YellowCard));
        assert!(EventType::Goal.is_scoring());
        assert!(EventType::PeriodEnd.is_phase_boundary());
        assert!(!EventType::Foul.is_scoring());
    }
}
