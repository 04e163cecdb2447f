// lv-model: canonical data model and wire types shared by every Live View
// service.
//
// Nothing in here talks to the network or the database.  Services depend on
// this crate for the entity types, the phase classification helpers, the
// bus/WS message shapes, and the Redis key grammar, and on nothing else
// from each other.

mod clock;
mod domain;
mod enums;
mod ids;
pub mod keys;
mod poll;
pub mod ws;

pub use clock::parse_clock_minute;
pub use domain::{
    HealthSample, LeagueRef, MatchEvent, MatchStatsPayload, ProviderHealth, Score, ScoreBreakdown,
    Scoreboard, ScoreboardExtra, TeamRef, TeamStats,
};
pub use enums::{EventType, MatchPhase, ProviderName, Sport, Tier};
pub use ids::placeholder_id;
pub use poll::PollCommand;
