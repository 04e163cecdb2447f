//! Redis key and channel grammar.
//!
//! Every service goes through these constructors so the namespace lives in
//! exactly one place.  Channels are pub/sub topics; keys are value/stream
//! entries.

use uuid::Uuid;

use crate::enums::{ProviderName, Tier};

/// Control channel carrying scheduler -> ingest poll commands.
pub const POLL_COMMANDS_CHANNEL: &str = "ingest:poll_commands";

/// Pattern matching every fan-out channel.
pub const FANOUT_PATTERN: &str = "fanout:match:*:tier:*";
/// Pattern matching scoreboard (tier 0) fan-out channels only.
pub const SCOREBOARD_FANOUT_PATTERN: &str = "fanout:match:*:tier:0";
/// Pattern matching event (tier 1) fan-out channels only.
pub const EVENTS_FANOUT_PATTERN: &str = "fanout:match:*:tier:1";

/// Set of currently flagged dispute keys.
pub const DISPUTES_SET: &str = "verification:disputes";

pub fn fanout_channel(match_id: Uuid, tier: Tier) -> String {
    format!("fanout:match:{match_id}:tier:{}", tier.as_u8())
}

/// Extract `(match_id, tier)` from a fan-out channel name.
pub fn parse_fanout_channel(channel: &str) -> Option<(Uuid, Tier)> {
    let rest = channel.strip_prefix("fanout:match:")?;
    let (match_id, tier) = rest.split_once(":tier:")?;
    let match_id = Uuid::parse_str(match_id).ok()?;
    let tier = Tier::from_u8(tier.parse().ok()?)?;
    Some((match_id, tier))
}

pub fn snapshot_key(match_id: Uuid, tier: Tier) -> String {
    format!("snap:match:{match_id}:{}", tier.snapshot_kind())
}

pub fn event_stream_key(match_id: Uuid) -> String {
    format!("stream:match:{match_id}:events")
}

pub fn health_key(provider: ProviderName) -> String {
    format!("health:provider:{provider}")
}

pub fn selection_key(match_id: Uuid, tier: Tier) -> String {
    format!("select:match:{match_id}:tier:{}", tier.as_u8())
}

pub fn quota_key(provider: ProviderName) -> String {
    format!("quota:provider:{provider}:window")
}

/// Subscriber presence counter for a fan-out channel.
pub fn presence_key(channel: &str) -> String {
    format!("presence:count:{channel}")
}

pub fn leader_key(role: &str) -> String {
    format!("leader:{role}")
}

pub fn prev_snapshot_key(match_id: Uuid) -> String {
    format!("builder:prev_snap:{match_id}")
}

pub fn sport_cache_key(match_id: Uuid) -> String {
    format!("builder:sport:{match_id}")
}

pub fn dispute_key(match_id: Uuid) -> String {
    format!("dispute:match:{match_id}")
}

pub fn last_checked_key(match_id: Uuid) -> String {
    format!("verification:last_checked:{match_id}")
}

pub fn confidence_key(match_id: Uuid) -> String {
    format!("verification:confidence:{match_id}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fanout_channel_round_trips() {
        let id = Uuid::new_v4();
        let channel = fanout_channel(id, Tier::Events);
        assert_eq!(channel, format!("fanout:match:{id}:tier:1"));
        assert_eq!(parse_fanout_channel(&channel), Some((id, Tier::Events)));
    }

    #[test]
    fn parse_rejects_foreign_channels() {
        assert_eq!(parse_fanout_channel("ingest:poll_commands"), None);
        assert_eq!(parse_fanout_channel("fanout:match:not-a-uuid:tier:0"), None);
        let id = Uuid::new_v4();
        assert_eq!(parse_fanout_channel(&format!("fanout:match:{id}:tier:7")), None);
    }

    #[test]
    fn snapshot_keys_use_tier_kind_segments() {
        let id = Uuid::nil();
        assert_eq!(
            snapshot_key(id, Tier::Scoreboard),
            format!("snap:match:{id}:scoreboard")
        );
        assert_eq!(snapshot_key(id, Tier::Stats), format!("snap:match:{id}:stats"));
    }
}
