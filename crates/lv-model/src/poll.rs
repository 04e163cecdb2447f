use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::enums::{ProviderName, Sport, Tier};

/// A poll command published by the scheduler on `ingest:poll_commands`.
///
/// The scheduler is the only producer.  Commands are fire-and-forget: a
/// command that is lost or fails downstream is simply reissued when the task
/// next comes due, so consumers never requeue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PollCommand {
    pub canonical_match_id: Uuid,
    pub tier: Tier,
    pub sport: Sport,
    pub league_provider_id: String,
    pub match_provider_id: String,
    /// The provider the scheduler resolved mappings for; the ingest side may
    /// still fail over via the registry.
    pub provider: ProviderName,
    /// Unix seconds at dispatch time.
    pub timestamp: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn poll_command_wire_format() {
        let cmd = PollCommand {
            canonical_match_id: Uuid::nil(),
            tier: Tier::Scoreboard,
            sport: Sport::Soccer,
            league_provider_id: "eng.1".to_owned(),
            match_provider_id: "401584".to_owned(),
            provider: ProviderName::Espn,
            timestamp: 1_700_000_000.5,
        };
        let json = serde_json::to_value(&cmd).unwrap();
        assert_eq!(json["tier"], 0);
        assert_eq!(json["sport"], "soccer");
        assert_eq!(json["provider"], "espn");
        let back: PollCommand = serde_json::from_value(json).unwrap();
        assert_eq!(back, cmd);
    }
}
