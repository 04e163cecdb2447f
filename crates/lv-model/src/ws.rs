//! WebSocket protocol between the gateway and browser/mobile clients.
//!
//! Client frames are JSON discriminated on `op`; server frames on `type`.
//! A `snapshot` frame always carries `replay: true` and is only sent in
//! response to a subscribe; live updates arrive as `delta`.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::enums::Tier;

/// Typed error codes sent in `error` frames.  The connection stays open for
/// all of them.
pub mod error_codes {
    pub const INVALID_JSON: &str = "invalid_json";
    pub const UNKNOWN_OP: &str = "unknown_op";
    pub const MISSING_MATCH_ID: &str = "missing_match_id";
    pub const INVALID_MATCH_ID: &str = "invalid_match_id";
    pub const INVALID_TIER: &str = "invalid_tier";
    pub const SUBSCRIPTION_LIMIT: &str = "subscription_limit";
}

/// Close codes used by the server.
pub mod close_codes {
    /// Client missed the heartbeat window.
    pub const HEARTBEAT_TIMEOUT: u16 = 4000;
    /// Server is shutting down.
    pub const SERVER_SHUTDOWN: u16 = 1001;
}

// ---------------------------------------------------------------------------
// Client -> server
// ---------------------------------------------------------------------------

fn default_subscribe_tiers() -> Vec<u8> {
    vec![0]
}

fn default_unsubscribe_tiers() -> Vec<u8> {
    vec![0, 1, 2]
}

/// A client operation.  Tier lists are raw integers at this layer so a frame
/// with one bad tier can be reported per-tier rather than rejected wholesale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum ClientOp {
    Subscribe {
        match_id: String,
        #[serde(default = "default_subscribe_tiers")]
        tiers: Vec<u8>,
    },
    Unsubscribe {
        match_id: String,
        #[serde(default = "default_unsubscribe_tiers")]
        tiers: Vec<u8>,
    },
    Ping,
}

// ---------------------------------------------------------------------------
// Server -> client
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServerMsgType {
    Snapshot,
    Delta,
    State,
    Pong,
    Error,
    Ping,
}

/// Server -> client message envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerMessage {
    #[serde(rename = "type")]
    pub kind: ServerMsgType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub match_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tier: Option<Tier>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub replay: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub data: Value,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

impl ServerMessage {
    pub fn snapshot(match_id: Uuid, tier: Tier, data: Value) -> ServerMessage {
        ServerMessage {
            kind: ServerMsgType::Snapshot,
            match_id: Some(match_id),
            tier: Some(tier),
            replay: true,
            error: None,
            data,
        }
    }

    pub fn delta(match_id: Uuid, tier: Tier, data: Value) -> ServerMessage {
        ServerMessage {
            kind: ServerMsgType::Delta,
            match_id: Some(match_id),
            tier: Some(tier),
            replay: false,
            error: None,
            data,
        }
    }

    pub fn state(data: Value) -> ServerMessage {
        ServerMessage {
            kind: ServerMsgType::State,
            match_id: None,
            tier: None,
            replay: false,
            error: None,
            data,
        }
    }

    pub fn pong() -> ServerMessage {
        ServerMessage {
            kind: ServerMsgType::Pong,
            match_id: None,
            tier: None,
            replay: false,
            error: None,
            data: Value::Null,
        }
    }

    pub fn ping() -> ServerMessage {
        ServerMessage {
            kind: ServerMsgType::Ping,
            match_id: None,
            tier: None,
            replay: false,
            error: None,
            data: Value::Null,
        }
    }

    pub fn error(code: &str, message: &str) -> ServerMessage {
        ServerMessage {
            kind: ServerMsgType::Error,
            match_id: None,
            tier: None,
            replay: false,
            error: Some(ErrorBody {
                code: code.to_owned(),
                message: message.to_owned(),
            }),
            data: Value::Null,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn subscribe_defaults_to_scoreboard_tier() {
        let op: ClientOp =
            serde_json::from_value(json!({"op": "subscribe", "match_id": "abc"})).unwrap();
        assert_eq!(
            op,
            ClientOp::Subscribe {
                match_id: "abc".to_owned(),
                tiers: vec![0],
            }
        );
    }

    #[test]
    fn unsubscribe_defaults_to_all_tiers() {
        let op: ClientOp =
            serde_json::from_value(json!({"op": "unsubscribe", "match_id": "abc"})).unwrap();
        assert_eq!(
            op,
            ClientOp::Unsubscribe {
                match_id: "abc".to_owned(),
                tiers: vec![0, 1, 2],
            }
        );
    }

    #[test]
    fn unknown_op_fails_to_parse() {
        assert!(serde_json::from_value::<ClientOp>(json!({"op": "shout"})).is_err());
    }

    #[test]
    fn snapshot_frame_always_carries_replay() {
        let id = Uuid::new_v4();
        let msg = ServerMessage::snapshot(id, Tier::Scoreboard, json!({"score": "2-1"}));
        let v = serde_json::to_value(&msg).unwrap();
        assert_eq!(v["type"], "snapshot");
        assert_eq!(v["replay"], true);
        assert_eq!(v["tier"], 0);

        let delta = serde_json::to_value(ServerMessage::delta(id, Tier::Scoreboard, json!({})))
            .unwrap();
        assert_eq!(delta["type"], "delta");
        assert!(delta.get("replay").is_none());
    }

    #[test]
    fn error_frame_shape() {
        let msg = ServerMessage::error(error_codes::SUBSCRIPTION_LIMIT, "too many");
        let v = serde_json::to_value(&msg).unwrap();
        assert_eq!(v["type"], "error");
        assert_eq!(v["error"]["code"], "subscription_limit");
    }
}
