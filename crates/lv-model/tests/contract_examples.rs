// Frozen wire-format examples for the bus and WebSocket protocols.
//
// These pin down the JSON every other service (and the browser clients)
// depends on; a failing test here means a breaking protocol change.

use serde_json::json;
use uuid::Uuid;

use lv_model::ws::{ClientOp, ServerMessage};
use lv_model::{keys, MatchPhase, PollCommand, ProviderName, Sport, Tier};

#[test]
fn poll_command_example() {
    let json_cmd = json!({
        "canonical_match_id": "8c5da1a8-0f5c-4f6e-9a56-1df0a8f3b2c4",
        "tier": 0,
        "sport": "soccer",
        "league_provider_id": "eng.1",
        "match_provider_id": "401584",
        "provider": "espn",
        "timestamp": 1756723200.25
    });
    let cmd: PollCommand = serde_json::from_value(json_cmd.clone()).expect("command parses");
    assert_eq!(cmd.tier, Tier::Scoreboard);
    assert_eq!(cmd.sport, Sport::Soccer);
    assert_eq!(cmd.provider, ProviderName::Espn);
    assert_eq!(serde_json::to_value(&cmd).unwrap(), json_cmd);
}

#[test]
fn client_subscribe_example() {
    let op: ClientOp = serde_json::from_value(json!({
        "op": "subscribe",
        "match_id": "8c5da1a8-0f5c-4f6e-9a56-1df0a8f3b2c4",
        "tiers": [0, 1]
    }))
    .expect("subscribe parses");
    match op {
        ClientOp::Subscribe { match_id, tiers } => {
            assert_eq!(match_id, "8c5da1a8-0f5c-4f6e-9a56-1df0a8f3b2c4");
            assert_eq!(tiers, vec![0, 1]);
        }
        other => panic!("expected subscribe, got {other:?}"),
    }
}

#[test]
fn client_ping_example() {
    let op: ClientOp = serde_json::from_value(json!({"op": "ping"})).expect("ping parses");
    assert_eq!(op, ClientOp::Ping);
}

#[test]
fn server_frame_examples() {
    let match_id = Uuid::parse_str("8c5da1a8-0f5c-4f6e-9a56-1df0a8f3b2c4").unwrap();

    let snapshot = serde_json::to_value(ServerMessage::snapshot(
        match_id,
        Tier::Scoreboard,
        json!({"score": {"home": 2, "away": 1}}),
    ))
    .unwrap();
    assert_eq!(snapshot["type"], "snapshot");
    assert_eq!(snapshot["replay"], true);
    assert_eq!(snapshot["tier"], 0);
    assert_eq!(snapshot["match_id"], "8c5da1a8-0f5c-4f6e-9a56-1df0a8f3b2c4");

    let delta =
        serde_json::to_value(ServerMessage::delta(match_id, Tier::Events, json!([]))).unwrap();
    assert_eq!(delta["type"], "delta");
    assert_eq!(delta["tier"], 1);
    assert!(delta.get("replay").is_none(), "deltas never carry replay");

    let pong = serde_json::to_value(ServerMessage::pong()).unwrap();
    assert_eq!(pong["type"], "pong");
    assert!(pong.get("data").is_none());

    let error = serde_json::to_value(ServerMessage::error("subscription_limit", "too many"))
        .unwrap();
    assert_eq!(error["type"], "error");
    assert_eq!(error["error"]["code"], "subscription_limit");
    assert_eq!(error["error"]["message"], "too many");
}

#[test]
fn key_grammar_examples() {
    let id = Uuid::parse_str("8c5da1a8-0f5c-4f6e-9a56-1df0a8f3b2c4").unwrap();
    assert_eq!(
        keys::fanout_channel(id, Tier::Stats),
        "fanout:match:8c5da1a8-0f5c-4f6e-9a56-1df0a8f3b2c4:tier:2"
    );
    assert_eq!(
        keys::snapshot_key(id, Tier::Events),
        "snap:match:8c5da1a8-0f5c-4f6e-9a56-1df0a8f3b2c4:events"
    );
    assert_eq!(
        keys::event_stream_key(id),
        "stream:match:8c5da1a8-0f5c-4f6e-9a56-1df0a8f3b2c4:events"
    );
    assert_eq!(
        keys::health_key(ProviderName::FootballData),
        "health:provider:football_data"
    );
    assert_eq!(
        keys::selection_key(id, Tier::Scoreboard),
        "select:match:8c5da1a8-0f5c-4f6e-9a56-1df0a8f3b2c4:tier:0"
    );
    assert_eq!(
        keys::quota_key(ProviderName::Espn),
        "quota:provider:espn:window"
    );
    assert_eq!(keys::leader_key("scheduler"), "leader:scheduler");
    assert_eq!(
        keys::presence_key(&keys::fanout_channel(id, Tier::Scoreboard)),
        "presence:count:fanout:match:8c5da1a8-0f5c-4f6e-9a56-1df0a8f3b2c4:tier:0"
    );
}

#[test]
fn phase_wire_values_are_frozen() {
    for (phase, wire) in [
        (MatchPhase::Scheduled, "scheduled"),
        (MatchPhase::PreMatch, "pre_match"),
        (MatchPhase::LiveFirstHalf, "live_first_half"),
        (MatchPhase::LiveOt, "live_ot"),
        (MatchPhase::LiveInning, "live_inning"),
        (MatchPhase::Break, "break"),
        (MatchPhase::Suspended, "suspended"),
        (MatchPhase::Finished, "finished"),
        (MatchPhase::Postponed, "postponed"),
        (MatchPhase::Cancelled, "cancelled"),
    ] {
        assert_eq!(serde_json::to_value(phase).unwrap(), json!(wire));
    }
}
