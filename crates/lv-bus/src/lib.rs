// lv-bus: the Redis-backed control/fan-out bus and cache.
//
// One `Bus` handle per service process.  Commands go through a cloned
// `ConnectionManager` (auto-reconnecting); subscriptions get their own
// dedicated pub/sub connections because a subscribed connection cannot issue
// regular commands.
//
// Delivery on the bus is best-effort at-least-once; durable truth lives in
// Postgres and every cached value carries a TTL, so nothing here needs a
// cleanup worker.

use std::time::Duration;

use redis::aio::ConnectionManager;
use redis::streams::{StreamMaxlen, StreamRangeReply};
use redis::AsyncCommands;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use lv_model::{keys, HealthSample, ProviderName, Tier};

#[derive(Debug, Error)]
pub enum BusError {
    #[error("redis: {0}")]
    Redis(#[from] redis::RedisError),
    #[error("payload decode: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Capped length of the per-provider health sample list.
const HEALTH_SAMPLE_CAP: isize = 500;
/// Capped length of the per-match event stream.
const EVENT_STREAM_CAP: usize = 500;
/// Sliding window for provider quota counters.
const QUOTA_WINDOW_S: i64 = 60;

// Atomically renew the leader TTL only while we still hold the lock.
const RENEW_LEADER_SCRIPT: &str = r#"
if redis.call("get", KEYS[1]) == ARGV[1] then
    redis.call("expire", KEYS[1], ARGV[2])
    return 1
end
return 0
"#;

// Atomically delete the leader key only while we still hold the lock.
const RELEASE_LEADER_SCRIPT: &str = r#"
if redis.call("get", KEYS[1]) == ARGV[1] then
    redis.call("del", KEYS[1])
    return 1
end
return 0
"#;

#[derive(Clone)]
pub struct Bus {
    conn: ConnectionManager,
    client: redis::Client,
}

impl Bus {
    /// Connect and verify with a PING.
    pub async fn connect(redis_url: &str) -> Result<Bus, BusError> {
        let client = redis::Client::open(redis_url)?;
        let mut conn = ConnectionManager::new(client.clone()).await?;
        let _: () = redis::cmd("PING").query_async(&mut conn).await?;
        info!("redis connected");
        Ok(Bus { conn, client })
    }

    /// Connect with bounded exponential backoff, for services that may start
    /// before the bus is reachable.
    pub async fn connect_with_retry(
        redis_url: &str,
        max_attempts: u32,
        base_delay: Duration,
    ) -> Result<Bus, BusError> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match Bus::connect(redis_url).await {
                Ok(bus) => return Ok(bus),
                Err(err) => {
                    if attempt >= max_attempts {
                        return Err(err);
                    }
                    let delay = base_delay * 2u32.pow(attempt - 1);
                    warn!(attempt, max_attempts, error = %err, delay_s = delay.as_secs(), "redis connect failed, retrying");
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    fn conn(&self) -> ConnectionManager {
        self.conn.clone()
    }

    /// A dedicated pub/sub connection.  The caller owns it for the lifetime
    /// of its subscription loop.
    pub async fn pubsub(&self) -> Result<redis::aio::PubSub, BusError> {
        Ok(self.client.get_async_pubsub().await?)
    }

    // -- Generic values ----------------------------------------------------

    pub async fn get_value(&self, key: &str) -> Result<Option<String>, BusError> {
        Ok(self.conn().get(key).await?)
    }

    pub async fn set_value(&self, key: &str, value: &str, ttl: Duration) -> Result<(), BusError> {
        self.conn().set_ex::<_, _, ()>(key, value, ttl.as_secs()).await?;
        Ok(())
    }

    // -- Snapshots ---------------------------------------------------------

    pub async fn set_snapshot(&self, key: &str, json: &str, ttl: Duration) -> Result<(), BusError> {
        self.set_value(key, json, ttl).await
    }

    pub async fn get_snapshot(&self, key: &str) -> Result<Option<String>, BusError> {
        self.get_value(key).await
    }

    // -- Publish -----------------------------------------------------------

    /// Publish a raw payload; returns the number of receiving subscribers.
    pub async fn publish(&self, channel: &str, payload: &str) -> Result<i64, BusError> {
        Ok(self.conn().publish(channel, payload).await?)
    }

    /// Publish a delta on the per-(match, tier) fan-out channel.
    pub async fn publish_delta(
        &self,
        match_id: Uuid,
        tier: Tier,
        payload: &str,
    ) -> Result<i64, BusError> {
        self.publish(&keys::fanout_channel(match_id, tier), payload).await
    }

    // -- Presence ----------------------------------------------------------

    /// Increment the subscriber count for a channel; refreshes the TTL.
    pub async fn incr_presence(&self, channel: &str, ttl: Duration) -> Result<i64, BusError> {
        let key = keys::presence_key(channel);
        let (count,): (i64,) = redis::pipe()
            .atomic()
            .incr(&key, 1)
            .expire(&key, ttl.as_secs() as i64)
            .ignore()
            .query_async(&mut self.conn())
            .await?;
        Ok(count)
    }

    /// Decrement the subscriber count, clamped at zero.
    pub async fn decr_presence(&self, channel: &str, ttl: Duration) -> Result<i64, BusError> {
        let key = keys::presence_key(channel);
        let (count,): (i64,) = redis::pipe()
            .atomic()
            .decr(&key, 1)
            .expire(&key, ttl.as_secs() as i64)
            .ignore()
            .query_async(&mut self.conn())
            .await?;
        if count < 0 {
            self.conn().set_ex::<_, _, ()>(&key, 0, ttl.as_secs()).await?;
            return Ok(0);
        }
        Ok(count)
    }

    pub async fn presence_count(&self, channel: &str) -> Result<i64, BusError> {
        let v: Option<i64> = self.conn().get(keys::presence_key(channel)).await?;
        Ok(v.unwrap_or(0))
    }

    // -- Provider health ---------------------------------------------------

    /// Append a health sample to the provider's rolling window.
    pub async fn record_health_sample(
        &self,
        provider: ProviderName,
        sample: &HealthSample,
        window: Duration,
    ) -> Result<(), BusError> {
        let key = keys::health_key(provider);
        let json = serde_json::to_string(sample)?;
        let _: () = redis::pipe()
            .atomic()
            .rpush(&key, json)
            .ignore()
            .ltrim(&key, -HEALTH_SAMPLE_CAP, -1)
            .ignore()
            .expire(&key, (window.as_secs() * 2) as i64)
            .ignore()
            .query_async(&mut self.conn())
            .await?;
        Ok(())
    }

    pub async fn health_samples(
        &self,
        provider: ProviderName,
    ) -> Result<Vec<HealthSample>, BusError> {
        let raw: Vec<String> = self.conn().lrange(keys::health_key(provider), 0, -1).await?;
        // Tolerate individual malformed entries rather than poisoning the window.
        Ok(raw
            .iter()
            .filter_map(|r| serde_json::from_str(r).ok())
            .collect())
    }

    // -- Provider selection pins -------------------------------------------

    pub async fn pinned_selection(
        &self,
        match_id: Uuid,
        tier: Tier,
    ) -> Result<Option<ProviderName>, BusError> {
        let v: Option<String> = self.conn().get(keys::selection_key(match_id, tier)).await?;
        Ok(v.as_deref().and_then(ProviderName::parse))
    }

    pub async fn pin_selection(
        &self,
        match_id: Uuid,
        tier: Tier,
        provider: ProviderName,
        ttl: Duration,
    ) -> Result<(), BusError> {
        self.set_value(&keys::selection_key(match_id, tier), provider.as_str(), ttl)
            .await
    }

    // -- Quota -------------------------------------------------------------

    /// Bump the provider's request counter in its sliding window.
    pub async fn incr_quota(&self, provider: ProviderName) -> Result<i64, BusError> {
        let key = keys::quota_key(provider);
        let (count,): (i64,) = redis::pipe()
            .atomic()
            .incr(&key, 1)
            .expire(&key, QUOTA_WINDOW_S)
            .ignore()
            .query_async(&mut self.conn())
            .await?;
        Ok(count)
    }

    pub async fn quota_usage(&self, provider: ProviderName) -> Result<i64, BusError> {
        let v: Option<i64> = self.conn().get(keys::quota_key(provider)).await?;
        Ok(v.unwrap_or(0))
    }

    // -- Leader election ---------------------------------------------------

    /// SET NX EX: true when this instance acquired the lock.
    pub async fn try_acquire_leader(
        &self,
        role: &str,
        instance_id: &str,
        ttl: Duration,
    ) -> Result<bool, BusError> {
        let v: Option<String> = redis::cmd("SET")
            .arg(keys::leader_key(role))
            .arg(instance_id)
            .arg("NX")
            .arg("EX")
            .arg(ttl.as_secs())
            .query_async(&mut self.conn())
            .await?;
        Ok(v.is_some())
    }

    /// Compare-and-renew: extends the TTL only while we still hold the lock.
    pub async fn renew_leader(
        &self,
        role: &str,
        instance_id: &str,
        ttl: Duration,
    ) -> Result<bool, BusError> {
        let renewed: i32 = redis::Script::new(RENEW_LEADER_SCRIPT)
            .key(keys::leader_key(role))
            .arg(instance_id)
            .arg(ttl.as_secs())
            .invoke_async(&mut self.conn())
            .await?;
        Ok(renewed == 1)
    }

    /// Compare-and-delete on shutdown, enabling fast fail-over.
    pub async fn release_leader(&self, role: &str, instance_id: &str) -> Result<bool, BusError> {
        let released: i32 = redis::Script::new(RELEASE_LEADER_SCRIPT)
            .key(keys::leader_key(role))
            .arg(instance_id)
            .invoke_async(&mut self.conn())
            .await?;
        Ok(released == 1)
    }

    // -- Event stream ------------------------------------------------------

    /// Append an event to the capped per-match stream.
    pub async fn append_event_stream(&self, match_id: Uuid, json: &str) -> Result<(), BusError> {
        self.conn()
            .xadd_maxlen::<_, _, _, _, ()>(
                keys::event_stream_key(match_id),
                StreamMaxlen::Approx(EVENT_STREAM_CAP),
                "*",
                &[("data", json)],
            )
            .await?;
        Ok(())
    }

    /// The most recent `count` stream entries, oldest first.
    pub async fn event_stream_tail(
        &self,
        match_id: Uuid,
        count: usize,
    ) -> Result<Vec<String>, BusError> {
        let reply: StreamRangeReply = self
            .conn()
            .xrevrange_count(keys::event_stream_key(match_id), "+", "-", count)
            .await?;
        let mut entries: Vec<String> = reply
            .ids
            .iter()
            .filter_map(|entry| entry.get::<String>("data"))
            .collect();
        entries.reverse();
        Ok(entries)
    }

    // -- Dispute bookkeeping ----------------------------------------------

    pub async fn flag_dispute(
        &self,
        match_id: Uuid,
        payload: &str,
        ttl: Duration,
    ) -> Result<(), BusError> {
        let key = keys::dispute_key(match_id);
        self.set_value(&key, payload, ttl).await?;
        self.conn().sadd::<_, _, ()>(keys::DISPUTES_SET, &key).await?;
        Ok(())
    }
}
