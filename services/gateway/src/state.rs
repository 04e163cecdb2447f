//! Shared gateway state: the connection registry and its reverse index.
//!
//! Each connection owns an outbound mpsc queue; the fan-out bridge resolves
//! channel -> senders through the reverse index and never touches sockets
//! directly.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tokio::sync::{mpsc, RwLock};

use lv_bus::Bus;
use lv_model::ws::ServerMessage;

/// Hard cap on subscriptions per connection.
pub const MAX_SUBSCRIPTIONS_PER_CONN: usize = 25;

pub type OutboundSender = mpsc::Sender<ServerMessage>;

#[derive(Default)]
struct RegistryInner {
    /// connection_id -> outbound queue
    connections: HashMap<String, OutboundSender>,
    /// connection_id -> subscribed channels
    subscriptions: HashMap<String, HashSet<String>>,
    /// channel -> connection_ids (reverse index for fan-out)
    channel_subscribers: HashMap<String, HashSet<String>>,
}

#[derive(Clone, Default)]
pub struct SubscriptionRegistry {
    inner: Arc<RwLock<RegistryInner>>,
}

impl SubscriptionRegistry {
    pub async fn register(&self, connection_id: &str, sender: OutboundSender) {
        let mut inner = self.inner.write().await;
        inner.connections.insert(connection_id.to_owned(), sender);
        inner
            .subscriptions
            .insert(connection_id.to_owned(), HashSet::new());
    }

    /// Drop the connection and return the channels it was subscribed to so
    /// the caller can release presence counters.
    pub async fn unregister(&self, connection_id: &str) -> Vec<String> {
        let mut inner = self.inner.write().await;
        inner.connections.remove(connection_id);
        let channels = inner
            .subscriptions
            .remove(connection_id)
            .map(|set| set.into_iter().collect::<Vec<_>>())
            .unwrap_or_default();
        for channel in &channels {
            if let Some(subs) = inner.channel_subscribers.get_mut(channel) {
                subs.remove(connection_id);
                if subs.is_empty() {
                    inner.channel_subscribers.remove(channel);
                }
            }
        }
        channels
    }

    /// Add channels; fails (returning the would-be total) when the cap would
    /// be exceeded.  Returns the channels actually added (already-subscribed
    /// ones are skipped) and the full subscription list.
    pub async fn subscribe(
        &self,
        connection_id: &str,
        channels: &[String],
    ) -> Result<(Vec<String>, Vec<String>), usize> {
        let mut inner = self.inner.write().await;
        let current = inner
            .subscriptions
            .get(connection_id)
            .cloned()
            .unwrap_or_default();
        let new: Vec<String> = channels
            .iter()
            .filter(|c| !current.contains(*c))
            .cloned()
            .collect();
        let total = current.len() + new.len();
        if total > MAX_SUBSCRIPTIONS_PER_CONN {
            return Err(total);
        }

        if let Some(subs) = inner.subscriptions.get_mut(connection_id) {
            for channel in &new {
                subs.insert(channel.clone());
            }
        }
        for channel in &new {
            inner
                .channel_subscribers
                .entry(channel.clone())
                .or_default()
                .insert(connection_id.to_owned());
        }
        let all = inner
            .subscriptions
            .get(connection_id)
            .map(|s| {
                let mut v: Vec<String> = s.iter().cloned().collect();
                v.sort();
                v
            })
            .unwrap_or_default();
        Ok((new, all))
    }

    /// Remove channels; returns those actually removed plus the remainder.
    pub async fn unsubscribe(
        &self,
        connection_id: &str,
        channels: &[String],
    ) -> (Vec<String>, Vec<String>) {
        let mut inner = self.inner.write().await;
        let mut removed = Vec::new();
        if let Some(subs) = inner.subscriptions.get_mut(connection_id) {
            for channel in channels {
                if subs.remove(channel) {
                    removed.push(channel.clone());
                }
            }
        }
        for channel in &removed {
            if let Some(subs) = inner.channel_subscribers.get_mut(channel) {
                subs.remove(connection_id);
                if subs.is_empty() {
                    inner.channel_subscribers.remove(channel);
                }
            }
        }
        let remaining = inner
            .subscriptions
            .get(connection_id)
            .map(|s| {
                let mut v: Vec<String> = s.iter().cloned().collect();
                v.sort();
                v
            })
            .unwrap_or_default();
        (removed, remaining)
    }

    /// Outbound senders for every subscriber of a channel.
    pub async fn senders_for(&self, channel: &str) -> Vec<OutboundSender> {
        let inner = self.inner.read().await;
        let Some(subscribers) = inner.channel_subscribers.get(channel) else {
            return Vec::new();
        };
        subscribers
            .iter()
            .filter_map(|id| inner.connections.get(id).cloned())
            .collect()
    }

    /// Every live outbound sender, for heartbeats and shutdown broadcast.
    pub async fn all_senders(&self) -> Vec<OutboundSender> {
        let inner = self.inner.read().await;
        inner.connections.values().cloned().collect()
    }

    pub async fn connection_count(&self) -> usize {
        self.inner.read().await.connections.len()
    }
}

#[derive(Clone)]
pub struct AppState {
    pub bus: Bus,
    pub registry: SubscriptionRegistry,
    pub shutdown: tokio::sync::watch::Receiver<bool>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chan(n: usize) -> String {
        format!("fanout:match:00000000-0000-0000-0000-000000000000:tier:{n}")
    }

    #[tokio::test]
    async fn subscribe_unsubscribe_round_trip_maintains_reverse_index() {
        let registry = SubscriptionRegistry::default();
        let (tx, _rx) = mpsc::channel(4);
        registry.register("conn-1", tx).await;

        let (added, all) = registry
            .subscribe("conn-1", &[chan(0), chan(1)])
            .await
            .expect("under the cap");
        assert_eq!(added.len(), 2);
        assert_eq!(all.len(), 2);
        assert_eq!(registry.senders_for(&chan(0)).await.len(), 1);

        // Re-subscribing the same channel is a no-op, not a double-count.
        let (added, all) = registry.subscribe("conn-1", &[chan(0)]).await.unwrap();
        assert!(added.is_empty());
        assert_eq!(all.len(), 2);

        let (removed, remaining) = registry.unsubscribe("conn-1", &[chan(0)]).await;
        assert_eq!(removed, vec![chan(0)]);
        assert_eq!(remaining, vec![chan(1)]);
        assert!(registry.senders_for(&chan(0)).await.is_empty());
    }

    #[tokio::test]
    async fn subscription_cap_is_enforced() {
        let registry = SubscriptionRegistry::default();
        let (tx, _rx) = mpsc::channel(4);
        registry.register("conn-1", tx).await;

        let channels: Vec<String> = (0..MAX_SUBSCRIPTIONS_PER_CONN)
            .map(|i| format!("fanout:match:{i:032}:tier:0"))
            .collect();
        assert!(registry.subscribe("conn-1", &channels).await.is_ok());

        let overflow = vec!["fanout:match:ffffffff:tier:0".to_owned()];
        let err = registry.subscribe("conn-1", &overflow).await.unwrap_err();
        assert_eq!(err, MAX_SUBSCRIPTIONS_PER_CONN + 1);
    }

    #[tokio::test]
    async fn unregister_returns_channels_and_clears_index() {
        let registry = SubscriptionRegistry::default();
        let (tx, _rx) = mpsc::channel(4);
        registry.register("conn-1", tx).await;
        registry.subscribe("conn-1", &[chan(0)]).await.unwrap();

        let released = registry.unregister("conn-1").await;
        assert_eq!(released, vec![chan(0)]);
        assert!(registry.senders_for(&chan(0)).await.is_empty());
        assert_eq!(registry.connection_count().await, 0);
    }
}
