//! Event Broadcaster
//!
//! Fan-out of match events to subscribers. Delivery never blocks: a full
//! channel misses the event, a closed one is dropped from the registry.

use std::collections::BTreeMap;

use parking_lot::RwLock;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::debug;

use crate::game::events::MatchEvent;
use crate::game::state::{MatchId, MatchState};

/// Per-match subscriber registry.
#[derive(Debug, Default)]
pub struct EventBroadcaster {
    subscribers: RwLock<BTreeMap<MatchId, Vec<mpsc::Sender<MatchEvent>>>>,
}

impl EventBroadcaster {
    /// Empty broadcaster.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a sender for a match. Returns `false` if it was already registered.
    pub fn subscribe(&self, match_id: &MatchId, sender: mpsc::Sender<MatchEvent>) -> bool {
        let mut subscribers = self.subscribers.write();
        let senders = subscribers.entry(match_id.clone()).or_default();
        if senders.iter().any(|s| s.same_channel(&sender)) {
            return false;
        }
        senders.push(sender);
        true
    }

    /// Create a bounded channel and register its sender.
    pub fn subscribe_channel(&self, match_id: &MatchId, capacity: usize) -> mpsc::Receiver<MatchEvent> {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        self.subscribe(match_id, tx);
        rx
    }

    /// Remove a sender. Returns `false` if it was not registered.
    pub fn unsubscribe(&self, match_id: &MatchId, sender: &mpsc::Sender<MatchEvent>) -> bool {
        let mut subscribers = self.subscribers.write();
        let Some(senders) = subscribers.get_mut(match_id) else {
            return false;
        };

        let before = senders.len();
        senders.retain(|s| !s.same_channel(sender));
        let removed = senders.len() != before;

        if senders.is_empty() {
            subscribers.remove(match_id);
        }
        removed
    }

    /// Deliver an event to every subscriber of its match. Returns deliveries made.
    ///
    /// Senders whose receiver has been dropped are pruned.
    pub fn publish(&self, event: MatchEvent) -> usize {
        let mut delivered = 0;
        let mut saw_closed = false;
        {
            let subscribers = self.subscribers.read();
            let Some(senders) = subscribers.get(&event.match_id) else {
                return 0;
            };

            for sender in senders {
                match sender.try_send(event.clone()) {
                    Ok(()) => delivered += 1,
                    Err(TrySendError::Closed(_)) => saw_closed = true,
                    Err(e) => debug!(
                        "Dropped {} event for match {}: {}",
                        event.event.kind(),
                        event.match_id,
                        e
                    ),
                }
            }
        }

        if saw_closed {
            self.prune_closed(&event.match_id);
        }
        delivered
    }

    fn prune_closed(&self, match_id: &MatchId) {
        let mut subscribers = self.subscribers.write();
        let Some(senders) = subscribers.get_mut(match_id) else {
            return;
        };

        let before = senders.len();
        senders.retain(|s| !s.is_closed());
        debug!("Pruned {} closed subscriber(s) for match {}", before - senders.len(), match_id);

        if senders.is_empty() {
            subscribers.remove(match_id);
        }
    }

    /// Publish every event a match logged from index `from` onward.
    pub fn publish_log(&self, game: &MatchState, from: usize) -> usize {
        game.events
            .get(from..)
            .unwrap_or_default()
            .iter()
            .map(|event| {
                self.publish(MatchEvent {
                    match_id: game.id.clone(),
                    event: event.clone(),
                })
            })
            .sum()
    }

    /// Drop every sender for a match so receivers see the channel close.
    pub fn cleanup_match(&self, match_id: &MatchId) {
        if let Some(senders) = self.subscribers.write().remove(match_id) {
            debug!("Closed {} subscriber(s) for match {}", senders.len(), match_id);
        }
    }

    /// Registered subscribers for a match.
    pub fn subscriber_count(&self, match_id: &MatchId) -> usize {
        self.subscribers.read().get(match_id).map_or(0, Vec::len)
    }
}
