// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Internal Channels
//!
//! This module provides the named conduits the router delivers through. A channel
//! has a fixed delivery mode and an ordered subscriber registry; registration order
//! is what point-to-point round-robin cycles over. Mutation of the registry uses a
//! readers-writer discipline so concurrent publishers snapshot the subscriber list
//! without excluding each other.

use crate::dispatch::Delivery;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::RwLock;
use tokio::sync::mpsc::UnboundedSender;
use uuid::Uuid;

/// The delivery discipline of a channel, fixed at creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelMode {
    /// Each message goes to exactly one subscriber, round-robin over registration order
    PointToPoint,

    /// Each message goes independently to every subscriber present at publish time
    PublishSubscribe,
}

/// One registered subscriber: its token id and the sender feeding its worker task.
#[derive(Clone)]
pub(crate) struct SubscriberEntry {
    pub(crate) id: Uuid,
    pub(crate) tx: UnboundedSender<Delivery>,
}

/// A named internal conduit. The name itself lives as the router's map key.
pub(crate) struct Channel {
    mode: ChannelMode,
    subscribers: RwLock<Vec<SubscriberEntry>>,
    cursor: AtomicUsize,
}

impl Channel {
    pub(crate) fn new(mode: ChannelMode) -> Channel {
        Channel {
            mode,
            subscribers: RwLock::new(vec![]),
            cursor: AtomicUsize::new(0),
        }
    }

    pub(crate) fn mode(&self) -> ChannelMode {
        self.mode
    }

    /// Appends a subscriber; registration order is preserved for round-robin.
    pub(crate) fn add_subscriber(&self, entry: SubscriberEntry) {
        self.subscribers
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push(entry);
    }

    /// Removes the subscriber with the given id, if registered.
    ///
    /// Dropping the entry's sender lets the worker drain deliveries already
    /// queued and then exit; nothing in flight is cancelled.
    pub(crate) fn remove_subscriber(&self, id: Uuid) {
        self.subscribers
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .retain(|entry| entry.id != id);
    }

    /// Returns the current subscriber list, in registration order.
    pub(crate) fn snapshot(&self) -> Vec<SubscriberEntry> {
        self.subscribers
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Advances the shared round-robin cursor and returns the selected index.
    ///
    /// The atomic fetch-add keeps concurrent publishers from selecting the same
    /// subscriber in ways that break round-robin fairness.
    pub(crate) fn next_round_robin(&self, len: usize) -> usize {
        self.cursor.fetch_add(1, Ordering::Relaxed) % len
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    fn entry() -> SubscriberEntry {
        let (tx, _rx) = mpsc::unbounded_channel();
        SubscriberEntry {
            id: Uuid::new_v4(),
            tx,
        }
    }

    #[test]
    fn snapshot_preserves_registration_order() {
        let channel = Channel::new(ChannelMode::PointToPoint);

        let first = entry();
        let second = entry();
        channel.add_subscriber(first.clone());
        channel.add_subscriber(second.clone());

        let snapshot = channel.snapshot();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[0].id, first.id);
        assert_eq!(snapshot[1].id, second.id);
    }

    #[test]
    fn remove_keeps_the_order_of_the_rest() {
        let channel = Channel::new(ChannelMode::PointToPoint);

        let first = entry();
        let second = entry();
        let third = entry();
        channel.add_subscriber(first.clone());
        channel.add_subscriber(second.clone());
        channel.add_subscriber(third.clone());

        channel.remove_subscriber(second.id);

        let snapshot = channel.snapshot();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[0].id, first.id);
        assert_eq!(snapshot[1].id, third.id);
    }

    #[test]
    fn round_robin_cycles_over_the_subscriber_count() {
        let channel = Channel::new(ChannelMode::PointToPoint);

        let picks: Vec<usize> = (0..5).map(|_| channel.next_round_robin(2)).collect();
        assert_eq!(picks, vec![0, 1, 0, 1, 0]);
    }

    #[test]
    fn mode_is_fixed_at_creation() {
        let channel = Channel::new(ChannelMode::PublishSubscribe);
        assert_eq!(channel.mode(), ChannelMode::PublishSubscribe);
    }
}
