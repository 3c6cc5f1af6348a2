// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Message Router
//!
//! This module provides the router that owns the set of named channels and resolves
//! publish/subscribe relationships. Publishing snapshots the channel's subscriber
//! list, selects targets per the channel mode, and hands each delivery to the
//! subscriber's worker queue; it returns once every delivery is handed off and
//! never waits for a handler to finish. Registration is explicit: `subscribe`
//! returns a token and `unsubscribe` removes it without cancelling deliveries
//! already queued.

use crate::ack::{AckHandle, AckOutcome};
use crate::channel::{Channel, ChannelMode, SubscriberEntry};
use crate::dispatch::{self, Delivery};
use crate::errors::BusError;
use crate::handler::MessageHandler;
use crate::message::Message;
use futures_util::future::join_all;
use std::{
    collections::HashMap,
    sync::{Arc, RwLock},
};
use tokio::sync::mpsc;
use tracing::{debug, error};
use uuid::Uuid;

/// Identifies one subscriber registration.
///
/// Returned by [`Router::subscribe`] and consumed by [`Router::unsubscribe`].
#[derive(Debug, Clone)]
pub struct SubscriptionToken {
    channel: String,
    id: Uuid,
}

impl SubscriptionToken {
    /// Returns the name of the channel this registration belongs to.
    pub fn channel(&self) -> &str {
        &self.channel
    }
}

/// The result of one publish call.
///
/// `deliveries` counts how many subscribers the message was handed to; zero means
/// the message was dropped for lack of subscribers, which is a signal rather than
/// an error, and the caller decides the broker-side policy. `handles` are observer
/// clones of each delivery's acknowledgment handle, in snapshot order, letting an
/// adapter poll or await the fan-out outcomes.
pub struct PublishReceipt {
    deliveries: usize,
    handles: Vec<AckHandle>,
}

impl PublishReceipt {
    /// Returns the number of subscribers the message was handed to.
    pub fn deliveries(&self) -> usize {
        self.deliveries
    }

    /// Returns true when the message was dropped for lack of subscribers.
    pub fn is_dropped(&self) -> bool {
        self.deliveries == 0
    }

    /// Returns the acknowledgment handles of the dispatched deliveries, in
    /// subscriber snapshot order.
    pub fn handles(&self) -> &[AckHandle] {
        &self.handles
    }

    /// Waits until every dispatched delivery settles and returns the outcomes in
    /// subscriber snapshot order.
    pub async fn settled(&self) -> Vec<AckOutcome> {
        join_all(self.handles.iter().map(|handle| handle.settled())).await
    }
}

/// The broker-agnostic message router.
///
/// Construct one explicitly (see [`crate::topology::BusTopology`]) and pass it to
/// collaborators; the router never depends on a specific broker type. Channel-map
/// reads (publishing) run concurrently; channel creation briefly excludes them.
pub struct Router {
    channels: RwLock<HashMap<String, Channel>>,
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}

impl Router {
    /// Creates an empty router.
    pub fn new() -> Router {
        Router {
            channels: RwLock::new(HashMap::new()),
        }
    }

    /// Registers a new named channel.
    ///
    /// # Parameters
    /// * `name` - Unique channel name
    /// * `mode` - Delivery discipline, fixed for the channel's lifetime
    ///
    /// # Returns
    /// Ok(()) or `BusError::DuplicateChannel` if the name is taken
    pub fn create_channel(&self, name: &str, mode: ChannelMode) -> Result<(), BusError> {
        let mut channels = self.channels.write().unwrap_or_else(|e| e.into_inner());

        if channels.contains_key(name) {
            return Err(BusError::DuplicateChannel(name.to_owned()));
        }

        channels.insert(name.to_owned(), Channel::new(mode));
        debug!(name, ?mode, "channel created");

        Ok(())
    }

    /// Registers a handler on a channel and spawns its worker task.
    ///
    /// # Parameters
    /// * `channel` - Name of the channel to subscribe to
    /// * `handler` - The subscriber's message handler
    ///
    /// # Returns
    /// A subscription token, or `BusError::UnknownChannel` if the channel is absent
    pub fn subscribe(
        &self,
        channel: &str,
        handler: Arc<dyn MessageHandler>,
    ) -> Result<SubscriptionToken, BusError> {
        let channels = self.channels.read().unwrap_or_else(|e| e.into_inner());

        let Some(registered) = channels.get(channel) else {
            return Err(BusError::UnknownChannel(channel.to_owned()));
        };

        let id = Uuid::new_v4();
        let (tx, rx) = mpsc::unbounded_channel();

        dispatch::spawn_worker(handler, rx);
        registered.add_subscriber(SubscriberEntry { id, tx });

        debug!(
            channel,
            subscription = id.to_string(),
            "subscriber registered"
        );

        Ok(SubscriptionToken {
            channel: channel.to_owned(),
            id,
        })
    }

    /// Removes a subscriber registration.
    ///
    /// Idempotent: removing an unknown token is a no-op. Deliveries already queued
    /// to the subscriber's worker are processed to completion; the worker exits
    /// once its queue drains.
    pub fn unsubscribe(&self, token: &SubscriptionToken) {
        let channels = self.channels.read().unwrap_or_else(|e| e.into_inner());

        if let Some(registered) = channels.get(&token.channel) {
            registered.remove_subscriber(token.id);
            debug!(
                channel = token.channel.as_str(),
                subscription = token.id.to_string(),
                "subscriber removed"
            );
        }
    }

    /// Publishes a message onto a channel.
    ///
    /// Point-to-point channels deliver to exactly one subscriber, round-robin over
    /// the snapshot taken at publish time. Publish-subscribe channels deliver an
    /// independent logical copy to every subscriber in the snapshot; subscribers
    /// registered afterwards do not receive the message. The call returns once all
    /// deliveries are handed off to the workers.
    ///
    /// # Parameters
    /// * `channel` - Name of the channel to publish on
    /// * `message` - The message envelope
    ///
    /// # Returns
    /// The publish receipt, or `BusError::UnknownChannel` if the channel is absent
    pub fn publish(&self, channel: &str, message: Message) -> Result<PublishReceipt, BusError> {
        let channels = self.channels.read().unwrap_or_else(|e| e.into_inner());

        let Some(registered) = channels.get(channel) else {
            return Err(BusError::UnknownChannel(channel.to_owned()));
        };

        let snapshot = registered.snapshot();
        if snapshot.is_empty() {
            debug!(channel, "no subscribers attached, dropping message");
            return Ok(PublishReceipt {
                deliveries: 0,
                handles: vec![],
            });
        }

        match registered.mode() {
            ChannelMode::PointToPoint => {
                let entry = &snapshot[registered.next_round_robin(snapshot.len())];
                let watch = message.ack_handle().clone();

                let delivery = Delivery {
                    message,
                    channel: channel.to_owned(),
                    subscription: entry.id,
                };

                if entry.tx.send(delivery).is_err() {
                    error!(channel, "subscriber worker is gone, dropping delivery");
                    return Ok(PublishReceipt {
                        deliveries: 0,
                        handles: vec![],
                    });
                }

                Ok(PublishReceipt {
                    deliveries: 1,
                    handles: vec![watch],
                })
            }
            ChannelMode::PublishSubscribe => {
                let mut deliveries = 0;
                let mut handles = vec![];

                for entry in &snapshot {
                    let copy = message.fork();
                    let watch = copy.ack_handle().clone();

                    let delivery = Delivery {
                        message: copy,
                        channel: channel.to_owned(),
                        subscription: entry.id,
                    };

                    if entry.tx.send(delivery).is_err() {
                        error!(channel, "subscriber worker is gone, skipping delivery");
                        continue;
                    }

                    deliveries += 1;
                    handles.push(watch);
                }

                Ok(PublishReceipt {
                    deliveries,
                    handles,
                })
            }
        }
    }
}
