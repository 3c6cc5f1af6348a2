// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Inbound Binding
//!
//! This module provides the adapter-facing helper that turns a broker delivery
//! into a bus message. The binding publishes the payload onto its channel and
//! resolves the single upstream acknowledgment from the fan-out outcomes: the
//! broker is acked only once every dispatched delivery settled without requesting
//! redelivery, and nacked with redelivery as soon as any subscriber asked for it.

use crate::ack::{AckCallback, AckHandle, AckOutcome};
use crate::errors::BusError;
use crate::message::{HeaderValue, Message};
use crate::router::{PublishReceipt, Router};
use futures_util::future::join_all;
use std::{collections::HashMap, sync::Arc};
use tracing::{debug, warn};

/// What to signal upstream when a message finds no subscriber.
///
/// Mirrors broker behavior where consumers may not be attached yet: the drop is
/// logged, never an error, and the broker-side decision is the adapter's.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZeroSubscriberPolicy {
    /// Nack upstream with redelivery so the broker re-attempts later
    Requeue,

    /// Ack upstream and let the message go
    Drop,
}

/// Binds one broker subscription to one bus channel.
pub struct InboundBinding {
    router: Arc<Router>,
    channel: String,
    zero_subscribers: ZeroSubscriberPolicy,
}

impl InboundBinding {
    /// Creates a binding onto the given channel.
    ///
    /// Messages that find no subscriber are requeued upstream by default.
    ///
    /// # Parameters
    /// * `router` - The bus router
    /// * `channel` - Name of the channel inbound messages are published on
    ///
    /// # Returns
    /// A new InboundBinding
    pub fn new(router: Arc<Router>, channel: &str) -> InboundBinding {
        InboundBinding {
            router,
            channel: channel.to_owned(),
            zero_subscribers: ZeroSubscriberPolicy::Requeue,
        }
    }

    /// Overrides the zero-subscriber policy.
    ///
    /// # Returns
    /// Self for method chaining
    pub fn on_zero_subscribers(mut self, policy: ZeroSubscriberPolicy) -> Self {
        self.zero_subscribers = policy;
        self
    }

    /// Publishes one broker delivery onto the bus.
    ///
    /// The upstream decision is settled asynchronously: a background task waits
    /// for every dispatched delivery and then makes exactly one call on the broker
    /// callback. The returned receipt lets the adapter observe the same outcomes
    /// directly when it wants its own policy instead.
    ///
    /// # Parameters
    /// * `payload` - The delivery body
    /// * `headers` - Broker headers mapped onto bus header values
    /// * `callback` - The broker acknowledgment binding for this delivery
    ///
    /// # Returns
    /// The publish receipt, or `BusError::UnknownChannel` if the bound channel
    /// was never created
    pub async fn receive(
        &self,
        payload: &[u8],
        headers: HashMap<String, HeaderValue>,
        callback: Arc<dyn AckCallback>,
    ) -> Result<PublishReceipt, BusError> {
        let message = Message::new(payload, AckHandle::detached()).headers_from(headers);

        let receipt = self.router.publish(&self.channel, message)?;

        if receipt.is_dropped() {
            match self.zero_subscribers {
                ZeroSubscriberPolicy::Requeue => {
                    warn!(
                        channel = self.channel.as_str(),
                        "no subscribers, requeuing upstream"
                    );
                    callback.on_nack(true).await;
                }
                ZeroSubscriberPolicy::Drop => {
                    debug!(
                        channel = self.channel.as_str(),
                        "no subscribers, dropping upstream"
                    );
                    callback.on_ack().await;
                }
            }

            return Ok(receipt);
        }

        let handles = receipt.handles().to_vec();
        let channel = self.channel.clone();

        tokio::spawn(async move {
            let outcomes = join_all(handles.iter().map(|handle| handle.settled())).await;
            relay_aggregate(&channel, &outcomes, callback.as_ref()).await;
        });

        Ok(receipt)
    }
}

/// Makes the single upstream call for a set of settled fan-out outcomes.
async fn relay_aggregate(channel: &str, outcomes: &[AckOutcome], callback: &dyn AckCallback) {
    let redeliver = outcomes
        .iter()
        .any(|outcome| matches!(outcome, AckOutcome::Nacked { redeliver: true }));

    if redeliver {
        warn!(channel, "a subscriber requested redelivery, nacking upstream");
        callback.on_nack(true).await;
        return;
    }

    let all_acked = outcomes
        .iter()
        .all(|outcome| *outcome == AckOutcome::Acked);

    if all_acked {
        debug!(channel, "all deliveries acked, acking upstream");
        callback.on_ack().await;
    } else {
        debug!(channel, "deliveries rejected without redelivery, nacking upstream");
        callback.on_nack(false).await;
    }
}
