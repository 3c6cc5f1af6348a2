// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Outbound Gateway
//!
//! This module provides the gateway surface application code uses to send
//! messages outwards. `ChannelGateway` publishes the payload onto a named bus
//! channel; a broker-specific publisher handler subscribed to that channel carries
//! it to the wire. OpenTelemetry trace context is injected into the message
//! headers for distributed request tracking.

use crate::ack::AckHandle;
use crate::errors::BusError;
use crate::message::{HeaderValue, Message};
use crate::otel;
use crate::router::Router;
use async_trait::async_trait;
use opentelemetry::Context;
use std::{collections::HashMap, fmt, sync::Arc};
use tracing::{debug, error};
use uuid::Uuid;

/// Identifies one outbound hand-off; mirrors the message id of the envelope the
/// gateway published.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeliveryId(Uuid);

impl DeliveryId {
    /// Returns the underlying uuid.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl fmt::Display for DeliveryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Accepts application-originated payloads for delivery to a broker.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait OutboundGateway: Send + Sync {
    /// Hands a payload with its headers to the outbound path.
    ///
    /// # Parameters
    /// * `payload` - The opaque message body
    /// * `headers` - Headers to attach to the outbound envelope
    ///
    /// # Returns
    /// The delivery id on success or BusError on failure
    async fn send(
        &self,
        payload: &[u8],
        headers: HashMap<String, HeaderValue>,
    ) -> Result<DeliveryId, BusError>;
}

/// Outbound gateway backed by a bus channel.
///
/// The broker publisher is just another subscriber on the configured channel, so
/// the application never talks to a broker type directly.
pub struct ChannelGateway {
    router: Arc<Router>,
    channel: String,
}

impl ChannelGateway {
    /// Creates a new gateway over the given channel.
    ///
    /// # Parameters
    /// * `router` - The bus router
    /// * `channel` - Name of the channel carrying outbound messages
    ///
    /// # Returns
    /// An Arc-wrapped ChannelGateway instance for thread-safe sharing
    pub fn new(router: Arc<Router>, channel: &str) -> Arc<ChannelGateway> {
        Arc::new(ChannelGateway {
            router,
            channel: channel.to_owned(),
        })
    }
}

#[async_trait]
impl OutboundGateway for ChannelGateway {
    /// Publishes the payload onto the outbound channel.
    ///
    /// The current OpenTelemetry context is injected into the headers before
    /// publishing. A channel with no subscriber attached cannot carry the message
    /// anywhere, so that case is surfaced as `BusError::NoOutboundRoute` rather
    /// than silently dropped.
    async fn send(
        &self,
        payload: &[u8],
        headers: HashMap<String, HeaderValue>,
    ) -> Result<DeliveryId, BusError> {
        let mut headers = headers;
        otel::inject_context(&Context::current(), &mut headers);

        let message = Message::new(payload, AckHandle::detached()).headers_from(headers);
        let id = DeliveryId(message.id());

        let receipt = self.router.publish(&self.channel, message)?;
        if receipt.is_dropped() {
            error!(
                channel = self.channel.as_str(),
                "no outbound subscriber to carry the message"
            );
            return Err(BusError::NoOutboundRoute(self.channel.clone()));
        }

        debug!(
            channel = self.channel.as_str(),
            delivery = id.to_string(),
            "outbound message handed off"
        );

        Ok(id)
    }
}
