// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Message Handlers
//!
//! This module provides the handler contract subscribers register with the router,
//! plus the auto-ack convenience wrapper for handlers that don't manage their own
//! acknowledgment lifecycle.

use crate::errors::BusError;
use crate::message::Message;
use async_trait::async_trait;

/// A subscriber's message handler.
///
/// The handler owns the delivery's acknowledgment lifecycle: it settles the message
/// through `message.ack()` / `message.nack(redeliver)` when it is done. A handler
/// that returns an error without settling is auto-nacked with redelivery by the
/// dispatch layer to preserve at-least-once semantics.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MessageHandler: Send + Sync {
    /// Processes one delivery.
    ///
    /// # Parameters
    /// * `message` - The delivered message, owning its acknowledgment handle
    ///
    /// # Returns
    /// Ok(()) on success or BusError on failure
    async fn handle(&self, message: Message) -> Result<(), BusError>;
}

/// Wraps a handler so the acknowledgment follows its return value.
///
/// On `Ok` the delivery is acked, on `Err` it is nacked with redelivery, unless the
/// inner handler already settled the message itself. Manual acknowledgment remains
/// the core contract; this is the adapter-facing convenience for the auto-ack style.
pub struct AutoAckHandler<H> {
    inner: H,
}

impl<H> AutoAckHandler<H> {
    /// Wraps the given handler.
    ///
    /// # Parameters
    /// * `inner` - The handler to wrap
    ///
    /// # Returns
    /// A new AutoAckHandler
    pub fn new(inner: H) -> AutoAckHandler<H> {
        AutoAckHandler { inner }
    }
}

#[async_trait]
impl<H> MessageHandler for AutoAckHandler<H>
where
    H: MessageHandler,
{
    async fn handle(&self, message: Message) -> Result<(), BusError> {
        let ack = message.ack_handle().clone();

        match self.inner.handle(message).await {
            Ok(()) => {
                if !ack.is_terminal() {
                    ack.ack().await?;
                }
                Ok(())
            }
            Err(err) => {
                if !ack.is_terminal() {
                    ack.nack(true).await?;
                }
                Err(err)
            }
        }
    }
}
