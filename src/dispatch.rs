// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Subscriber Dispatch
//!
//! This module provides the per-subscriber delivery path. Each subscription owns a
//! worker task fed by an unbounded queue, which keeps publish order per channel and
//! per publisher without ever blocking a publisher on a slow handler. The dispatch
//! wrapper isolates handler failures: an error or panic is caught at the boundary,
//! logged as a failed delivery, and auto-nacked with redelivery unless the handler
//! already settled the message itself.

use crate::ack::{AckHandle, AckOutcome};
use crate::handler::MessageHandler;
use crate::message::Message;
use crate::otel;
use opentelemetry::{
    global::{self, BoxedTracer},
    trace::{FutureExt, Span, Status},
};
use std::{borrow::Cow, sync::Arc};
use tokio::{sync::mpsc::UnboundedReceiver, task::JoinHandle};
use tracing::{debug, error, warn};
use uuid::Uuid;

/// One queued delivery on its way to a subscriber's worker.
pub(crate) struct Delivery {
    pub(crate) message: Message,
    pub(crate) channel: String,
    pub(crate) subscription: Uuid,
}

/// The state of a single delivery instance.
///
/// `Dispatched` and `Processing` are transient; the other states are final and the
/// dispatch layer never transitions out of them. Redelivery after a nack is the
/// broker's job, not this layer's.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryState {
    /// Queued to the subscriber's worker
    Dispatched,

    /// Handed to the handler; also the final report for a delivery the handler
    /// completed without settling (manual-ack contract, settlement still pending)
    Processing,

    /// The handler acknowledged the delivery
    Acked,

    /// The handler negatively acknowledged the delivery
    Nacked,

    /// The handler failed without settling and the wrapper nacked with redelivery
    AutoNackedOnError,
}

/// Spawns the worker task draining one subscription's delivery queue.
///
/// The worker exits once every sender feeding the queue is dropped, which is how
/// unsubscription winds a subscriber down without cancelling queued deliveries.
pub(crate) fn spawn_worker(
    handler: Arc<dyn MessageHandler>,
    mut rx: UnboundedReceiver<Delivery>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(delivery) = rx.recv().await {
            deliver(&global::tracer("bus dispatcher"), handler.clone(), delivery).await;
        }
    })
}

/// Runs one delivery through the subscriber's handler.
///
/// The handler executes on its own task so a panic is contained to this delivery.
/// If the handler fails (error or panic) without reaching a terminal ack state,
/// the delivery is auto-nacked with `redeliver = true` to preserve at-least-once
/// semantics.
///
/// # Parameters
/// * `tracer` - OpenTelemetry tracer for the consumer span
/// * `handler` - The subscriber's handler
/// * `delivery` - The queued delivery
///
/// # Returns
/// The final state of this delivery instance
pub(crate) async fn deliver(
    tracer: &BoxedTracer,
    handler: Arc<dyn MessageHandler>,
    delivery: Delivery,
) -> DeliveryState {
    let Delivery {
        message,
        channel,
        subscription,
    } = delivery;

    debug!(
        channel = channel.as_str(),
        subscription = subscription.to_string(),
        "delivery dispatched"
    );

    let (ctx, mut span) = otel::new_consumer_span(message.headers(), tracer, &channel);
    let watch = message.ack_handle().clone();

    debug!(channel = channel.as_str(), "delivery processing");

    let spawned = tokio::spawn(
        async move { handler.handle(message).await }.with_context(ctx),
    )
    .await;

    match spawned {
        Ok(Ok(())) => match watch.outcome() {
            AckOutcome::Acked => {
                span.set_status(Status::Ok);
                DeliveryState::Acked
            }
            AckOutcome::Nacked { .. } => {
                span.set_status(Status::Ok);
                DeliveryState::Nacked
            }
            AckOutcome::Pending => {
                debug!(
                    channel = channel.as_str(),
                    "handler finished without settling, leaving delivery pending"
                );
                DeliveryState::Processing
            }
        },
        Ok(Err(err)) => {
            error!(
                error = err.to_string(),
                channel = channel.as_str(),
                "handler failed"
            );
            span.record_error(&err);
            span.set_status(Status::Error {
                description: Cow::from("handler failure"),
            });

            auto_nack(&watch, &channel).await
        }
        Err(err) => {
            error!(
                error = err.to_string(),
                channel = channel.as_str(),
                "handler panicked"
            );
            span.set_status(Status::Error {
                description: Cow::from("handler panicked"),
            });

            auto_nack(&watch, &channel).await
        }
    }
}

/// Nacks a failed delivery with redelivery, unless the handler already settled it,
/// in which case the handler's own decision stands.
async fn auto_nack(watch: &AckHandle, channel: &str) -> DeliveryState {
    match watch.outcome() {
        AckOutcome::Acked => DeliveryState::Acked,
        AckOutcome::Nacked { .. } => DeliveryState::Nacked,
        AckOutcome::Pending => {
            if let Err(err) = watch.nack(true).await {
                warn!(
                    error = err.to_string(),
                    channel, "delivery settled concurrently, skipping auto-nack"
                );
                return DeliveryState::Nacked;
            }

            DeliveryState::AutoNackedOnError
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ack::AckHandle;
    use crate::errors::BusError;
    use async_trait::async_trait;

    struct AckingHandler;

    #[async_trait]
    impl MessageHandler for AckingHandler {
        async fn handle(&self, message: Message) -> Result<(), BusError> {
            message.ack().await
        }
    }

    struct SilentHandler;

    #[async_trait]
    impl MessageHandler for SilentHandler {
        async fn handle(&self, _message: Message) -> Result<(), BusError> {
            Ok(())
        }
    }

    struct FailingHandler;

    #[async_trait]
    impl MessageHandler for FailingHandler {
        async fn handle(&self, _message: Message) -> Result<(), BusError> {
            Err(BusError::HandlerError("boom".to_owned()))
        }
    }

    struct NackThenFailHandler;

    #[async_trait]
    impl MessageHandler for NackThenFailHandler {
        async fn handle(&self, message: Message) -> Result<(), BusError> {
            message.nack(false).await?;
            Err(BusError::HandlerError("late failure".to_owned()))
        }
    }

    struct PanickingHandler;

    #[async_trait]
    impl MessageHandler for PanickingHandler {
        async fn handle(&self, _message: Message) -> Result<(), BusError> {
            panic!("kaboom")
        }
    }

    fn delivery() -> (Delivery, AckHandle) {
        let message = Message::new(b"hi", AckHandle::detached());
        let watch = message.ack_handle().clone();

        let delivery = Delivery {
            message,
            channel: "orders".to_owned(),
            subscription: Uuid::new_v4(),
        };

        (delivery, watch)
    }

    #[tokio::test]
    async fn an_acked_delivery_reports_acked() {
        let (delivery, watch) = delivery();

        let state = deliver(&global::tracer("test"), Arc::new(AckingHandler), delivery).await;

        assert_eq!(state, DeliveryState::Acked);
        assert_eq!(watch.outcome(), AckOutcome::Acked);
    }

    #[tokio::test]
    async fn a_successful_unsettled_delivery_stays_pending() {
        let (delivery, watch) = delivery();

        let state = deliver(&global::tracer("test"), Arc::new(SilentHandler), delivery).await;

        assert_eq!(state, DeliveryState::Processing);
        assert_eq!(watch.outcome(), AckOutcome::Pending);
    }

    #[tokio::test]
    async fn a_failed_delivery_is_auto_nacked_with_redelivery() {
        let (delivery, watch) = delivery();

        let state = deliver(&global::tracer("test"), Arc::new(FailingHandler), delivery).await;

        assert_eq!(state, DeliveryState::AutoNackedOnError);
        assert_eq!(watch.outcome(), AckOutcome::Nacked { redeliver: true });
    }

    #[tokio::test]
    async fn a_handler_settled_nack_stands_over_the_auto_nack() {
        let (delivery, watch) = delivery();

        let state = deliver(
            &global::tracer("test"),
            Arc::new(NackThenFailHandler),
            delivery,
        )
        .await;

        assert_eq!(state, DeliveryState::Nacked);
        assert_eq!(watch.outcome(), AckOutcome::Nacked { redeliver: false });
    }

    #[tokio::test]
    async fn a_panicking_handler_is_contained_and_auto_nacked() {
        let (delivery, watch) = delivery();

        let state = deliver(
            &global::tracer("test"),
            Arc::new(PanickingHandler),
            delivery,
        )
        .await;

        assert_eq!(state, DeliveryState::AutoNackedOnError);
        assert_eq!(watch.outcome(), AckOutcome::Nacked { redeliver: true });
    }
}
