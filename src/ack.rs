// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Acknowledgment Handles
//!
//! This module provides the acknowledgment capability bound to each message delivery.
//! An `AckHandle` is created when an inbound adapter receives a broker delivery and
//! travels with the message to the subscriber, which settles it exactly once with
//! `ack` or `nack`. The terminal decision is relayed to the broker through an
//! `AckCallback` supplied at construction; handles without a broker binding are
//! "detached" and only track state.

use crate::errors::BusError;
use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;
use tracing::debug;

/// Broker-side acknowledgment binding.
///
/// Implemented per broker adapter (AMQP basic.ack, cloud pub/sub ack deadlines,
/// object-storage delete-on-consume). The bus relays the subscriber's terminal
/// decision through this callback and never depends on a specific broker type.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AckCallback: Send + Sync {
    /// Signals the broker that processing succeeded.
    async fn on_ack(&self);

    /// Signals the broker that processing failed, optionally requesting redelivery.
    async fn on_nack(&self, redeliver: bool);
}

/// The settlement state of a delivery.
///
/// `Pending` is the only non-terminal state; once a handle reaches `Acked` or
/// `Nacked` it never transitions again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckOutcome {
    /// No terminal decision was made yet
    Pending,

    /// The subscriber acknowledged the delivery
    Acked,

    /// The subscriber rejected the delivery
    Nacked {
        /// Whether the broker should re-attempt delivery
        redeliver: bool,
    },
}

struct AckShared {
    state: Mutex<AckOutcome>,
    settle: Notify,
    callback: Option<Arc<dyn AckCallback>>,
}

/// Acknowledgment capability bound to one message delivery.
///
/// Each delivery carries exactly one handle; in publish-subscribe fan-out every
/// subscriber receives its own independently terminable handle. Clones of a handle
/// observe the same delivery and share its terminal state, which is how adapters
/// watch settlement through [`crate::router::PublishReceipt`].
///
/// Transitioning a handle twice is a programming error and fails with
/// `BusError::AlreadyTerminal`; broker semantics around double-acks are
/// inconsistent, so the bus refuses to mask the misuse.
#[derive(Clone)]
pub struct AckHandle {
    shared: Arc<AckShared>,
}

impl AckHandle {
    /// Creates a handle that relays its terminal decision to a broker binding.
    ///
    /// # Parameters
    /// * `callback` - The broker-specific acknowledgment callback
    ///
    /// # Returns
    /// A pending handle bound to the broker
    pub fn bound(callback: Arc<dyn AckCallback>) -> AckHandle {
        AckHandle {
            shared: Arc::new(AckShared {
                state: Mutex::new(AckOutcome::Pending),
                settle: Notify::new(),
                callback: Some(callback),
            }),
        }
    }

    /// Creates a handle with no broker binding.
    ///
    /// Detached handles track settlement state without relaying it anywhere. They
    /// back application-originated messages and fan-out copies whose upstream
    /// decision is aggregated by the inbound adapter.
    ///
    /// # Returns
    /// A pending, unbound handle
    pub fn detached() -> AckHandle {
        AckHandle {
            shared: Arc::new(AckShared {
                state: Mutex::new(AckOutcome::Pending),
                settle: Notify::new(),
                callback: None,
            }),
        }
    }

    /// Creates an independent pending handle for a fan-out copy of the delivery.
    ///
    /// The fork starts detached: the upstream decision for a fan-out is the
    /// adapter's aggregate call, not any single subscriber's.
    pub(crate) fn fork(&self) -> AckHandle {
        AckHandle::detached()
    }

    /// Acknowledges the delivery.
    ///
    /// Relays success to the broker binding, if any, and wakes settlement waiters.
    ///
    /// # Returns
    /// Ok(()) on the first transition or `BusError::AlreadyTerminal` afterwards
    pub async fn ack(&self) -> Result<(), BusError> {
        self.transition(AckOutcome::Acked)?;

        match &self.shared.callback {
            Some(callback) => callback.on_ack().await,
            None => debug!("detached handle acked, no broker relay"),
        }

        self.shared.settle.notify_waiters();
        Ok(())
    }

    /// Negatively acknowledges the delivery.
    ///
    /// Relays failure to the broker binding, if any, and wakes settlement waiters.
    ///
    /// # Parameters
    /// * `redeliver` - Whether the broker should re-attempt delivery
    ///
    /// # Returns
    /// Ok(()) on the first transition or `BusError::AlreadyTerminal` afterwards
    pub async fn nack(&self, redeliver: bool) -> Result<(), BusError> {
        self.transition(AckOutcome::Nacked { redeliver })?;

        match &self.shared.callback {
            Some(callback) => callback.on_nack(redeliver).await,
            None => debug!(redeliver, "detached handle nacked, no broker relay"),
        }

        self.shared.settle.notify_waiters();
        Ok(())
    }

    /// Returns the current settlement state.
    pub fn outcome(&self) -> AckOutcome {
        *self.shared.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Returns true once the handle reached `Acked` or `Nacked`.
    pub fn is_terminal(&self) -> bool {
        self.outcome() != AckOutcome::Pending
    }

    /// Waits until the handle settles and returns the terminal outcome.
    ///
    /// Resolves immediately when the handle is already terminal. This is the
    /// notification surface adapters use to aggregate fan-out outcomes.
    pub async fn settled(&self) -> AckOutcome {
        loop {
            let notified = self.shared.settle.notified();

            let outcome = self.outcome();
            if outcome != AckOutcome::Pending {
                return outcome;
            }

            notified.await;
        }
    }

    fn transition(&self, to: AckOutcome) -> Result<(), BusError> {
        let mut state = self.shared.state.lock().unwrap_or_else(|e| e.into_inner());

        if *state != AckOutcome::Pending {
            return Err(BusError::AlreadyTerminal);
        }

        *state = to;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn ack_relays_to_the_broker_binding() {
        let mut callback = MockAckCallback::new();
        callback.expect_on_ack().times(1).return_const(());

        let handle = AckHandle::bound(Arc::new(callback));
        handle.ack().await.unwrap();

        assert_eq!(handle.outcome(), AckOutcome::Acked);
        assert!(handle.is_terminal());
    }

    #[tokio::test]
    async fn nack_relays_the_redeliver_flag() {
        let mut callback = MockAckCallback::new();
        callback
            .expect_on_nack()
            .withf(|redeliver| *redeliver)
            .times(1)
            .return_const(());

        let handle = AckHandle::bound(Arc::new(callback));
        handle.nack(true).await.unwrap();

        assert_eq!(handle.outcome(), AckOutcome::Nacked { redeliver: true });
    }

    #[tokio::test]
    async fn double_ack_fails_with_already_terminal() {
        let handle = AckHandle::detached();

        handle.ack().await.unwrap();
        assert_eq!(handle.ack().await, Err(BusError::AlreadyTerminal));
    }

    #[tokio::test]
    async fn nack_after_ack_fails_with_already_terminal() {
        let handle = AckHandle::detached();

        handle.ack().await.unwrap();
        assert_eq!(handle.nack(false).await, Err(BusError::AlreadyTerminal));
        assert_eq!(handle.outcome(), AckOutcome::Acked);
    }

    #[tokio::test]
    async fn double_nack_fails_with_already_terminal() {
        let handle = AckHandle::detached();

        handle.nack(false).await.unwrap();
        assert_eq!(handle.nack(true).await, Err(BusError::AlreadyTerminal));
        assert_eq!(handle.outcome(), AckOutcome::Nacked { redeliver: false });
    }

    #[tokio::test]
    async fn clones_share_terminal_state() {
        let handle = AckHandle::detached();
        let watch = handle.clone();

        handle.ack().await.unwrap();

        assert_eq!(watch.outcome(), AckOutcome::Acked);
        assert_eq!(watch.ack().await, Err(BusError::AlreadyTerminal));
    }

    #[tokio::test]
    async fn forks_settle_independently() {
        let handle = AckHandle::detached();
        let fork = handle.fork();

        handle.ack().await.unwrap();

        assert_eq!(fork.outcome(), AckOutcome::Pending);
        fork.nack(true).await.unwrap();
        assert_eq!(fork.outcome(), AckOutcome::Nacked { redeliver: true });
        assert_eq!(handle.outcome(), AckOutcome::Acked);
    }

    #[tokio::test]
    async fn settled_wakes_a_pending_waiter() {
        let handle = AckHandle::detached();
        let watch = handle.clone();

        let waiter = tokio::spawn(async move { watch.settled().await });

        tokio::task::yield_now().await;
        handle.nack(false).await.unwrap();

        let outcome = waiter.await.unwrap();
        assert_eq!(outcome, AckOutcome::Nacked { redeliver: false });
    }

    #[tokio::test]
    async fn settled_resolves_immediately_when_terminal() {
        let handle = AckHandle::detached();
        handle.ack().await.unwrap();

        assert_eq!(handle.settled().await, AckOutcome::Acked);
    }
}
