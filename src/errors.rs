// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Error Types for the Message Bus
//!
//! This module provides the error types for the internal message bus.
//! The `BusError` enum represents all possible error scenarios that can occur during
//! channel registration, subscription, publishing, acknowledgment, and handler execution.

use thiserror::Error;

/// Represents errors that can occur during message bus operations.
///
/// Configuration-time mistakes (duplicate or unknown channels) and contract
/// violations (double ack/nack) are surfaced immediately to the caller and never
/// retried. Handler execution failures are recovered at the dispatch boundary and
/// reported through this type only to the failing handler's own context.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum BusError {
    /// Internal errors that don't fit into other categories
    #[error("internal error")]
    InternalError,

    /// A channel with the given name is already registered
    #[error("channel `{0}` already exists")]
    DuplicateChannel(String),

    /// No channel with the given name is registered
    #[error("unknown channel `{0}`")]
    UnknownChannel(String),

    /// The acknowledgment handle already reached a terminal state
    #[error("ack handle already terminal")]
    AlreadyTerminal,

    /// A message handler returned a failure
    #[error("handler failure `{0}`")]
    HandlerError(String),

    /// An outbound message found no subscriber to carry it to the broker
    #[error("no outbound route on channel `{0}`")]
    NoOutboundRoute(String),
}
