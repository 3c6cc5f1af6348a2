// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Message Envelope
//!
//! This module provides the immutable message envelope routed by the bus: an opaque
//! payload, a header map, and the acknowledgment handle for the delivery. Payload
//! and headers never change after construction; only the settlement state of the
//! handle does, and only through the handle itself.

use crate::ack::{AckHandle, AckOutcome};
use crate::errors::BusError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Header carrying the generated message id, mirrored from the envelope field so
/// adapters that only see the header map can correlate deliveries.
pub const HEADER_MESSAGE_ID: &str = "message-id";

/// A typed header value.
///
/// Broker adapters map their wire-level header types onto this set when
/// translating deliveries into bus messages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum HeaderValue {
    String(String),
    Int(i64),
    Uint(u64),
    Bool(bool),
    Bytes(Vec<u8>),
}

impl HeaderValue {
    /// Returns the value as a string slice when it is a `String` header.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            HeaderValue::String(v) => Some(v),
            _ => None,
        }
    }
}

/// Immutable message envelope with its acknowledgment handle.
///
/// The handle is owned by the message until delivery hands it to the subscriber's
/// processing context. Fan-out never shares a handle between subscribers: each
/// logical copy created by [`Message::fork`] carries a fresh, independently
/// terminable one.
pub struct Message {
    id: Uuid,
    payload: Vec<u8>,
    headers: HashMap<String, HeaderValue>,
    ack: AckHandle,
}

impl Message {
    /// Creates a new message with the given payload and acknowledgment handle.
    ///
    /// A v4 uuid is generated as the message id and mirrored into the
    /// `message-id` header.
    ///
    /// # Parameters
    /// * `payload` - The opaque message body
    /// * `ack` - The acknowledgment handle for this delivery
    ///
    /// # Returns
    /// A new message envelope
    pub fn new(payload: &[u8], ack: AckHandle) -> Message {
        let id = Uuid::new_v4();

        let mut headers = HashMap::new();
        headers.insert(
            HEADER_MESSAGE_ID.to_owned(),
            HeaderValue::String(id.to_string()),
        );

        Message {
            id,
            payload: payload.to_owned(),
            headers,
            ack,
        }
    }

    /// Adds a header during construction.
    ///
    /// # Parameters
    /// * `key` - The header key; an existing value under the key is replaced
    /// * `value` - The header value
    ///
    /// # Returns
    /// Self for method chaining
    pub fn header(mut self, key: &str, value: HeaderValue) -> Self {
        self.headers.insert(key.to_owned(), value);
        self
    }

    /// Adds every entry of the given map as headers during construction.
    ///
    /// # Parameters
    /// * `headers` - Header entries to merge into the envelope
    ///
    /// # Returns
    /// Self for method chaining
    pub fn headers_from(mut self, headers: HashMap<String, HeaderValue>) -> Self {
        self.headers.extend(headers);
        self
    }

    /// Returns the generated message id.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Returns the message payload.
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Returns the header map.
    pub fn headers(&self) -> &HashMap<String, HeaderValue> {
        &self.headers
    }

    /// Returns the header value for the given key, if present.
    pub fn get_header(&self, key: &str) -> Option<&HeaderValue> {
        self.headers.get(key)
    }

    /// Returns the acknowledgment handle of this delivery.
    pub fn ack_handle(&self) -> &AckHandle {
        &self.ack
    }

    /// Acknowledges this delivery. See [`AckHandle::ack`].
    pub async fn ack(&self) -> Result<(), BusError> {
        self.ack.ack().await
    }

    /// Negatively acknowledges this delivery. See [`AckHandle::nack`].
    pub async fn nack(&self, redeliver: bool) -> Result<(), BusError> {
        self.ack.nack(redeliver).await
    }

    /// Returns the settlement state of this delivery.
    pub fn outcome(&self) -> AckOutcome {
        self.ack.outcome()
    }

    /// Creates the logical copy delivered to one fan-out subscriber.
    ///
    /// Payload, headers and message id are identical to the original; the
    /// acknowledgment handle is a fresh pending one so every subscriber settles
    /// independently.
    pub(crate) fn fork(&self) -> Message {
        Message {
            id: self.id,
            payload: self.payload.clone(),
            headers: self.headers.clone(),
            ack: self.ack.fork(),
        }
    }

}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_message_mirrors_its_id_into_headers() {
        let msg = Message::new(b"hi", AckHandle::detached());

        let id_header = msg.get_header(HEADER_MESSAGE_ID).unwrap();
        assert_eq!(id_header.as_str(), Some(msg.id().to_string().as_str()));
    }

    #[test]
    fn header_builder_replaces_existing_keys() {
        let msg = Message::new(b"hi", AckHandle::detached())
            .header("kind", HeaderValue::String("order".to_owned()))
            .header("kind", HeaderValue::String("invoice".to_owned()))
            .header("attempt", HeaderValue::Uint(1));

        assert_eq!(msg.get_header("kind").unwrap().as_str(), Some("invoice"));
        assert_eq!(msg.get_header("attempt"), Some(&HeaderValue::Uint(1)));
        assert_eq!(msg.payload(), b"hi");
    }

    #[test]
    fn fork_copies_payload_and_headers_with_a_fresh_handle() {
        let msg = Message::new(b"hi", AckHandle::detached())
            .header("kind", HeaderValue::String("order".to_owned()));

        let copy = msg.fork();

        assert_eq!(copy.id(), msg.id());
        assert_eq!(copy.payload(), msg.payload());
        assert_eq!(copy.headers(), msg.headers());
        assert_eq!(copy.outcome(), AckOutcome::Pending);
    }

    #[test]
    fn header_maps_serialize_for_wire_adapters() {
        let msg = Message::new(b"hi", AckHandle::detached())
            .header("attempt", HeaderValue::Uint(2))
            .header("redelivered", HeaderValue::Bool(false));

        let json = serde_json::to_string(msg.headers()).unwrap();
        assert!(json.contains("\"attempt\""));
        assert!(json.contains("\"redelivered\""));
    }

    #[tokio::test]
    async fn fork_settles_independently_of_the_original() {
        let msg = Message::new(b"hi", AckHandle::detached());
        let copy = msg.fork();

        msg.ack().await.unwrap();

        assert_eq!(msg.outcome(), AckOutcome::Acked);
        assert_eq!(copy.outcome(), AckOutcome::Pending);
    }
}
