// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # OpenTelemetry Integration for the Message Bus
//!
//! This module provides integration with OpenTelemetry for distributed tracing.
//! It includes utilities for propagating trace context through message headers,
//! extracting context from inbound messages, and creating trace spans around
//! subscriber dispatch.

use crate::message::HeaderValue;
use opentelemetry::{
    global::{self, BoxedSpan, BoxedTracer},
    propagation::{Extractor, Injector},
    trace::{SpanKind, Tracer},
    Context,
};
use std::{borrow::Cow, collections::HashMap};

/// An adapter for injecting and extracting OpenTelemetry context from bus headers.
///
/// This struct implements the OpenTelemetry `Injector` and `Extractor` traits,
/// allowing trace context to travel in the message header map across the bus and
/// through broker adapters on either side.
pub(crate) struct BusTracePropagator<'a> {
    headers: &'a mut HashMap<String, HeaderValue>,
}

impl<'a> BusTracePropagator<'a> {
    pub(crate) fn new(headers: &'a mut HashMap<String, HeaderValue>) -> Self {
        Self { headers }
    }
}

impl Injector for BusTracePropagator<'_> {
    /// Sets a trace context key-value pair in the message headers.
    fn set(&mut self, key: &str, value: String) {
        self.headers
            .insert(key.to_lowercase(), HeaderValue::String(value));
    }
}

impl Extractor for BusTracePropagator<'_> {
    /// Gets a trace context value from the message headers.
    fn get(&self, key: &str) -> Option<&str> {
        self.headers.get(key).and_then(|value| value.as_str())
    }

    /// Gets all keys in the message headers.
    fn keys(&self) -> Vec<&str> {
        self.headers.keys().map(|key| key.as_str()).collect()
    }
}

/// Creates a new OpenTelemetry consumer span for a delivery.
///
/// Extracts trace context from the message headers and starts a span named after
/// the channel the delivery came through.
///
/// # Parameters
/// * `headers` - The message headers possibly carrying upstream trace context
/// * `tracer` - OpenTelemetry tracer
/// * `name` - Name for the new span (typically the channel name)
///
/// # Returns
/// A tuple containing the extracted context and the new span
pub(crate) fn new_consumer_span(
    headers: &HashMap<String, HeaderValue>,
    tracer: &BoxedTracer,
    name: &str,
) -> (Context, BoxedSpan) {
    let mut headers = headers.clone();

    let ctx = global::get_text_map_propagator(|propagator| {
        propagator.extract(&BusTracePropagator::new(&mut headers))
    });

    let span = tracer
        .span_builder(Cow::from(name.to_owned()))
        .with_kind(SpanKind::Consumer)
        .start_with_context(tracer, &ctx);

    (ctx, span)
}

/// Injects the given context into a header map on the outbound path.
pub(crate) fn inject_context(ctx: &Context, headers: &mut HashMap<String, HeaderValue>) {
    global::get_text_map_propagator(|propagator| {
        propagator.inject_context(ctx, &mut BusTracePropagator::new(headers))
    });
}
