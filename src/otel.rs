// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # OpenTelemetry Integration for NATS Messages
//!
//! This module provides the adapters used to propagate trace context through
//! message headers: injecting it into outbound replies and extracting it from
//! inbound messages before the consumer span is started.

use crate::{message::Headers, telemetry::Telemetry};
use opentelemetry::{
    global::BoxedSpan,
    propagation::{Extractor, Injector},
    trace::{SpanKind, Tracer},
    Context,
};
use std::borrow::Cow;

/// An adapter for injecting OpenTelemetry context into message headers.
pub(crate) struct HeaderInjector<'a> {
    headers: &'a mut Headers,
}

impl<'a> HeaderInjector<'a> {
    pub(crate) fn new(headers: &'a mut Headers) -> Self {
        Self { headers }
    }
}

impl Injector for HeaderInjector<'_> {
    fn set(&mut self, key: &str, value: String) {
        self.headers.insert(key.to_lowercase(), value);
    }
}

/// Read-only counterpart of `HeaderInjector`, used on inbound messages.
pub(crate) struct HeaderExtractor<'a> {
    headers: &'a Headers,
}

impl<'a> HeaderExtractor<'a> {
    pub(crate) fn new(headers: &'a Headers) -> Self {
        Self { headers }
    }
}

impl Extractor for HeaderExtractor<'_> {
    /// Header names are matched case-insensitively, as NATS preserves the
    /// casing used by the publisher.
    fn get(&self, key: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(key))
            .map(|(_, value)| value.as_str())
    }

    fn keys(&self) -> Vec<&str> {
        self.headers.keys().map(|header| header.as_str()).collect()
    }
}

/// Stamps the trace and baggage context of `cx` onto `headers`.
pub fn inject(telemetry: &Telemetry, cx: &Context, headers: &mut Headers) {
    telemetry.with_propagator(|propagator| {
        propagator.inject_context(cx, &mut HeaderInjector::new(headers))
    });
}

/// Extracts the remote trace and baggage context carried by `headers`.
pub fn extract(telemetry: &Telemetry, headers: &Headers) -> Context {
    telemetry.with_propagator(|propagator| propagator.extract(&HeaderExtractor::new(headers)))
}

/// Creates a new consumer span for message processing.
///
/// # Parameters
/// * `telemetry` - Telemetry providing the tracer and propagator
/// * `headers` - Headers of the inbound message
/// * `name` - Name for the new span (typically the message subject)
///
/// # Returns
/// A tuple containing the extracted parent context and the new span
pub fn new_span(telemetry: &Telemetry, headers: &Headers, name: &str) -> (Context, BoxedSpan) {
    let ctx = extract(telemetry, headers);
    let tracer = telemetry.tracer();

    let span = tracer
        .span_builder(Cow::from(name.to_owned()))
        .with_kind(SpanKind::Consumer)
        .start_with_context(tracer, &ctx);

    (ctx, span)
}
