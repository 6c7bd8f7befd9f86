// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Message Handling Middleware
//!
//! `Middleware` wraps a message handler with tracing, metrics and structured
//! logging. For every message it:
//! 1. Extracts the remote trace context from the message headers
//! 2. Starts a consumer span named after the subject
//! 3. Dumps the request payload when configured to
//! 4. Runs the handler within the span context
//! 5. Dumps the response and runs the post-hook when the handler succeeded
//! 6. Dumps the payloads when handling failed and dumping on error is enabled
//! 7. Records the outcome on the span and the metric instruments

use crate::{
    errors::{BoxError, MiddlewareError},
    hook::HookContext,
    message::Message,
    metrics::{Instruments, DESTINATION_NAME},
    options::{Settings, SettingsOption},
    otel,
};
use async_trait::async_trait;
use opentelemetry::{
    trace::{Status, TraceContextExt},
    Context, KeyValue,
};
use std::time::Instant;
use tracing::{debug, error, info};

/// Span event name used for request dumps
pub const REQUEST_EVENT: &str = "request";
/// Span event name used for response dumps
pub const RESPONSE_EVENT: &str = "response";
/// Span event attribute holding a dumped payload
pub const PAYLOAD_ATTRIBUTE: &str = "messaging.message.body";

/// A message handler producing the payload handed to the post-hook.
#[async_trait]
pub trait Handler: Send + Sync {
    /// Handles a message within the given processing context.
    ///
    /// # Returns
    /// The response payload on success
    async fn handle(&self, cx: &Context, msg: &Message) -> Result<Vec<u8>, BoxError>;
}

/// Instrumented wrapper around a `Handler`.
pub struct Middleware<H> {
    handler: H,
    settings: Settings,
    instruments: Instruments,
}

impl<H> Middleware<H>
where
    H: Handler,
{
    /// Wraps `handler`, configuring the middleware with `opts`.
    pub fn new<I>(handler: H, opts: I) -> Self
    where
        I: IntoIterator<Item = Box<dyn SettingsOption>>,
    {
        let settings = Settings::new(opts);
        let instruments = Instruments::new(&settings.meter());

        Middleware {
            handler,
            settings,
            instruments,
        }
    }

    /// Returns the settings the middleware was built with.
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Handles one message.
    ///
    /// # Returns
    /// Ok(()) on success, or the handler or post-hook error
    pub async fn handle(&self, msg: &Message) -> Result<(), MiddlewareError> {
        let start = Instant::now();
        let telemetry = self.settings.telemetry();

        let (parent, span) = otel::new_span(telemetry, &msg.headers, &msg.subject);
        let cx = parent.with_span(span);
        cx.span()
            .set_attribute(KeyValue::new(DESTINATION_NAME, msg.subject.clone()));

        debug!(subject = msg.subject, "received message");

        if self.settings.dump_request() {
            dump(&cx, REQUEST_EVENT, &msg.subject, &msg.payload);
        }

        let mut response = None;
        let result = match self.handler.handle(&cx, msg).await {
            Ok(data) => {
                if self.settings.dump_response() {
                    dump(&cx, RESPONSE_EVENT, &msg.subject, &data);
                }

                let res = match self.settings.post_hook() {
                    Some(hook) => {
                        let ctx = HookContext::new(cx.clone(), telemetry.clone());
                        hook.call(&ctx, msg, &data).await
                    }
                    None => Ok(()),
                };

                response = Some(data);
                res
            }
            Err(err) => Err(MiddlewareError::Handler(err)),
        };

        match &result {
            Ok(()) => {
                debug!(subject = msg.subject, "message successfully processed");
                cx.span().set_status(Status::Ok);
            }
            Err(err) => {
                if self.settings.dump_payload_on_error() {
                    if !self.settings.dump_request() {
                        dump(&cx, REQUEST_EVENT, &msg.subject, &msg.payload);
                    }
                    if let Some(data) = response.as_deref() {
                        if !self.settings.dump_response() {
                            dump(&cx, RESPONSE_EVENT, &msg.subject, data);
                        }
                    }
                }

                error!(
                    error = err.to_string(),
                    subject = msg.subject,
                    "error handling message"
                );
                let span = cx.span();
                span.record_error(err);
                span.set_status(Status::error(err.to_string()));
            }
        }

        self.instruments
            .record(&msg.subject, start.elapsed(), result.is_err());
        cx.span().end();

        result
    }
}

fn dump(cx: &Context, event: &'static str, subject: &str, payload: &[u8]) {
    let body = String::from_utf8_lossy(payload).into_owned();

    info!(subject, payload = body.as_str(), "{} dump", event);
    cx.span()
        .add_event(event, vec![KeyValue::new(PAYLOAD_ATTRIBUTE, body)]);
}
