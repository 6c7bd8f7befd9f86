// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Post-Handle Hooks
//!
//! A post-hook runs after a handler succeeded, with the payload the handler
//! produced. The built-in `ReplyHook` answers NATS requests with that payload.

use crate::{
    errors::MiddlewareError,
    message::Message,
    otel,
    telemetry::Telemetry,
};
use async_trait::async_trait;
use opentelemetry::Context;

/// What a post-hook knows about the handling it follows.
#[derive(Debug, Clone)]
pub struct HookContext {
    /// Context of the consumer span the handler ran in
    pub cx: Context,
    /// Telemetry the middleware was configured with
    pub telemetry: Telemetry,
}

impl HookContext {
    /// Creates the context handed to a post-hook.
    pub fn new(cx: Context, telemetry: Telemetry) -> Self {
        Self { cx, telemetry }
    }
}

/// Operation performed once per handled message, after the handler returned.
#[async_trait]
pub trait PostHook: Send + Sync {
    /// Runs the hook.
    ///
    /// # Parameters
    /// * `ctx` - Processing context of the handled message
    /// * `msg` - The inbound message
    /// * `data` - The payload produced by the handler
    ///
    /// # Returns
    /// Ok(()) on success or MiddlewareError on failure
    async fn call(&self, ctx: &HookContext, msg: &Message, data: &[u8])
        -> Result<(), MiddlewareError>;
}

/// Sends the handler output back to the requester.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReplyHook {
    inject: bool,
}

impl ReplyHook {
    /// Creates a reply hook; `inject` stamps trace and baggage headers on replies.
    pub fn new(inject: bool) -> Self {
        Self { inject }
    }
}

#[async_trait]
impl PostHook for ReplyHook {
    async fn call(
        &self,
        ctx: &HookContext,
        msg: &Message,
        data: &[u8],
    ) -> Result<(), MiddlewareError> {
        let Some(reply) = msg.reply_subject() else {
            return Ok(());
        };

        let mut res = Message::new(reply, data);
        if self.inject {
            otel::inject(&ctx.telemetry, &ctx.cx, &mut res.headers);
        }

        msg.respond(res)
            .await
            .map_err(|err| MiddlewareError::reply(reply, err))
    }
}
