// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Error Types for the NATS Middleware
//!
//! Two error families live here. `TransportError` is what a messaging client
//! reports back when publishing fails, and `MiddlewareError` is what the
//! middleware and its post-hooks return to the dispatcher that drives them.

use std::{backtrace::Backtrace, sync::Arc};
use thiserror::Error;

/// Boxed error type returned by message handlers.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Represents errors reported by the messaging client.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The inbound message carries no reply subject to respond to
    #[error("message has no reply subject")]
    NoReplySubject,

    /// The message was not received through a client, so it can't respond
    #[error("message is not bound to a client")]
    NotBound,

    /// Error publishing a message
    #[error("failure to publish `{0}`")]
    PublishError(String),
}

/// Represents errors surfaced by the middleware while handling a message.
#[derive(Error, Debug)]
pub enum MiddlewareError {
    /// Sending the reply produced by a handler failed
    #[error("failure to send reply to `{subject}`")]
    Reply {
        subject: String,
        #[source]
        source: TransportError,
        trace: Arc<Backtrace>,
    },

    /// The wrapped handler returned an error
    #[error("handler failure")]
    Handler(#[source] BoxError),

    /// A post-hook returned an error of its own
    #[error("post hook failure")]
    PostHook(#[source] BoxError),

    /// The middleware configuration could not be parsed
    #[error("failure to parse middleware config `{0}`")]
    ConfigError(String),
}

impl MiddlewareError {
    /// Wraps a failed reply send, capturing the backtrace of the call site.
    pub fn reply(subject: &str, source: TransportError) -> Self {
        MiddlewareError::Reply {
            subject: subject.to_owned(),
            source,
            trace: Arc::new(Backtrace::capture()),
        }
    }

    /// Returns the backtrace captured when the error was created, if any.
    pub fn backtrace(&self) -> Option<&Backtrace> {
        match self {
            MiddlewareError::Reply { trace, .. } => Some(trace.as_ref()),
            _ => None,
        }
    }
}
