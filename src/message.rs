// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Messages and the Messaging Client Seam
//!
//! This module defines the transport-neutral message the middleware works with
//! and the `Client` trait a messaging connection implements to publish it.
//! The middleware never talks to a broker directly: replies go out through the
//! client a message was received from.

use crate::errors::TransportError;
use async_trait::async_trait;
use std::{collections::BTreeMap, fmt, sync::Arc};

/// Message headers, keyed by header name.
pub type Headers = BTreeMap<String, String>;

/// A messaging connection able to publish messages to a subject.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Client: Send + Sync {
    /// Publishes a message to the given subject.
    ///
    /// # Parameters
    /// * `subject` - The subject to publish to
    /// * `msg` - The message to publish
    ///
    /// # Returns
    /// Ok(()) on success or TransportError on failure
    async fn publish(&self, subject: &str, msg: Message) -> Result<(), TransportError>;
}

/// A message received from, or about to be sent to, the broker.
#[derive(Clone, Default)]
pub struct Message {
    /// Subject the message was published on
    pub subject: String,
    /// Subject the receiver is expected to answer on, if any
    pub reply: Option<String>,
    /// Message headers, including trace propagation headers
    pub headers: Headers,
    /// Message body
    pub payload: Vec<u8>,
    client: Option<Arc<dyn Client>>,
}

impl fmt::Debug for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Message")
            .field("subject", &self.subject)
            .field("reply", &self.reply)
            .field("headers", &self.headers)
            .field("payload", &self.payload.len())
            .field("bound", &self.client.is_some())
            .finish()
    }
}

impl Message {
    /// Creates a new message for the given subject.
    ///
    /// # Parameters
    /// * `subject` - The subject of the message
    /// * `payload` - The message body
    ///
    /// # Returns
    /// A new message without reply subject or headers
    pub fn new(subject: &str, payload: impl Into<Vec<u8>>) -> Message {
        Message {
            subject: subject.to_owned(),
            payload: payload.into(),
            ..Default::default()
        }
    }

    /// Sets the reply subject of the message.
    ///
    /// # Returns
    /// Self for method chaining
    pub fn with_reply(mut self, reply: &str) -> Self {
        self.reply = Some(reply.to_owned());
        self
    }

    /// Adds a header to the message.
    ///
    /// # Returns
    /// Self for method chaining
    pub fn with_header(mut self, key: &str, value: &str) -> Self {
        self.headers.insert(key.to_owned(), value.to_owned());
        self
    }

    /// Binds the message to the client it was received through.
    ///
    /// # Returns
    /// Self for method chaining
    pub fn bind(mut self, client: Arc<dyn Client>) -> Self {
        self.client = Some(client);
        self
    }

    /// Returns the reply subject, treating an empty subject as absent.
    pub fn reply_subject(&self) -> Option<&str> {
        self.reply.as_deref().filter(|reply| !reply.is_empty())
    }

    /// Sends `msg` to the reply subject of this message.
    ///
    /// # Returns
    /// Ok(()) on success or TransportError when there is nothing to reply to,
    /// no bound client, or the publish fails
    pub async fn respond(&self, mut msg: Message) -> Result<(), TransportError> {
        let reply = self.reply_subject().ok_or(TransportError::NoReplySubject)?;
        let client = self.client.as_ref().ok_or(TransportError::NotBound)?;

        msg.subject = reply.to_owned();
        client.publish(reply, msg).await
    }
}
