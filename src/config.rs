// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Declarative Middleware Configuration
//!
//! `MiddlewareConfig` is the serde form of the boolean options, meant to be
//! embedded in an application configuration file. It turns into the same
//! option list a caller would otherwise build by hand.

use crate::{
    errors::MiddlewareError,
    options::{
        with_dump_payload_on_error, with_dump_request, with_dump_response, with_reply,
        SettingsOption,
    },
};
use serde::{Deserialize, Serialize};
use tracing::error;

/// Reply behaviour of the middleware.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplyConfig {
    /// Stamp trace and baggage headers on replies
    #[serde(default)]
    pub inject: bool,
}

/// Middleware configuration as found in configuration files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MiddlewareConfig {
    #[serde(default)]
    pub dump_request: bool,
    #[serde(default)]
    pub dump_response: bool,
    #[serde(default = "default_dump_payload_on_error")]
    pub dump_payload_on_error: bool,
    #[serde(default)]
    pub reply: Option<ReplyConfig>,
}

fn default_dump_payload_on_error() -> bool {
    true
}

impl Default for MiddlewareConfig {
    fn default() -> Self {
        MiddlewareConfig {
            dump_request: false,
            dump_response: false,
            dump_payload_on_error: default_dump_payload_on_error(),
            reply: None,
        }
    }
}

impl MiddlewareConfig {
    /// Parses a configuration from its JSON representation.
    pub fn from_json(raw: &str) -> Result<Self, MiddlewareError> {
        serde_json::from_str(raw).map_err(|err| {
            error!(error = err.to_string(), "failure to parse middleware config");
            MiddlewareError::ConfigError(err.to_string())
        })
    }

    /// Returns the equivalent options: the dump flags, then the reply hook.
    pub fn options(&self) -> Vec<Box<dyn SettingsOption>> {
        let mut opts = vec![
            with_dump_request(self.dump_request),
            with_dump_response(self.dump_response),
            with_dump_payload_on_error(self.dump_payload_on_error),
        ];

        if let Some(reply) = self.reply {
            opts.push(with_reply(reply.inject));
        }

        opts
    }
}
