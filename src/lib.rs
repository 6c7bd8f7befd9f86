// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

mod metrics;

pub mod config;
pub mod errors;
pub mod hook;
pub mod message;
pub mod middleware;
pub mod options;
pub mod otel;
pub mod telemetry;

/// Name the middleware's tracer and meter are registered under.
pub const INSTRUMENTATION_NAME: &str = "nats-otel/middleware";

/// Semantic version reported alongside `INSTRUMENTATION_NAME`.
pub fn sem_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

pub use metrics::{DESTINATION_NAME, ERRORS_TOTAL, MESSAGES_TOTAL, PROCESS_DURATION};
