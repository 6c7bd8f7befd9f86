// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! Metric instruments recorded by the middleware for every handled message.

use opentelemetry::{
    metrics::{Counter, Histogram, Meter},
    KeyValue,
};
use std::time::Duration;

pub const MESSAGES_TOTAL: &str = "messaging.process.messages";
pub const ERRORS_TOTAL: &str = "messaging.process.errors";
pub const PROCESS_DURATION: &str = "messaging.process.duration";

/// Attribute holding the subject a message was received on.
pub const DESTINATION_NAME: &str = "messaging.destination.name";

pub(crate) struct Instruments {
    messages: Counter<u64>,
    errors: Counter<u64>,
    duration: Histogram<f64>,
}

impl Instruments {
    pub(crate) fn new(meter: &Meter) -> Self {
        Instruments {
            messages: meter
                .u64_counter(MESSAGES_TOTAL)
                .with_description("Total number of handled messages")
                .build(),
            errors: meter
                .u64_counter(ERRORS_TOTAL)
                .with_description("Total number of messages whose handling failed")
                .build(),
            duration: meter
                .f64_histogram(PROCESS_DURATION)
                .with_description("Duration of message handling in seconds")
                .with_unit("s")
                .build(),
        }
    }

    pub(crate) fn record(&self, subject: &str, elapsed: Duration, failed: bool) {
        let attributes = [KeyValue::new(DESTINATION_NAME, subject.to_owned())];

        self.messages.add(1, &attributes);
        if failed {
            self.errors.add(1, &attributes);
        }
        self.duration.record(elapsed.as_secs_f64(), &attributes);
    }
}
