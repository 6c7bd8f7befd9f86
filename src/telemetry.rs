// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Telemetry Facility
//!
//! `Telemetry` bundles what the middleware needs to observe message handling:
//! a tracer, a meter provider and a text-map propagator. Logging goes through
//! the `tracing` dispatcher installed by the application.
//!
//! `Telemetry::global()` snapshots the process-wide OpenTelemetry providers at
//! the time it is called, so the application must install its global tracer and
//! meter providers before building a middleware that relies on the default.
//! The global text-map propagator is looked up on every use.

use crate::{sem_version, INSTRUMENTATION_NAME};
use opentelemetry::{
    global::{self, BoxedTracer},
    metrics::{Meter, MeterProvider},
    propagation::TextMapPropagator,
    trace::{Span, Tracer},
    InstrumentationScope,
};
use std::{fmt, sync::Arc};

/// The instrumentation scope every tracer and meter of this crate is created with.
pub fn instrumentation_scope() -> InstrumentationScope {
    InstrumentationScope::builder(INSTRUMENTATION_NAME)
        .with_version(sem_version())
        .build()
}

/// Tracer, meter provider and propagator used by the middleware.
#[derive(Clone)]
pub struct Telemetry {
    tracer: Arc<BoxedTracer>,
    meter_provider: Arc<dyn MeterProvider + Send + Sync>,
    propagator: Option<Arc<dyn TextMapPropagator + Send + Sync>>,
    global: bool,
}

impl fmt::Debug for Telemetry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Telemetry")
            .field("global", &self.global)
            .field("custom_propagator", &self.propagator.is_some())
            .finish()
    }
}

impl Default for Telemetry {
    fn default() -> Self {
        Self::global()
    }
}

impl Telemetry {
    /// Returns the telemetry backed by the process-wide OpenTelemetry providers.
    pub fn global() -> Telemetry {
        Telemetry {
            tracer: Arc::new(global::tracer_with_scope(instrumentation_scope())),
            meter_provider: global::meter_provider(),
            propagator: None,
            global: true,
        }
    }

    /// Starts building a telemetry that overrides some of the global providers.
    pub fn builder() -> TelemetryBuilder {
        TelemetryBuilder::default()
    }

    /// Whether this telemetry is the process-wide default.
    pub fn is_global(&self) -> bool {
        self.global
    }

    /// Returns the tracer consumer spans are started with.
    pub fn tracer(&self) -> &BoxedTracer {
        &self.tracer
    }

    /// Creates a meter scoped to the given instrumentation identity.
    pub fn meter(&self, scope: InstrumentationScope) -> Meter {
        self.meter_provider.meter_with_scope(scope)
    }

    /// Runs `f` with the configured propagator, falling back to the global one.
    pub fn with_propagator<T, F>(&self, mut f: F) -> T
    where
        F: FnMut(&dyn TextMapPropagator) -> T,
    {
        match &self.propagator {
            Some(propagator) => f(propagator.as_ref()),
            None => global::get_text_map_propagator(f),
        }
    }
}

/// Builder for a non-global `Telemetry`.
///
/// Any provider left unset falls back to the process-wide one.
///
/// # Example
///
/// ```ignore
/// let telemetry = Telemetry::builder()
///     .tracer(provider.tracer("orders"))
///     .meter_provider(meter_provider)
///     .propagator(TraceContextPropagator::new())
///     .build();
/// ```
#[derive(Default)]
pub struct TelemetryBuilder {
    tracer: Option<BoxedTracer>,
    meter_provider: Option<Arc<dyn MeterProvider + Send + Sync>>,
    propagator: Option<Arc<dyn TextMapPropagator + Send + Sync>>,
}

impl TelemetryBuilder {
    /// Sets the tracer used to create consumer spans.
    pub fn tracer<T, S>(mut self, tracer: T) -> Self
    where
        T: Tracer<Span = S> + Send + Sync + 'static,
        S: Span + Send + Sync + 'static,
    {
        self.tracer = Some(BoxedTracer::new(Box::new(tracer)));
        self
    }

    /// Sets the meter provider instruments are created from.
    pub fn meter_provider<P>(mut self, provider: P) -> Self
    where
        P: MeterProvider + Send + Sync + 'static,
    {
        self.meter_provider = Some(Arc::new(provider));
        self
    }

    /// Sets the propagator used to inject and extract message headers.
    pub fn propagator<P>(mut self, propagator: P) -> Self
    where
        P: TextMapPropagator + Send + Sync + 'static,
    {
        self.propagator = Some(Arc::new(propagator));
        self
    }

    /// Builds the telemetry, filling unset providers from the global ones.
    ///
    /// # Returns
    /// A non-global `Telemetry`
    pub fn build(self) -> Telemetry {
        Telemetry {
            tracer: Arc::new(
                self.tracer
                    .unwrap_or_else(|| global::tracer_with_scope(instrumentation_scope())),
            ),
            meter_provider: self.meter_provider.unwrap_or_else(global::meter_provider),
            propagator: self.propagator,
            global: false,
        }
    }
}
