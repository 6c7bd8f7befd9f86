// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Middleware Options
//!
//! The middleware is configured with an ordered list of options. Each option
//! mutates a single field of `Settings`; options are applied in list order, so
//! a later option overrides an earlier one touching the same field. Once every
//! option has been applied the meter is derived from the final telemetry.
//!
//! ```ignore
//! let settings = Settings::new([
//!     with_dump_request(true),
//!     with_reply(true),
//! ]);
//! ```

use crate::{
    hook::{PostHook, ReplyHook},
    telemetry::{instrumentation_scope, Telemetry},
};
use opentelemetry::metrics::Meter;
use std::{fmt, sync::Arc};
use tracing::warn;

/// A single configuration mutation applied to `Settings`.
pub trait SettingsOption {
    fn apply(&self, settings: &mut Settings);
}

struct OptionFn<F>(F);

impl<F> SettingsOption for OptionFn<F>
where
    F: Fn(&mut Settings),
{
    fn apply(&self, settings: &mut Settings) {
        (self.0)(settings)
    }
}

fn option_fn<F>(f: F) -> Box<dyn SettingsOption>
where
    F: Fn(&mut Settings) + 'static,
{
    Box::new(OptionFn(f))
}

/// Middleware settings, read-only once built.
pub struct Settings {
    post_hook: Option<Arc<dyn PostHook>>,
    telemetry: Telemetry,
    meter: Option<Meter>,
    dump_request: bool,
    dump_response: bool,
    dump_payload_on_error: bool,
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("post_hook", &self.post_hook.is_some())
            .field("telemetry", &self.telemetry)
            .field("dump_request", &self.dump_request)
            .field("dump_response", &self.dump_response)
            .field("dump_payload_on_error", &self.dump_payload_on_error)
            .finish()
    }
}

impl Default for Settings {
    fn default() -> Self {
        Settings::new(Vec::new())
    }
}

impl Settings {
    /// Builds the settings from defaults and the given options.
    ///
    /// Defaults: global telemetry, no post-hook, no request or response dump,
    /// payloads dumped when the handler fails.
    ///
    /// # Parameters
    /// * `opts` - Options applied in order; later ones win
    ///
    /// # Returns
    /// The finalized settings, with the meter derived from the final telemetry
    pub fn new<I>(opts: I) -> Settings
    where
        I: IntoIterator<Item = Box<dyn SettingsOption>>,
    {
        let mut settings = Settings {
            post_hook: None,
            telemetry: Telemetry::global(),
            meter: None,
            dump_request: false,
            dump_response: false,
            dump_payload_on_error: true,
        };

        settings.apply(opts);
        settings.meter = Some(settings.telemetry.meter(instrumentation_scope()));

        settings
    }

    fn apply<I>(&mut self, opts: I)
    where
        I: IntoIterator<Item = Box<dyn SettingsOption>>,
    {
        for opt in opts {
            opt.apply(self);
        }
    }

    fn set_post_hook(&mut self, hook: Arc<dyn PostHook>) {
        if self.post_hook.is_some() {
            warn!("post hook already registered, replacing it with the latest one");
        }

        self.post_hook = Some(hook);
    }

    /// Returns the post-hook run after a successful handling, if any.
    pub fn post_hook(&self) -> Option<&Arc<dyn PostHook>> {
        self.post_hook.as_ref()
    }

    /// Returns the telemetry spans, metrics and propagation go through.
    pub fn telemetry(&self) -> &Telemetry {
        &self.telemetry
    }

    /// Meter scoped to this crate's instrumentation name and version.
    ///
    /// Derived once from the final telemetry, after every option was applied.
    pub fn meter(&self) -> Meter {
        match &self.meter {
            Some(meter) => meter.clone(),
            None => self.telemetry.meter(instrumentation_scope()),
        }
    }

    /// Whether request payloads are dumped to the log and the span.
    pub fn dump_request(&self) -> bool {
        self.dump_request
    }

    /// Whether response payloads are dumped to the log and the span.
    pub fn dump_response(&self) -> bool {
        self.dump_response
    }

    /// Whether payloads are dumped when handling fails.
    pub fn dump_payload_on_error(&self) -> bool {
        self.dump_payload_on_error
    }
}

/// Sends the handler output as a reply to NATS requests that ask for one.
///
/// With `inject`, trace and baggage headers of the processing context are
/// stamped on the reply. Shares its slot with `with_post_hook`.
pub fn with_reply(inject: bool) -> Box<dyn SettingsOption> {
    with_post_hook(ReplyHook::new(inject))
}

/// Sets the (single) post-hook run after a successful handling.
pub fn with_post_hook<H>(hook: H) -> Box<dyn SettingsOption>
where
    H: PostHook + 'static,
{
    let hook: Arc<dyn PostHook> = Arc::new(hook);
    option_fn(move |s| s.set_post_hook(hook.clone()))
}

/// Like `with_post_hook`, but leaves the settings untouched when given `None`.
pub fn with_post_hook_opt<H>(hook: Option<H>) -> Box<dyn SettingsOption>
where
    H: PostHook + 'static,
{
    match hook {
        Some(hook) => with_post_hook(hook),
        None => option_fn(|_| {}),
    }
}

/// Replaces the global telemetry.
pub fn with_telemetry(telemetry: Telemetry) -> Box<dyn SettingsOption> {
    option_fn(move |s| s.telemetry = telemetry.clone())
}

/// Dumps the request payload to the log and the consumer span.
pub fn with_dump_request(enable: bool) -> Box<dyn SettingsOption> {
    option_fn(move |s| s.dump_request = enable)
}

/// Dumps the response payload to the log and the consumer span.
pub fn with_dump_response(enable: bool) -> Box<dyn SettingsOption> {
    option_fn(move |s| s.dump_response = enable)
}

/// Dumps request and response payloads when the handler fails.
///
/// Default: true
pub fn with_dump_payload_on_error(enable: bool) -> Box<dyn SettingsOption> {
    option_fn(move |s| s.dump_payload_on_error = enable)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{errors::MiddlewareError, hook::HookContext, message::Message};
    use async_trait::async_trait;
    use opentelemetry::{global, metrics::MeterProvider, InstrumentationScope};
    use opentelemetry_sdk::{metrics::SdkMeterProvider, propagation::TraceContextPropagator};
    use std::{
        collections::HashMap,
        sync::{Mutex, OnceLock},
        thread::{self, ThreadId},
    };

    struct Recorder {
        id: &'static str,
        calls: Arc<Mutex<Vec<&'static str>>>,
    }

    #[async_trait]
    impl PostHook for Recorder {
        async fn call(
            &self,
            _ctx: &HookContext,
            _msg: &Message,
            _data: &[u8],
        ) -> Result<(), MiddlewareError> {
            self.calls.lock().unwrap().push(self.id);
            Ok(())
        }
    }

    struct CountingMeterProvider {
        inner: SdkMeterProvider,
        calls: Arc<Mutex<HashMap<ThreadId, usize>>>,
    }

    impl MeterProvider for CountingMeterProvider {
        fn meter_with_scope(&self, scope: InstrumentationScope) -> Meter {
            *self
                .calls
                .lock()
                .unwrap()
                .entry(thread::current().id())
                .or_default() += 1;
            self.inner.meter_with_scope(scope)
        }
    }

    /// Installs, once per test binary, a global meter provider counting the
    /// meters created from each thread.
    fn counting_global_meter_provider() -> Arc<Mutex<HashMap<ThreadId, usize>>> {
        static CALLS: OnceLock<Arc<Mutex<HashMap<ThreadId, usize>>>> = OnceLock::new();

        CALLS
            .get_or_init(|| {
                let calls = Arc::new(Mutex::new(HashMap::new()));
                global::set_meter_provider(CountingMeterProvider {
                    inner: SdkMeterProvider::default(),
                    calls: calls.clone(),
                });
                calls
            })
            .clone()
    }

    fn custom_telemetry() -> Telemetry {
        Telemetry::builder()
            .meter_provider(SdkMeterProvider::default())
            .propagator(TraceContextPropagator::new())
            .build()
    }

    fn propagated_fields(s: &Settings) -> Vec<String> {
        s.telemetry().with_propagator(|propagator| {
            propagator.fields().map(str::to_owned).collect::<Vec<_>>()
        })
    }

    fn flags(s: &Settings) -> (bool, bool, bool, bool) {
        (
            s.dump_request(),
            s.dump_response(),
            s.dump_payload_on_error(),
            s.telemetry().is_global(),
        )
    }

    #[test]
    fn defaults() {
        let settings = Settings::default();

        assert!(settings.dump_payload_on_error());
        assert!(!settings.dump_request());
        assert!(!settings.dump_response());
        assert!(settings.post_hook().is_none());
        assert!(settings.telemetry().is_global());
    }

    #[tokio::test]
    async fn disjoint_options_commute() {
        let telemetry = custom_telemetry();
        let forward_calls = Arc::new(Mutex::new(vec![]));
        let backward_calls = Arc::new(Mutex::new(vec![]));

        let forward = Settings::new([
            with_dump_request(true),
            with_dump_response(true),
            with_post_hook(Recorder {
                id: "audit",
                calls: forward_calls.clone(),
            }),
            with_dump_payload_on_error(false),
            with_telemetry(telemetry.clone()),
        ]);
        let backward = Settings::new([
            with_telemetry(telemetry),
            with_dump_payload_on_error(false),
            with_post_hook(Recorder {
                id: "audit",
                calls: backward_calls.clone(),
            }),
            with_dump_response(true),
            with_dump_request(true),
        ]);

        assert_eq!(flags(&forward), flags(&backward));
        assert_eq!(flags(&forward), (true, true, false, false));
        assert_eq!(propagated_fields(&forward), vec!["traceparent", "tracestate"]);
        assert_eq!(propagated_fields(&backward), vec!["traceparent", "tracestate"]);

        for settings in [&forward, &backward] {
            let ctx = HookContext::new(Default::default(), settings.telemetry().clone());
            settings
                .post_hook()
                .unwrap()
                .call(&ctx, &Message::new("orders", "x"), b"y")
                .await
                .unwrap();
        }

        assert_eq!(*forward_calls.lock().unwrap(), vec!["audit"]);
        assert_eq!(*backward_calls.lock().unwrap(), vec!["audit"]);
    }

    #[test]
    fn meter_comes_only_from_final_telemetry() {
        let calls = counting_global_meter_provider();
        let this_thread = thread::current().id();

        let settings = Settings::new([with_telemetry(custom_telemetry())]);
        let _ = settings.meter();
        assert_eq!(calls.lock().unwrap().get(&this_thread).copied(), None);

        let _ = Settings::default();
        assert_eq!(calls.lock().unwrap().get(&this_thread).copied(), Some(1));
    }

    #[test]
    fn same_field_last_write_wins() {
        let settings = Settings::new([with_dump_request(true), with_dump_request(false)]);
        assert!(!settings.dump_request());

        let settings = Settings::new([
            with_dump_payload_on_error(false),
            with_dump_payload_on_error(true),
        ]);
        assert!(settings.dump_payload_on_error());
    }

    #[tokio::test]
    async fn later_post_hook_replaces_earlier() {
        let calls = Arc::new(Mutex::new(vec![]));
        let settings = Settings::new([
            with_post_hook(Recorder {
                id: "first",
                calls: calls.clone(),
            }),
            with_post_hook(Recorder {
                id: "second",
                calls: calls.clone(),
            }),
        ]);

        let ctx = HookContext::new(Default::default(), settings.telemetry().clone());
        settings
            .post_hook()
            .unwrap()
            .call(&ctx, &Message::new("orders", "x"), b"y")
            .await
            .unwrap();

        assert_eq!(*calls.lock().unwrap(), vec!["second"]);
    }

    #[tokio::test]
    async fn post_hook_after_reply_wins() {
        let calls = Arc::new(Mutex::new(vec![]));
        let settings = Settings::new([
            with_reply(true),
            with_post_hook(Recorder {
                id: "custom",
                calls: calls.clone(),
            }),
        ]);

        let ctx = HookContext::new(Default::default(), settings.telemetry().clone());
        settings
            .post_hook()
            .unwrap()
            .call(&ctx, &Message::new("orders", "x").with_reply("_INBOX.1"), b"y")
            .await
            .unwrap();

        assert_eq!(*calls.lock().unwrap(), vec!["custom"]);
    }

    #[test]
    fn none_post_hook_is_noop() {
        let calls = Arc::new(Mutex::new(vec![]));
        let settings = Settings::new([
            with_post_hook(Recorder {
                id: "kept",
                calls: calls.clone(),
            }),
            with_post_hook_opt(None::<Recorder>),
        ]);

        assert!(settings.post_hook().is_some());
        assert!(Settings::new([with_post_hook_opt(None::<ReplyHook>)])
            .post_hook()
            .is_none());
    }
}
