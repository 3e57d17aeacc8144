use std::error::Error;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Instant;

use opentelemetry::global::{self, BoxedTracer};
use opentelemetry::metrics::{Meter, MeterProvider};
use opentelemetry::propagation::{Extractor, Injector, TextMapPropagator};
use opentelemetry::trace::{SpanKind, TraceContextExt, Tracer, TracerProvider};
use opentelemetry::{otel_debug, Context, InstrumentationScope, KeyValue};

use crate::extractor::{ConstSpanKindExtractor, DefaultSpanStatusExtractor};
use crate::operation::OperationState;
use crate::suppression;
use crate::{
    AttributesExtractor, AttributesSink, OperationListener, SpanKindExtractor, SpanNameExtractor,
    SpanStatusExtractor,
};

type ContextCustomizer<REQUEST> =
    Box<dyn Fn(Context, &REQUEST, &[KeyValue]) -> Context + Send + Sync>;

/// Orchestrates the instrumentation of a single kind of operation.
///
/// An `Instrumenter` is built once per instrumented library via
/// [`Instrumenter::builder`] and shared across all of that library's calls.
/// For every operation the caller is expected to:
///
/// 1. consult [`should_start`](Instrumenter::should_start) and, when it
///    returns `false`, execute the underlying call without instrumentation;
/// 2. call [`start`](Instrumenter::start) and run the real library call
///    under the returned [`Context`];
/// 3. call [`end`](Instrumenter::end) exactly once with the outcome.
///
/// `start` and `end` are synchronous, bounded-time and never block. Any
/// failure inside the pipeline degrades to reduced telemetry; nothing is
/// surfaced to the instrumented call path.
pub struct Instrumenter<REQUEST, RESPONSE> {
    tracer: BoxedTracer,
    span_name_extractor: Box<dyn SpanNameExtractor<REQUEST>>,
    span_kind_extractor: Box<dyn SpanKindExtractor<REQUEST>>,
    span_status_extractor: Box<dyn SpanStatusExtractor<REQUEST, RESPONSE>>,
    extractors: Vec<Box<dyn AttributesExtractor<REQUEST, RESPONSE>>>,
    context_customizers: Vec<ContextCustomizer<REQUEST>>,
    listeners: Vec<Box<dyn OperationListener>>,
}

impl<REQUEST, RESPONSE> fmt::Debug for Instrumenter<REQUEST, RESPONSE> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instrumenter")
            .field("extractors", &self.extractors.len())
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

impl<REQUEST, RESPONSE> Instrumenter<REQUEST, RESPONSE> {
    /// Returns a builder for an instrumenter identified by the given
    /// instrumentation scope name.
    pub fn builder(
        scope_name: &'static str,
        span_name_extractor: impl SpanNameExtractor<REQUEST> + 'static,
    ) -> InstrumenterBuilder<REQUEST, RESPONSE> {
        InstrumenterBuilder::new(scope_name, Box::new(span_name_extractor))
    }

    /// Determines whether an operation should be observed at all.
    ///
    /// Returns `false` when a span of the same kind is already active in
    /// `parent_cx`, which signals a recursive wrapper layer; the caller
    /// should then execute the underlying call directly, bypassing the
    /// pipeline.
    pub fn should_start(&self, parent_cx: &Context, request: &REQUEST) -> bool {
        let kind = self.span_kind_extractor.extract(request);
        !suppression::is_suppressed(parent_cx, &kind)
    }

    /// Starts an operation: creates the span, runs the start hooks of all
    /// configured extractors and listeners, and returns the context the
    /// operation must execute under.
    pub fn start(&self, parent_cx: &Context, request: &REQUEST) -> Context {
        let start_time = Instant::now();
        let span_kind = self.span_kind_extractor.extract(request);
        let span_name = self.span_name_extractor.extract(request);

        let mut sink = AttributesSink::new();
        for extractor in &self.extractors {
            extractor.on_start(&mut sink, parent_cx, request);
        }
        let attributes = sink.into_attributes();

        let span = self
            .tracer
            .span_builder(span_name)
            .with_kind(span_kind.clone())
            .with_attributes(attributes.iter().cloned())
            .start_with_context(&self.tracer, parent_cx);

        let mut cx = parent_cx.with_span(span);
        cx = suppression::mark(cx, &span_kind);
        cx = cx.with_value(OperationState::new());
        for customize in &self.context_customizers {
            cx = customize(cx, request, &attributes);
        }
        for listener in &self.listeners {
            cx = listener.on_start(cx, &attributes, start_time);
        }
        cx
    }

    /// Ends the operation started under `cx`.
    ///
    /// Runs the end hooks of all extractors, records `error` as an
    /// exception event, computes the span status, closes the span and
    /// notifies the operation listeners. `response` may be absent together
    /// with a present `error` (transport failure).
    ///
    /// Ending a context that was not produced by [`start`](Self::start), or
    /// ending the same context twice, is a logged no-op.
    pub fn end(
        &self,
        cx: &Context,
        request: &REQUEST,
        response: Option<&RESPONSE>,
        error: Option<&dyn Error>,
    ) {
        let end_time = Instant::now();
        let Some(state) = cx.get::<OperationState>() else {
            otel_debug!(
                name: "Instrumenter.EndWithoutStart",
                message = "no operation state in context, skipping end"
            );
            return;
        };
        if !state.transition_to_ended() {
            otel_debug!(
                name: "Instrumenter.AlreadyEnded",
                message = "operation already ended, skipping duplicate end"
            );
            return;
        }

        let mut sink = AttributesSink::new();
        for extractor in &self.extractors {
            extractor.on_end(&mut sink, cx, request, response, error);
        }
        let attributes = sink.into_attributes();

        let span = cx.span();
        for attribute in attributes.iter().cloned() {
            span.set_attribute(attribute);
        }
        if let Some(error) = error {
            span.record_error(error);
        }
        span.set_status(self.span_status_extractor.extract(request, response, error));
        span.end();

        for listener in self.listeners.iter().rev() {
            listener.on_end(cx, &attributes, end_time);
        }
    }
}

/// Composes an [`Instrumenter`] from extractors, metrics listeners and the
/// telemetry providers.
///
/// Providers default to the process globals; tests typically swap in SDK
/// providers backed by in-memory exporters via
/// [`with_tracer_provider`](InstrumenterBuilder::with_tracer_provider) and
/// [`with_meter_provider`](InstrumenterBuilder::with_meter_provider).
pub struct InstrumenterBuilder<REQUEST, RESPONSE> {
    scope: InstrumentationScope,
    tracer: Option<BoxedTracer>,
    meter: Option<Meter>,
    propagator: Option<Arc<dyn TextMapPropagator + Send + Sync>>,
    span_name_extractor: Box<dyn SpanNameExtractor<REQUEST>>,
    span_status_extractor: Box<dyn SpanStatusExtractor<REQUEST, RESPONSE>>,
    extractors: Vec<Box<dyn AttributesExtractor<REQUEST, RESPONSE>>>,
    context_customizers: Vec<ContextCustomizer<REQUEST>>,
    operation_metrics: Vec<crate::OperationMetrics>,
    _phantom: PhantomData<fn(REQUEST, RESPONSE)>,
}

impl<REQUEST, RESPONSE> fmt::Debug for InstrumenterBuilder<REQUEST, RESPONSE> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstrumenterBuilder")
            .field("scope", &self.scope)
            .field("extractors", &self.extractors.len())
            .finish()
    }
}

impl<REQUEST, RESPONSE> InstrumenterBuilder<REQUEST, RESPONSE> {
    fn new(
        scope_name: &'static str,
        span_name_extractor: Box<dyn SpanNameExtractor<REQUEST>>,
    ) -> Self {
        InstrumenterBuilder {
            scope: InstrumentationScope::builder(scope_name)
                .with_version(env!("CARGO_PKG_VERSION"))
                .build(),
            tracer: None,
            meter: None,
            propagator: None,
            span_name_extractor,
            span_status_extractor: Box::new(DefaultSpanStatusExtractor),
            extractors: Vec::new(),
            context_customizers: Vec::new(),
            operation_metrics: Vec::new(),
            _phantom: PhantomData,
        }
    }

    /// Uses the given tracer provider instead of the global one.
    pub fn with_tracer_provider<P>(mut self, provider: &P) -> Self
    where
        P: TracerProvider,
        P::Tracer: Send + Sync + 'static,
        <P::Tracer as Tracer>::Span: Send + Sync + 'static,
    {
        self.tracer = Some(BoxedTracer::new(Box::new(
            provider.tracer_with_scope(self.scope.clone()),
        )));
        self
    }

    /// Uses the given meter provider instead of the global one.
    pub fn with_meter_provider<P: MeterProvider>(mut self, provider: &P) -> Self {
        self.meter = Some(provider.meter_with_scope(self.scope.clone()));
        self
    }

    /// Uses the given propagator for context injection/extraction instead
    /// of the global one. Only consulted by the client and server variants.
    pub fn with_propagator(mut self, propagator: impl TextMapPropagator + Send + Sync + 'static) -> Self {
        self.propagator = Some(Arc::new(propagator));
        self
    }

    /// Adds an attributes extractor. Extractors run in registration order.
    pub fn with_attributes_extractor(
        mut self,
        extractor: impl AttributesExtractor<REQUEST, RESPONSE> + 'static,
    ) -> Self {
        self.extractors.push(Box::new(extractor));
        self
    }

    /// Wraps the configured span name extractor, e.g. to apply
    /// framework-specific naming on top of the protocol default.
    pub fn with_span_name_transformer<F>(mut self, transform: F) -> Self
    where
        F: FnOnce(Box<dyn SpanNameExtractor<REQUEST>>) -> Box<dyn SpanNameExtractor<REQUEST>>,
    {
        self.span_name_extractor = transform(self.span_name_extractor);
        self
    }

    /// Replaces the default span status policy.
    pub fn with_span_status_extractor(
        mut self,
        extractor: impl SpanStatusExtractor<REQUEST, RESPONSE> + 'static,
    ) -> Self {
        self.span_status_extractor = Box::new(extractor);
        self
    }

    /// Adds a hook that may attach additional values to the operation
    /// context at start, after the span was created.
    pub fn with_context_customizer(
        mut self,
        customizer: impl Fn(Context, &REQUEST, &[KeyValue]) -> Context + Send + Sync + 'static,
    ) -> Self {
        self.context_customizers.push(Box::new(customizer));
        self
    }

    /// Registers an operation metrics factory, resolved against the
    /// instrumentation-scoped meter when the instrumenter is built.
    pub fn with_operation_metrics(mut self, metrics: crate::OperationMetrics) -> Self {
        self.operation_metrics.push(metrics);
        self
    }

    /// Builds an instrumenter whose span kind is derived per request.
    pub fn build_instrumenter(
        self,
        span_kind_extractor: impl SpanKindExtractor<REQUEST> + 'static,
    ) -> Instrumenter<REQUEST, RESPONSE> {
        self.build_with_kind(Box::new(span_kind_extractor))
    }

    /// Builds a CLIENT-kind instrumenter that can inject the operation
    /// context into outgoing carriers.
    pub fn build_client_instrumenter(self) -> ClientInstrumenter<REQUEST, RESPONSE> {
        let propagator = self.propagator.clone();
        let inner = self.build_with_kind(Box::new(ConstSpanKindExtractor(SpanKind::Client)));
        ClientInstrumenter { inner, propagator }
    }

    /// Builds a SERVER-kind instrumenter that extracts the remote parent
    /// from incoming carriers.
    pub fn build_server_instrumenter(self) -> ServerInstrumenter<REQUEST, RESPONSE> {
        let propagator = self.propagator.clone();
        let inner = self.build_with_kind(Box::new(ConstSpanKindExtractor(SpanKind::Server)));
        ServerInstrumenter { inner, propagator }
    }

    fn build_with_kind(
        self,
        span_kind_extractor: Box<dyn SpanKindExtractor<REQUEST>>,
    ) -> Instrumenter<REQUEST, RESPONSE> {
        let tracer = self.tracer.unwrap_or_else(|| {
            global::tracer_provider().tracer_with_scope(self.scope.clone())
        });
        let meter = self
            .meter
            .unwrap_or_else(|| global::meter_provider().meter_with_scope(self.scope.clone()));
        let listeners = self
            .operation_metrics
            .iter()
            .map(|factory| factory(&meter))
            .collect();
        Instrumenter {
            tracer,
            span_name_extractor: self.span_name_extractor,
            span_kind_extractor,
            span_status_extractor: self.span_status_extractor,
            extractors: self.extractors,
            context_customizers: self.context_customizers,
            listeners,
        }
    }
}

/// A CLIENT-kind [`Instrumenter`] paired with carrier injection.
///
/// After [`start`](ClientInstrumenter::start), callers inject the new
/// operation context into the outgoing request's headers with
/// [`inject`](ClientInstrumenter::inject) before executing the call.
pub struct ClientInstrumenter<REQUEST, RESPONSE> {
    inner: Instrumenter<REQUEST, RESPONSE>,
    propagator: Option<Arc<dyn TextMapPropagator + Send + Sync>>,
}

impl<REQUEST, RESPONSE> fmt::Debug for ClientInstrumenter<REQUEST, RESPONSE> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientInstrumenter").finish()
    }
}

impl<REQUEST, RESPONSE> ClientInstrumenter<REQUEST, RESPONSE> {
    /// See [`Instrumenter::should_start`].
    pub fn should_start(&self, parent_cx: &Context, request: &REQUEST) -> bool {
        self.inner.should_start(parent_cx, request)
    }

    /// See [`Instrumenter::start`].
    pub fn start(&self, parent_cx: &Context, request: &REQUEST) -> Context {
        self.inner.start(parent_cx, request)
    }

    /// Injects the operation context into an outgoing carrier.
    pub fn inject(&self, cx: &Context, carrier: &mut dyn Injector) {
        match &self.propagator {
            Some(propagator) => propagator.inject_context(cx, carrier),
            None => global::get_text_map_propagator(|propagator| {
                propagator.inject_context(cx, carrier)
            }),
        }
    }

    /// See [`Instrumenter::end`].
    pub fn end(
        &self,
        cx: &Context,
        request: &REQUEST,
        response: Option<&RESPONSE>,
        error: Option<&dyn Error>,
    ) {
        self.inner.end(cx, request, response, error)
    }
}

/// A SERVER-kind [`Instrumenter`] that derives the span parent from an
/// incoming carrier.
///
/// Extraction always starts from a fresh root context: when the carrier
/// holds no usable trace context the operation becomes a local root rather
/// than inheriting whatever span happens to be current on the thread.
pub struct ServerInstrumenter<REQUEST, RESPONSE> {
    inner: Instrumenter<REQUEST, RESPONSE>,
    propagator: Option<Arc<dyn TextMapPropagator + Send + Sync>>,
}

impl<REQUEST, RESPONSE> fmt::Debug for ServerInstrumenter<REQUEST, RESPONSE> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerInstrumenter").finish()
    }
}

impl<REQUEST, RESPONSE> ServerInstrumenter<REQUEST, RESPONSE> {
    /// Suppression check against the caller's current context; nested
    /// server layers handling the same request should skip instrumentation.
    pub fn should_start(&self, parent_cx: &Context, request: &REQUEST) -> bool {
        self.inner.should_start(parent_cx, request)
    }

    /// Extracts the remote parent context from an incoming carrier,
    /// falling back to a root context.
    pub fn extract_parent(&self, carrier: &dyn Extractor) -> Context {
        let root = Context::new();
        match &self.propagator {
            Some(propagator) => propagator.extract_with_context(&root, carrier),
            None => global::get_text_map_propagator(|propagator| {
                propagator.extract_with_context(&root, carrier)
            }),
        }
    }

    /// Starts a server operation parented to the carrier's trace context.
    pub fn start(&self, carrier: &dyn Extractor, request: &REQUEST) -> Context {
        let parent_cx = self.extract_parent(carrier);
        self.inner.start(&parent_cx, request)
    }

    /// See [`Instrumenter::end`].
    pub fn end(
        &self,
        cx: &Context,
        request: &REQUEST,
        response: Option<&RESPONSE>,
        error: Option<&dyn Error>,
    ) {
        self.inner.end(cx, request, response, error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use opentelemetry::trace::{SpanKind, Status};
    use opentelemetry_sdk::trace::{InMemorySpanExporter, SdkTracerProvider};
    use std::borrow::Cow;
    use std::collections::HashMap;

    struct FakeRequest {
        name: &'static str,
    }

    struct FakeResponse;

    #[derive(Debug)]
    struct FakeError;

    impl fmt::Display for FakeError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "connection reset")
        }
    }

    impl Error for FakeError {}

    struct FakeExtractor;

    impl AttributesExtractor<FakeRequest, FakeResponse> for FakeExtractor {
        fn on_start(&self, sink: &mut AttributesSink, _cx: &Context, request: &FakeRequest) {
            sink.set("fake.name", request.name);
        }

        fn on_end(
            &self,
            sink: &mut AttributesSink,
            _cx: &Context,
            _request: &FakeRequest,
            response: Option<&FakeResponse>,
            _error: Option<&dyn Error>,
        ) {
            sink.set("fake.responded", response.is_some());
        }
    }

    struct FakeStatusExtractor;

    impl SpanStatusExtractor<FakeRequest, FakeResponse> for FakeStatusExtractor {
        fn extract(
            &self,
            _request: &FakeRequest,
            _response: Option<&FakeResponse>,
            error: Option<&dyn Error>,
        ) -> Status {
            match error {
                Some(_) => Status::error("request failed"),
                None => Status::Unset,
            }
        }
    }

    fn name_extractor(request: &FakeRequest) -> Cow<'static, str> {
        Cow::Borrowed(request.name)
    }

    fn test_instrumenter(
        provider: &SdkTracerProvider,
    ) -> Instrumenter<FakeRequest, FakeResponse> {
        Instrumenter::builder("test-instrumentation", name_extractor)
            .with_tracer_provider(provider)
            .with_attributes_extractor(FakeExtractor)
            .with_span_status_extractor(FakeStatusExtractor)
            .build_instrumenter(ConstSpanKindExtractor(SpanKind::Client))
    }

    fn finished_spans(
        exporter: &InMemorySpanExporter,
    ) -> Vec<opentelemetry_sdk::trace::SpanData> {
        exporter.get_finished_spans().expect("spans exported")
    }

    #[test]
    fn start_end_produces_one_span() {
        let exporter = InMemorySpanExporter::default();
        let provider = SdkTracerProvider::builder()
            .with_simple_exporter(exporter.clone())
            .build();
        let instrumenter = test_instrumenter(&provider);

        let request = FakeRequest { name: "fake-op" };
        let cx = instrumenter.start(&Context::new(), &request);
        instrumenter.end(&cx, &request, Some(&FakeResponse), None);

        let spans = finished_spans(&exporter);
        assert_eq!(spans.len(), 1);
        let span = &spans[0];
        assert_eq!(span.name, "fake-op");
        assert_eq!(span.span_kind, SpanKind::Client);
        assert_eq!(span.status, Status::Unset);
        assert!(span
            .attributes
            .iter()
            .any(|kv| kv.key.as_str() == "fake.name"));
        assert!(span
            .attributes
            .iter()
            .any(|kv| kv.key.as_str() == "fake.responded"));
    }

    #[test]
    fn transport_error_maps_to_error_status() {
        let exporter = InMemorySpanExporter::default();
        let provider = SdkTracerProvider::builder()
            .with_simple_exporter(exporter.clone())
            .build();
        let instrumenter = test_instrumenter(&provider);

        let request = FakeRequest { name: "fake-op" };
        let cx = instrumenter.start(&Context::new(), &request);
        instrumenter.end(&cx, &request, None, Some(&FakeError));

        let spans = finished_spans(&exporter);
        assert_eq!(spans.len(), 1);
        assert!(matches!(spans[0].status, Status::Error { .. }));
        // The transport error is recorded as an exception event.
        assert!(spans[0].events.iter().any(|e| e.name == "exception"));
    }

    #[test]
    fn end_is_idempotent() {
        let exporter = InMemorySpanExporter::default();
        let provider = SdkTracerProvider::builder()
            .with_simple_exporter(exporter.clone())
            .build();
        let instrumenter = test_instrumenter(&provider);

        let request = FakeRequest { name: "fake-op" };
        let cx = instrumenter.start(&Context::new(), &request);
        instrumenter.end(&cx, &request, Some(&FakeResponse), None);
        instrumenter.end(&cx, &request, Some(&FakeResponse), None);

        assert_eq!(finished_spans(&exporter).len(), 1);
    }

    #[test]
    fn end_without_start_is_a_no_op() {
        let exporter = InMemorySpanExporter::default();
        let provider = SdkTracerProvider::builder()
            .with_simple_exporter(exporter.clone())
            .build();
        let instrumenter = test_instrumenter(&provider);

        let request = FakeRequest { name: "fake-op" };
        instrumenter.end(&Context::new(), &request, Some(&FakeResponse), None);

        assert!(finished_spans(&exporter).is_empty());
    }

    struct Prefixed(Box<dyn SpanNameExtractor<FakeRequest>>);

    impl SpanNameExtractor<FakeRequest> for Prefixed {
        fn extract(&self, request: &FakeRequest) -> Cow<'static, str> {
            Cow::Owned(format!("wrapped {}", self.0.extract(request)))
        }
    }

    #[test]
    fn span_name_transformer_wraps_the_default() {
        let exporter = InMemorySpanExporter::default();
        let provider = SdkTracerProvider::builder()
            .with_simple_exporter(exporter.clone())
            .build();
        let instrumenter = Instrumenter::<FakeRequest, FakeResponse>::builder(
            "test-instrumentation",
            name_extractor,
        )
        .with_tracer_provider(&provider)
        .with_span_name_transformer(|inner| Box::new(Prefixed(inner)))
        .build_instrumenter(ConstSpanKindExtractor(SpanKind::Client));

        let request = FakeRequest { name: "fake-op" };
        let cx = instrumenter.start(&Context::new(), &request);
        instrumenter.end(&cx, &request, Some(&FakeResponse), None);

        let spans = finished_spans(&exporter);
        assert_eq!(spans[0].name, "wrapped fake-op");
    }

    #[test]
    fn nested_client_operations_are_suppressed() {
        let exporter = InMemorySpanExporter::default();
        let provider = SdkTracerProvider::builder()
            .with_simple_exporter(exporter.clone())
            .build();
        let instrumenter = test_instrumenter(&provider);

        let request = FakeRequest { name: "fake-op" };
        let parent = Context::new();
        assert!(instrumenter.should_start(&parent, &request));
        let cx = instrumenter.start(&parent, &request);
        assert!(!instrumenter.should_start(&cx, &request));
    }

    #[test]
    fn child_span_is_parented_to_started_operation() {
        let exporter = InMemorySpanExporter::default();
        let provider = SdkTracerProvider::builder()
            .with_simple_exporter(exporter.clone())
            .build();
        let instrumenter = test_instrumenter(&provider);

        let request = FakeRequest { name: "outer" };
        let cx = instrumenter.start(&Context::new(), &request);
        let parent_span_id = cx.span().span_context().span_id();

        let inner = FakeRequest { name: "inner" };
        // A different-kind instrumenter is not suppressed under the client.
        let server = Instrumenter::<FakeRequest, FakeResponse>::builder(
            "test-instrumentation",
            name_extractor,
        )
        .with_tracer_provider(&provider)
        .build_instrumenter(ConstSpanKindExtractor(SpanKind::Internal));
        let inner_cx = server.start(&cx, &inner);
        server.end(&inner_cx, &inner, Some(&FakeResponse), None);
        instrumenter.end(&cx, &request, Some(&FakeResponse), None);

        let spans = finished_spans(&exporter);
        assert_eq!(spans.len(), 2);
        let inner_span = spans.iter().find(|s| s.name == "inner").unwrap();
        assert_eq!(inner_span.parent_span_id, parent_span_id);
    }

    struct MapCarrier(HashMap<String, String>);

    impl Injector for MapCarrier {
        fn set(&mut self, key: &str, value: String) {
            self.0.insert(key.to_string(), value);
        }
    }

    impl Extractor for MapCarrier {
        fn get(&self, key: &str) -> Option<&str> {
            self.0.get(key).map(|v| v.as_str())
        }

        fn keys(&self) -> Vec<&str> {
            self.0.keys().map(|k| k.as_str()).collect()
        }
    }

    #[test]
    fn client_injects_and_server_extracts() {
        let exporter = InMemorySpanExporter::default();
        let provider = SdkTracerProvider::builder()
            .with_simple_exporter(exporter.clone())
            .build();
        let propagator = opentelemetry_sdk::propagation::TraceContextPropagator::new();

        let client: ClientInstrumenter<FakeRequest, FakeResponse> =
            Instrumenter::builder("test-instrumentation", name_extractor)
                .with_tracer_provider(&provider)
                .with_propagator(propagator.clone())
                .build_client_instrumenter();
        let server: ServerInstrumenter<FakeRequest, FakeResponse> =
            Instrumenter::builder("test-instrumentation", name_extractor)
                .with_tracer_provider(&provider)
                .with_propagator(propagator)
                .build_server_instrumenter();

        let request = FakeRequest { name: "client-op" };
        let client_cx = client.start(&Context::new(), &request);
        let mut carrier = MapCarrier(HashMap::new());
        client.inject(&client_cx, &mut carrier);
        assert!(carrier.0.contains_key("traceparent"));

        let server_request = FakeRequest { name: "server-op" };
        let server_cx = server.start(&carrier, &server_request);
        server.end(&server_cx, &server_request, Some(&FakeResponse), None);
        client.end(&client_cx, &request, Some(&FakeResponse), None);

        let spans = finished_spans(&exporter);
        assert_eq!(spans.len(), 2);
        let client_span = spans.iter().find(|s| s.name == "client-op").unwrap();
        let server_span = spans.iter().find(|s| s.name == "server-op").unwrap();
        assert_eq!(
            server_span.span_context.trace_id(),
            client_span.span_context.trace_id()
        );
        assert_eq!(
            server_span.parent_span_id,
            client_span.span_context.span_id()
        );
    }

    #[test]
    fn server_without_carrier_context_becomes_local_root() {
        let exporter = InMemorySpanExporter::default();
        let provider = SdkTracerProvider::builder()
            .with_simple_exporter(exporter.clone())
            .build();
        let server: ServerInstrumenter<FakeRequest, FakeResponse> =
            Instrumenter::builder("test-instrumentation", name_extractor)
                .with_tracer_provider(&provider)
                .with_propagator(opentelemetry_sdk::propagation::TraceContextPropagator::new())
                .build_server_instrumenter();

        let request = FakeRequest { name: "server-op" };
        let carrier = MapCarrier(HashMap::new());
        let cx = server.start(&carrier, &request);
        server.end(&cx, &request, Some(&FakeResponse), None);

        let spans = finished_spans(&exporter);
        assert_eq!(spans.len(), 1);
        assert_eq!(
            spans[0].parent_span_id,
            opentelemetry::trace::SpanId::INVALID
        );
    }
}
