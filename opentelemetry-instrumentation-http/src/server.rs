use std::borrow::Cow;
use std::error::Error;
use std::fmt;
use std::marker::PhantomData;

use opentelemetry::Context;
use opentelemetry_instrumentation::{AttributesExtractor, AttributesSink};
use opentelemetry_semantic_conventions::attribute;

use crate::common::{self, CommonConfig};
use crate::getter::HttpServerAttributesGetter;
use crate::route::HttpServerRoute;
use crate::semconv;
use crate::HttpSemconvStability;

/// Extracts the HTTP server span attributes defined by the semantic
/// conventions from an [`HttpServerAttributesGetter`].
///
/// Emits, depending on the configured schema mode: the request method, URL
/// scheme/path/query, client address, user agent, local server address and
/// port, response status code, error type, protocol name/version, the
/// resolved route, content lengths and the configured captured headers.
pub struct HttpServerAttributesExtractor<REQUEST, RESPONSE, G> {
    getter: G,
    config: CommonConfig,
    _phantom: PhantomData<fn(REQUEST, RESPONSE)>,
}

impl<REQUEST, RESPONSE, G> fmt::Debug for HttpServerAttributesExtractor<REQUEST, RESPONSE, G> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpServerAttributesExtractor")
            .field("config", &self.config)
            .finish()
    }
}

impl<REQUEST, RESPONSE, G> HttpServerAttributesExtractor<REQUEST, RESPONSE, G>
where
    G: HttpServerAttributesGetter<REQUEST, RESPONSE>,
{
    /// Returns a builder wrapping `getter`, with the schema mode taken from
    /// the environment.
    pub fn builder(getter: G) -> HttpServerAttributesExtractorBuilder<REQUEST, RESPONSE, G> {
        HttpServerAttributesExtractorBuilder {
            getter,
            config: CommonConfig::new(HttpSemconvStability::from_env()),
            _phantom: PhantomData,
        }
    }
}

impl<REQUEST, RESPONSE, G> AttributesExtractor<REQUEST, RESPONSE>
    for HttpServerAttributesExtractor<REQUEST, RESPONSE, G>
where
    REQUEST: Send + Sync,
    RESPONSE: Send + Sync,
    G: HttpServerAttributesGetter<REQUEST, RESPONSE>,
{
    fn on_start(&self, sink: &mut AttributesSink, _parent_cx: &Context, request: &REQUEST) {
        let method = self.getter.http_request_method(request);
        common::extract_method(sink, &self.config, method.as_deref());

        if let Some(scheme) = self.getter.url_scheme(request) {
            if self.config.stability.emit_stable() {
                sink.set(attribute::URL_SCHEME, scheme.to_string());
            }
            if self.config.stability.emit_old() {
                sink.set(semconv::HTTP_SCHEME, scheme.into_owned());
            }
        }

        let path = self.getter.url_path(request);
        let query = self.getter.url_query(request);
        if self.config.stability.emit_stable() {
            if let Some(path) = &path {
                sink.set(attribute::URL_PATH, path.to_string());
            }
            if let Some(query) = &query {
                sink.set(attribute::URL_QUERY, query.to_string());
            }
        }
        if self.config.stability.emit_old() {
            if let Some(path) = path {
                let target = match query {
                    Some(query) if !query.is_empty() => format!("{path}?{query}"),
                    _ => path.into_owned(),
                };
                sink.set(semconv::HTTP_TARGET, target);
            }
        }

        if let Some(address) = self.getter.client_address(request) {
            if self.config.stability.emit_stable() {
                sink.set(attribute::CLIENT_ADDRESS, address.to_string());
            }
            if self.config.stability.emit_old() {
                sink.set(semconv::HTTP_CLIENT_IP, address.into_owned());
            }
        }

        if let Some(user_agent) = self
            .getter
            .http_request_header(request, "user-agent")
            .into_iter()
            .next()
        {
            sink.set(attribute::USER_AGENT_ORIGINAL, user_agent);
        }

        if let Some(address) = self.getter.server_address(request) {
            if self.config.stability.emit_stable() {
                sink.set(attribute::SERVER_ADDRESS, address.to_string());
            }
            if self.config.stability.emit_old() {
                sink.set(semconv::NET_HOST_NAME, address.into_owned());
            }
            if let Some(port) = self.getter.server_port(request) {
                if self.config.stability.emit_stable() {
                    sink.set(attribute::SERVER_PORT, i64::from(port));
                }
                if self.config.stability.emit_old() {
                    sink.set(semconv::NET_HOST_PORT, i64::from(port));
                }
            }
        }

        common::capture_request_headers(sink, &self.config, &self.getter, request);
    }

    fn on_end(
        &self,
        sink: &mut AttributesSink,
        cx: &Context,
        request: &REQUEST,
        response: Option<&RESPONSE>,
        error: Option<&dyn Error>,
    ) {
        // Prefer the route refined by framework layers during the request.
        let route = HttpServerRoute::get(cx)
            .or_else(|| self.getter.http_route(request).map(Cow::into_owned));
        sink.set_opt(attribute::HTTP_ROUTE, route);

        common::extract_common_end(
            sink,
            &self.config,
            &self.getter,
            request,
            response,
            error,
            500,
        );
    }
}

/// Builder for [`HttpServerAttributesExtractor`].
pub struct HttpServerAttributesExtractorBuilder<REQUEST, RESPONSE, G> {
    getter: G,
    config: CommonConfig,
    _phantom: PhantomData<fn(REQUEST, RESPONSE)>,
}

impl<REQUEST, RESPONSE, G> fmt::Debug
    for HttpServerAttributesExtractorBuilder<REQUEST, RESPONSE, G>
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpServerAttributesExtractorBuilder")
            .field("config", &self.config)
            .finish()
    }
}

impl<REQUEST, RESPONSE, G> HttpServerAttributesExtractorBuilder<REQUEST, RESPONSE, G>
where
    G: HttpServerAttributesGetter<REQUEST, RESPONSE>,
{
    /// Request headers (lowercase names) to capture as span attributes.
    pub fn with_captured_request_headers(
        mut self,
        headers: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        self.config.captured_request_headers =
            headers.into_iter().map(Into::into).collect();
        self
    }

    /// Response headers (lowercase names) to capture as span attributes.
    pub fn with_captured_response_headers(
        mut self,
        headers: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        self.config.captured_response_headers =
            headers.into_iter().map(Into::into).collect();
        self
    }

    /// Replaces the set of methods reported verbatim; anything outside it
    /// is normalized to `_OTHER`.
    pub fn with_known_methods(
        mut self,
        methods: impl IntoIterator<Item = impl Into<Cow<'static, str>>>,
    ) -> Self {
        self.config.known_methods = methods.into_iter().map(Into::into).collect();
        self
    }

    /// Overrides the schema mode read from the environment.
    pub fn with_semconv_stability(mut self, stability: HttpSemconvStability) -> Self {
        self.config.stability = stability;
        self
    }

    /// Builds the extractor.
    pub fn build(self) -> HttpServerAttributesExtractor<REQUEST, RESPONSE, G> {
        HttpServerAttributesExtractor {
            getter: self.getter,
            config: self.config,
            _phantom: PhantomData,
        }
    }
}
