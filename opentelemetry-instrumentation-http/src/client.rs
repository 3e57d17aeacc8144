use std::error::Error;
use std::fmt;
use std::marker::PhantomData;

use opentelemetry::Context;
use opentelemetry_instrumentation::{AttributesExtractor, AttributesSink};
use opentelemetry_semantic_conventions::attribute;

use crate::common::{self, CommonConfig};
use crate::getter::HttpClientAttributesGetter;
use crate::resend::HttpClientResend;
use crate::semconv;
use crate::HttpSemconvStability;

/// Extracts the HTTP client span attributes defined by the semantic
/// conventions from an [`HttpClientAttributesGetter`].
///
/// Emits, depending on the configured schema mode: the request method,
/// sanitized full URL, server address and non-default port, response status
/// code, error type, protocol name/version, socket peer, resend count,
/// content lengths and the configured captured headers.
pub struct HttpClientAttributesExtractor<REQUEST, RESPONSE, G> {
    getter: G,
    config: CommonConfig,
    _phantom: PhantomData<fn(REQUEST, RESPONSE)>,
}

impl<REQUEST, RESPONSE, G> fmt::Debug for HttpClientAttributesExtractor<REQUEST, RESPONSE, G> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpClientAttributesExtractor")
            .field("config", &self.config)
            .finish()
    }
}

impl<REQUEST, RESPONSE, G> HttpClientAttributesExtractor<REQUEST, RESPONSE, G>
where
    G: HttpClientAttributesGetter<REQUEST, RESPONSE>,
{
    /// Returns a builder wrapping `getter`, with the schema mode taken from
    /// the environment.
    pub fn builder(getter: G) -> HttpClientAttributesExtractorBuilder<REQUEST, RESPONSE, G> {
        HttpClientAttributesExtractorBuilder {
            getter,
            config: CommonConfig::new(HttpSemconvStability::from_env()),
            _phantom: PhantomData,
        }
    }
}

impl<REQUEST, RESPONSE, G> AttributesExtractor<REQUEST, RESPONSE>
    for HttpClientAttributesExtractor<REQUEST, RESPONSE, G>
where
    REQUEST: Send + Sync,
    RESPONSE: Send + Sync,
    G: HttpClientAttributesGetter<REQUEST, RESPONSE>,
{
    fn on_start(&self, sink: &mut AttributesSink, parent_cx: &Context, request: &REQUEST) {
        let method = self.getter.http_request_method(request);
        common::extract_method(sink, &self.config, method.as_deref());

        let url = self.getter.url_full(request);
        if let Some(url) = &url {
            let sanitized = common::sanitize_url(url);
            if self.config.stability.emit_stable() {
                sink.set(attribute::URL_FULL, sanitized.to_string());
            }
            if self.config.stability.emit_old() {
                sink.set(semconv::HTTP_URL, sanitized.into_owned());
            }
        }

        if let Some(address) = self.getter.server_address(request) {
            if self.config.stability.emit_stable() {
                sink.set(attribute::SERVER_ADDRESS, address.to_string());
            }
            if self.config.stability.emit_old() {
                sink.set(semconv::NET_PEER_NAME, address.into_owned());
            }
            if let Some(port) = self.getter.server_port(request) {
                if !common::is_default_port(url.as_deref(), port) {
                    if self.config.stability.emit_stable() {
                        sink.set(attribute::SERVER_PORT, i64::from(port));
                    }
                    if self.config.stability.emit_old() {
                        sink.set(semconv::NET_PEER_PORT, i64::from(port));
                    }
                }
            }
        }

        // The resend counter lives in the parent context shared by every
        // hop of one logical call chain; the first attempt reports nothing.
        let resend_count = HttpClientResend::get_and_increment(parent_cx);
        if resend_count > 0 {
            if self.config.stability.emit_stable() {
                sink.set(attribute::HTTP_REQUEST_RESEND_COUNT, resend_count);
            }
            if self.config.stability.emit_old() {
                sink.set(semconv::HTTP_RESEND_COUNT, resend_count);
            }
        }

        common::capture_request_headers(sink, &self.config, &self.getter, request);
    }

    fn on_end(
        &self,
        sink: &mut AttributesSink,
        _cx: &Context,
        request: &REQUEST,
        response: Option<&RESPONSE>,
        error: Option<&dyn Error>,
    ) {
        common::extract_common_end(
            sink,
            &self.config,
            &self.getter,
            request,
            response,
            error,
            400,
        );
    }
}

/// Builder for [`HttpClientAttributesExtractor`].
pub struct HttpClientAttributesExtractorBuilder<REQUEST, RESPONSE, G> {
    getter: G,
    config: CommonConfig,
    _phantom: PhantomData<fn(REQUEST, RESPONSE)>,
}

impl<REQUEST, RESPONSE, G> fmt::Debug
    for HttpClientAttributesExtractorBuilder<REQUEST, RESPONSE, G>
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpClientAttributesExtractorBuilder")
            .field("config", &self.config)
            .finish()
    }
}

impl<REQUEST, RESPONSE, G> HttpClientAttributesExtractorBuilder<REQUEST, RESPONSE, G>
where
    G: HttpClientAttributesGetter<REQUEST, RESPONSE>,
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
        methods: impl IntoIterator<Item = impl Into<std::borrow::Cow<'static, str>>>,
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
    pub fn build(self) -> HttpClientAttributesExtractor<REQUEST, RESPONSE, G> {
        HttpClientAttributesExtractor {
            getter: self.getter,
            config: self.config,
            _phantom: PhantomData,
        }
    }
}
