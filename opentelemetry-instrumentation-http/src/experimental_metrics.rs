use std::fmt;
use std::time::Instant;

use opentelemetry::metrics::{Histogram, Meter};
use opentelemetry::{otel_debug, Context, KeyValue, Value};
use opentelemetry_instrumentation::{OperationListener, OperationMetrics};
use opentelemetry_semantic_conventions::{attribute, metric};

use crate::advice;
use crate::semconv;

fn body_size(attributes: &[KeyValue], stable_key: &str, old_key: &str) -> Option<u64> {
    attributes
        .iter()
        .find(|kv| kv.key.as_str() == stable_key || kv.key.as_str() == old_key)
        .and_then(|kv| match kv.value {
            Value::I64(size) if size >= 0 => Some(size as u64),
            _ => None,
        })
}

#[derive(Debug)]
struct ClientSizeState {
    start_attributes: Vec<KeyValue>,
}

/// Opt-in HTTP client body-size histograms
/// (`http.client.request.body.size` / `http.client.response.body.size`),
/// fed from the content-length attributes the extractors record.
pub struct HttpClientExperimentalMetrics {
    request_size: Histogram<u64>,
    response_size: Histogram<u64>,
}

impl fmt::Debug for HttpClientExperimentalMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpClientExperimentalMetrics").finish()
    }
}

impl HttpClientExperimentalMetrics {
    /// Returns the metrics factory to register with
    /// `InstrumenterBuilder::with_operation_metrics`.
    pub fn factory() -> OperationMetrics {
        Box::new(|meter: &Meter| {
            Box::new(HttpClientExperimentalMetrics {
                request_size: meter
                    .u64_histogram(metric::HTTP_CLIENT_REQUEST_BODY_SIZE)
                    .with_unit("By")
                    .with_description("Size of HTTP client request bodies.")
                    .build(),
                response_size: meter
                    .u64_histogram(metric::HTTP_CLIENT_RESPONSE_BODY_SIZE)
                    .with_unit("By")
                    .with_description("Size of HTTP client response bodies.")
                    .build(),
            })
        })
    }
}

impl OperationListener for HttpClientExperimentalMetrics {
    fn on_start(&self, cx: Context, attributes: &[KeyValue], _start_time: Instant) -> Context {
        cx.with_value(ClientSizeState {
            start_attributes: attributes.to_vec(),
        })
    }

    fn on_end(&self, cx: &Context, attributes: &[KeyValue], _end_time: Instant) {
        let Some(state) = cx.get::<ClientSizeState>() else {
            otel_debug!(
                name: "HttpClientExperimentalMetrics.StateMissing",
                message = "no client metrics state in context, skipping body size recording"
            );
            return;
        };
        let merged = advice::merge_attributes(&state.start_attributes, attributes);
        let filtered = advice::filter_attributes(&merged, advice::CLIENT_BODY_SIZE);
        if let Some(size) = body_size(
            &merged,
            attribute::HTTP_REQUEST_BODY_SIZE,
            semconv::HTTP_REQUEST_CONTENT_LENGTH,
        ) {
            self.request_size.record(size, &filtered);
        }
        if let Some(size) = body_size(
            &merged,
            attribute::HTTP_RESPONSE_BODY_SIZE,
            semconv::HTTP_RESPONSE_CONTENT_LENGTH,
        ) {
            self.response_size.record(size, &filtered);
        }
    }
}

#[derive(Debug)]
struct ServerSizeState {
    start_attributes: Vec<KeyValue>,
}

/// Opt-in HTTP server body-size histograms
/// (`http.server.request.body.size` / `http.server.response.body.size`).
pub struct HttpServerExperimentalMetrics {
    request_size: Histogram<u64>,
    response_size: Histogram<u64>,
}

impl fmt::Debug for HttpServerExperimentalMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpServerExperimentalMetrics").finish()
    }
}

impl HttpServerExperimentalMetrics {
    /// Returns the metrics factory to register with
    /// `InstrumenterBuilder::with_operation_metrics`.
    pub fn factory() -> OperationMetrics {
        Box::new(|meter: &Meter| {
            Box::new(HttpServerExperimentalMetrics {
                request_size: meter
                    .u64_histogram(metric::HTTP_SERVER_REQUEST_BODY_SIZE)
                    .with_unit("By")
                    .with_description("Size of HTTP server request bodies.")
                    .build(),
                response_size: meter
                    .u64_histogram(metric::HTTP_SERVER_RESPONSE_BODY_SIZE)
                    .with_unit("By")
                    .with_description("Size of HTTP server response bodies.")
                    .build(),
            })
        })
    }
}

impl OperationListener for HttpServerExperimentalMetrics {
    fn on_start(&self, cx: Context, attributes: &[KeyValue], _start_time: Instant) -> Context {
        cx.with_value(ServerSizeState {
            start_attributes: attributes.to_vec(),
        })
    }

    fn on_end(&self, cx: &Context, attributes: &[KeyValue], _end_time: Instant) {
        let Some(state) = cx.get::<ServerSizeState>() else {
            otel_debug!(
                name: "HttpServerExperimentalMetrics.StateMissing",
                message = "no server metrics state in context, skipping body size recording"
            );
            return;
        };
        let merged = advice::merge_attributes(&state.start_attributes, attributes);
        let filtered = advice::filter_attributes(&merged, advice::SERVER_BODY_SIZE);
        if let Some(size) = body_size(
            &merged,
            attribute::HTTP_REQUEST_BODY_SIZE,
            semconv::HTTP_REQUEST_CONTENT_LENGTH,
        ) {
            self.request_size.record(size, &filtered);
        }
        if let Some(size) = body_size(
            &merged,
            attribute::HTTP_RESPONSE_BODY_SIZE,
            semconv::HTTP_RESPONSE_CONTENT_LENGTH,
        ) {
            self.response_size.record(size, &filtered);
        }
    }
}
