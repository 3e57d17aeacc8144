use std::fmt;
use std::time::Instant;

use opentelemetry::metrics::{Histogram, Meter, UpDownCounter};
use opentelemetry::{otel_debug, Context, KeyValue};
use opentelemetry_instrumentation::{OperationListener, OperationMetrics};
use opentelemetry_semantic_conventions::metric;

use crate::advice;
use crate::client_metrics::DURATION_SECONDS_BOUNDARIES;
use crate::semconv;
use crate::HttpSemconvStability;

#[derive(Debug)]
struct ServerMetricsState {
    start_attributes: Vec<KeyValue>,
    start_time: Instant,
}

/// Records HTTP server request duration histograms and the in-flight
/// `http.server.active_requests` counter.
///
/// The duration instrument follows the schema mode:
/// `http.server.request.duration` in seconds (stable),
/// `http.server.duration` in milliseconds (old), or both. The
/// active-requests counter is incremented in `on_start` and decremented in
/// `on_end` with the same start-time attribute snapshot, so an operation
/// that ends through any channel always balances the counter.
pub struct HttpServerMetrics {
    stable_duration: Option<Histogram<f64>>,
    old_duration: Option<Histogram<f64>>,
    active_requests: UpDownCounter<i64>,
}

impl fmt::Debug for HttpServerMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpServerMetrics")
            .field("stable", &self.stable_duration.is_some())
            .field("old", &self.old_duration.is_some())
            .finish()
    }
}

impl HttpServerMetrics {
    /// Returns the metrics factory to register with
    /// `InstrumenterBuilder::with_operation_metrics`.
    pub fn factory(stability: HttpSemconvStability) -> OperationMetrics {
        Box::new(move |meter: &Meter| Box::new(HttpServerMetrics::create(meter, stability)))
    }

    fn create(meter: &Meter, stability: HttpSemconvStability) -> Self {
        let stable_duration = stability.emit_stable().then(|| {
            meter
                .f64_histogram(metric::HTTP_SERVER_REQUEST_DURATION)
                .with_unit("s")
                .with_description("Duration of HTTP server requests.")
                .with_boundaries(DURATION_SECONDS_BOUNDARIES.to_vec())
                .build()
        });
        let old_duration = stability.emit_old().then(|| {
            meter
                .f64_histogram(semconv::HTTP_SERVER_DURATION)
                .with_unit("ms")
                .with_description("The duration of the inbound HTTP request")
                .build()
        });
        let active_requests = meter
            .i64_up_down_counter(metric::HTTP_SERVER_ACTIVE_REQUESTS)
            .with_unit("{request}")
            .with_description("Number of active HTTP server requests.")
            .build();
        HttpServerMetrics {
            stable_duration,
            old_duration,
            active_requests,
        }
    }
}

impl OperationListener for HttpServerMetrics {
    fn on_start(&self, cx: Context, attributes: &[KeyValue], start_time: Instant) -> Context {
        self.active_requests.add(
            1,
            &advice::filter_attributes(attributes, advice::SERVER_ACTIVE_REQUESTS),
        );
        cx.with_value(ServerMetricsState {
            start_attributes: attributes.to_vec(),
            start_time,
        })
    }

    fn on_end(&self, cx: &Context, attributes: &[KeyValue], end_time: Instant) {
        let Some(state) = cx.get::<ServerMetricsState>() else {
            otel_debug!(
                name: "HttpServerMetrics.StateMissing",
                message = "no server metrics state in context, skipping duration recording"
            );
            return;
        };
        self.active_requests.add(
            -1,
            &advice::filter_attributes(&state.start_attributes, advice::SERVER_ACTIVE_REQUESTS),
        );
        let merged = advice::merge_attributes(&state.start_attributes, attributes);
        let elapsed = end_time.saturating_duration_since(state.start_time);
        if let Some(histogram) = &self.stable_duration {
            histogram.record(
                elapsed.as_secs_f64(),
                &advice::filter_attributes(&merged, advice::STABLE_SERVER_DURATION),
            );
        }
        if let Some(histogram) = &self.old_duration {
            histogram.record(
                elapsed.as_secs_f64() * 1000.0,
                &advice::filter_attributes(&merged, advice::OLD_SERVER_DURATION),
            );
        }
    }
}
