use std::fmt;
use std::time::Instant;

use opentelemetry::metrics::{Histogram, Meter};
use opentelemetry::{otel_debug, Context, KeyValue};
use opentelemetry_instrumentation::{OperationListener, OperationMetrics};
use opentelemetry_semantic_conventions::metric;

use crate::advice;
use crate::semconv;
use crate::HttpSemconvStability;

/// Explicit bucket boundaries the stable conventions recommend for request
/// duration histograms, in seconds.
pub(crate) const DURATION_SECONDS_BOUNDARIES: &[f64] = &[
    0.005, 0.01, 0.025, 0.05, 0.075, 0.1, 0.25, 0.5, 0.75, 1.0, 2.5, 5.0, 7.5, 10.0,
];

#[derive(Debug)]
struct ClientMetricsState {
    start_attributes: Vec<KeyValue>,
    start_time: Instant,
}

/// Records HTTP client request duration histograms.
///
/// Depending on the schema mode this is `http.client.request.duration` in
/// seconds (stable), `http.client.duration` in milliseconds (old), or both
/// from the same measurement.
pub struct HttpClientMetrics {
    stable_duration: Option<Histogram<f64>>,
    old_duration: Option<Histogram<f64>>,
}

impl fmt::Debug for HttpClientMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpClientMetrics")
            .field("stable", &self.stable_duration.is_some())
            .field("old", &self.old_duration.is_some())
            .finish()
    }
}

impl HttpClientMetrics {
    /// Returns the metrics factory to register with
    /// `InstrumenterBuilder::with_operation_metrics`.
    pub fn factory(stability: HttpSemconvStability) -> OperationMetrics {
        Box::new(move |meter: &Meter| Box::new(HttpClientMetrics::create(meter, stability)))
    }

    fn create(meter: &Meter, stability: HttpSemconvStability) -> Self {
        let stable_duration = stability.emit_stable().then(|| {
            meter
                .f64_histogram(metric::HTTP_CLIENT_REQUEST_DURATION)
                .with_unit("s")
                .with_description("Duration of HTTP client requests.")
                .with_boundaries(DURATION_SECONDS_BOUNDARIES.to_vec())
                .build()
        });
        let old_duration = stability.emit_old().then(|| {
            meter
                .f64_histogram(semconv::HTTP_CLIENT_DURATION)
                .with_unit("ms")
                .with_description("The duration of the outbound HTTP request")
                .build()
        });
        HttpClientMetrics {
            stable_duration,
            old_duration,
        }
    }
}

impl OperationListener for HttpClientMetrics {
    fn on_start(&self, cx: Context, attributes: &[KeyValue], start_time: Instant) -> Context {
        cx.with_value(ClientMetricsState {
            start_attributes: attributes.to_vec(),
            start_time,
        })
    }

    fn on_end(&self, cx: &Context, attributes: &[KeyValue], end_time: Instant) {
        let Some(state) = cx.get::<ClientMetricsState>() else {
            otel_debug!(
                name: "HttpClientMetrics.StateMissing",
                message = "no client metrics state in context, skipping duration recording"
            );
            return;
        };
        let merged = advice::merge_attributes(&state.start_attributes, attributes);
        let elapsed = end_time.saturating_duration_since(state.start_time);
        if let Some(histogram) = &self.stable_duration {
            histogram.record(
                elapsed.as_secs_f64(),
                &advice::filter_attributes(&merged, advice::STABLE_CLIENT_DURATION),
            );
        }
        if let Some(histogram) = &self.old_duration {
            histogram.record(
                elapsed.as_secs_f64() * 1000.0,
                &advice::filter_attributes(&merged, advice::OLD_CLIENT_DURATION),
            );
        }
    }
}
