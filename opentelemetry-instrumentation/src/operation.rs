use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use opentelemetry::metrics::Meter;
use opentelemetry::{Context, KeyValue};

/// A hook notified when an operation starts and ends, used to implement
/// operation metrics such as duration histograms and in-flight counters.
///
/// Listeners keep per-operation state in the [`Context`] returned from
/// [`on_start`](OperationListener::on_start), an immutable snapshot stored
/// under a listener-private key. The only state shared across operations
/// are the metric instruments themselves, which are safe for concurrent
/// recording by contract of the OpenTelemetry API.
pub trait OperationListener: Send + Sync {
    /// Called when an operation starts, after all attribute extractors ran.
    ///
    /// Returns the context the operation proceeds under, usually the input
    /// context with the listener's state snapshot attached.
    fn on_start(&self, cx: Context, attributes: &[KeyValue], start_time: Instant) -> Context;

    /// Called when an operation ends, after the span was closed.
    ///
    /// `attributes` holds the end-time attributes only; listeners merge
    /// them over the start snapshot they stored in the context. A missing
    /// snapshot (context lost or mismatched) must degrade to a logged
    /// no-op, never an error.
    fn on_end(&self, cx: &Context, attributes: &[KeyValue], end_time: Instant);
}

/// Factory for an [`OperationListener`] bound to a [`Meter`].
///
/// Metric implementations hand this to
/// [`InstrumenterBuilder::with_operation_metrics`](crate::InstrumenterBuilder::with_operation_metrics);
/// the builder resolves it once with the instrumentation-scoped meter.
pub type OperationMetrics = Box<dyn Fn(&Meter) -> Box<dyn OperationListener> + Send + Sync>;

/// Lifecycle state attached to the context produced by
/// [`Instrumenter::start`](crate::Instrumenter::start).
///
/// The ended flag makes the started-to-ended transition one-way: a second
/// end observed through any channel is dropped.
#[derive(Debug, Default)]
pub(crate) struct OperationState {
    ended: AtomicBool,
}

impl OperationState {
    pub(crate) fn new() -> Self {
        OperationState::default()
    }

    /// Attempts the started-to-ended transition, returning `false` if the
    /// operation had already ended.
    pub(crate) fn transition_to_ended(&self) -> bool {
        self.ended
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}
