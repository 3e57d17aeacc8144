use std::borrow::Cow;
use std::error::Error;

use opentelemetry::trace::{SpanKind, Status};
use opentelemetry::Context;

use crate::AttributesSink;

/// Derives span attributes from a library's request/response pair.
///
/// Implementations must be pure with respect to external state: they may
/// read the request and response but only write to the sink. Every accessor
/// result must be treated as optionally absent; a library that cannot
/// produce a value is not an error condition.
///
/// Extractors registered on an [`Instrumenter`](crate::Instrumenter) run in
/// registration order against a shared [`AttributesSink`].
pub trait AttributesExtractor<REQUEST, RESPONSE>: Send + Sync {
    /// Extracts attributes available before the operation executes.
    fn on_start(&self, sink: &mut AttributesSink, parent_cx: &Context, request: &REQUEST);

    /// Extracts attributes available once the operation has completed.
    ///
    /// `response` is `None` when the operation failed before producing one;
    /// a transport failure surfaces as `error` with no response, and both
    /// may be present simultaneously.
    fn on_end(
        &self,
        sink: &mut AttributesSink,
        cx: &Context,
        request: &REQUEST,
        response: Option<&RESPONSE>,
        error: Option<&dyn Error>,
    );
}

/// Derives the span name from a request snapshot.
///
/// Extraction happens before the span is created and must be deterministic
/// for a given request. Low cardinality is the implementor's
/// responsibility: values such as full URLs do not belong in span names.
pub trait SpanNameExtractor<REQUEST>: Send + Sync {
    /// Returns the name for the operation described by `request`.
    fn extract(&self, request: &REQUEST) -> Cow<'static, str>;
}

impl<REQUEST, F> SpanNameExtractor<REQUEST> for F
where
    F: Fn(&REQUEST) -> Cow<'static, str> + Send + Sync,
{
    fn extract(&self, request: &REQUEST) -> Cow<'static, str> {
        self(request)
    }
}

/// Derives the [`SpanKind`] from a request snapshot.
pub trait SpanKindExtractor<REQUEST>: Send + Sync {
    /// Returns the kind of span to create for `request`.
    fn extract(&self, request: &REQUEST) -> SpanKind;
}

/// A [`SpanKindExtractor`] returning the same kind for every request.
pub(crate) struct ConstSpanKindExtractor(pub(crate) SpanKind);

impl<REQUEST> SpanKindExtractor<REQUEST> for ConstSpanKindExtractor {
    fn extract(&self, _request: &REQUEST) -> SpanKind {
        self.0.clone()
    }
}

/// Derives the span status from the operation outcome.
///
/// Per convention the result is either [`Status::Unset`] or a
/// [`Status::Error`]; the absence of an error is expressed as unset, never
/// as `Ok`.
pub trait SpanStatusExtractor<REQUEST, RESPONSE>: Send + Sync {
    /// Classifies the outcome of the operation.
    fn extract(
        &self,
        request: &REQUEST,
        response: Option<&RESPONSE>,
        error: Option<&dyn Error>,
    ) -> Status;
}

/// The default status policy: any transport or application error maps to an
/// error status, everything else stays unset.
#[derive(Debug, Default)]
pub(crate) struct DefaultSpanStatusExtractor;

impl<REQUEST, RESPONSE> SpanStatusExtractor<REQUEST, RESPONSE> for DefaultSpanStatusExtractor {
    fn extract(
        &self,
        _request: &REQUEST,
        _response: Option<&RESPONSE>,
        error: Option<&dyn Error>,
    ) -> Status {
        match error {
            Some(error) => Status::error(error.to_string()),
            None => Status::Unset,
        }
    }
}
