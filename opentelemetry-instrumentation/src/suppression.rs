//! Nested-span suppression.
//!
//! Recursive wrapper layers (an HTTP client built on another instrumented
//! HTTP client, a server dispatch that re-enters the same framework) would
//! otherwise produce nested spans for one logical operation. Suppression is
//! signalled through context-key presence: starting a CLIENT or SERVER
//! operation inserts a kind marker into the returned context, and
//! `should_start` reports `false` when the parent context already carries
//! the marker for the same kind. INTERNAL, PRODUCER and CONSUMER spans are
//! never suppressed.

use opentelemetry::trace::SpanKind;
use opentelemetry::Context;

#[derive(Debug)]
struct ActiveClientSpan;

#[derive(Debug)]
struct ActiveServerSpan;

pub(crate) fn mark(cx: Context, kind: &SpanKind) -> Context {
    match kind {
        SpanKind::Client => cx.with_value(ActiveClientSpan),
        SpanKind::Server => cx.with_value(ActiveServerSpan),
        _ => cx,
    }
}

pub(crate) fn is_suppressed(cx: &Context, kind: &SpanKind) -> bool {
    match kind {
        SpanKind::Client => cx.get::<ActiveClientSpan>().is_some(),
        SpanKind::Server => cx.get::<ActiveServerSpan>().is_some(),
        _ => false,
    }
}
