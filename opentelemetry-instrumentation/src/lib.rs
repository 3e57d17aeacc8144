//! Building blocks for library instrumentations on top of the
//! [OpenTelemetry API](https://crates.io/crates/opentelemetry).
//!
//! An instrumentation observes a single *operation* (an HTTP call, a
//! message send, a database query) performed by the library it wraps, and
//! reports that operation as a span plus a set of metrics. This crate
//! contains the pieces that are common to every instrumentation:
//!
//! - [`Instrumenter`]: the orchestrator. It decides whether an operation
//!   should be observed at all, opens the span, runs the configured
//!   extractors, and on completion records status, exception events and
//!   operation metrics.
//! - [`AttributesExtractor`], [`SpanNameExtractor`], [`SpanKindExtractor`]
//!   and [`SpanStatusExtractor`]: pure components that derive telemetry
//!   data from the instrumented library's request/response types.
//! - [`OperationListener`]: the hook used by metrics implementations to
//!   track per-operation state such as duration histograms and in-flight
//!   counters.
//! - [`OperationEnder`] and [`InstrumentedFuture`]: adapters that guarantee
//!   an operation ends exactly once when completion can arrive through more
//!   than one channel (callbacks, futures, cancellation).
//!
//! Instrumentations describe their library through the extractor traits and
//! compose an [`Instrumenter`] with [`Instrumenter::builder`]. The crate
//! never blocks and never surfaces errors into the instrumented call path:
//! inconsistencies degrade to missing telemetry and an internal log line.
//!
//! Semantic-convention implementations of the extractor traits live in
//! sibling crates such as `opentelemetry-instrumentation-http`.
#![warn(
    future_incompatible,
    missing_debug_implementations,
    missing_docs,
    nonstandard_style,
    rust_2018_idioms,
    unreachable_pub,
    unused
)]
#![allow(elided_lifetimes_in_paths)]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]

mod attributes;
mod completion;
mod extractor;
mod future;
mod instrumenter;
mod operation;
mod suppression;

pub use attributes::AttributesSink;
pub use completion::{OperationCancelled, OperationEnder};
pub use extractor::{
    AttributesExtractor, SpanKindExtractor, SpanNameExtractor, SpanStatusExtractor,
};
pub use future::InstrumentedFuture;
pub use instrumenter::{
    ClientInstrumenter, Instrumenter, InstrumenterBuilder, ServerInstrumenter,
};
pub use operation::{OperationListener, OperationMetrics};
