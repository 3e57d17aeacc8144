//! HTTP semantic-convention building blocks for the
//! [`opentelemetry-instrumentation`] pipeline.
//!
//! An HTTP client or server instrumentation implements
//! [`HttpClientAttributesGetter`] or [`HttpServerAttributesGetter`] for its
//! request/response types and composes an instrumenter from the pieces in
//! this crate:
//!
//! - [`HttpClientAttributesExtractor`] / [`HttpServerAttributesExtractor`]:
//!   map the getter's accessors to the semantic-convention span attributes,
//!   including URL sanitization, captured headers and the resend counter.
//! - [`HttpClientSpanNameExtractor`] / [`HttpServerSpanNameExtractor`] and
//!   the matching span status extractors.
//! - [`HttpClientMetrics`] / [`HttpServerMetrics`]: duration histograms and
//!   the server active-requests counter, with per-instrument attribute
//!   filtering; experimental body-size histograms are available behind
//!   explicit opt-in.
//! - [`HttpServerRoute`]: a context holder that lets nested framework
//!   layers refine the `http.route` value and the server span name.
//! - [`RedirectExec`] and [`HttpClientResend`]: drive a redirect-following
//!   client call chain, one span per hop, with the resend count attribute.
//!
//! During the HTTP semantic-convention migration the crate can emit the
//! stable schema, the old schema, or both at once. The mode is selected by
//! the `OTEL_SEMCONV_STABILITY_OPT_IN` environment variable (values `http`
//! and `http/dup`) through [`HttpSemconvStability::from_env`] and injected
//! into every extractor and metrics listener when it is built; it is never
//! consulted again afterwards.
//!
//! Ready-made getter implementations for [`http::Request`] /
//! [`http::Response`] pairs live in [`HttpClientRequestGetter`] and
//! [`HttpServerRequestGetter`], together with [`HeaderInjector`] /
//! [`HeaderExtractor`] carrier adapters for [`http::HeaderMap`].
//!
//! [`opentelemetry-instrumentation`]: https://crates.io/crates/opentelemetry-instrumentation
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

mod advice;
mod client;
mod client_metrics;
mod common;
mod experimental_metrics;
mod getter;
mod http_types;
mod redirect;
mod resend;
mod route;
mod semconv;
mod server;
mod server_metrics;
mod span_name;
mod span_status;

pub use client::{HttpClientAttributesExtractor, HttpClientAttributesExtractorBuilder};
pub use client_metrics::HttpClientMetrics;
pub use experimental_metrics::{HttpClientExperimentalMetrics, HttpServerExperimentalMetrics};
pub use getter::{
    HttpClientAttributesGetter, HttpCommonAttributesGetter, HttpServerAttributesGetter,
};
pub use http_types::{
    HeaderExtractor, HeaderInjector, HttpClientRequestGetter, HttpServerRequestGetter,
};
pub use redirect::RedirectExec;
pub use resend::HttpClientResend;
pub use route::{HttpServerRoute, HttpServerRouteSource};
pub use semconv::HttpSemconvStability;
pub use server::{HttpServerAttributesExtractor, HttpServerAttributesExtractorBuilder};
pub use server_metrics::HttpServerMetrics;
pub use span_name::{HttpClientSpanNameExtractor, HttpServerSpanNameExtractor};
pub use span_status::{HttpClientSpanStatusExtractor, HttpServerSpanStatusExtractor};
