use std::sync::atomic::{AtomicI64, Ordering};

use opentelemetry::Context;

/// Counts the attempts of one logical client call chain.
///
/// [`RedirectExec`](crate::RedirectExec) (or any retry layer) installs the
/// counter in the context shared by every hop; the client attributes
/// extractor reads and advances it when a hop starts, emitting the resend
/// count attribute for every attempt after the first.
#[derive(Debug, Default)]
pub struct HttpClientResend(AtomicI64);

impl HttpClientResend {
    /// Installs a fresh counter unless the context already carries one, so
    /// nested retry layers share a single count per user-initiated call.
    pub fn initialize(cx: Context) -> Context {
        if cx.get::<HttpClientResend>().is_some() {
            return cx;
        }
        cx.with_value(HttpClientResend::default())
    }

    /// Returns the current attempt index and advances the counter. A
    /// context without a counter always reports 0.
    pub(crate) fn get_and_increment(cx: &Context) -> i64 {
        match cx.get::<HttpClientResend>() {
            Some(resend) => resend.0.fetch_add(1, Ordering::AcqRel),
            None => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_attempts_per_chain() {
        let cx = HttpClientResend::initialize(Context::new());
        assert_eq!(HttpClientResend::get_and_increment(&cx), 0);
        assert_eq!(HttpClientResend::get_and_increment(&cx), 1);
        assert_eq!(HttpClientResend::get_and_increment(&cx), 2);
    }

    #[test]
    fn initialize_is_idempotent() {
        let cx = HttpClientResend::initialize(Context::new());
        assert_eq!(HttpClientResend::get_and_increment(&cx), 0);
        let cx = HttpClientResend::initialize(cx);
        // The pre-existing counter survives, no reset to zero.
        assert_eq!(HttpClientResend::get_and_increment(&cx), 1);
    }

    #[test]
    fn absent_counter_reports_zero() {
        let cx = Context::new();
        assert_eq!(HttpClientResend::get_and_increment(&cx), 0);
        assert_eq!(HttpClientResend::get_and_increment(&cx), 0);
    }
}
