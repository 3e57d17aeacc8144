use std::error::Error;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use opentelemetry::Context;

use crate::Instrumenter;

/// The error recorded when an operation is abandoned before completing,
/// for example when its future is dropped by a timeout or disconnect.
#[derive(Debug, Default, Clone, Copy)]
pub struct OperationCancelled;

impl fmt::Display for OperationCancelled {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("operation cancelled before completion")
    }
}

impl Error for OperationCancelled {}

/// Owns everything needed to end one started operation, and guarantees the
/// end happens at most once.
///
/// Libraries with callback-style completion often signal the outcome through
/// several channels (a success callback, a failure callback, a cancellation
/// hook). Cloning is cheap; every clone shares the same once-guard, so the
/// first channel to report wins and the rest become no-ops. The
/// [`Instrumenter`] applies the same guard internally, making a duplicate
/// end harmless even when it bypasses the ender.
pub struct OperationEnder<REQUEST, RESPONSE> {
    inner: Arc<EnderInner<REQUEST, RESPONSE>>,
}

struct EnderInner<REQUEST, RESPONSE> {
    instrumenter: Arc<Instrumenter<REQUEST, RESPONSE>>,
    cx: Context,
    request: REQUEST,
    ended: AtomicBool,
}

impl<REQUEST, RESPONSE> Clone for OperationEnder<REQUEST, RESPONSE> {
    fn clone(&self) -> Self {
        OperationEnder {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<REQUEST, RESPONSE> fmt::Debug for OperationEnder<REQUEST, RESPONSE> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OperationEnder")
            .field("ended", &self.inner.ended)
            .finish()
    }
}

impl<REQUEST, RESPONSE> OperationEnder<REQUEST, RESPONSE> {
    /// Wraps an operation started by `instrumenter` under `cx`, taking
    /// ownership of the request so completion callbacks need not borrow it.
    pub fn new(
        instrumenter: Arc<Instrumenter<REQUEST, RESPONSE>>,
        cx: Context,
        request: REQUEST,
    ) -> Self {
        OperationEnder {
            inner: Arc::new(EnderInner {
                instrumenter,
                cx,
                request,
                ended: AtomicBool::new(false),
            }),
        }
    }

    /// The context the operation runs under.
    pub fn context(&self) -> &Context {
        &self.inner.cx
    }

    /// Ends the operation with the given outcome. Later calls, from this or
    /// any clone, are no-ops.
    pub fn end(&self, response: Option<&RESPONSE>, error: Option<&dyn Error>) {
        if self.inner.ended.swap(true, Ordering::AcqRel) {
            return;
        }
        self.inner
            .instrumenter
            .end(&self.inner.cx, &self.inner.request, response, error);
    }

    /// Ends the operation as abandoned, recording [`OperationCancelled`].
    pub fn end_cancelled(&self) {
        self.end(None, Some(&OperationCancelled));
    }
}
