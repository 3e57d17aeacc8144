use std::error::Error;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::task::Poll;

use pin_project_lite::pin_project;

use crate::OperationEnder;

pin_project! {
    /// A future adapter that ties an operation's lifetime to the future
    /// driving it.
    ///
    /// The wrapped operation context is attached as the current context for
    /// the duration of every poll, so telemetry produced by the inner future
    /// parents correctly. When the inner future resolves the operation ends
    /// with its output; when the future is dropped before resolving the
    /// operation ends as cancelled. Either way the end happens exactly once.
    pub struct InstrumentedFuture<F, REQUEST, RESPONSE> {
        #[pin]
        inner: F,
        ender: Option<OperationEnder<REQUEST, RESPONSE>>,
    }

    impl<F, REQUEST, RESPONSE> PinnedDrop for InstrumentedFuture<F, REQUEST, RESPONSE> {
        fn drop(this: Pin<&mut Self>) {
            let this = this.project();
            if let Some(ender) = this.ender.take() {
                ender.end_cancelled();
            }
        }
    }
}

impl<F, REQUEST, RESPONSE> fmt::Debug for InstrumentedFuture<F, REQUEST, RESPONSE> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstrumentedFuture")
            .field("pending", &self.ender.is_some())
            .finish()
    }
}

impl<F, REQUEST, RESPONSE> InstrumentedFuture<F, REQUEST, RESPONSE> {
    /// Ties `future` to the operation owned by `ender`.
    pub fn new(future: F, ender: OperationEnder<REQUEST, RESPONSE>) -> Self {
        InstrumentedFuture {
            inner: future,
            ender: Some(ender),
        }
    }
}

impl<F, REQUEST, RESPONSE, E> Future for InstrumentedFuture<F, REQUEST, RESPONSE>
where
    F: Future<Output = Result<RESPONSE, E>>,
    E: Error,
{
    type Output = F::Output;

    fn poll(self: Pin<&mut Self>, task_cx: &mut std::task::Context<'_>) -> Poll<Self::Output> {
        let this = self.project();
        let _guard = this
            .ender
            .as_ref()
            .map(|ender| ender.context().clone().attach());
        match this.inner.poll(task_cx) {
            Poll::Ready(output) => {
                if let Some(ender) = this.ender.take() {
                    match &output {
                        Ok(response) => ender.end(Some(response), None),
                        Err(error) => ender.end(None, Some(error)),
                    }
                }
                Poll::Ready(output)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractor::ConstSpanKindExtractor;
    use crate::Instrumenter;
    use opentelemetry::trace::{SpanKind, Status};
    use opentelemetry::Context;
    use opentelemetry_sdk::trace::{InMemorySpanExporter, SdkTracerProvider};
    use std::borrow::Cow;
    use std::sync::Arc;
    use std::task::{RawWaker, RawWakerVTable, Waker};

    struct Req;
    struct Res;

    #[derive(Debug)]
    struct Failed;

    impl fmt::Display for Failed {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("failed")
        }
    }

    impl Error for Failed {}

    fn test_instrumenter(provider: &SdkTracerProvider) -> Arc<Instrumenter<Req, Res>> {
        Arc::new(
            Instrumenter::builder("test-instrumentation", |_req: &Req| {
                Cow::Borrowed("async-op")
            })
            .with_tracer_provider(provider)
            .build_instrumenter(ConstSpanKindExtractor(SpanKind::Client)),
        )
    }

    fn noop_waker() -> Waker {
        fn clone(_: *const ()) -> RawWaker {
            RawWaker::new(std::ptr::null(), &VTABLE)
        }
        fn noop(_: *const ()) {}
        static VTABLE: RawWakerVTable = RawWakerVTable::new(clone, noop, noop, noop);
        // Safety: all vtable entries are no-ops over a null pointer.
        unsafe { Waker::from_raw(RawWaker::new(std::ptr::null(), &VTABLE)) }
    }

    fn poll_once<F: Future>(future: Pin<&mut F>) -> Poll<F::Output> {
        let waker = noop_waker();
        let mut task_cx = std::task::Context::from_waker(&waker);
        future.poll(&mut task_cx)
    }

    #[test]
    fn resolving_future_ends_the_operation() {
        let exporter = InMemorySpanExporter::default();
        let provider = SdkTracerProvider::builder()
            .with_simple_exporter(exporter.clone())
            .build();
        let instrumenter = test_instrumenter(&provider);

        let cx = instrumenter.start(&Context::new(), &Req);
        let ender = OperationEnder::new(instrumenter, cx, Req);
        let future = InstrumentedFuture::new(async { Ok::<_, Failed>(Res) }, ender);
        let mut future = Box::pin(future);

        assert!(matches!(poll_once(future.as_mut()), Poll::Ready(Ok(_))));

        let spans = exporter.get_finished_spans().unwrap();
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].status, Status::Unset);
    }

    #[test]
    fn failing_future_records_the_error() {
        let exporter = InMemorySpanExporter::default();
        let provider = SdkTracerProvider::builder()
            .with_simple_exporter(exporter.clone())
            .build();
        let instrumenter = test_instrumenter(&provider);

        let cx = instrumenter.start(&Context::new(), &Req);
        let ender = OperationEnder::new(instrumenter, cx, Req);
        let future = InstrumentedFuture::new(async { Err::<Res, _>(Failed) }, ender);
        let mut future = Box::pin(future);

        assert!(matches!(poll_once(future.as_mut()), Poll::Ready(Err(_))));

        let spans = exporter.get_finished_spans().unwrap();
        assert_eq!(spans.len(), 1);
        assert!(matches!(spans[0].status, Status::Error { .. }));
        assert!(spans[0].events.iter().any(|e| e.name == "exception"));
    }

    #[test]
    fn dropped_future_ends_as_cancelled() {
        let exporter = InMemorySpanExporter::default();
        let provider = SdkTracerProvider::builder()
            .with_simple_exporter(exporter.clone())
            .build();
        let instrumenter = test_instrumenter(&provider);

        let cx = instrumenter.start(&Context::new(), &Req);
        let ender = OperationEnder::new(instrumenter, cx, Req);
        let future = InstrumentedFuture::new(
            async {
                std::future::pending::<()>().await;
                Ok::<_, Failed>(Res)
            },
            ender,
        );
        let mut future = Box::pin(future);

        assert!(poll_once(future.as_mut()).is_pending());
        drop(future);

        let spans = exporter.get_finished_spans().unwrap();
        assert_eq!(spans.len(), 1);
        assert!(matches!(spans[0].status, Status::Error { .. }));
    }

    #[test]
    fn drop_after_completion_does_not_double_end() {
        let exporter = InMemorySpanExporter::default();
        let provider = SdkTracerProvider::builder()
            .with_simple_exporter(exporter.clone())
            .build();
        let instrumenter = test_instrumenter(&provider);

        let cx = instrumenter.start(&Context::new(), &Req);
        let ender = OperationEnder::new(instrumenter, cx, Req);
        let future = InstrumentedFuture::new(async { Ok::<_, Failed>(Res) }, ender);
        let mut future = Box::pin(future);

        assert!(poll_once(future.as_mut()).is_ready());
        drop(future);

        assert_eq!(exporter.get_finished_spans().unwrap().len(), 1);
    }
}
