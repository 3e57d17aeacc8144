use std::error::Error;
use std::fmt;
use std::marker::PhantomData;

use opentelemetry::trace::Status;
use opentelemetry_instrumentation::SpanStatusExtractor;

use crate::getter::HttpCommonAttributesGetter;

fn http_status<REQUEST, RESPONSE, G>(
    getter: &G,
    request: &REQUEST,
    response: Option<&RESPONSE>,
) -> Option<u16>
where
    G: HttpCommonAttributesGetter<REQUEST, RESPONSE>,
{
    response.and_then(|response| getter.http_response_status_code(request, response))
}

fn status_from(status: Option<u16>, error_threshold: u16, error: Option<&dyn Error>) -> Status {
    match status {
        Some(code) if code >= error_threshold => Status::error(""),
        Some(_) => Status::Unset,
        None => match error {
            Some(error) => Status::error(error.to_string()),
            None => Status::Unset,
        },
    }
}

/// The HTTP client status policy: status codes of 400 and above, or a
/// transport error without a status code, map to an error status; anything
/// else stays unset.
pub struct HttpClientSpanStatusExtractor<REQUEST, RESPONSE, G> {
    getter: G,
    _phantom: PhantomData<fn(REQUEST, RESPONSE)>,
}

impl<REQUEST, RESPONSE, G> fmt::Debug for HttpClientSpanStatusExtractor<REQUEST, RESPONSE, G> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpClientSpanStatusExtractor").finish()
    }
}

impl<REQUEST, RESPONSE, G> HttpClientSpanStatusExtractor<REQUEST, RESPONSE, G>
where
    G: HttpCommonAttributesGetter<REQUEST, RESPONSE>,
{
    /// Wraps `getter`.
    pub fn new(getter: G) -> Self {
        HttpClientSpanStatusExtractor {
            getter,
            _phantom: PhantomData,
        }
    }
}

impl<REQUEST, RESPONSE, G> SpanStatusExtractor<REQUEST, RESPONSE>
    for HttpClientSpanStatusExtractor<REQUEST, RESPONSE, G>
where
    REQUEST: Send + Sync,
    RESPONSE: Send + Sync,
    G: HttpCommonAttributesGetter<REQUEST, RESPONSE>,
{
    fn extract(
        &self,
        request: &REQUEST,
        response: Option<&RESPONSE>,
        error: Option<&dyn Error>,
    ) -> Status {
        status_from(http_status(&self.getter, request, response), 400, error)
    }
}

/// The HTTP server status policy: only 5xx responses, or a transport error
/// without a status code, map to an error status; client errors (4xx) stay
/// unset because they do not indicate a server-side failure.
pub struct HttpServerSpanStatusExtractor<REQUEST, RESPONSE, G> {
    getter: G,
    _phantom: PhantomData<fn(REQUEST, RESPONSE)>,
}

impl<REQUEST, RESPONSE, G> fmt::Debug for HttpServerSpanStatusExtractor<REQUEST, RESPONSE, G> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpServerSpanStatusExtractor").finish()
    }
}

impl<REQUEST, RESPONSE, G> HttpServerSpanStatusExtractor<REQUEST, RESPONSE, G>
where
    G: HttpCommonAttributesGetter<REQUEST, RESPONSE>,
{
    /// Wraps `getter`.
    pub fn new(getter: G) -> Self {
        HttpServerSpanStatusExtractor {
            getter,
            _phantom: PhantomData,
        }
    }
}

impl<REQUEST, RESPONSE, G> SpanStatusExtractor<REQUEST, RESPONSE>
    for HttpServerSpanStatusExtractor<REQUEST, RESPONSE, G>
where
    REQUEST: Send + Sync,
    RESPONSE: Send + Sync,
    G: HttpCommonAttributesGetter<REQUEST, RESPONSE>,
{
    fn extract(
        &self,
        request: &REQUEST,
        response: Option<&RESPONSE>,
        error: Option<&dyn Error>,
    ) -> Status {
        status_from(http_status(&self.getter, request, response), 500, error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[derive(Debug)]
    struct Broken;

    impl fmt::Display for Broken {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("broken")
        }
    }

    impl Error for Broken {}

    #[rstest]
    #[case(Some(200), 400, false)]
    #[case(Some(399), 400, false)]
    #[case(Some(400), 400, true)]
    #[case(Some(500), 400, true)]
    #[case(Some(404), 500, false)]
    #[case(Some(500), 500, true)]
    fn status_codes_classify_by_threshold(
        #[case] status: Option<u16>,
        #[case] threshold: u16,
        #[case] is_error: bool,
    ) {
        let result = status_from(status, threshold, None);
        assert_eq!(matches!(result, Status::Error { .. }), is_error);
    }

    #[test]
    fn transport_error_without_status_is_an_error() {
        let result = status_from(None, 400, Some(&Broken));
        match result {
            Status::Error { description } => assert_eq!(description, "broken"),
            other => panic!("expected error status, got {other:?}"),
        }
    }

    #[test]
    fn no_status_and_no_error_stays_unset() {
        assert_eq!(status_from(None, 400, None), Status::Unset);
    }
}
