use std::borrow::Cow;
use std::fmt;
use std::marker::PhantomData;

use opentelemetry_instrumentation::SpanNameExtractor;

use crate::common::KNOWN_METHODS;
use crate::getter::{HttpClientAttributesGetter, HttpServerAttributesGetter};

fn known_method<'a>(known: &[Cow<'static, str>], method: Option<Cow<'a, str>>) -> Option<Cow<'a, str>> {
    method.filter(|m| known.iter().any(|k| k == m))
}

/// Names HTTP client spans `{method}`, or `HTTP` when the method is absent
/// or outside the known set; full URLs never appear in span names because
/// their cardinality is unbounded.
pub struct HttpClientSpanNameExtractor<REQUEST, RESPONSE, G> {
    getter: G,
    known_methods: Vec<Cow<'static, str>>,
    _phantom: PhantomData<fn(REQUEST, RESPONSE)>,
}

impl<REQUEST, RESPONSE, G> fmt::Debug for HttpClientSpanNameExtractor<REQUEST, RESPONSE, G> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpClientSpanNameExtractor").finish()
    }
}

impl<REQUEST, RESPONSE, G> HttpClientSpanNameExtractor<REQUEST, RESPONSE, G>
where
    G: HttpClientAttributesGetter<REQUEST, RESPONSE>,
{
    /// Wraps `getter` with the default known-methods set.
    pub fn new(getter: G) -> Self {
        HttpClientSpanNameExtractor {
            getter,
            known_methods: KNOWN_METHODS.iter().map(|m| Cow::Borrowed(*m)).collect(),
            _phantom: PhantomData,
        }
    }

    /// Replaces the set of methods that may appear verbatim in span names.
    pub fn with_known_methods(
        mut self,
        methods: impl IntoIterator<Item = impl Into<Cow<'static, str>>>,
    ) -> Self {
        self.known_methods = methods.into_iter().map(Into::into).collect();
        self
    }
}

impl<REQUEST, RESPONSE, G> SpanNameExtractor<REQUEST>
    for HttpClientSpanNameExtractor<REQUEST, RESPONSE, G>
where
    REQUEST: Send + Sync,
    RESPONSE: Send + Sync,
    G: HttpClientAttributesGetter<REQUEST, RESPONSE>,
{
    fn extract(&self, request: &REQUEST) -> Cow<'static, str> {
        match known_method(&self.known_methods, self.getter.http_request_method(request)) {
            Some(method) => Cow::Owned(method.into_owned()),
            None => Cow::Borrowed("HTTP"),
        }
    }
}

/// Names HTTP server spans `{method} {route}` when the framework already
/// knows the route at request time, `{method}` otherwise. Routes resolved
/// later rename the span through
/// [`HttpServerRoute`](crate::HttpServerRoute).
pub struct HttpServerSpanNameExtractor<REQUEST, RESPONSE, G> {
    getter: G,
    known_methods: Vec<Cow<'static, str>>,
    _phantom: PhantomData<fn(REQUEST, RESPONSE)>,
}

impl<REQUEST, RESPONSE, G> fmt::Debug for HttpServerSpanNameExtractor<REQUEST, RESPONSE, G> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpServerSpanNameExtractor").finish()
    }
}

impl<REQUEST, RESPONSE, G> HttpServerSpanNameExtractor<REQUEST, RESPONSE, G>
where
    G: HttpServerAttributesGetter<REQUEST, RESPONSE>,
{
    /// Wraps `getter` with the default known-methods set.
    pub fn new(getter: G) -> Self {
        HttpServerSpanNameExtractor {
            getter,
            known_methods: KNOWN_METHODS.iter().map(|m| Cow::Borrowed(*m)).collect(),
            _phantom: PhantomData,
        }
    }

    /// Replaces the set of methods that may appear verbatim in span names.
    pub fn with_known_methods(
        mut self,
        methods: impl IntoIterator<Item = impl Into<Cow<'static, str>>>,
    ) -> Self {
        self.known_methods = methods.into_iter().map(Into::into).collect();
        self
    }
}

impl<REQUEST, RESPONSE, G> SpanNameExtractor<REQUEST>
    for HttpServerSpanNameExtractor<REQUEST, RESPONSE, G>
where
    REQUEST: Send + Sync,
    RESPONSE: Send + Sync,
    G: HttpServerAttributesGetter<REQUEST, RESPONSE>,
{
    fn extract(&self, request: &REQUEST) -> Cow<'static, str> {
        let method = known_method(&self.known_methods, self.getter.http_request_method(request))
            .map(Cow::into_owned)
            .unwrap_or_else(|| "HTTP".to_owned());
        match self.getter.http_route(request) {
            Some(route) => Cow::Owned(format!("{method} {route}")),
            None => Cow::Owned(method),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::borrow::Cow;

    struct Fake {
        method: Option<&'static str>,
        route: Option<&'static str>,
    }

    struct Getter;

    impl crate::HttpCommonAttributesGetter<Fake, ()> for Getter {
        fn http_request_method<'a>(&self, request: &'a Fake) -> Option<Cow<'a, str>> {
            request.method.map(Cow::Borrowed)
        }

        fn http_response_status_code(&self, _request: &Fake, _response: &()) -> Option<u16> {
            None
        }
    }

    impl crate::HttpClientAttributesGetter<Fake, ()> for Getter {
        fn url_full<'a>(&self, _request: &'a Fake) -> Option<Cow<'a, str>> {
            None
        }
    }

    impl crate::HttpServerAttributesGetter<Fake, ()> for Getter {
        fn url_scheme<'a>(&self, _request: &'a Fake) -> Option<Cow<'a, str>> {
            None
        }

        fn url_path<'a>(&self, _request: &'a Fake) -> Option<Cow<'a, str>> {
            None
        }

        fn http_route<'a>(&self, request: &'a Fake) -> Option<Cow<'a, str>> {
            request.route.map(Cow::Borrowed)
        }
    }

    #[test]
    fn client_name_is_the_method() {
        let extractor = HttpClientSpanNameExtractor::new(Getter);
        let name = SpanNameExtractor::<Fake>::extract(
            &extractor,
            &Fake {
                method: Some("GET"),
                route: None,
            },
        );
        assert_eq!(name, "GET");
    }

    #[test]
    fn unknown_or_missing_method_falls_back_to_http() {
        let extractor = HttpClientSpanNameExtractor::new(Getter);
        assert_eq!(
            extractor.extract(&Fake {
                method: Some("SPLICE"),
                route: None
            }),
            "HTTP"
        );
        assert_eq!(
            extractor.extract(&Fake {
                method: None,
                route: None
            }),
            "HTTP"
        );
    }

    #[test]
    fn server_name_includes_the_route_when_known() {
        let extractor = HttpServerSpanNameExtractor::new(Getter);
        assert_eq!(
            extractor.extract(&Fake {
                method: Some("GET"),
                route: Some("/users/{id}")
            }),
            "GET /users/{id}"
        );
        assert_eq!(
            extractor.extract(&Fake {
                method: Some("GET"),
                route: None
            }),
            "GET"
        );
    }
}
