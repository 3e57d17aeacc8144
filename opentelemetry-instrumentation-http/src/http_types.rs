//! Getter and carrier implementations for [`http`] crate types.

use std::borrow::Cow;

use opentelemetry::propagation::{Extractor, Injector};

use crate::getter::{
    HttpClientAttributesGetter, HttpCommonAttributesGetter, HttpServerAttributesGetter,
};

/// Helper for injecting the propagation headers into an outgoing
/// [`http::HeaderMap`].
#[derive(Debug)]
pub struct HeaderInjector<'a>(pub &'a mut http::HeaderMap);

impl Injector for HeaderInjector<'_> {
    /// Set a key and value in the HeaderMap. Does nothing if the key or
    /// value are not valid inputs.
    fn set(&mut self, key: &str, value: String) {
        if let Ok(name) = http::header::HeaderName::from_bytes(key.as_bytes()) {
            if let Ok(val) = http::header::HeaderValue::from_str(&value) {
                self.0.insert(name, val);
            }
        }
    }
}

/// Helper for extracting the propagation headers from an incoming
/// [`http::HeaderMap`].
#[derive(Debug)]
pub struct HeaderExtractor<'a>(pub &'a http::HeaderMap);

impl Extractor for HeaderExtractor<'_> {
    /// Get a value for a key from the HeaderMap. If the value is not valid
    /// ASCII, returns None.
    fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(|value| value.to_str().ok())
    }

    /// Collect all the keys from the HeaderMap.
    fn keys(&self) -> Vec<&str> {
        self.0.keys().map(|name| name.as_str()).collect()
    }
}

fn header_values(headers: &http::HeaderMap, name: &str) -> Vec<String> {
    headers
        .get_all(name)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .map(str::to_owned)
        .collect()
}

fn protocol_version(version: http::Version) -> Option<Cow<'static, str>> {
    match version {
        http::Version::HTTP_09 => Some(Cow::Borrowed("0.9")),
        http::Version::HTTP_10 => Some(Cow::Borrowed("1.0")),
        http::Version::HTTP_11 => Some(Cow::Borrowed("1.1")),
        http::Version::HTTP_2 => Some(Cow::Borrowed("2")),
        http::Version::HTTP_3 => Some(Cow::Borrowed("3")),
        _ => None,
    }
}

/// [`HttpClientAttributesGetter`] for [`http::Request`] / [`http::Response`]
/// pairs; the request URI must be absolute for the URL attributes to be
/// complete.
#[derive(Debug, Default, Clone, Copy)]
pub struct HttpClientRequestGetter;

impl<B1, B2> HttpCommonAttributesGetter<http::Request<B1>, http::Response<B2>>
    for HttpClientRequestGetter
where
    B1: Send + Sync,
    B2: Send + Sync,
{
    fn http_request_method<'a>(&self, request: &'a http::Request<B1>) -> Option<Cow<'a, str>> {
        Some(Cow::Borrowed(request.method().as_str()))
    }

    fn http_request_header(&self, request: &http::Request<B1>, name: &str) -> Vec<String> {
        header_values(request.headers(), name)
    }

    fn http_response_status_code(
        &self,
        _request: &http::Request<B1>,
        response: &http::Response<B2>,
    ) -> Option<u16> {
        Some(response.status().as_u16())
    }

    fn http_response_header(
        &self,
        _request: &http::Request<B1>,
        response: &http::Response<B2>,
        name: &str,
    ) -> Vec<String> {
        header_values(response.headers(), name)
    }

    fn network_protocol_name<'a>(
        &self,
        _request: &'a http::Request<B1>,
        _response: Option<&'a http::Response<B2>>,
    ) -> Option<Cow<'a, str>> {
        Some(Cow::Borrowed("http"))
    }

    fn network_protocol_version<'a>(
        &self,
        request: &'a http::Request<B1>,
        response: Option<&'a http::Response<B2>>,
    ) -> Option<Cow<'a, str>> {
        protocol_version(response.map(|r| r.version()).unwrap_or_else(|| request.version()))
    }
}

impl<B1, B2> HttpClientAttributesGetter<http::Request<B1>, http::Response<B2>>
    for HttpClientRequestGetter
where
    B1: Send + Sync,
    B2: Send + Sync,
{
    fn url_full<'a>(&self, request: &'a http::Request<B1>) -> Option<Cow<'a, str>> {
        Some(Cow::Owned(request.uri().to_string()))
    }

    fn server_address<'a>(&self, request: &'a http::Request<B1>) -> Option<Cow<'a, str>> {
        request.uri().host().map(Cow::Borrowed)
    }

    fn server_port(&self, request: &http::Request<B1>) -> Option<u16> {
        request.uri().port_u16()
    }
}

/// [`HttpServerAttributesGetter`] for [`http::Request`] / [`http::Response`]
/// pairs.
#[derive(Debug, Default, Clone, Copy)]
pub struct HttpServerRequestGetter;

impl<B1, B2> HttpCommonAttributesGetter<http::Request<B1>, http::Response<B2>>
    for HttpServerRequestGetter
where
    B1: Send + Sync,
    B2: Send + Sync,
{
    fn http_request_method<'a>(&self, request: &'a http::Request<B1>) -> Option<Cow<'a, str>> {
        Some(Cow::Borrowed(request.method().as_str()))
    }

    fn http_request_header(&self, request: &http::Request<B1>, name: &str) -> Vec<String> {
        header_values(request.headers(), name)
    }

    fn http_response_status_code(
        &self,
        _request: &http::Request<B1>,
        response: &http::Response<B2>,
    ) -> Option<u16> {
        Some(response.status().as_u16())
    }

    fn http_response_header(
        &self,
        _request: &http::Request<B1>,
        response: &http::Response<B2>,
        name: &str,
    ) -> Vec<String> {
        header_values(response.headers(), name)
    }

    fn network_protocol_name<'a>(
        &self,
        _request: &'a http::Request<B1>,
        _response: Option<&'a http::Response<B2>>,
    ) -> Option<Cow<'a, str>> {
        Some(Cow::Borrowed("http"))
    }

    fn network_protocol_version<'a>(
        &self,
        request: &'a http::Request<B1>,
        _response: Option<&'a http::Response<B2>>,
    ) -> Option<Cow<'a, str>> {
        protocol_version(request.version())
    }
}

impl<B1, B2> HttpServerAttributesGetter<http::Request<B1>, http::Response<B2>>
    for HttpServerRequestGetter
where
    B1: Send + Sync,
    B2: Send + Sync,
{
    fn url_scheme<'a>(&self, request: &'a http::Request<B1>) -> Option<Cow<'a, str>> {
        request.uri().scheme_str().map(Cow::Borrowed)
    }

    fn url_path<'a>(&self, request: &'a http::Request<B1>) -> Option<Cow<'a, str>> {
        Some(Cow::Borrowed(request.uri().path()))
    }

    fn url_query<'a>(&self, request: &'a http::Request<B1>) -> Option<Cow<'a, str>> {
        request.uri().query().map(Cow::Borrowed)
    }

    fn server_address<'a>(&self, request: &'a http::Request<B1>) -> Option<Cow<'a, str>> {
        match request.uri().host() {
            Some(host) => Some(Cow::Borrowed(host)),
            None => header_values(request.headers(), "host")
                .into_iter()
                .next()
                .map(|host| {
                    Cow::Owned(match host.split_once(':') {
                        Some((name, _port)) => name.to_owned(),
                        None => host,
                    })
                }),
        }
    }

    fn server_port(&self, request: &http::Request<B1>) -> Option<u16> {
        request.uri().port_u16().or_else(|| {
            header_values(request.headers(), "host")
                .into_iter()
                .next()
                .and_then(|host| {
                    host.split_once(':')
                        .and_then(|(_, port)| port.parse().ok())
                })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_getter_reads_the_request_line() {
        let request = http::Request::builder()
            .method("POST")
            .uri("https://example.com:8443/orders?verbose=1")
            .body(())
            .unwrap();
        let getter = HttpClientRequestGetter;
        assert_eq!(
            HttpCommonAttributesGetter::<_, http::Response<()>>::http_request_method(
                &getter, &request
            )
            .as_deref(),
            Some("POST")
        );
        assert_eq!(
            HttpClientAttributesGetter::<_, http::Response<()>>::url_full(&getter, &request)
                .as_deref(),
            Some("https://example.com:8443/orders?verbose=1")
        );
        assert_eq!(
            HttpClientAttributesGetter::<_, http::Response<()>>::server_address(
                &getter, &request
            )
            .as_deref(),
            Some("example.com")
        );
        assert_eq!(
            HttpClientAttributesGetter::<_, http::Response<()>>::server_port(&getter, &request),
            Some(8443)
        );
    }

    #[test]
    fn server_getter_falls_back_to_the_host_header() {
        let request = http::Request::builder()
            .method("GET")
            .uri("/health")
            .header("host", "internal:9090")
            .body(())
            .unwrap();
        let getter = HttpServerRequestGetter;
        assert_eq!(
            HttpServerAttributesGetter::<_, http::Response<()>>::server_address(
                &getter, &request
            )
            .as_deref(),
            Some("internal")
        );
        assert_eq!(
            HttpServerAttributesGetter::<_, http::Response<()>>::server_port(&getter, &request),
            Some(9090)
        );
    }

    #[test]
    fn host_header_without_a_port_yields_no_server_port() {
        let request = http::Request::builder()
            .method("GET")
            .uri("/health")
            .header("host", "internal")
            .body(())
            .unwrap();
        let getter = HttpServerRequestGetter;
        assert_eq!(
            HttpServerAttributesGetter::<_, http::Response<()>>::server_address(
                &getter, &request
            )
            .as_deref(),
            Some("internal")
        );
        assert_eq!(
            HttpServerAttributesGetter::<_, http::Response<()>>::server_port(&getter, &request),
            None
        );
    }

    #[test]
    fn multi_valued_headers_are_collected_in_order() {
        let request = http::Request::builder()
            .uri("/")
            .header("accept", "text/html")
            .header("accept", "application/json")
            .body(())
            .unwrap();
        let getter = HttpServerRequestGetter;
        assert_eq!(
            HttpCommonAttributesGetter::<_, http::Response<()>>::http_request_header(
                &getter, &request, "accept"
            ),
            vec!["text/html".to_owned(), "application/json".to_owned()]
        );
    }
}
