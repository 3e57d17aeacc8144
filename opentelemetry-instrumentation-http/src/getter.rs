use std::borrow::Cow;
use std::error::Error;

/// Accessors shared by HTTP client and server instrumentations.
///
/// Every accessor is side-effect-free and tolerant of partial information:
/// a library that cannot produce a value returns `None` (or an empty vec
/// for headers), and the extractors simply omit the attribute.
pub trait HttpCommonAttributesGetter<REQUEST, RESPONSE>: Send + Sync {
    /// The HTTP request method, exactly as sent on the wire.
    fn http_request_method<'a>(&self, request: &'a REQUEST) -> Option<Cow<'a, str>>;

    /// All values of the request header `name` (lowercase), in send order.
    fn http_request_header(&self, _request: &REQUEST, _name: &str) -> Vec<String> {
        Vec::new()
    }

    /// The response status code, if the response carries one.
    fn http_response_status_code(&self, request: &REQUEST, response: &RESPONSE) -> Option<u16>;

    /// All values of the response header `name` (lowercase), in send order.
    fn http_response_header(
        &self,
        _request: &REQUEST,
        _response: &RESPONSE,
        _name: &str,
    ) -> Vec<String> {
        Vec::new()
    }

    /// OSI application-layer protocol name, e.g. `http` or `spdy`.
    fn network_protocol_name<'a>(
        &self,
        _request: &'a REQUEST,
        _response: Option<&'a RESPONSE>,
    ) -> Option<Cow<'a, str>> {
        None
    }

    /// Protocol version, e.g. `1.1` or `2`.
    fn network_protocol_version<'a>(
        &self,
        _request: &'a REQUEST,
        _response: Option<&'a RESPONSE>,
    ) -> Option<Cow<'a, str>> {
        None
    }

    /// Address of the immediate network peer, from the socket if available.
    fn network_peer_address<'a>(
        &self,
        _request: &'a REQUEST,
        _response: Option<&'a RESPONSE>,
    ) -> Option<Cow<'a, str>> {
        None
    }

    /// Port of the immediate network peer.
    fn network_peer_port(&self, _request: &REQUEST, _response: Option<&RESPONSE>) -> Option<u16> {
        None
    }

    /// A low-cardinality class for `error`, when the instrumentation can
    /// name one. Falls back to `_OTHER` when `None`.
    fn error_type(
        &self,
        _request: &REQUEST,
        _response: Option<&RESPONSE>,
        _error: &dyn Error,
    ) -> Option<Cow<'static, str>> {
        None
    }
}

/// Accessors specific to HTTP client (outgoing request) instrumentations.
pub trait HttpClientAttributesGetter<REQUEST, RESPONSE>:
    HttpCommonAttributesGetter<REQUEST, RESPONSE>
{
    /// The absolute request URL. Credentials embedded in the authority are
    /// stripped by the extractor before the value is recorded.
    fn url_full<'a>(&self, request: &'a REQUEST) -> Option<Cow<'a, str>>;

    /// Logical server host name or address, usually taken from the URL.
    fn server_address<'a>(&self, _request: &'a REQUEST) -> Option<Cow<'a, str>> {
        None
    }

    /// Logical server port. Scheme-default ports (http/80, https/443) are
    /// omitted from the recorded attributes.
    fn server_port(&self, _request: &REQUEST) -> Option<u16> {
        None
    }
}

/// Accessors specific to HTTP server (incoming request) instrumentations.
pub trait HttpServerAttributesGetter<REQUEST, RESPONSE>:
    HttpCommonAttributesGetter<REQUEST, RESPONSE>
{
    /// The URI scheme of the request (`http`, `https`).
    fn url_scheme<'a>(&self, request: &'a REQUEST) -> Option<Cow<'a, str>>;

    /// The request path component.
    fn url_path<'a>(&self, request: &'a REQUEST) -> Option<Cow<'a, str>>;

    /// The request query string, without the leading `?`.
    fn url_query<'a>(&self, _request: &'a REQUEST) -> Option<Cow<'a, str>> {
        None
    }

    /// The matched route template, when the framework knows it at request
    /// time. Most frameworks only resolve the route later; those report it
    /// through [`HttpServerRoute`](crate::HttpServerRoute) instead.
    fn http_route<'a>(&self, _request: &'a REQUEST) -> Option<Cow<'a, str>> {
        None
    }

    /// Address of the original client, honoring forwarding headers when the
    /// instrumentation resolves them.
    fn client_address<'a>(&self, _request: &'a REQUEST) -> Option<Cow<'a, str>> {
        None
    }

    /// The local server host name the request was addressed to.
    fn server_address<'a>(&self, _request: &'a REQUEST) -> Option<Cow<'a, str>> {
        None
    }

    /// The local server port the request was addressed to.
    fn server_port(&self, _request: &REQUEST) -> Option<u16> {
        None
    }
}
