//! Per-instrument attribute allow-lists.
//!
//! Metric instruments must only be fed the low-cardinality subset of the
//! span attributes; high-cardinality values such as `url.full` or captured
//! headers would explode aggregation state. Each instrument carries a
//! static allow-list and the listeners filter the merged attribute set
//! through it before recording.

use opentelemetry::KeyValue;
use opentelemetry_semantic_conventions::attribute;

use crate::semconv;

pub(crate) const STABLE_CLIENT_DURATION: &[&str] = &[
    attribute::HTTP_REQUEST_METHOD,
    attribute::HTTP_RESPONSE_STATUS_CODE,
    attribute::ERROR_TYPE,
    attribute::NETWORK_PROTOCOL_NAME,
    attribute::NETWORK_PROTOCOL_VERSION,
    attribute::SERVER_ADDRESS,
    attribute::SERVER_PORT,
];

pub(crate) const OLD_CLIENT_DURATION: &[&str] = &[
    semconv::HTTP_METHOD,
    semconv::HTTP_STATUS_CODE,
    semconv::NET_PEER_NAME,
    semconv::NET_PEER_PORT,
    semconv::NET_PROTOCOL_NAME,
    semconv::NET_PROTOCOL_VERSION,
    semconv::NET_SOCK_PEER_ADDR,
];

pub(crate) const STABLE_SERVER_DURATION: &[&str] = &[
    attribute::HTTP_ROUTE,
    attribute::HTTP_REQUEST_METHOD,
    attribute::HTTP_RESPONSE_STATUS_CODE,
    attribute::ERROR_TYPE,
    attribute::NETWORK_PROTOCOL_NAME,
    attribute::NETWORK_PROTOCOL_VERSION,
    attribute::URL_SCHEME,
];

pub(crate) const OLD_SERVER_DURATION: &[&str] = &[
    semconv::HTTP_SCHEME,
    attribute::HTTP_ROUTE,
    semconv::HTTP_METHOD,
    semconv::HTTP_STATUS_CODE,
    semconv::NET_HOST_NAME,
    semconv::NET_HOST_PORT,
    semconv::NET_PROTOCOL_NAME,
    semconv::NET_PROTOCOL_VERSION,
];

// Both schema variants of the active-requests attributes feed the same
// instrument, so the allow-list covers both key sets.
pub(crate) const SERVER_ACTIVE_REQUESTS: &[&str] = &[
    semconv::HTTP_METHOD,
    semconv::HTTP_SCHEME,
    semconv::NET_HOST_NAME,
    semconv::NET_HOST_PORT,
    attribute::HTTP_REQUEST_METHOD,
    attribute::URL_SCHEME,
];

pub(crate) const CLIENT_BODY_SIZE: &[&str] = &[
    attribute::HTTP_REQUEST_METHOD,
    attribute::HTTP_RESPONSE_STATUS_CODE,
    attribute::ERROR_TYPE,
    attribute::NETWORK_PROTOCOL_NAME,
    attribute::NETWORK_PROTOCOL_VERSION,
    attribute::SERVER_ADDRESS,
    attribute::SERVER_PORT,
];

pub(crate) const SERVER_BODY_SIZE: &[&str] = &[
    attribute::HTTP_ROUTE,
    attribute::HTTP_REQUEST_METHOD,
    attribute::HTTP_RESPONSE_STATUS_CODE,
    attribute::ERROR_TYPE,
    attribute::NETWORK_PROTOCOL_NAME,
    attribute::NETWORK_PROTOCOL_VERSION,
    attribute::URL_SCHEME,
];

pub(crate) fn filter_attributes(attributes: &[KeyValue], allowed: &[&str]) -> Vec<KeyValue> {
    attributes
        .iter()
        .filter(|kv| allowed.contains(&kv.key.as_str()))
        .cloned()
        .collect()
}

/// Merges end attributes over start attributes; end values win on key
/// collision.
pub(crate) fn merge_attributes(start: &[KeyValue], end: &[KeyValue]) -> Vec<KeyValue> {
    let mut merged: Vec<KeyValue> = start
        .iter()
        .filter(|kv| !end.iter().any(|e| e.key == kv.key))
        .cloned()
        .collect();
    merged.extend_from_slice(end);
    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn high_cardinality_attributes_are_filtered_out() {
        let attributes = vec![
            KeyValue::new(attribute::HTTP_REQUEST_METHOD, "GET"),
            KeyValue::new(attribute::URL_FULL, "https://example.com/a/b/c?q=1"),
            KeyValue::new("http.request.header.accept", "application/json"),
            KeyValue::new(attribute::HTTP_RESPONSE_STATUS_CODE, 200_i64),
        ];
        let filtered = filter_attributes(&attributes, STABLE_CLIENT_DURATION);
        assert_eq!(filtered.len(), 2);
        assert!(filtered.iter().all(|kv| {
            kv.key.as_str() == attribute::HTTP_REQUEST_METHOD
                || kv.key.as_str() == attribute::HTTP_RESPONSE_STATUS_CODE
        }));
    }

    #[test]
    fn end_attributes_win_on_merge() {
        let start = vec![
            KeyValue::new("http.request.method", "GET"),
            KeyValue::new("url.scheme", "http"),
        ];
        let end = vec![
            KeyValue::new("url.scheme", "https"),
            KeyValue::new("http.response.status_code", 200_i64),
        ];
        let merged = merge_attributes(&start, &end);
        assert_eq!(merged.len(), 3);
        let scheme = merged
            .iter()
            .find(|kv| kv.key.as_str() == "url.scheme")
            .unwrap();
        assert_eq!(scheme.value.as_str(), "https");
    }
}
