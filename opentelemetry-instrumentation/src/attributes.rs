use opentelemetry::{Key, KeyValue, Value};

/// An ordered collection of span attributes written by
/// [`AttributesExtractor`](crate::AttributesExtractor) hooks.
///
/// Multiple extractors run against the same sink for a single operation.
/// The sink applies set-if-absent semantics: the first extractor to write a
/// key wins, and later writes for the same key are ignored. This lets
/// composite extractors layer protocol-independent and library-specific
/// values without coordinating key ownership.
#[derive(Debug, Default)]
pub struct AttributesSink {
    entries: Vec<KeyValue>,
}

impl AttributesSink {
    /// Creates an empty sink.
    pub fn new() -> Self {
        AttributesSink::default()
    }

    /// Records an attribute unless the key was already written.
    pub fn set(&mut self, key: impl Into<Key>, value: impl Into<Value>) {
        let key = key.into();
        if self.entries.iter().any(|kv| kv.key == key) {
            return;
        }
        self.entries.push(KeyValue::new(key, value));
    }

    /// Records an attribute if `value` is present and the key was not
    /// already written. Absent values are not an error, they are simply
    /// omitted.
    pub fn set_opt(&mut self, key: impl Into<Key>, value: Option<impl Into<Value>>) {
        if let Some(value) = value {
            self.set(key, value);
        }
    }

    /// Returns the attributes written so far.
    pub fn as_slice(&self) -> &[KeyValue] {
        &self.entries
    }

    /// Returns `true` if no attribute was written.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Consumes the sink, yielding the attributes in write order.
    pub fn into_attributes(self) -> Vec<KeyValue> {
        self.entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use opentelemetry::Value;

    #[test]
    fn first_write_wins() {
        let mut sink = AttributesSink::new();
        sink.set("http.request.method", "GET");
        sink.set("http.request.method", "POST");
        sink.set("server.port", 8080_i64);

        let attributes = sink.into_attributes();
        assert_eq!(attributes.len(), 2);
        assert_eq!(attributes[0].value, Value::from("GET"));
        assert_eq!(attributes[1].value, Value::from(8080_i64));
    }

    #[test]
    fn absent_values_are_omitted() {
        let mut sink = AttributesSink::new();
        sink.set_opt("url.query", None::<&str>);
        sink.set_opt("url.path", Some("/health"));
        assert_eq!(sink.as_slice().len(), 1);
        assert_eq!(sink.as_slice()[0].key.as_str(), "url.path");
    }
}
