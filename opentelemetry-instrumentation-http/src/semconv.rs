//! Schema-mode selection plus the old HTTP semantic-convention keys that the
//! semantic-conventions registry no longer carries.

use std::env;

/// Which HTTP semantic-convention schema(s) the extractors and metrics
/// listeners emit.
///
/// Decided once when an instrumenter is built, typically from the
/// `OTEL_SEMCONV_STABILITY_OPT_IN` environment variable, and injected into
/// every component; the mode is immutable afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HttpSemconvStability {
    /// Emit only the stable HTTP semantic conventions.
    Stable,
    /// Emit only the old (pre-stabilization) HTTP semantic conventions.
    /// This is the default during the migration period.
    #[default]
    Old,
    /// Emit both schemas side by side.
    Both,
}

impl HttpSemconvStability {
    /// Reads the schema mode from `OTEL_SEMCONV_STABILITY_OPT_IN`.
    ///
    /// The variable holds a comma-separated list of opt-in tokens;
    /// `http/dup` selects both schemas and wins over `http`, which selects
    /// the stable schema only. Anything else keeps the old schema.
    pub fn from_env() -> Self {
        match env::var("OTEL_SEMCONV_STABILITY_OPT_IN") {
            Ok(value) => {
                let mut stable = false;
                for token in value.split(',') {
                    match token.trim() {
                        "http/dup" => return HttpSemconvStability::Both,
                        "http" => stable = true,
                        _ => {}
                    }
                }
                if stable {
                    HttpSemconvStability::Stable
                } else {
                    HttpSemconvStability::Old
                }
            }
            Err(_) => HttpSemconvStability::Old,
        }
    }

    pub(crate) fn emit_stable(&self) -> bool {
        matches!(self, HttpSemconvStability::Stable | HttpSemconvStability::Both)
    }

    pub(crate) fn emit_old(&self) -> bool {
        matches!(self, HttpSemconvStability::Old | HttpSemconvStability::Both)
    }
}

// Old-schema attribute keys, kept here because the registry crate dropped
// them when the HTTP conventions stabilized.
pub(crate) const HTTP_METHOD: &str = "http.method";
pub(crate) const HTTP_URL: &str = "http.url";
pub(crate) const HTTP_STATUS_CODE: &str = "http.status_code";
pub(crate) const HTTP_SCHEME: &str = "http.scheme";
pub(crate) const HTTP_TARGET: &str = "http.target";
pub(crate) const HTTP_CLIENT_IP: &str = "http.client_ip";
pub(crate) const HTTP_RESEND_COUNT: &str = "http.resend_count";
pub(crate) const HTTP_REQUEST_CONTENT_LENGTH: &str = "http.request_content_length";
pub(crate) const HTTP_RESPONSE_CONTENT_LENGTH: &str = "http.response_content_length";
pub(crate) const NET_PEER_NAME: &str = "net.peer.name";
pub(crate) const NET_PEER_PORT: &str = "net.peer.port";
pub(crate) const NET_SOCK_PEER_ADDR: &str = "net.sock.peer.addr";
pub(crate) const NET_SOCK_PEER_PORT: &str = "net.sock.peer.port";
pub(crate) const NET_HOST_NAME: &str = "net.host.name";
pub(crate) const NET_HOST_PORT: &str = "net.host.port";
pub(crate) const NET_PROTOCOL_NAME: &str = "net.protocol.name";
pub(crate) const NET_PROTOCOL_VERSION: &str = "net.protocol.version";

// Old-schema metric names.
pub(crate) const HTTP_CLIENT_DURATION: &str = "http.client.duration";
pub(crate) const HTTP_SERVER_DURATION: &str = "http.server.duration";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_var_selects_schema() {
        temp_env::with_var("OTEL_SEMCONV_STABILITY_OPT_IN", None::<&str>, || {
            assert_eq!(HttpSemconvStability::from_env(), HttpSemconvStability::Old);
        });
        temp_env::with_var("OTEL_SEMCONV_STABILITY_OPT_IN", Some("http"), || {
            assert_eq!(
                HttpSemconvStability::from_env(),
                HttpSemconvStability::Stable
            );
        });
        temp_env::with_var("OTEL_SEMCONV_STABILITY_OPT_IN", Some("http/dup"), || {
            assert_eq!(HttpSemconvStability::from_env(), HttpSemconvStability::Both);
        });
        temp_env::with_var(
            "OTEL_SEMCONV_STABILITY_OPT_IN",
            Some("database,http/dup,http"),
            || {
                assert_eq!(HttpSemconvStability::from_env(), HttpSemconvStability::Both);
            },
        );
        temp_env::with_var("OTEL_SEMCONV_STABILITY_OPT_IN", Some("database"), || {
            assert_eq!(HttpSemconvStability::from_env(), HttpSemconvStability::Old);
        });
    }

    #[test]
    fn both_mode_emits_both_schemas() {
        assert!(HttpSemconvStability::Both.emit_stable());
        assert!(HttpSemconvStability::Both.emit_old());
        assert!(!HttpSemconvStability::Stable.emit_old());
        assert!(!HttpSemconvStability::Old.emit_stable());
    }
}
