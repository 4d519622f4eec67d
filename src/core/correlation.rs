use axum::{
    extract::{FromRequestParts, Request},
    http::{request::Parts, HeaderValue},
    middleware::Next,
    response::Response,
};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::fmt;
use tracing::Span;

/// Header echoed back to the caller.
pub const RESPONSE_HEADER: &str = "x-correlation-id";
/// Header attached to outbound cloud API calls.
pub const OUTBOUND_HEADER: &str = "x-ms-correlation-id";

const ID_BYTES: usize = 8;

/// Per-request opaque token: 8 random bytes as 16 lowercase hex chars.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrelationId(String);

impl CorrelationId {
    pub fn generate() -> Self {
        let bytes: [u8; ID_BYTES] = rand::random();
        Self(bytes.iter().map(|b| format!("{:02x}", b)).collect())
    }

    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.len() == ID_BYTES * 2 && raw.chars().all(|c| c.is_ascii_hexdigit()) {
            Some(Self(raw.to_ascii_lowercase()))
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl<S: Send + Sync> FromRequestParts<S> for CorrelationId {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts
            .extensions
            .get::<CorrelationId>()
            .cloned()
            .unwrap_or_else(CorrelationId::generate))
    }
}

/// Tags every request with a correlation id and echoes it back.
///
/// Must sit outside the trace layer so [`request_span`] can see the id.
pub async fn correlation_layer(mut request: Request, next: Next) -> Response {
    let correlation_id = request
        .headers()
        .get(RESPONSE_HEADER)
        .and_then(|value| value.to_str().ok())
        .and_then(CorrelationId::parse)
        .unwrap_or_else(CorrelationId::generate);
    request.extensions_mut().insert(correlation_id.clone());

    let mut response = next.run(request).await;

    if let Ok(value) = HeaderValue::from_str(correlation_id.as_str()) {
        response.headers_mut().insert(RESPONSE_HEADER, value);
    }
    response
}

/// Span factory for `TraceLayer::make_span_with`.
pub fn request_span(request: &Request) -> Span {
    let correlation_id = request
        .extensions()
        .get::<CorrelationId>()
        .map(CorrelationId::to_string)
        .unwrap_or_default();
    tracing::info_span!(
        "request",
        method = %request.method(),
        uri = %request.uri().path(),
        correlation_id = %correlation_id,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderName;
    use axum::{middleware, routing::get, Router};
    use axum_test::TestServer;
    use std::collections::HashSet;

    #[test]
    fn test_generate_is_sixteen_hex_chars() {
        let id = CorrelationId::generate();
        assert_eq!(id.as_str().len(), 16);
        assert!(id.as_str().chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(id.as_str(), id.as_str().to_ascii_lowercase());
    }

    #[test]
    fn test_generated_ids_differ() {
        let ids: HashSet<String> = (0..100)
            .map(|_| CorrelationId::generate().to_string())
            .collect();
        assert_eq!(ids.len(), 100);
    }

    #[test]
    fn test_parse() {
        assert_eq!(
            CorrelationId::parse("00AABBCCDDEEFF11").unwrap().as_str(),
            "00aabbccddeeff11"
        );
        assert!(CorrelationId::parse("not-hex-at-all!!").is_none());
        assert!(CorrelationId::parse("abc").is_none());
        assert!(CorrelationId::parse("").is_none());
    }

    async fn echo(correlation_id: CorrelationId) -> String {
        correlation_id.to_string()
    }

    fn app() -> Router {
        Router::new()
            .route("/echo", get(echo))
            .layer(middleware::from_fn(correlation_layer))
    }

    #[tokio::test]
    async fn test_layer_sets_header_matching_extension() {
        let server = TestServer::new(app()).unwrap();

        let response = server.get("/echo").await;
        response.assert_status_ok();
        let header = response.header(HeaderName::from_static(RESPONSE_HEADER));
        let header = header.to_str().unwrap();
        assert_eq!(header.len(), 16);
        assert_eq!(response.text(), header);
    }

    #[tokio::test]
    async fn test_layer_reuses_inbound_id() {
        let server = TestServer::new(app()).unwrap();

        let response = server
            .get("/echo")
            .add_header(
                HeaderName::from_static(RESPONSE_HEADER),
                HeaderValue::from_static("0123456789abcdef"),
            )
            .await;
        assert_eq!(response.text(), "0123456789abcdef");
        assert_eq!(
            response.header(HeaderName::from_static(RESPONSE_HEADER)),
            "0123456789abcdef"
        );
    }

    #[tokio::test]
    async fn test_layer_replaces_malformed_inbound_id() {
        let server = TestServer::new(app()).unwrap();

        let response = server
            .get("/echo")
            .add_header(
                HeaderName::from_static(RESPONSE_HEADER),
                HeaderValue::from_static("<script>"),
            )
            .await;
        assert_ne!(response.text(), "<script>");
        assert_eq!(response.text().len(), 16);
    }

    #[tokio::test]
    async fn test_trace_layer_inside_correlation_layer_sees_id() {
        let app = Router::new()
            .route("/echo", get(echo))
            .layer(tower_http::trace::TraceLayer::new_for_http().make_span_with(request_span))
            .layer(middleware::from_fn(correlation_layer));
        let server = TestServer::new(app).unwrap();

        let response = server
            .get("/echo")
            .add_header(
                HeaderName::from_static(RESPONSE_HEADER),
                HeaderValue::from_static("fedcba9876543210"),
            )
            .await;
        response.assert_status_ok();
        assert_eq!(response.text(), "fedcba9876543210");
    }
}
