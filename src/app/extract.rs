use crate::core::correlation::CorrelationId;
use crate::utils::error::{ApiError, DemoError};
use axum::extract::{FromRequest, Request};
use std::fmt;

/// Runs the inner extractor and reports its rejection as a JSON
/// `BadRequest` carrying the request's correlation id.
#[derive(Debug)]
pub struct Payload<E>(pub E);

impl<S, E> FromRequest<S> for Payload<E>
where
    S: Send + Sync,
    E: FromRequest<S>,
    E::Rejection: fmt::Display,
{
    type Rejection = ApiError;

    async fn from_request(request: Request, state: &S) -> Result<Self, Self::Rejection> {
        let correlation_id = request
            .extensions()
            .get::<CorrelationId>()
            .cloned()
            .unwrap_or_else(CorrelationId::generate);

        E::from_request(request, state)
            .await
            .map(Payload)
            .map_err(|rejection| {
                DemoError::bad_request(rejection.to_string()).with_correlation(&correlation_id)
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::correlation::correlation_layer;
    use axum::body::Bytes;
    use axum::http::{HeaderName, HeaderValue, StatusCode};
    use axum::{middleware, routing::post, Json, Router};
    use axum_test::TestServer;
    use serde::Deserialize;
    use serde_json::Value;

    #[derive(Deserialize)]
    struct Greeting {
        name: String,
    }

    async fn greet(Payload(Json(greeting)): Payload<Json<Greeting>>) -> String {
        format!("hello {}", greeting.name)
    }

    fn app() -> Router {
        Router::new()
            .route("/greet", post(greet))
            .layer(middleware::from_fn(correlation_layer))
    }

    #[tokio::test]
    async fn test_valid_body_passes_through() {
        let server = TestServer::new(app()).unwrap();
        let response = server
            .post("/greet")
            .json(&serde_json::json!({"name": "Woodgrove"}))
            .await;
        response.assert_status_ok();
        assert_eq!(response.text(), "hello Woodgrove");
    }

    #[tokio::test]
    async fn test_malformed_json_is_bad_request_with_correlation_id() {
        let server = TestServer::new(app()).unwrap();
        let response = server
            .post("/greet")
            .add_header(
                HeaderName::from_static("x-correlation-id"),
                HeaderValue::from_static("00112233aabbccdd"),
            )
            .bytes(Bytes::from_static(b"{not json"))
            .content_type("application/json")
            .await;

        response.assert_status(StatusCode::BAD_REQUEST);
        let body: Value = response.json();
        assert_eq!(body["correlation_id"], "00112233aabbccdd");
        assert!(body["error"].as_str().unwrap().starts_with("Invalid request:"));
    }
}
