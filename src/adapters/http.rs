use crate::config::ServiceEndpoint;
use crate::core::correlation::{CorrelationId, OUTBOUND_HEADER};
use crate::domain::model::MediaSource;
use crate::utils::error::{DemoError, Result};
use reqwest::{Client, RequestBuilder, Response};
use serde_json::{json, Value};
use std::time::Duration;

const MAX_ERROR_BODY: usize = 500;

pub fn build_client(timeout: Duration) -> Result<Client> {
    Client::builder()
        .timeout(timeout)
        .user_agent(concat!("cloud-ai-demos/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(DemoError::from)
}

pub fn with_correlation(builder: RequestBuilder, correlation_id: &CorrelationId) -> RequestBuilder {
    builder.header(OUTBOUND_HEADER, correlation_id.as_str())
}

/// Adds the service key under the endpoint's auth header.
pub fn with_key(builder: RequestBuilder, endpoint: &ServiceEndpoint) -> RequestBuilder {
    builder.header(endpoint.auth_header.as_str(), endpoint.key.as_str())
}

/// URL 以 JSON `{"url": ...}` 送出，上傳內容以原始位元組送出
pub fn with_media(builder: RequestBuilder, source: &MediaSource, url_field: &str) -> RequestBuilder {
    match source {
        MediaSource::Url(url) => builder.json(&json!({ url_field: url })),
        MediaSource::Upload {
            content_type,
            bytes,
        } => builder
            .header(reqwest::header::CONTENT_TYPE, content_type.as_str())
            .body(bytes.clone()),
    }
}

/// Passes 2xx responses through and turns anything else into an upstream error.
pub async fn check_status(service: &str, response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = extract_error_message(&body).unwrap_or_else(|| {
        if body.trim().is_empty() {
            status
                .canonical_reason()
                .unwrap_or("unknown error")
                .to_string()
        } else {
            truncate(body.trim(), MAX_ERROR_BODY)
        }
    });

    tracing::debug!("{} responded {}: {}", service, status, message);
    Err(DemoError::UpstreamError {
        service: service.to_string(),
        status: status.as_u16(),
        message,
    })
}

pub async fn read_json(service: &str, response: Response) -> Result<Value> {
    let response = check_status(service, response).await?;
    Ok(response.json::<Value>().await?)
}

/// Cloud APIs report errors as `{"error": {"message": ...}}` or `{"message": ...}`.
pub fn extract_error_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    value
        .pointer("/error/message")
        .or_else(|| value.get("message"))
        .or_else(|| value.get("error").filter(|e| e.is_string()))
        .and_then(Value::as_str)
        .map(str::to_string)
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let mut out: String = text.chars().take(max_chars).collect();
        out.push('…');
        out
    }
}
