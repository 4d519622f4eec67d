use crate::adapters::http::{read_json, with_correlation, with_key};
use crate::config::ServiceEndpoint;
use crate::core::correlation::CorrelationId;
use crate::domain::model::{CategorySeverity, GroundednessRequest, GroundednessResult, TextModeration};
use crate::utils::error::{DemoError, Result};
use reqwest::Client;
use serde_json::{json, Value};

const SERVICE: &str = "content_safety";
const ANALYZE_API_VERSION: &str = "2023-10-01";
const GROUNDEDNESS_API_VERSION: &str = "2024-09-15-preview";
pub const DEFAULT_CATEGORIES: [&str; 4] = ["Hate", "SelfHarm", "Sexual", "Violence"];

#[derive(Debug, Clone)]
pub struct ContentSafetyClient {
    http: Client,
    endpoint: ServiceEndpoint,
    block_threshold: u8,
}

impl ContentSafetyClient {
    pub fn new(http: Client, endpoint: ServiceEndpoint, block_threshold: u8) -> Self {
        Self {
            http,
            endpoint,
            block_threshold,
        }
    }

    /// 文字內容審核，任一類別嚴重度達門檻即視為封鎖
    pub async fn analyze_text(
        &self,
        text: &str,
        correlation_id: &CorrelationId,
    ) -> Result<TextModeration> {
        if text.trim().is_empty() {
            return Err(DemoError::bad_request("text must not be empty"));
        }

        let url = format!("{}/contentsafety/text:analyze", self.endpoint.base_url());
        let request = with_correlation(with_key(self.http.post(url), &self.endpoint), correlation_id)
            .query(&[("api-version", ANALYZE_API_VERSION)])
            .json(&json!({
                "text": text,
                "categories": DEFAULT_CATEGORIES,
                "outputType": "FourSeverityLevels",
            }));

        let body = read_json(SERVICE, request.send().await?).await?;
        let moderation = moderation_from(&body, self.block_threshold);
        if moderation.blocked {
            tracing::warn!(
                "🚫 Text blocked with severity {} [{}]",
                moderation.max_severity,
                correlation_id
            );
        }
        Ok(moderation)
    }

    pub async fn detect_groundedness(
        &self,
        input: &GroundednessRequest,
        correlation_id: &CorrelationId,
    ) -> Result<GroundednessResult> {
        if input.text.trim().is_empty() {
            return Err(DemoError::bad_request("text must not be empty"));
        }
        if input.grounding_sources.iter().all(|s| s.trim().is_empty()) {
            return Err(DemoError::bad_request(
                "at least one grounding source is required",
            ));
        }

        let url = format!(
            "{}/contentsafety/text:detectGroundedness",
            self.endpoint.base_url()
        );
        let request = with_correlation(with_key(self.http.post(url), &self.endpoint), correlation_id)
            .query(&[("api-version", GROUNDEDNESS_API_VERSION)])
            .json(&groundedness_body(input));

        let body = read_json(SERVICE, request.send().await?).await?;
        Ok(groundedness_from(&body))
    }
}

pub fn moderation_from(body: &Value, block_threshold: u8) -> TextModeration {
    let categories: Vec<CategorySeverity> = body
        .get("categoriesAnalysis")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .map(|c| CategorySeverity {
            category: c
                .get("category")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            severity: c
                .get("severity")
                .and_then(Value::as_u64)
                .unwrap_or(0)
                .min(u8::MAX as u64) as u8,
        })
        .collect();

    let max_severity = categories.iter().map(|c| c.severity).max().unwrap_or(0);
    TextModeration {
        blocked: max_severity >= block_threshold,
        categories,
        max_severity,
    }
}

/// 有 query 時以 QnA 任務送出，否則為摘要任務
pub fn groundedness_body(input: &GroundednessRequest) -> Value {
    let mut body = json!({
        "domain": "Generic",
        "text": input.text,
        "groundingSources": input.grounding_sources,
        "reasoning": false,
    });
    match input.query.as_deref().filter(|q| !q.trim().is_empty()) {
        Some(query) => {
            body["task"] = json!("QnA");
            body["qna"] = json!({ "query": query });
        }
        None => body["task"] = json!("Summarization"),
    }
    body
}

pub fn groundedness_from(body: &Value) -> GroundednessResult {
    GroundednessResult {
        ungrounded_detected: body
            .get("ungroundedDetected")
            .and_then(Value::as_bool)
            .unwrap_or(false),
        ungrounded_percentage: body
            .get("ungroundedPercentage")
            .and_then(Value::as_f64)
            .unwrap_or(0.0),
        details: body
            .get("ungroundedDetails")
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
            .filter_map(|d| d.get("text").and_then(Value::as_str))
            .map(str::to_string)
            .collect(),
    }
}
