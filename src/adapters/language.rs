use crate::adapters::http::{read_json, with_correlation, with_key};
use crate::config::ServiceEndpoint;
use crate::core::correlation::CorrelationId;
use crate::domain::model::{DetectedLanguage, SentimentScores, TextInsights};
use crate::utils::error::{DemoError, Result};
use reqwest::Client;
use serde_json::{json, Value};

const SERVICE: &str = "language";
const API_VERSION: &str = "2023-04-01";

/// Text analytics: language detection, sentiment and key phrases.
#[derive(Debug, Clone)]
pub struct LanguageClient {
    http: Client,
    endpoint: ServiceEndpoint,
}

impl LanguageClient {
    pub fn new(http: Client, endpoint: ServiceEndpoint) -> Self {
        Self { http, endpoint }
    }

    pub async fn analyze(&self, text: &str, correlation_id: &CorrelationId) -> Result<TextInsights> {
        if text.trim().is_empty() {
            return Err(DemoError::bad_request("text must not be empty"));
        }

        let language = self.detect_language(text, correlation_id).await?;
        let hint = Some(language.iso_code.as_str()).filter(|code| !code.is_empty());

        let (sentiment_doc, phrases_doc) = tokio::try_join!(
            self.run_task("SentimentAnalysis", text, hint, correlation_id),
            self.run_task("KeyPhraseExtraction", text, hint, correlation_id),
        )?;

        let scores = sentiment_doc
            .get("confidenceScores")
            .cloned()
            .unwrap_or(Value::Null);

        Ok(TextInsights {
            language,
            sentiment: sentiment_doc
                .get("sentiment")
                .and_then(Value::as_str)
                .unwrap_or("unknown")
                .to_string(),
            scores: SentimentScores {
                positive: scores.get("positive").and_then(Value::as_f64).unwrap_or(0.0),
                neutral: scores.get("neutral").and_then(Value::as_f64).unwrap_or(0.0),
                negative: scores.get("negative").and_then(Value::as_f64).unwrap_or(0.0),
            },
            key_phrases: phrases_doc
                .get("keyPhrases")
                .and_then(Value::as_array)
                .into_iter()
                .flatten()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect(),
        })
    }

    pub async fn detect_language(
        &self,
        text: &str,
        correlation_id: &CorrelationId,
    ) -> Result<DetectedLanguage> {
        let document = self
            .run_task("LanguageDetection", text, None, correlation_id)
            .await?;
        let detected = document.get("detectedLanguage").cloned().unwrap_or(Value::Null);

        Ok(DetectedLanguage {
            name: detected
                .get("name")
                .and_then(Value::as_str)
                .unwrap_or("Unknown")
                .to_string(),
            iso_code: detected
                .get("iso6391Name")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            confidence: detected
                .get("confidenceScore")
                .and_then(Value::as_f64)
                .unwrap_or(0.0),
        })
    }

    /// 送出單一文件的分析任務並回傳該文件的結果
    async fn run_task(
        &self,
        kind: &str,
        text: &str,
        language: Option<&str>,
        correlation_id: &CorrelationId,
    ) -> Result<Value> {
        let mut document = json!({ "id": "1", "text": text });
        if let Some(language) = language {
            document["language"] = json!(language);
        }

        let url = format!("{}/language/:analyze-text", self.endpoint.base_url());
        let request = with_correlation(with_key(self.http.post(url), &self.endpoint), correlation_id)
            .query(&[("api-version", API_VERSION)])
            .json(&json!({
                "kind": kind,
                "analysisInput": { "documents": [document] },
            }));

        let body = read_json(SERVICE, request.send().await?).await?;
        first_document(kind, &body)
    }
}

pub fn first_document(kind: &str, body: &Value) -> Result<Value> {
    if let Some(message) = body
        .pointer("/results/errors/0/error/message")
        .and_then(Value::as_str)
    {
        return Err(DemoError::OperationFailed {
            operation: kind.to_string(),
            message: message.to_string(),
        });
    }

    body.pointer("/results/documents/0")
        .cloned()
        .ok_or_else(|| DemoError::OperationFailed {
            operation: kind.to_string(),
            message: "response contained no documents".to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::http::build_client;
    use httpmock::prelude::*;
    use std::time::Duration;

    #[test]
    fn test_document_error_is_surfaced() {
        let body = json!({
            "kind": "SentimentAnalysisResults",
            "results": {
                "documents": [],
                "errors": [{"id": "1", "error": {"code": "InvalidArgument", "message": "Document text is empty."}}]
            }
        });
        match first_document("SentimentAnalysis", &body) {
            Err(DemoError::OperationFailed { operation, message }) => {
                assert_eq!(operation, "SentimentAnalysis");
                assert_eq!(message, "Document text is empty.");
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_analyze_runs_all_three_tasks() {
        let server = MockServer::start_async().await;

        let detect = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/language/:analyze-text")
                    .query_param("api-version", API_VERSION)
                    .json_body_partial(r#"{"kind": "LanguageDetection"}"#);
                then.status(200).json_body(json!({
                    "kind": "LanguageDetectionResults",
                    "results": {"documents": [{
                        "id": "1",
                        "detectedLanguage": {"name": "English", "iso6391Name": "en", "confidenceScore": 0.99}
                    }], "errors": []}
                }));
            })
            .await;

        let sentiment = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/language/:analyze-text")
                    .json_body_partial(r#"{"kind": "SentimentAnalysis"}"#);
                then.status(200).json_body(json!({
                    "kind": "SentimentAnalysisResults",
                    "results": {"documents": [{
                        "id": "1",
                        "sentiment": "positive",
                        "confidenceScores": {"positive": 0.9, "neutral": 0.08, "negative": 0.02}
                    }], "errors": []}
                }));
            })
            .await;

        let phrases = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/language/:analyze-text")
                    .json_body_partial(r#"{"kind": "KeyPhraseExtraction"}"#);
                then.status(200).json_body(json!({
                    "kind": "KeyPhraseExtractionResults",
                    "results": {"documents": [{"id": "1", "keyPhrases": ["great service", "bank"]}], "errors": []}
                }));
            })
            .await;

        let client = LanguageClient::new(
            build_client(Duration::from_secs(5)).unwrap(),
            ServiceEndpoint::new(server.base_url(), "lang-key"),
        );
        let insights = client
            .analyze("Great service at the bank today!", &CorrelationId::generate())
            .await
            .unwrap();

        detect.assert_async().await;
        sentiment.assert_async().await;
        phrases.assert_async().await;
        assert_eq!(insights.language.iso_code, "en");
        assert_eq!(insights.sentiment, "positive");
        assert_eq!(insights.scores.positive, 0.9);
        assert_eq!(insights.key_phrases, vec!["great service", "bank"]);
    }
}
