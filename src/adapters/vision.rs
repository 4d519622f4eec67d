use crate::adapters::http::{read_json, with_correlation, with_key, with_media};
use crate::config::ServiceEndpoint;
use crate::core::correlation::CorrelationId;
use crate::domain::model::{
    DetectedObject, MediaSource, ModerationFlags, OcrResult, Tag, VisionAnalysis,
};
use crate::utils::error::Result;
use reqwest::Client;
use serde_json::Value;

const SERVICE: &str = "vision";
const ANALYZE_PATH: &str = "/vision/v3.2/analyze";
const OCR_PATH: &str = "/vision/v3.2/ocr";

/// Image analysis and OCR client.
#[derive(Debug, Clone)]
pub struct VisionClient {
    http: Client,
    endpoint: ServiceEndpoint,
}

impl VisionClient {
    pub fn new(http: Client, endpoint: ServiceEndpoint) -> Self {
        Self { http, endpoint }
    }

    pub async fn analyze(
        &self,
        source: &MediaSource,
        correlation_id: &CorrelationId,
    ) -> Result<VisionAnalysis> {
        tracing::debug!("🖼️ Analyzing image {} [{}]", source.describe(), correlation_id);

        let url = format!("{}{}", self.endpoint.base_url(), ANALYZE_PATH);
        let request = self.http.post(url).query(&[
            ("visualFeatures", "Tags,Objects,Adult,Description"),
            ("language", "en"),
        ]);
        let request = with_media(
            with_correlation(with_key(request, &self.endpoint), correlation_id),
            source,
            "url",
        );

        let body = read_json(SERVICE, request.send().await?).await?;
        Ok(parse_analysis(body))
    }

    pub async fn ocr(
        &self,
        source: &MediaSource,
        correlation_id: &CorrelationId,
    ) -> Result<OcrResult> {
        tracing::debug!("🔤 Running OCR on {} [{}]", source.describe(), correlation_id);

        let url = format!("{}{}", self.endpoint.base_url(), OCR_PATH);
        let request = self
            .http
            .post(url)
            .query(&[("language", "unk"), ("detectOrientation", "true")]);
        let request = with_media(
            with_correlation(with_key(request, &self.endpoint), correlation_id),
            source,
            "url",
        );

        let body = read_json(SERVICE, request.send().await?).await?;
        Ok(OcrResult {
            text: ocr_text(&body),
            raw: body,
        })
    }
}

fn str_field(value: &Value, key: &str) -> String {
    value
        .get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

fn f64_field(value: &Value, key: &str) -> f64 {
    value.get(key).and_then(Value::as_f64).unwrap_or(0.0)
}

fn array<'a>(value: &'a Value, key: &str) -> impl Iterator<Item = &'a Value> {
    value
        .get(key)
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
}

pub fn parse_analysis(body: Value) -> VisionAnalysis {
    let tags = array(&body, "tags")
        .map(|t| Tag {
            name: str_field(t, "name"),
            confidence: f64_field(t, "confidence"),
        })
        .collect();

    let objects = array(&body, "objects")
        .map(|o| DetectedObject {
            object: str_field(o, "object"),
            confidence: f64_field(o, "confidence"),
        })
        .collect();

    let caption = body
        .pointer("/description/captions/0/text")
        .and_then(Value::as_str)
        .map(str::to_string);

    let moderation = body
        .get("adult")
        .map(|adult| ModerationFlags {
            is_adult: adult
                .get("isAdultContent")
                .and_then(Value::as_bool)
                .unwrap_or(false),
            is_racy: adult
                .get("isRacyContent")
                .and_then(Value::as_bool)
                .unwrap_or(false),
            adult_score: f64_field(adult, "adultScore"),
            racy_score: f64_field(adult, "racyScore"),
        })
        .unwrap_or_default();

    VisionAnalysis {
        tags,
        objects,
        caption,
        moderation,
        raw: body,
    }
}

/// 同一區塊的各行以空白相接，區塊之間換行
pub fn ocr_text(body: &Value) -> String {
    array(body, "regions")
        .map(|region| {
            array(region, "lines")
                .flat_map(|line| array(line, "words"))
                .filter_map(|w| w.get("text").and_then(Value::as_str))
                .collect::<Vec<_>>()
                .join(" ")
        })
        .filter(|text| !text.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::http::build_client;
    use crate::utils::error::DemoError;
    use httpmock::prelude::*;
    use serde_json::json;
    use std::time::Duration;

    fn client(server: &MockServer) -> VisionClient {
        VisionClient::new(
            build_client(Duration::from_secs(5)).unwrap(),
            ServiceEndpoint::new(server.base_url(), "vision-key"),
        )
    }

    #[test]
    fn test_ocr_text_joins_lines_per_region() {
        let body = json!({
            "regions": [
                {"lines": [
                    {"words": [{"text": "Hello"}, {"text": "World"}]},
                    {"words": [{"text": "Line"}, {"text": "two"}]}
                ]},
                {"lines": [{"words": [{"text": "Second"}, {"text": "region"}]}]}
            ]
        });
        assert_eq!(ocr_text(&body), "Hello World Line two\nSecond region");
        assert_eq!(ocr_text(&json!({})), "");
    }

    #[test]
    fn test_parse_analysis_tolerates_missing_sections() {
        let analysis = parse_analysis(json!({"tags": [{"name": "dog", "confidence": 0.98}]}));
        assert_eq!(analysis.tags.len(), 1);
        assert!(analysis.objects.is_empty());
        assert_eq!(analysis.caption, None);
        assert_eq!(analysis.moderation, ModerationFlags::default());
    }

    #[tokio::test]
    async fn test_analyze_url_sends_json_and_headers() {
        let server = MockServer::start_async().await;
        let cid = CorrelationId::generate();

        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/vision/v3.2/analyze")
                    .query_param("visualFeatures", "Tags,Objects,Adult,Description")
                    .header("ocp-apim-subscription-key", "vision-key")
                    .header("x-ms-correlation-id", cid.as_str())
                    .json_body(json!({"url": "https://example.com/cat.jpg"}));
                then.status(200).json_body(json!({
                    "tags": [{"name": "cat", "confidence": 0.99}],
                    "objects": [{"object": "cat", "confidence": 0.9}],
                    "description": {"captions": [{"text": "a cat on a sofa", "confidence": 0.8}]},
                    "adult": {
                        "isAdultContent": false,
                        "isRacyContent": true,
                        "adultScore": 0.01,
                        "racyScore": 0.62
                    }
                }));
            })
            .await;

        let analysis = client(&server)
            .analyze(&MediaSource::Url("https://example.com/cat.jpg".into()), &cid)
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(analysis.tags[0].name, "cat");
        assert_eq!(analysis.caption.as_deref(), Some("a cat on a sofa"));
        assert!(analysis.moderation.is_racy);
        assert_eq!(analysis.moderation.severity(), 2);
    }

    #[tokio::test]
    async fn test_ocr_upload_sends_raw_bytes() {
        let server = MockServer::start_async().await;

        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/vision/v3.2/ocr")
                    .query_param("language", "unk")
                    .header("content-type", "image/png")
                    .body("PNGDATA");
                then.status(200).json_body(json!({
                    "regions": [{"lines": [{"words": [{"text": "TOTAL"}, {"text": "42"}]}]}]
                }));
            })
            .await;

        let source = MediaSource::Upload {
            content_type: "image/png".into(),
            bytes: b"PNGDATA".to_vec(),
        };
        let result = client(&server)
            .ocr(&source, &CorrelationId::generate())
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(result.text, "TOTAL 42");
    }

    #[tokio::test]
    async fn test_upstream_error_message_is_extracted() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/vision/v3.2/analyze");
                then.status(400).json_body(json!({
                    "error": {"code": "InvalidImageUrl", "message": "Image URL is badly formatted."}
                }));
            })
            .await;

        let err = client(&server)
            .analyze(&MediaSource::Url("nope".into()), &CorrelationId::generate())
            .await
            .unwrap_err();

        match err {
            DemoError::UpstreamError {
                service,
                status,
                message,
            } => {
                assert_eq!(service, "vision");
                assert_eq!(status, 400);
                assert_eq!(message, "Image URL is badly formatted.");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }
}
