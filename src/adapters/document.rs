use crate::adapters::http::{check_status, read_json, with_correlation, with_key};
use crate::config::services::DEFAULT_DOCUMENT_MODEL;
use crate::config::ServiceEndpoint;
use crate::core::correlation::CorrelationId;
use crate::core::poll::{poll_until_complete, PollPolicy};
use crate::domain::model::{DocumentAnalysis, KeyValue, MediaSource, PollStatus};
use crate::domain::ports::StatusSource;
use crate::utils::error::{DemoError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};

const SERVICE: &str = "document";
const API_VERSION: &str = "2023-07-31";
const OPERATION_LOCATION: &str = "operation-location";

/// Document analysis client (submit, then poll the returned operation).
#[derive(Debug, Clone)]
pub struct DocumentClient {
    http: Client,
    endpoint: ServiceEndpoint,
}

impl DocumentClient {
    pub fn new(http: Client, endpoint: ServiceEndpoint) -> Self {
        Self { http, endpoint }
    }

    pub fn model(&self) -> &str {
        self.endpoint
            .model
            .as_deref()
            .unwrap_or(DEFAULT_DOCUMENT_MODEL)
    }

    /// Submits the document and returns the operation URL to poll.
    pub async fn submit(
        &self,
        source: &MediaSource,
        correlation_id: &CorrelationId,
    ) -> Result<String> {
        let url = format!(
            "{}/formrecognizer/documentModels/{}:analyze",
            self.endpoint.base_url(),
            self.model()
        );
        let request = with_correlation(
            with_key(self.http.post(url), &self.endpoint),
            correlation_id,
        )
        .query(&[("api-version", API_VERSION)]);

        let request = match source {
            MediaSource::Url(url) => request.json(&json!({ "urlSource": url })),
            MediaSource::Upload {
                content_type,
                bytes,
            } => request
                .header(reqwest::header::CONTENT_TYPE, content_type.as_str())
                .body(bytes.clone()),
        };

        let response = check_status(SERVICE, request.send().await?).await?;
        let location = response
            .headers()
            .get(OPERATION_LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| DemoError::UpstreamError {
                service: SERVICE.to_string(),
                status: response.status().as_u16(),
                message: "response is missing the operation-location header".to_string(),
            })?;

        tracing::debug!("📄 Document submitted [{}], polling {}", correlation_id, location);
        Ok(location)
    }

    pub async fn analyze(
        &self,
        source: &MediaSource,
        correlation_id: &CorrelationId,
        policy: &PollPolicy,
    ) -> Result<DocumentAnalysis> {
        tracing::info!(
            "📄 Analyzing document {} with {} [{}]",
            source.describe(),
            self.model(),
            correlation_id
        );

        let location = self.submit(source, correlation_id).await?;
        let operation = AnalyzeOperation {
            http: self.http.clone(),
            endpoint: self.endpoint.clone(),
            location,
            correlation_id: correlation_id.clone(),
        };
        poll_until_complete(&operation, policy, "Document analysis").await
    }
}

/// 一個尚在進行中的文件分析作業
pub struct AnalyzeOperation {
    http: Client,
    endpoint: ServiceEndpoint,
    location: String,
    correlation_id: CorrelationId,
}

#[async_trait]
impl StatusSource for AnalyzeOperation {
    type Output = DocumentAnalysis;

    async fn check(&self) -> Result<PollStatus<DocumentAnalysis>> {
        let request = with_correlation(
            with_key(self.http.get(&self.location), &self.endpoint),
            &self.correlation_id,
        );
        let body = read_json(SERVICE, request.send().await?).await?;
        Ok(document_status(&body))
    }
}

pub fn document_status(body: &Value) -> PollStatus<DocumentAnalysis> {
    let status = body
        .get("status")
        .and_then(Value::as_str)
        .unwrap_or("unknown");

    match status {
        "notStarted" | "running" => PollStatus::Pending {
            state: status.to_string(),
            progress: None,
        },
        "succeeded" => PollStatus::Succeeded(
            body.get("analyzeResult")
                .map(parse_analyze_result)
                .unwrap_or(DocumentAnalysis {
                    fields: Vec::new(),
                    tables: Vec::new(),
                }),
        ),
        other => PollStatus::Failed(
            body.pointer("/error/message")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| format!("analysis ended with status '{}'", other)),
        ),
    }
}

fn content(value: Option<&Value>) -> String {
    value
        .and_then(|v| v.get("content"))
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

pub fn parse_analyze_result(result: &Value) -> DocumentAnalysis {
    let fields = result
        .get("keyValuePairs")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .map(|kv| KeyValue {
            key: content(kv.get("key")),
            value: content(kv.get("value")),
        })
        .collect();

    let tables = result
        .get("tables")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .map(rebuild_table)
        .collect();

    DocumentAnalysis { fields, tables }
}

/// Upper bound on rebuilt table dimensions.
pub const MAX_TABLE_DIMENSION: usize = 1000;

/// 以 (rowIndex, columnIndex, content) 重建表格，缺少的格子補空字串
///
/// The grid is sized from the cells actually present; the declared
/// `rowCount`/`columnCount` are not trusted. Cells beyond
/// [`MAX_TABLE_DIMENSION`] are dropped.
fn rebuild_table(table: &Value) -> Vec<Vec<String>> {
    let cells: Vec<(usize, usize, String)> = table
        .get("cells")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(|cell| {
            let row = usize::try_from(cell.get("rowIndex")?.as_u64()?).ok()?;
            let column = usize::try_from(cell.get("columnIndex")?.as_u64()?).ok()?;
            if row >= MAX_TABLE_DIMENSION || column >= MAX_TABLE_DIMENSION {
                return None;
            }
            let text = cell
                .get("content")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            Some((row, column, text))
        })
        .collect();

    let rows = cells.iter().map(|(r, _, _)| r + 1).max().unwrap_or(0);
    let columns = cells.iter().map(|(_, c, _)| c + 1).max().unwrap_or(0);

    let mut grid = vec![vec![String::new(); columns]; rows];
    for (row, column, text) in cells {
        grid[row][column] = text;
    }
    grid
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::http::build_client;
    use httpmock::prelude::*;
    use std::time::Duration;

    fn fast_policy() -> PollPolicy {
        PollPolicy::new(Duration::from_millis(5), 3).wait_first(true)
    }

    #[test]
    fn test_rebuild_table_fills_gaps() {
        let table = json!({
            "rowCount": 2,
            "columnCount": 2,
            "cells": [
                {"rowIndex": 0, "columnIndex": 0, "content": "Item"},
                {"rowIndex": 0, "columnIndex": 1, "content": "Amount"},
                {"rowIndex": 1, "columnIndex": 1, "content": "12.00"}
            ]
        });
        assert_eq!(
            rebuild_table(&table),
            vec![
                vec!["Item".to_string(), "Amount".to_string()],
                vec!["".to_string(), "12.00".to_string()],
            ]
        );
    }

    #[test]
    fn test_rebuild_table_ignores_oversized_counts() {
        let table = json!({
            "rowCount": 4611686018427387904u64,
            "columnCount": 1,
            "cells": []
        });
        assert!(rebuild_table(&table).is_empty());

        let table = json!({
            "rowCount": 100000,
            "columnCount": 100000,
            "cells": [
                {"rowIndex": 0, "columnIndex": 0, "content": "Total"},
                {"rowIndex": 100000, "columnIndex": 100000, "content": "far away"}
            ]
        });
        assert_eq!(rebuild_table(&table), vec![vec!["Total".to_string()]]);

        let result = parse_analyze_result(&json!({
            "tables": [{"rowCount": u64::MAX, "columnCount": u64::MAX, "cells": []}]
        }));
        assert_eq!(result.tables, vec![Vec::<Vec<String>>::new()]);
    }

    #[test]
    fn test_document_status_mapping() {
        assert!(matches!(
            document_status(&json!({"status": "notStarted"})),
            PollStatus::Pending { .. }
        ));
        assert!(matches!(
            document_status(&json!({"status": "running"})),
            PollStatus::Pending { .. }
        ));
        match document_status(&json!({"status": "failed", "error": {"message": "Corrupt file"}})) {
            PollStatus::Failed(message) => assert_eq!(message, "Corrupt file"),
            _ => panic!("expected failure"),
        }
        match document_status(&json!({"status": "canceled"})) {
            PollStatus::Failed(message) => assert!(message.contains("canceled")),
            _ => panic!("expected failure"),
        }
    }

    #[test]
    fn test_key_value_pairs_without_value() {
        let analysis = parse_analyze_result(&json!({
            "keyValuePairs": [
                {"key": {"content": "Invoice No"}, "value": {"content": "INV-100"}},
                {"key": {"content": "Signature"}}
            ]
        }));
        assert_eq!(analysis.fields[0].value, "INV-100");
        assert_eq!(analysis.fields[1].value, "");
        assert!(analysis.tables.is_empty());
    }

    #[tokio::test]
    async fn test_analyze_submits_and_polls() {
        let server = MockServer::start_async().await;
        let location = server.url("/formrecognizer/documentModels/prebuilt-document/analyzeResults/op-1");

        let submit = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/formrecognizer/documentModels/prebuilt-document:analyze")
                    .query_param("api-version", API_VERSION)
                    .header("ocp-apim-subscription-key", "doc-key")
                    .json_body(json!({"urlSource": "https://example.com/invoice.pdf"}));
                then.status(202).header("operation-location", location.as_str());
            })
            .await;

        let poll = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/formrecognizer/documentModels/prebuilt-document/analyzeResults/op-1");
                then.status(200).json_body(json!({
                    "status": "succeeded",
                    "analyzeResult": {
                        "keyValuePairs": [
                            {"key": {"content": "Total"}, "value": {"content": "$42"}}
                        ],
                        "tables": []
                    }
                }));
            })
            .await;

        let client = DocumentClient::new(
            build_client(Duration::from_secs(5)).unwrap(),
            ServiceEndpoint::new(server.base_url(), "doc-key"),
        );
        let analysis = client
            .analyze(
                &MediaSource::Url("https://example.com/invoice.pdf".into()),
                &CorrelationId::generate(),
                &fast_policy(),
            )
            .await
            .unwrap();

        submit.assert_async().await;
        poll.assert_async().await;
        assert_eq!(
            analysis.fields,
            vec![KeyValue {
                key: "Total".into(),
                value: "$42".into()
            }]
        );
    }

    #[tokio::test]
    async fn test_missing_operation_location_is_an_error() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST);
                then.status(202);
            })
            .await;

        let client = DocumentClient::new(
            build_client(Duration::from_secs(5)).unwrap(),
            ServiceEndpoint::new(server.base_url(), "doc-key"),
        );
        let result = client
            .analyze(
                &MediaSource::Url("https://example.com/a.pdf".into()),
                &CorrelationId::generate(),
                &fast_policy(),
            )
            .await;

        assert!(matches!(result, Err(DemoError::UpstreamError { .. })));
    }

    #[tokio::test]
    async fn test_still_running_times_out() {
        let server = MockServer::start_async().await;
        let location = server.url("/ops/slow");
        server
            .mock_async(|when, then| {
                when.method(POST);
                then.status(202).header("operation-location", location.as_str());
            })
            .await;
        let poll = server
            .mock_async(|when, then| {
                when.method(GET).path("/ops/slow");
                then.status(200).json_body(json!({"status": "running"}));
            })
            .await;

        let client = DocumentClient::new(
            build_client(Duration::from_secs(5)).unwrap(),
            ServiceEndpoint::new(server.base_url(), "doc-key"),
        );
        let result = client
            .analyze(
                &MediaSource::Url("https://example.com/a.pdf".into()),
                &CorrelationId::generate(),
                &fast_policy(),
            )
            .await;

        assert!(matches!(result, Err(DemoError::PollTimeout { attempts: 3, .. })));
        assert_eq!(poll.hits_async().await, 3);
    }
}
