use crate::core::fanout::{BatchSummary, ItemOutcome};
use crate::domain::model::ImageAnalysis;
use crate::domain::ports::ArtifactStore;
use crate::utils::error::{DemoError, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;
use std::io::Write;
use zip::write::{FileOptions, ZipWriter};

/// One line of `summary.csv`.
#[derive(Debug, Clone, Serialize)]
pub struct SummaryRow {
    pub index: usize,
    pub correlation_id: String,
    pub status: &'static str,
    pub tags: String,
    pub objects: String,
    pub ocr_text: String,
    pub severity: Option<u8>,
    pub error: String,
}

/// 批次影像分析的報表：CSV 摘要、成功結果 JSON、失敗清單 JSON
#[derive(Debug, Clone)]
pub struct BatchReport {
    pub batch_id: String,
    pub created_at: DateTime<Utc>,
    pub summary: BatchSummary,
    pub rows: Vec<SummaryRow>,
    pub results: Vec<serde_json::Value>,
    pub errors: Vec<serde_json::Value>,
}

impl BatchReport {
    pub fn build(batch_id: impl Into<String>, outcomes: &[ItemOutcome<ImageAnalysis>]) -> Self {
        let mut rows = Vec::with_capacity(outcomes.len());
        let mut results = Vec::new();
        let mut errors = Vec::new();

        for outcome in outcomes {
            let correlation_id = outcome.correlation_id.to_string();
            match &outcome.result {
                Ok(analysis) => {
                    rows.push(SummaryRow {
                        index: outcome.index,
                        correlation_id: correlation_id.clone(),
                        status: "ok",
                        tags: join_names(analysis.tags.iter().map(|t| t.name.as_str())),
                        objects: join_names(analysis.objects.iter().map(|o| o.object.as_str())),
                        // 壓成單行
                        ocr_text: analysis.ocr_text.replace('\n', " "),
                        severity: Some(analysis.severity),
                        error: String::new(),
                    });
                    results.push(json!({
                        "index": outcome.index,
                        "correlation_id": correlation_id,
                        "analysis": analysis,
                    }));
                }
                Err(e) => {
                    let message = e.client_message();
                    rows.push(SummaryRow {
                        index: outcome.index,
                        correlation_id: correlation_id.clone(),
                        status: "error",
                        tags: String::new(),
                        objects: String::new(),
                        ocr_text: String::new(),
                        severity: None,
                        error: message.clone(),
                    });
                    errors.push(json!({
                        "index": outcome.index,
                        "correlation_id": correlation_id,
                        "error": message,
                    }));
                }
            }
        }

        Self {
            batch_id: batch_id.into(),
            created_at: Utc::now(),
            summary: BatchSummary::from_outcomes(outcomes),
            rows,
            results,
            errors,
        }
    }

    pub fn storage_key(&self) -> String {
        report_key(&self.batch_id)
    }

    pub fn to_csv(&self) -> Result<Vec<u8>> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        for row in &self.rows {
            writer.serialize(row)?;
        }
        writer.flush()?;
        writer
            .into_inner()
            .map_err(|e| DemoError::IoError(e.into_error()))
    }

    pub fn to_zip(&self) -> Result<Vec<u8>> {
        let csv_data = self.to_csv()?;

        let mut zip = ZipWriter::new(std::io::Cursor::new(Vec::new()));

        zip.start_file::<_, ()>("summary.csv", FileOptions::default())?;
        zip.write_all(&csv_data)?;

        zip.start_file::<_, ()>("results.json", FileOptions::default())?;
        let results = json!({
            "batch_id": self.batch_id,
            "created_at": self.created_at.to_rfc3339(),
            "summary": self.summary,
            "items": self.results,
        });
        zip.write_all(serde_json::to_string_pretty(&results)?.as_bytes())?;

        // 只有失敗項目時才附上 errors.json
        if !self.errors.is_empty() {
            zip.start_file::<_, ()>("errors.json", FileOptions::default())?;
            zip.write_all(serde_json::to_string_pretty(&self.errors)?.as_bytes())?;
        }

        let cursor = zip.finish()?;
        Ok(cursor.into_inner())
    }

    /// Zips the report and stores it, returning the storage key.
    pub async fn store(&self, store: &dyn ArtifactStore) -> Result<String> {
        let key = self.storage_key();
        let data = self.to_zip()?;
        tracing::debug!("Writing report {} ({} bytes)", key, data.len());
        store.put(&key, &data).await?;
        tracing::info!(
            "📦 Batch report {} stored ({} ok, {} failed)",
            self.batch_id,
            self.summary.succeeded,
            self.summary.failed
        );
        Ok(key)
    }
}

pub fn report_key(batch_id: &str) -> String {
    format!("reports/{}.zip", batch_id)
}

fn join_names<'a>(names: impl Iterator<Item = &'a str>) -> String {
    names.collect::<Vec<_>>().join("; ")
}
