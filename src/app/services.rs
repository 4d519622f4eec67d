use crate::adapters::{DocumentClient, VisionClient};
use crate::config::BatchSettings;
use crate::core::correlation::CorrelationId;
use crate::core::fanout::{fan_out, ItemOutcome};
use crate::core::poll::PollPolicy;
use crate::domain::model::{DocumentAnalysis, ImageAnalysis, KeyValue, MediaSource};
use crate::utils::error::{DemoError, Result};

pub const EXTRACTED_TEXT_FIELD: &str = "Extracted Text";

/// Splits a free-form text box into image URLs, keeping only http(s) entries.
pub fn parse_image_urls(text: &str) -> Vec<String> {
    text.split(['\n', '\r', ','])
        .map(str::trim)
        .filter(|s| s.starts_with("http://") || s.starts_with("https://"))
        .map(str::to_string)
        .collect()
}

/// 組出批次：URL 在前、上傳檔案在後
pub fn collect_batch(
    urls: Vec<String>,
    uploads: Vec<MediaSource>,
    max_items: usize,
) -> Result<Vec<MediaSource>> {
    let batch: Vec<MediaSource> = urls
        .into_iter()
        .map(MediaSource::Url)
        .chain(uploads)
        .collect();

    if batch.is_empty() {
        return Err(DemoError::bad_request(
            "Please provide at least one image URL or upload at least one image.",
        ));
    }
    if batch.len() > max_items {
        return Err(DemoError::bad_request(format!(
            "Please limit to {} images per batch (got {}).",
            max_items,
            batch.len()
        )));
    }
    Ok(batch)
}

/// Image analysis followed by OCR, both under the same correlation id.
pub async fn analyze_image(
    vision: &VisionClient,
    source: &MediaSource,
    correlation_id: &CorrelationId,
) -> Result<ImageAnalysis> {
    let analysis = vision.analyze(source, correlation_id).await?;
    let ocr = vision.ocr(source, correlation_id).await?;
    let severity = analysis.moderation.severity();

    Ok(ImageAnalysis {
        tags: analysis.tags,
        objects: analysis.objects,
        caption: analysis.caption,
        ocr_text: ocr.text,
        moderation: analysis.moderation,
        severity,
        raw: serde_json::json!({ "analysis": analysis.raw, "ocr": ocr.raw }),
    })
}

pub async fn analyze_batch(
    vision: &VisionClient,
    sources: Vec<MediaSource>,
    settings: &BatchSettings,
) -> Vec<ItemOutcome<ImageAnalysis>> {
    tracing::info!("🖼️ Analyzing batch of {} images", sources.len());
    fan_out(sources, settings.concurrency, |source, correlation_id| async move {
        analyze_image(vision, &source, &correlation_id).await
    })
    .await
}

/// 上游錯誤只取服務回傳的訊息，其餘用錯誤本身的描述
fn reason(error: &DemoError) -> String {
    match error {
        DemoError::UpstreamError { message, .. } => message.clone(),
        other => other.to_string(),
    }
}

/// Document analysis, falling back to OCR for uploaded images.
///
/// The fallback only applies to `image/*` uploads and only when a vision
/// client is available. When both fail the error carries both reasons.
pub async fn analyze_document(
    document: &DocumentClient,
    vision: Option<&VisionClient>,
    source: &MediaSource,
    correlation_id: &CorrelationId,
    policy: &PollPolicy,
) -> Result<DocumentAnalysis> {
    let doc_error = match document.analyze(source, correlation_id, policy).await {
        Ok(analysis) => return Ok(analysis),
        Err(e) => e,
    };

    let vision = match vision {
        Some(vision) if source.is_image_upload() => vision,
        _ => return Err(doc_error),
    };

    tracing::warn!(
        "⚠️ Document analysis failed ({}), falling back to OCR [{}]",
        doc_error,
        correlation_id
    );

    match vision.ocr(source, correlation_id).await {
        Ok(ocr) => Ok(DocumentAnalysis {
            fields: vec![KeyValue {
                key: EXTRACTED_TEXT_FIELD.to_string(),
                value: ocr.text,
            }],
            tables: Vec::new(),
        }),
        Err(ocr_error) => {
            let status = match &doc_error {
                DemoError::UpstreamError { status, .. } => *status,
                _ => 502,
            };
            Err(DemoError::UpstreamError {
                service: "document".to_string(),
                status,
                message: format!(
                    "{} | OCR fallback failed: {}",
                    reason(&doc_error),
                    reason(&ocr_error)
                ),
            })
        }
    }
}
