use crate::app::extract::Payload;
use crate::app::report::{report_key, BatchReport};
use crate::app::services::{analyze_batch, analyze_document, collect_batch, parse_image_urls};
use crate::app::state::SharedState;
use crate::core::correlation::CorrelationId;
use crate::core::fanout::BatchSummary;
use crate::domain::model::{ChatMessage, GroundednessRequest, MediaSource};
use crate::utils::error::{ApiError, DemoError, ResultExt};
use crate::utils::validation::validate_url;
use axum::{
    extract::{multipart::Field, Multipart, Path, State},
    http::header,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};

type ApiResult<T> = std::result::Result<T, ApiError>;

const DEFAULT_UPLOAD_TYPE: &str = "application/octet-stream";

/// Per-file limit for `images` uploads.
pub const MAX_IMAGE_BYTES: usize = 5 * 1024 * 1024;
/// Per-file limit for `doc_file` uploads.
pub const MAX_DOCUMENT_BYTES: usize = 10 * 1024 * 1024;

pub async fn health(State(state): State<SharedState>, correlation_id: CorrelationId) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "time": chrono::Utc::now().to_rfc3339(),
        "uptime_seconds": state.monitor.uptime().as_secs(),
        "process": state.monitor.snapshot(),
        "services": state.config.services.configured_names(),
        "correlation_id": correlation_id,
    }))
}

pub async fn frontend_settings(
    State(state): State<SharedState>,
    correlation_id: CorrelationId,
) -> Json<Value> {
    let ui = &state.config.ui;
    Json(json!({
        "auth_enabled": false,
        "ui": {
            "title": ui.title,
            "chat_title": ui.chat_title,
            "chat_description": ui.chat_description,
            "show_share_button": false,
            "show_chat_history_button": false,
        },
        "correlation_id": correlation_id,
    }))
}

async fn read_upload(
    mut field: Field<'_>,
    max_bytes: usize,
) -> Result<Option<MediaSource>, DemoError> {
    let content_type = field
        .content_type()
        .unwrap_or(DEFAULT_UPLOAD_TYPE)
        .to_string();
    let file_name = field.file_name().unwrap_or("upload").to_string();

    let mut bytes = Vec::new();
    while let Some(chunk) = field
        .chunk()
        .await
        .map_err(|e| DemoError::bad_request(format!("could not read upload: {}", e)))?
    {
        if bytes.len() + chunk.len() > max_bytes {
            return Err(DemoError::bad_request(format!(
                "'{}' exceeds the {} MB per-file limit",
                file_name,
                max_bytes / (1024 * 1024)
            )));
        }
        bytes.extend_from_slice(&chunk);
    }

    // 瀏覽器在未選檔時仍會送出空的檔案欄位
    if bytes.is_empty() {
        return Ok(None);
    }
    Ok(Some(MediaSource::Upload {
        content_type,
        bytes,
    }))
}

async fn read_text(field: Field<'_>) -> Result<String, DemoError> {
    field
        .text()
        .await
        .map_err(|e| DemoError::bad_request(format!("could not read form field: {}", e)))
}

async fn next_field(multipart: &mut Multipart) -> Result<Option<Field<'_>>, DemoError> {
    multipart
        .next_field()
        .await
        .map_err(|e| DemoError::bad_request(format!("invalid multipart body: {}", e)))
}

/// POST /vision/analyze: `image_urls` text plus any number of `images` files.
pub async fn analyze_images(
    State(state): State<SharedState>,
    correlation_id: CorrelationId,
    Payload(mut multipart): Payload<Multipart>,
) -> ApiResult<Json<Value>> {
    let mut urls = Vec::new();
    let mut uploads = Vec::new();

    while let Some(field) = next_field(&mut multipart).await.with_correlation(&correlation_id)? {
        let field_name = field.name().unwrap_or_default().to_string();
        match field_name.as_str() {
            "image_urls" => {
                let text = read_text(field).await.with_correlation(&correlation_id)?;
                urls.extend(parse_image_urls(&text));
            }
            "images" => {
                if let Some(upload) = read_upload(field, MAX_IMAGE_BYTES)
                    .await
                    .with_correlation(&correlation_id)?
                {
                    uploads.push(upload);
                }
            }
            other => tracing::debug!("Ignoring form field '{}'", other),
        }
    }

    let vision = state.vision().with_correlation(&correlation_id)?;
    let batch = collect_batch(urls, uploads, state.config.batch.max_items)
        .with_correlation(&correlation_id)?;
    let sources: Vec<(String, String)> = batch
        .iter()
        .map(|s| (s.describe(), s.thumbnail()))
        .collect();

    let outcomes = analyze_batch(vision, batch, &state.config.batch).await;
    let summary = BatchSummary::from_outcomes(&outcomes);

    // 每個批次都用新的 id，避免覆蓋既有報告
    let batch_id = CorrelationId::generate().to_string();
    let report = match state.store.as_deref() {
        Some(store) => match BatchReport::build(&batch_id, &outcomes).store(store).await {
            Ok(_) => Some(format!("/reports/{}", batch_id)),
            Err(e) => {
                tracing::warn!("⚠️ Could not store batch report {}: {}", batch_id, e);
                None
            }
        },
        None => None,
    };

    let items: Vec<Value> = outcomes
        .iter()
        .zip(sources)
        .map(|(outcome, (source, thumbnail))| match &outcome.result {
            Ok(analysis) => json!({
                "index": outcome.index,
                "correlation_id": outcome.correlation_id,
                "source": source,
                "thumbnail": thumbnail,
                "status": "ok",
                "result": analysis,
            }),
            Err(_) => json!({
                "index": outcome.index,
                "correlation_id": outcome.correlation_id,
                "source": source,
                "thumbnail": thumbnail,
                "status": "error",
                "error": outcome.error_message(),
            }),
        })
        .collect();

    Ok(Json(json!({
        "batch_id": batch_id,
        "correlation_id": correlation_id,
        "summary": summary,
        "items": items,
        "report": report,
    })))
}

/// POST /documents/analyze: `doc_url` text or a `doc_file` upload.
pub async fn analyze_document_form(
    State(state): State<SharedState>,
    correlation_id: CorrelationId,
    Payload(mut multipart): Payload<Multipart>,
) -> ApiResult<Json<Value>> {
    let mut doc_url = None;
    let mut upload = None;

    while let Some(field) = next_field(&mut multipart).await.with_correlation(&correlation_id)? {
        let field_name = field.name().unwrap_or_default().to_string();
        match field_name.as_str() {
            "doc_url" => {
                let text = read_text(field).await.with_correlation(&correlation_id)?;
                let text = text.trim();
                if !text.is_empty() {
                    doc_url = Some(text.to_string());
                }
            }
            "doc_file" => {
                upload = read_upload(field, MAX_DOCUMENT_BYTES)
                    .await
                    .with_correlation(&correlation_id)?;
            }
            other => tracing::debug!("Ignoring form field '{}'", other),
        }
    }

    let source = match (doc_url, upload) {
        (Some(url), _) => {
            validate_url("doc_url", &url)
                .map_err(|e| DemoError::bad_request(e.to_string()))
                .with_correlation(&correlation_id)?;
            MediaSource::Url(url)
        }
        (None, Some(upload)) => upload,
        (None, None) => {
            return Err(DemoError::bad_request(
                "Please provide a document URL or upload a document.",
            )
            .with_correlation(&correlation_id))
        }
    };

    let document = state.document().with_correlation(&correlation_id)?;
    let result = analyze_document(
        document,
        state.vision.as_ref(),
        &source,
        &correlation_id,
        &state.config.polling.document,
    )
    .await
    .with_correlation(&correlation_id)?;

    Ok(Json(json!({
        "correlation_id": correlation_id,
        "source": source.describe(),
        "result": result,
    })))
}

#[derive(Debug, Deserialize)]
pub struct TextRequest {
    pub text: String,
}

pub async fn moderate_text(
    State(state): State<SharedState>,
    correlation_id: CorrelationId,
    Payload(Json(request)): Payload<Json<TextRequest>>,
) -> ApiResult<Json<Value>> {
    let client = state.content_safety().with_correlation(&correlation_id)?;
    let result = client
        .analyze_text(&request.text, &correlation_id)
        .await
        .with_correlation(&correlation_id)?;

    Ok(Json(json!({
        "correlation_id": correlation_id,
        "result": result,
    })))
}

pub async fn groundedness(
    State(state): State<SharedState>,
    correlation_id: CorrelationId,
    Payload(Json(request)): Payload<Json<GroundednessRequest>>,
) -> ApiResult<Json<Value>> {
    let client = state.content_safety().with_correlation(&correlation_id)?;
    let result = client
        .detect_groundedness(&request, &correlation_id)
        .await
        .with_correlation(&correlation_id)?;

    Ok(Json(json!({
        "correlation_id": correlation_id,
        "result": result,
    })))
}

pub async fn analyze_language(
    State(state): State<SharedState>,
    correlation_id: CorrelationId,
    Payload(Json(request)): Payload<Json<TextRequest>>,
) -> ApiResult<Json<Value>> {
    let client = state.language().with_correlation(&correlation_id)?;
    let result = client
        .analyze(&request.text, &correlation_id)
        .await
        .with_correlation(&correlation_id)?;

    Ok(Json(json!({
        "correlation_id": correlation_id,
        "result": result,
    })))
}

#[derive(Debug, Deserialize)]
pub struct ConversationRequest {
    pub messages: Vec<ChatMessage>,
}

pub async fn conversation(
    State(state): State<SharedState>,
    correlation_id: CorrelationId,
    Payload(Json(request)): Payload<Json<ConversationRequest>>,
) -> ApiResult<Json<Value>> {
    let client = state.chat().with_correlation(&correlation_id)?;
    tracing::info!(
        "📨 Received chat request with {} messages",
        request.messages.len()
    );

    let reply = client
        .complete(&request.messages, &correlation_id)
        .await
        .with_correlation(&correlation_id)?;

    Ok(Json(json!({
        "correlation_id": correlation_id,
        "model": reply.model.as_deref().unwrap_or(client.model()),
        "choices": [{ "index": 0, "message": reply.message }],
        "usage": reply.usage,
    })))
}

#[derive(Debug, Deserialize)]
pub struct VideoIndexRequest {
    pub video_url: String,
    #[serde(default)]
    pub name: Option<String>,
}

pub async fn index_video(
    State(state): State<SharedState>,
    correlation_id: CorrelationId,
    Payload(Json(request)): Payload<Json<VideoIndexRequest>>,
) -> ApiResult<Json<Value>> {
    validate_url("video_url", &request.video_url)
        .map_err(|e| DemoError::bad_request(e.to_string()))
        .with_correlation(&correlation_id)?;
    let client = state.video().with_correlation(&correlation_id)?;

    let name = request
        .name
        .filter(|n| !n.trim().is_empty())
        .unwrap_or_else(|| format!("demo-{}", correlation_id));
    let (video_id, insights) = client
        .index_and_wait(
            &request.video_url,
            &name,
            &state.config.polling.video,
            &correlation_id,
        )
        .await
        .with_correlation(&correlation_id)?;

    Ok(Json(json!({
        "correlation_id": correlation_id,
        "video_id": video_id,
        "insights": insights,
    })))
}

/// GET /reports/{batch_id}: the zipped batch report.
pub async fn download_report(
    State(state): State<SharedState>,
    correlation_id: CorrelationId,
    Path(batch_id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let store = state.store().with_correlation(&correlation_id)?;
    // batch id 與 correlation id 同格式
    let batch_id = CorrelationId::parse(&batch_id)
        .ok_or_else(|| DemoError::NotFound {
            resource: "report".to_string(),
            id: batch_id.clone(),
        })
        .with_correlation(&correlation_id)?;

    let data = store
        .get(&report_key(batch_id.as_str()))
        .await
        .map_err(|e| match e {
            DemoError::NotFound { .. } => DemoError::NotFound {
                resource: "report".to_string(),
                id: batch_id.to_string(),
            },
            other => other,
        })
        .with_correlation(&correlation_id)?;

    Ok((
        [
            (header::CONTENT_TYPE, "application/zip".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"batch-{}.zip\"", batch_id),
            ),
        ],
        data,
    ))
}
