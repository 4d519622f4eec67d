use crate::adapters::http::{read_json, with_correlation};
use crate::config::VideoIndexerSettings;
use crate::core::correlation::CorrelationId;
use crate::core::poll::{poll_until_complete, PollPolicy};
use crate::domain::model::{PollStatus, TranscriptLine, VideoInsights};
use crate::domain::ports::StatusSource;
use crate::utils::error::{DemoError, Result};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde_json::Value;
use std::path::Path;

const SERVICE: &str = "video";
const TRANSCRIPT_PREVIEW_LINES: usize = 5;

#[derive(Debug, Clone)]
pub struct VideoIndexerClient {
    http: Client,
    settings: VideoIndexerSettings,
}

impl VideoIndexerClient {
    pub fn new(http: Client, settings: VideoIndexerSettings) -> Self {
        Self { http, settings }
    }

    fn videos_url(&self) -> String {
        format!(
            "{}/{}/Accounts/{}/Videos",
            self.settings.api_base.trim_end_matches('/'),
            self.settings.region,
            self.settings.account_id
        )
    }

    fn index_url(&self, video_id: &str) -> String {
        format!("{}/{}/Index", self.videos_url(), video_id)
    }

    /// 以公開 URL 上傳影片，回傳 video id
    pub async fn upload_by_url(
        &self,
        video_url: &str,
        name: &str,
        correlation_id: &CorrelationId,
    ) -> Result<String> {
        tracing::info!("🎬 Uploading video {} [{}]", video_url, correlation_id);

        let request = with_correlation(self.http.post(self.videos_url()), correlation_id).query(&[
            ("accessToken", self.settings.access_token.as_str()),
            ("name", name),
            ("videoUrl", video_url),
            ("privacy", "Private"),
            ("language", "English"),
        ]);

        let body = read_json(SERVICE, request.send().await?).await?;
        video_id_of(&body)
    }

    /// 以 multipart 上傳本機影片檔，回傳 video id
    pub async fn upload_file(
        &self,
        path: &Path,
        name: &str,
        correlation_id: &CorrelationId,
    ) -> Result<String> {
        let bytes = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "video.mp4".to_string());
        tracing::info!(
            "🎬 Uploading local video {} ({} bytes) [{}]",
            path.display(),
            bytes.len(),
            correlation_id
        );

        let form = Form::new()
            .part("file", Part::bytes(bytes).file_name(file_name))
            .text("name", name.to_string())
            .text("description", "Uploaded from a local file")
            .text("privacy", "Private")
            .text("language", "English");

        let request = with_correlation(self.http.post(self.videos_url()), correlation_id)
            .query(&[("accessToken", self.settings.access_token.as_str())])
            .multipart(form);

        let body = read_json(SERVICE, request.send().await?).await?;
        video_id_of(&body)
    }

    async fn fetch_index(&self, video_id: &str, correlation_id: &CorrelationId) -> Result<Value> {
        let request = with_correlation(self.http.get(self.index_url(video_id)), correlation_id)
            .query(&[("accessToken", self.settings.access_token.as_str())]);
        read_json(SERVICE, request.send().await?).await
    }

    pub async fn index_status(
        &self,
        video_id: &str,
        correlation_id: &CorrelationId,
    ) -> Result<PollStatus<Value>> {
        let body = self.fetch_index(video_id, correlation_id).await?;
        Ok(index_state(body))
    }

    pub async fn insights(
        &self,
        video_id: &str,
        correlation_id: &CorrelationId,
    ) -> Result<VideoInsights> {
        let body = self.fetch_index(video_id, correlation_id).await?;
        Ok(parse_insights(&body))
    }

    /// Uploads by URL, waits for indexing to finish and summarises the insights.
    pub async fn index_and_wait(
        &self,
        video_url: &str,
        name: &str,
        policy: &PollPolicy,
        correlation_id: &CorrelationId,
    ) -> Result<(String, VideoInsights)> {
        let video_id = self.upload_by_url(video_url, name, correlation_id).await?;
        let insights = self.wait_for_insights(&video_id, policy, correlation_id).await?;
        Ok((video_id, insights))
    }

    /// Polls an uploaded video until indexing finishes.
    pub async fn wait_for_insights(
        &self,
        video_id: &str,
        policy: &PollPolicy,
        correlation_id: &CorrelationId,
    ) -> Result<VideoInsights> {
        tracing::info!("📼 Video uploaded, id {} [{}]", video_id, correlation_id);

        let job = IndexingJob {
            client: self,
            video_id,
            correlation_id,
        };
        let index = poll_until_complete(&job, policy, "Video indexing").await?;
        Ok(parse_insights(&index))
    }
}

fn video_id_of(body: &Value) -> Result<String> {
    body.get("id")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| DemoError::UpstreamError {
            service: SERVICE.to_string(),
            status: 200,
            message: "upload response did not include a video id".to_string(),
        })
}

struct IndexingJob<'a> {
    client: &'a VideoIndexerClient,
    video_id: &'a str,
    correlation_id: &'a CorrelationId,
}

#[async_trait]
impl StatusSource for IndexingJob<'_> {
    type Output = Value;

    async fn check(&self) -> Result<PollStatus<Value>> {
        self.client
            .index_status(self.video_id, self.correlation_id)
            .await
    }
}

/// `Processed` 成功，`Failed` 失敗，其餘狀態視為處理中
pub fn index_state(body: Value) -> PollStatus<Value> {
    let state = body
        .get("state")
        .and_then(Value::as_str)
        .unwrap_or("Uploaded")
        .to_string();

    match state.as_str() {
        "Processed" => PollStatus::Succeeded(body),
        "Failed" => PollStatus::Failed("Video indexing failed.".to_string()),
        _ => PollStatus::Pending {
            progress: progress_of(&body),
            state,
        },
    }
}

/// Progress shows up either as a number or as a `"42%"` string on the first video.
fn progress_of(body: &Value) -> Option<u8> {
    let raw = body
        .get("progress")
        .or_else(|| body.pointer("/videos/0/processingProgress"))?;
    let pct = match raw {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().trim_end_matches('%').parse::<f64>().ok()?,
        _ => return None,
    };
    Some(pct.clamp(0.0, 100.0) as u8)
}

fn names(summary: &Value, key: &str) -> Vec<String> {
    summary
        .get(key)
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(|item| item.get("name").and_then(Value::as_str))
        .map(str::to_string)
        .collect()
}

pub fn parse_insights(index: &Value) -> VideoInsights {
    let summary = index.get("summarizedInsights").cloned().unwrap_or(Value::Null);

    let transcript = index
        .pointer("/videos/0/insights/transcript")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .take(TRANSCRIPT_PREVIEW_LINES)
        .map(|line| TranscriptLine {
            time: line
                .get("time")
                .or_else(|| line.pointer("/instances/0/start"))
                .and_then(Value::as_str)
                .map(str::to_string),
            text: line
                .get("text")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
        })
        .collect();

    VideoInsights {
        faces: names(&summary, "faces"),
        brands: names(&summary, "brands"),
        locations: names(&summary, "namedLocations"),
        people: names(&summary, "namedPeople"),
        topics: names(&summary, "topics"),
        transcript,
    }
}
