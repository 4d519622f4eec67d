use base64::Engine;
use serde::{Deserialize, Serialize};

/// 送往雲端服務的輸入：公開 URL 或上傳的原始位元組
#[derive(Debug, Clone, PartialEq)]
pub enum MediaSource {
    Url(String),
    Upload { content_type: String, bytes: Vec<u8> },
}

impl MediaSource {
    pub fn is_image_upload(&self) -> bool {
        matches!(self, MediaSource::Upload { content_type, .. } if content_type.starts_with("image/"))
    }

    /// URL 直接使用，上傳內容轉為 data URI
    pub fn thumbnail(&self) -> String {
        match self {
            MediaSource::Url(url) => url.clone(),
            MediaSource::Upload {
                content_type,
                bytes,
            } => format!(
                "data:{};base64,{}",
                content_type,
                base64::engine::general_purpose::STANDARD.encode(bytes)
            ),
        }
    }

    pub fn describe(&self) -> String {
        match self {
            MediaSource::Url(url) => url.clone(),
            MediaSource::Upload {
                content_type,
                bytes,
            } => format!("upload ({}, {} bytes)", content_type, bytes.len()),
        }
    }
}

#[derive(Debug, Clone)]
pub enum PollStatus<T> {
    Pending {
        state: String,
        progress: Option<u8>,
    },
    Succeeded(T),
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tag {
    pub name: String,
    pub confidence: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectedObject {
    pub object: String,
    pub confidence: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModerationFlags {
    pub is_adult: bool,
    pub is_racy: bool,
    pub adult_score: f64,
    pub racy_score: f64,
}

impl ModerationFlags {
    /// 0 = safe, 2 = racy, 3 = adult
    pub fn severity(&self) -> u8 {
        if self.adult_score > 0.5 {
            3
        } else if self.racy_score > 0.5 {
            2
        } else {
            0
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct VisionAnalysis {
    pub tags: Vec<Tag>,
    pub objects: Vec<DetectedObject>,
    pub caption: Option<String>,
    pub moderation: ModerationFlags,
    pub raw: serde_json::Value,
}

#[derive(Debug, Clone, Serialize)]
pub struct OcrResult {
    pub text: String,
    pub raw: serde_json::Value,
}

/// 單張圖片的分析結果（影像分析 + OCR）
#[derive(Debug, Clone, Serialize)]
pub struct ImageAnalysis {
    pub tags: Vec<Tag>,
    pub objects: Vec<DetectedObject>,
    pub caption: Option<String>,
    pub ocr_text: String,
    pub moderation: ModerationFlags,
    pub severity: u8,
    pub raw: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KeyValue {
    pub key: String,
    pub value: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct DocumentAnalysis {
    pub fields: Vec<KeyValue>,
    pub tables: Vec<Vec<Vec<String>>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategorySeverity {
    pub category: String,
    pub severity: u8,
}

#[derive(Debug, Clone, Serialize)]
pub struct TextModeration {
    pub categories: Vec<CategorySeverity>,
    pub max_severity: u8,
    pub blocked: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GroundednessRequest {
    #[serde(default)]
    pub query: Option<String>,
    pub text: String,
    pub grounding_sources: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GroundednessResult {
    pub ungrounded_detected: bool,
    pub ungrounded_percentage: f64,
    pub details: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DetectedLanguage {
    pub name: String,
    pub iso_code: String,
    pub confidence: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct SentimentScores {
    pub positive: f64,
    pub neutral: f64,
    pub negative: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct TextInsights {
    pub language: DetectedLanguage,
    pub sentiment: String,
    pub scores: SentimentScores,
    pub key_phrases: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TranscriptLine {
    pub time: Option<String>,
    pub text: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct VideoInsights {
    pub faces: Vec<String>,
    pub brands: Vec<String>,
    pub locations: Vec<String>,
    pub people: Vec<String>,
    pub topics: Vec<String>,
    pub transcript: Vec<TranscriptLine>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatUsage {
    #[serde(default)]
    pub prompt_tokens: u32,
    #[serde(default)]
    pub completion_tokens: u32,
    #[serde(default)]
    pub total_tokens: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatReply {
    pub message: ChatMessage,
    pub model: Option<String>,
    pub usage: Option<ChatUsage>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_moderation_severity() {
        let safe = ModerationFlags::default();
        assert_eq!(safe.severity(), 0);

        let racy = ModerationFlags {
            racy_score: 0.7,
            ..Default::default()
        };
        assert_eq!(racy.severity(), 2);

        let adult = ModerationFlags {
            adult_score: 0.9,
            racy_score: 0.9,
            ..Default::default()
        };
        assert_eq!(adult.severity(), 3);
    }

    #[test]
    fn test_upload_thumbnail_is_data_uri() {
        let source = MediaSource::Upload {
            content_type: "image/png".to_string(),
            bytes: vec![1, 2, 3],
        };
        assert_eq!(source.thumbnail(), "data:image/png;base64,AQID");
        assert!(source.is_image_upload());

        let pdf = MediaSource::Upload {
            content_type: "application/pdf".to_string(),
            bytes: vec![],
        };
        assert!(!pdf.is_image_upload());
        assert!(!MediaSource::Url("https://example.com/a.jpg".into()).is_image_upload());
    }
}
