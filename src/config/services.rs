use crate::utils::error::Result;
use crate::utils::validation::{validate_non_empty_string, validate_url, Validate};
use serde::{Deserialize, Serialize};

pub const DEFAULT_AUTH_HEADER: &str = "Ocp-Apim-Subscription-Key";
pub const DEFAULT_DOCUMENT_MODEL: &str = "prebuilt-document";
pub const DEFAULT_VIDEO_API_BASE: &str = "https://api.videoindexer.ai";

fn default_auth_header() -> String {
    DEFAULT_AUTH_HEADER.to_string()
}

fn default_temperature() -> f32 {
    0.7
}

fn default_max_tokens() -> u32 {
    800
}

fn default_video_api_base() -> String {
    DEFAULT_VIDEO_API_BASE.to_string()
}

fn default_region() -> String {
    "eastus".to_string()
}

/// 以 API key 存取的雲端服務端點
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceEndpoint {
    pub endpoint: String,
    pub key: String,
    #[serde(default = "default_auth_header")]
    pub auth_header: String,
    /// Model or deployment id, for services that need one.
    #[serde(default)]
    pub model: Option<String>,
}

impl ServiceEndpoint {
    pub fn new(endpoint: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            key: key.into(),
            auth_header: default_auth_header(),
            model: None,
        }
    }

    /// Endpoint without a trailing slash, ready for path joins.
    pub fn base_url(&self) -> &str {
        self.endpoint.trim_end_matches('/')
    }

    fn validate_as(&self, name: &str) -> Result<()> {
        validate_url(&format!("{}.endpoint", name), &self.endpoint)?;
        validate_non_empty_string(&format!("{}.key", name), &self.key)?;
        validate_non_empty_string(&format!("{}.auth_header", name), &self.auth_header)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatAuth {
    #[default]
    ApiKey,
    Bearer,
}

/// OpenAI 相容的聊天端點
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatSettings {
    pub endpoint: String,
    pub key: String,
    pub model: String,
    #[serde(default)]
    pub auth: ChatAuth,
    #[serde(default)]
    pub api_version: Option<String>,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

impl ChatSettings {
    pub fn new(
        endpoint: impl Into<String>,
        key: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            key: key.into(),
            model: model.into(),
            auth: ChatAuth::default(),
            api_version: None,
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoIndexerSettings {
    #[serde(default = "default_video_api_base")]
    pub api_base: String,
    #[serde(default = "default_region")]
    pub region: String,
    pub account_id: String,
    pub access_token: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServicesConfig {
    #[serde(default)]
    pub vision: Option<ServiceEndpoint>,
    #[serde(default)]
    pub document: Option<ServiceEndpoint>,
    #[serde(default)]
    pub content_safety: Option<ServiceEndpoint>,
    #[serde(default)]
    pub language: Option<ServiceEndpoint>,
    #[serde(default)]
    pub chat: Option<ChatSettings>,
    #[serde(default)]
    pub video: Option<VideoIndexerSettings>,
}

impl ServicesConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// 從環境變數組出服務設定；端點與金鑰都存在才算已設定
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let endpoint = |url_var: &str, key_var: &str| match (get(url_var), get(key_var)) {
            (Some(url), Some(key)) => Some(ServiceEndpoint::new(url, key)),
            _ => None,
        };

        let document = endpoint("FORM_RECOGNIZER_ENDPOINT", "FORM_RECOGNIZER_KEY").map(|mut e| {
            e.model = get("FORM_RECOGNIZER_MODEL");
            e
        });

        let chat_endpoint = get("OPENAI_ENDPOINT").or_else(|| get("AZURE_OPENAI_ENDPOINT"));
        let chat_key = get("OPENAI_KEY").or_else(|| get("AZURE_OPENAI_KEY"));
        let chat_model = get("OPENAI_MODEL").or_else(|| get("AZURE_OPENAI_MODEL"));
        let chat = match (chat_endpoint, chat_key, chat_model) {
            (Some(endpoint), Some(key), Some(model)) => {
                let mut settings = ChatSettings::new(endpoint, key, model);
                if get("OPENAI_AUTH").as_deref() == Some("bearer") {
                    settings.auth = ChatAuth::Bearer;
                }
                settings.api_version = get("OPENAI_API_VERSION");
                Some(settings)
            }
            _ => None,
        };

        let video = match (
            get("VIDEO_INDEXER_ACCOUNT_ID"),
            get("VIDEO_INDEXER_ACCESS_TOKEN"),
        ) {
            (Some(account_id), Some(access_token)) => Some(VideoIndexerSettings {
                api_base: get("VIDEO_INDEXER_API_BASE").unwrap_or_else(default_video_api_base),
                region: get("VIDEO_INDEXER_REGION").unwrap_or_else(default_region),
                account_id,
                access_token,
            }),
            _ => None,
        };

        Self {
            vision: endpoint("VISION_ENDPOINT", "VISION_KEY"),
            document,
            content_safety: endpoint("CONTENT_SAFETY_ENDPOINT", "CONTENT_SAFETY_KEY"),
            language: endpoint("LANGUAGE_ENDPOINT", "LANGUAGE_KEY"),
            chat,
            video,
        }
    }

    /// `other` 中有設定的服務覆蓋目前的設定
    pub fn merge(self, other: ServicesConfig) -> Self {
        Self {
            vision: other.vision.or(self.vision),
            document: other.document.or(self.document),
            content_safety: other.content_safety.or(self.content_safety),
            language: other.language.or(self.language),
            chat: other.chat.or(self.chat),
            video: other.video.or(self.video),
        }
    }

    pub fn configured_names(&self) -> Vec<&'static str> {
        let mut names = Vec::new();
        if self.vision.is_some() {
            names.push("vision");
        }
        if self.document.is_some() {
            names.push("document");
        }
        if self.content_safety.is_some() {
            names.push("content_safety");
        }
        if self.language.is_some() {
            names.push("language");
        }
        if self.chat.is_some() {
            names.push("chat");
        }
        if self.video.is_some() {
            names.push("video");
        }
        names
    }
}

impl Validate for ServicesConfig {
    fn validate(&self) -> Result<()> {
        if let Some(vision) = &self.vision {
            vision.validate_as("services.vision")?;
        }
        if let Some(document) = &self.document {
            document.validate_as("services.document")?;
        }
        if let Some(content_safety) = &self.content_safety {
            content_safety.validate_as("services.content_safety")?;
        }
        if let Some(language) = &self.language {
            language.validate_as("services.language")?;
        }
        if let Some(chat) = &self.chat {
            validate_url("services.chat.endpoint", &chat.endpoint)?;
            validate_non_empty_string("services.chat.key", &chat.key)?;
            validate_non_empty_string("services.chat.model", &chat.model)?;
            crate::utils::validation::validate_range(
                "services.chat.temperature",
                chat.temperature,
                0.0,
                2.0,
            )?;
        }
        if let Some(video) = &self.video {
            validate_url("services.video.api_base", &video.api_base)?;
            validate_non_empty_string("services.video.region", &video.region)?;
            validate_non_empty_string("services.video.account_id", &video.account_id)?;
            validate_non_empty_string("services.video.access_token", &video.access_token)?;
        }
        Ok(())
    }
}
