use crate::adapters::http::build_client;
use crate::adapters::{
    ChatClient, ContentSafetyClient, DocumentClient, LanguageClient, LocalArtifactStore,
    VideoIndexerClient, VisionClient,
};
use crate::config::AppConfig;
use crate::domain::ports::ArtifactStore;
use crate::utils::error::{DemoError, Result};
use crate::utils::monitor::ProcessMonitor;
use std::sync::Arc;

pub type SharedState = Arc<AppState>;

/// 啟動後不再變動的共用狀態；未設定的服務為 None，呼叫時回 503
pub struct AppState {
    pub config: AppConfig,
    pub vision: Option<VisionClient>,
    pub document: Option<DocumentClient>,
    pub content_safety: Option<ContentSafetyClient>,
    pub language: Option<LanguageClient>,
    pub chat: Option<ChatClient>,
    pub video: Option<VideoIndexerClient>,
    pub store: Option<Arc<dyn ArtifactStore>>,
    pub monitor: ProcessMonitor,
}

impl AppState {
    pub fn from_config(config: AppConfig) -> Result<Self> {
        let http = build_client(config.request_timeout)?;
        let services = &config.services;

        let state = Self {
            vision: services
                .vision
                .clone()
                .map(|e| VisionClient::new(http.clone(), e)),
            document: services
                .document
                .clone()
                .map(|e| DocumentClient::new(http.clone(), e)),
            content_safety: services.content_safety.clone().map(|e| {
                ContentSafetyClient::new(http.clone(), e, config.moderation_block_threshold)
            }),
            language: services
                .language
                .clone()
                .map(|e| LanguageClient::new(http.clone(), e)),
            chat: services
                .chat
                .clone()
                .map(|s| ChatClient::new(http.clone(), s)),
            video: services
                .video
                .clone()
                .map(|s| VideoIndexerClient::new(http.clone(), s)),
            store: config
                .artifact_dir
                .clone()
                .map(|dir| Arc::new(LocalArtifactStore::new(dir)) as Arc<dyn ArtifactStore>),
            monitor: ProcessMonitor::new(),
            config,
        };

        tracing::info!(
            "🔧 Configured services: [{}]",
            state.config.services.configured_names().join(", ")
        );
        if let Some(dir) = &state.config.artifact_dir {
            tracing::info!("📁 Artifacts stored under {}", dir.display());
        }
        Ok(state)
    }

    pub fn with_store(mut self, store: Arc<dyn ArtifactStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn vision(&self) -> Result<&VisionClient> {
        self.vision
            .as_ref()
            .ok_or_else(|| DemoError::not_configured("vision"))
    }

    pub fn document(&self) -> Result<&DocumentClient> {
        self.document
            .as_ref()
            .ok_or_else(|| DemoError::not_configured("document"))
    }

    pub fn content_safety(&self) -> Result<&ContentSafetyClient> {
        self.content_safety
            .as_ref()
            .ok_or_else(|| DemoError::not_configured("content_safety"))
    }

    pub fn language(&self) -> Result<&LanguageClient> {
        self.language
            .as_ref()
            .ok_or_else(|| DemoError::not_configured("language"))
    }

    pub fn chat(&self) -> Result<&ChatClient> {
        self.chat
            .as_ref()
            .ok_or_else(|| DemoError::not_configured("chat"))
    }

    pub fn video(&self) -> Result<&VideoIndexerClient> {
        self.video
            .as_ref()
            .ok_or_else(|| DemoError::not_configured("video"))
    }

    pub fn store(&self) -> Result<&dyn ArtifactStore> {
        self.store
            .as_deref()
            .ok_or_else(|| DemoError::not_configured("artifact_store"))
    }
}
