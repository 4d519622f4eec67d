pub mod services;
pub mod toml_config;

use crate::core::poll::PollPolicy;
use crate::utils::error::Result;
use crate::utils::validation::{validate_positive_number, validate_range, Validate};
use clap::Parser;
use serde::Serialize;
use std::path::PathBuf;
use std::time::Duration;

pub use services::{ChatAuth, ChatSettings, ServiceEndpoint, ServicesConfig, VideoIndexerSettings};
pub use toml_config::TomlConfig;

#[derive(Debug, Clone, Parser)]
#[command(name = "cloud-ai-demos")]
#[command(about = "Demo server wrapping cloud AI services behind a small REST API")]
pub struct ServerConfig {
    #[arg(long, env = "DEMO_HOST", default_value = "127.0.0.1")]
    pub host: String,

    #[arg(long, env = "PORT", default_value = "3003")]
    pub port: u16,

    /// Path to an optional TOML configuration file
    #[arg(short, long, env = "DEMO_CONFIG")]
    pub config: Option<String>,

    /// Directory for stored artifacts (batch reports, document results)
    #[arg(long, env = "ARTIFACT_DIR")]
    pub artifact_dir: Option<String>,

    /// Kill whatever is listening on the port before binding
    #[arg(long, env = "RECLAIM_PORT")]
    pub reclaim_port: bool,

    #[arg(long, default_value = "30")]
    pub request_timeout_secs: u64,

    #[arg(long, env = "MAX_BATCH_ITEMS", default_value = "10")]
    pub max_batch_items: usize,

    #[arg(long)]
    pub batch_concurrency: Option<usize>,

    #[arg(short, long, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, env = "LOG_JSON", help = "Emit logs as JSON")]
    pub log_json: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchSettings {
    pub max_items: usize,
    pub concurrency: Option<usize>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PollingSettings {
    pub document: PollPolicy,
    pub video: PollPolicy,
}

impl Default for PollingSettings {
    fn default() -> Self {
        Self {
            document: PollPolicy::document(),
            video: PollPolicy::video(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UiSettings {
    pub title: String,
    pub chat_title: String,
    pub chat_description: String,
}

impl Default for UiSettings {
    fn default() -> Self {
        Self {
            title: "Cloud AI Demos".to_string(),
            chat_title: "Learn Azure OpenAI".to_string(),
            chat_description: "Ask me anything about Azure OpenAI and cloud development!"
                .to_string(),
        }
    }
}

/// 合併 CLI、環境變數與 TOML 後的最終設定
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub reclaim_port: bool,
    pub request_timeout: Duration,
    pub artifact_dir: Option<PathBuf>,
    pub batch: BatchSettings,
    pub polling: PollingSettings,
    pub moderation_block_threshold: u8,
    pub services: ServicesConfig,
    pub ui: UiSettings,
}

impl AppConfig {
    pub fn resolve(cli: &ServerConfig) -> Result<Self> {
        let file = match &cli.config {
            Some(path) => {
                tracing::info!("📁 Loading configuration from: {}", path);
                Some(TomlConfig::from_file(path)?)
            }
            None => None,
        };
        Ok(Self::from_parts(cli, ServicesConfig::from_env(), file))
    }

    /// 優先順序：TOML > 環境變數 / CLI > 預設值
    pub fn from_parts(
        cli: &ServerConfig,
        env_services: ServicesConfig,
        file: Option<TomlConfig>,
    ) -> Self {
        let file = file.unwrap_or_default();

        let mut batch = BatchSettings {
            max_items: cli.max_batch_items,
            concurrency: cli.batch_concurrency,
        };
        if let Some(section) = &file.batch {
            if let Some(max_items) = section.max_items {
                batch.max_items = max_items;
            }
            if section.concurrency.is_some() {
                batch.concurrency = section.concurrency;
            }
        }

        let mut polling = PollingSettings::default();
        if let Some(section) = &file.polling {
            if let Some(ms) = section.document_interval_ms {
                polling.document.interval = Duration::from_millis(ms);
            }
            if let Some(attempts) = section.document_max_attempts {
                polling.document.max_attempts = attempts;
            }
            if let Some(secs) = section.video_interval_secs {
                polling.video.interval = Duration::from_secs(secs);
            }
            if let Some(attempts) = section.video_max_attempts {
                polling.video.max_attempts = attempts;
            }
        }

        let mut ui = UiSettings::default();
        if let Some(section) = &file.ui {
            if let Some(title) = &section.title {
                ui.title = title.clone();
            }
            if let Some(chat_title) = &section.chat_title {
                ui.chat_title = chat_title.clone();
            }
            if let Some(chat_description) = &section.chat_description {
                ui.chat_description = chat_description.clone();
            }
        }

        Self {
            host: cli.host.clone(),
            port: cli.port,
            reclaim_port: cli.reclaim_port,
            request_timeout: Duration::from_secs(cli.request_timeout_secs),
            artifact_dir: cli.artifact_dir.as_ref().map(PathBuf::from),
            batch,
            polling,
            moderation_block_threshold: file
                .moderation
                .as_ref()
                .and_then(|m| m.block_threshold)
                .unwrap_or(4),
            services: env_services.merge(file.services),
            ui,
        }
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Validate for AppConfig {
    fn validate(&self) -> Result<()> {
        validate_range("port", self.port, 1, u16::MAX)?;
        crate::utils::validation::validate_non_empty_string("host", &self.host)?;
        validate_range("request_timeout_secs", self.request_timeout.as_secs(), 1, 600)?;
        validate_range("batch.max_items", self.batch.max_items, 1, 100)?;
        if let Some(concurrency) = self.batch.concurrency {
            validate_positive_number("batch.concurrency", concurrency, 1)?;
        }
        validate_range(
            "polling.document_max_attempts",
            self.polling.document.max_attempts,
            1,
            1000,
        )?;
        validate_range(
            "polling.video_max_attempts",
            self.polling.video.max_attempts,
            1,
            1000,
        )?;
        validate_range(
            "moderation.block_threshold",
            self.moderation_block_threshold,
            0,
            7,
        )?;
        if let Some(dir) = &self.artifact_dir {
            crate::utils::validation::validate_non_empty_string(
                "artifact_dir",
                &dir.to_string_lossy(),
            )?;
        }
        self.services.validate()?;

        tracing::debug!("✅ Configuration validation passed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cli(args: &[&str]) -> ServerConfig {
        let mut argv = vec!["cloud-ai-demos"];
        argv.extend_from_slice(args);
        ServerConfig::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_cli_defaults() {
        let config = AppConfig::from_parts(&cli(&[]), ServicesConfig::default(), None);

        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.bind_address(), format!("127.0.0.1:{}", config.port));
        assert!(!config.reclaim_port);
        assert_eq!(config.batch.max_items, 10);
        assert_eq!(config.batch.concurrency, None);
        assert_eq!(config.polling, PollingSettings::default());
        assert_eq!(config.moderation_block_threshold, 4);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_cli_flags() {
        let config = AppConfig::from_parts(
            &cli(&[
                "--port",
                "8080",
                "--reclaim-port",
                "--batch-concurrency",
                "3",
                "--artifact-dir",
                "/tmp/artifacts",
            ]),
            ServicesConfig::default(),
            None,
        );

        assert_eq!(config.port, 8080);
        assert!(config.reclaim_port);
        assert_eq!(config.batch.concurrency, Some(3));
        assert_eq!(config.artifact_dir, Some(PathBuf::from("/tmp/artifacts")));
    }

    #[test]
    fn test_toml_overrides_cli_and_env() {
        let env = ServicesConfig {
            vision: Some(ServiceEndpoint::new("https://env.example.com", "env-key")),
            ..Default::default()
        };
        let file = TomlConfig::from_toml_str(
            r#"
[services.vision]
endpoint = "https://file.example.com"
key = "file-key"

[batch]
max_items = 3

[polling]
video_interval_secs = 2
video_max_attempts = 5

[ui]
chat_title = "Woodgrove Assistant"
"#,
        )
        .unwrap();

        let config = AppConfig::from_parts(&cli(&[]), env, Some(file));

        assert_eq!(
            config.services.vision.unwrap().endpoint,
            "https://file.example.com"
        );
        assert_eq!(config.batch.max_items, 3);
        assert_eq!(config.polling.video.interval, Duration::from_secs(2));
        assert_eq!(config.polling.video.max_attempts, 5);
        assert_eq!(config.polling.document, PollPolicy::document());
        assert_eq!(config.ui.chat_title, "Woodgrove Assistant");
        assert_eq!(config.ui.title, "Cloud AI Demos");
    }

    #[test]
    fn test_validation_rejects_zero_batch() {
        let config = AppConfig::from_parts(
            &cli(&["--max-batch-items", "0"]),
            ServicesConfig::default(),
            None,
        );
        assert!(config.validate().is_err());
    }
}
