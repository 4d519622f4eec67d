use crate::config::services::ServicesConfig;
use crate::utils::error::{DemoError, Result};
use crate::utils::validation::{validate_positive_number, validate_range, Validate};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::OnceLock;

/// 選用的 TOML 設定檔，值可用 `${VAR}` 引用環境變數
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TomlConfig {
    #[serde(default)]
    pub services: ServicesConfig,
    pub batch: Option<BatchSection>,
    pub polling: Option<PollingSection>,
    pub moderation: Option<ModerationSection>,
    pub ui: Option<UiSection>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchSection {
    pub max_items: Option<usize>,
    pub concurrency: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollingSection {
    pub document_interval_ms: Option<u64>,
    pub document_max_attempts: Option<u32>,
    pub video_interval_secs: Option<u64>,
    pub video_max_attempts: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModerationSection {
    pub block_threshold: Option<u8>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UiSection {
    pub title: Option<String>,
    pub chat_title: Option<String>,
    pub chat_description: Option<String>,
}

fn env_var_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("valid regex"))
}

impl TomlConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(DemoError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content);

        toml::from_str(&processed_content).map_err(|e| DemoError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${VISION_KEY})，未設定的保留原樣
    fn substitute_env_vars(content: &str) -> String {
        env_var_pattern()
            .replace_all(content, |caps: &regex::Captures| {
                let var_name = &caps[1];
                std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
            })
            .into_owned()
    }
}

impl Validate for TomlConfig {
    fn validate(&self) -> Result<()> {
        self.services.validate()?;

        if let Some(batch) = &self.batch {
            if let Some(max_items) = batch.max_items {
                validate_range("batch.max_items", max_items, 1, 100)?;
            }
            if let Some(concurrency) = batch.concurrency {
                validate_positive_number("batch.concurrency", concurrency, 1)?;
            }
        }

        if let Some(polling) = &self.polling {
            for (field, attempts) in [
                ("polling.document_max_attempts", polling.document_max_attempts),
                ("polling.video_max_attempts", polling.video_max_attempts),
            ] {
                if let Some(attempts) = attempts {
                    validate_range(field, attempts, 1, 1000)?;
                }
            }
        }

        if let Some(threshold) = self.moderation.as_ref().and_then(|m| m.block_threshold) {
            validate_range("moderation.block_threshold", threshold, 0, 7)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_parse_full_config() {
        let toml_content = r#"
[services.vision]
endpoint = "https://vision.example.com"
key = "vision-key"

[services.document]
endpoint = "https://docs.example.com"
key = "doc-key"
model = "prebuilt-invoice"

[services.chat]
endpoint = "https://chat.example.com/v1"
key = "sk-test"
model = "gpt-4o-mini"
auth = "bearer"

[batch]
max_items = 5
concurrency = 2

[polling]
document_interval_ms = 500
document_max_attempts = 4

[moderation]
block_threshold = 2

[ui]
title = "Asset Review"
"#;

        let config = TomlConfig::from_toml_str(toml_content).unwrap();

        let vision = config.services.vision.as_ref().unwrap();
        assert_eq!(vision.key, "vision-key");
        assert_eq!(vision.auth_header, "Ocp-Apim-Subscription-Key");
        assert_eq!(
            config.services.document.as_ref().unwrap().model.as_deref(),
            Some("prebuilt-invoice")
        );
        let chat = config.services.chat.as_ref().unwrap();
        assert_eq!(chat.auth, crate::config::services::ChatAuth::Bearer);
        assert_eq!(chat.temperature, 0.7);
        assert_eq!(config.batch.as_ref().unwrap().max_items, Some(5));
        assert_eq!(
            config.polling.as_ref().unwrap().document_max_attempts,
            Some(4)
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_config_is_valid() {
        let config = TomlConfig::from_toml_str("").unwrap();
        assert!(config.services.vision.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_var_substitution() {
        std::env::set_var("CLOUD_AI_DEMOS_TEST_KEY", "from-env");

        let toml_content = r#"
[services.language]
endpoint = "https://language.example.com"
key = "${CLOUD_AI_DEMOS_TEST_KEY}"
"#;

        let config = TomlConfig::from_toml_str(toml_content).unwrap();
        assert_eq!(config.services.language.unwrap().key, "from-env");

        std::env::remove_var("CLOUD_AI_DEMOS_TEST_KEY");
    }

    #[test]
    fn test_unset_env_var_is_left_verbatim() {
        let toml_content = r#"
[services.language]
endpoint = "https://language.example.com"
key = "${CLOUD_AI_DEMOS_SURELY_UNSET}"
"#;

        let config = TomlConfig::from_toml_str(toml_content).unwrap();
        assert_eq!(
            config.services.language.unwrap().key,
            "${CLOUD_AI_DEMOS_SURELY_UNSET}"
        );
    }

    #[test]
    fn test_config_validation() {
        let toml_content = r#"
[services.vision]
endpoint = "invalid-url"
key = "k"

[batch]
max_items = 0
"#;

        let config = TomlConfig::from_toml_str(toml_content).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_toml_is_config_error() {
        let result = TomlConfig::from_toml_str("[services.vision\nendpoint=");
        assert!(matches!(
            result,
            Err(DemoError::ConfigValidationError { .. })
        ));
    }

    #[test]
    fn test_config_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();

        let toml_content = r#"
[services.content_safety]
endpoint = "https://safety.example.com"
key = "safety-key"
"#;

        temp_file.write_all(toml_content.as_bytes()).unwrap();

        let config = TomlConfig::from_file(temp_file.path()).unwrap();
        assert!(config.services.content_safety.is_some());
    }
}
