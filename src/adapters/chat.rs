use crate::adapters::http::{read_json, with_correlation};
use crate::config::{ChatAuth, ChatSettings};
use crate::core::correlation::CorrelationId;
use crate::domain::model::{ChatMessage, ChatReply, ChatUsage};
use crate::utils::error::{DemoError, Result};
use reqwest::Client;
use serde_json::{json, Value};

const SERVICE: &str = "chat";
const ROLES: [&str; 3] = ["system", "user", "assistant"];

/// OpenAI 相容的 `/chat/completions` 用戶端
#[derive(Debug, Clone)]
pub struct ChatClient {
    http: Client,
    settings: ChatSettings,
}

impl ChatClient {
    pub fn new(http: Client, settings: ChatSettings) -> Self {
        Self { http, settings }
    }

    pub fn model(&self) -> &str {
        &self.settings.model
    }

    pub async fn complete(
        &self,
        messages: &[ChatMessage],
        correlation_id: &CorrelationId,
    ) -> Result<ChatReply> {
        validate_messages(messages)?;
        tracing::info!(
            "💬 Chat request with {} messages [{}]",
            messages.len(),
            correlation_id
        );

        let url = format!(
            "{}/chat/completions",
            self.settings.endpoint.trim_end_matches('/')
        );
        let mut request = with_correlation(self.http.post(url), correlation_id);
        if let Some(version) = &self.settings.api_version {
            request = request.query(&[("api-version", version.as_str())]);
        }
        request = match self.settings.auth {
            ChatAuth::ApiKey => request.header("api-key", self.settings.key.as_str()),
            ChatAuth::Bearer => request.bearer_auth(&self.settings.key),
        };

        let request = request.json(&json!({
            "model": self.settings.model,
            "messages": messages,
            "temperature": self.settings.temperature,
            "max_tokens": self.settings.max_tokens,
        }));

        let body = read_json(SERVICE, request.send().await?).await?;
        parse_reply(&body)
    }
}

fn validate_messages(messages: &[ChatMessage]) -> Result<()> {
    if messages.is_empty() {
        return Err(DemoError::bad_request("messages must not be empty"));
    }
    if let Some(bad) = messages.iter().find(|m| !ROLES.contains(&m.role.as_str())) {
        return Err(DemoError::bad_request(format!(
            "unsupported message role '{}'",
            bad.role
        )));
    }
    Ok(())
}

pub fn parse_reply(body: &Value) -> Result<ChatReply> {
    let message = body
        .pointer("/choices/0/message")
        .ok_or_else(|| DemoError::OperationFailed {
            operation: "Chat completion".to_string(),
            message: "response contained no choices".to_string(),
        })?;

    Ok(ChatReply {
        message: ChatMessage {
            role: message
                .get("role")
                .and_then(Value::as_str)
                .unwrap_or("assistant")
                .to_string(),
            content: message
                .get("content")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
        },
        model: body.get("model").and_then(Value::as_str).map(str::to_string),
        usage: body
            .get("usage")
            .and_then(|u| serde_json::from_value::<ChatUsage>(u.clone()).ok()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::http::build_client;
    use httpmock::prelude::*;
    use std::time::Duration;

    fn user(content: &str) -> ChatMessage {
        ChatMessage {
            role: "user".into(),
            content: content.into(),
        }
    }

    #[test]
    fn test_empty_choices_is_an_error() {
        assert!(parse_reply(&json!({"choices": []})).is_err());
    }

    #[test]
    fn test_rejects_unknown_role() {
        let messages = vec![ChatMessage {
            role: "wizard".into(),
            content: "hi".into(),
        }];
        assert!(matches!(
            validate_messages(&messages),
            Err(DemoError::BadRequest { .. })
        ));
        assert!(validate_messages(&[]).is_err());
    }

    #[tokio::test]
    async fn test_api_key_auth_and_defaults() {
        let server = MockServer::start_async().await;
        let mut settings = ChatSettings::new(
            server.url("/openai/deployments/gpt-4o-mini"),
            "azure-key",
            "gpt-4o-mini",
        );
        settings.api_version = Some("2024-06-01".into());

        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/openai/deployments/gpt-4o-mini/chat/completions")
                    .query_param("api-version", "2024-06-01")
                    .header("api-key", "azure-key")
                    .json_body_partial(r#"{"max_tokens": 800, "model": "gpt-4o-mini"}"#);
                then.status(200).json_body(json!({
                    "model": "gpt-4o-mini",
                    "choices": [{"index": 0, "message": {"role": "assistant", "content": "Hello!"}}],
                    "usage": {"prompt_tokens": 5, "completion_tokens": 2, "total_tokens": 7}
                }));
            })
            .await;

        let client = ChatClient::new(build_client(Duration::from_secs(5)).unwrap(), settings);
        let reply = client
            .complete(&[user("Hi")], &CorrelationId::generate())
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(reply.message.content, "Hello!");
        assert_eq!(reply.usage.unwrap().total_tokens, 7);
    }

    #[tokio::test]
    async fn test_bearer_auth() {
        let server = MockServer::start_async().await;
        let mut settings = ChatSettings::new(server.url("/v1"), "sk-test", "gpt-4o-mini");
        settings.auth = ChatAuth::Bearer;

        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/v1/chat/completions")
                    .header("authorization", "Bearer sk-test");
                then.status(200).json_body(json!({
                    "choices": [{"message": {"role": "assistant", "content": "ok"}}]
                }));
            })
            .await;

        let client = ChatClient::new(build_client(Duration::from_secs(5)).unwrap(), settings);
        let reply = client
            .complete(&[user("ping")], &CorrelationId::generate())
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(reply.message.role, "assistant");
        assert!(reply.model.is_none());
    }
}
