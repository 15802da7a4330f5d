use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use tracing::{debug, warn};
use vendorwatch_domain::{ChatRequest, LlmPort};
use vendorwatch_error::WatchError;

pub const DEFAULT_OPENAI_BASE: &str = "https://api.openai.com/v1";

pub struct OpenAiConfig {
    pub api_key: String,
    pub base_url: String,
}

pub struct OpenAiAdapter {
    config: OpenAiConfig,
    client: Client,
}

impl OpenAiAdapter {
    pub fn new(config: OpenAiConfig) -> Self {
        let client = Client::new();
        Self { config, client }
    }
}

#[async_trait]
impl LlmPort for OpenAiAdapter {
    async fn chat(&self, request: &ChatRequest) -> Result<Value, WatchError> {
        let url = format!(
            "{}/chat/completions",
            self.config.base_url.trim_end_matches('/')
        );
        debug!(url, model = %request.model, "openai POST");
        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(request)
            .send()
            .await
            .map_err(|e| WatchError::network(format!("openai request failed: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            warn!(%status, "openai returned an error status");
        }
        resp.json::<Value>()
            .await
            .map_err(|e| WatchError::api(format!("openai response is not json: {e}")))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use serde_json::json;
    use vendorwatch_domain::ChatMessage;

    fn adapter_for(server: &mockito::ServerGuard) -> OpenAiAdapter {
        OpenAiAdapter::new(OpenAiConfig {
            api_key: "sk-test".to_string(),
            base_url: server.url(),
        })
    }

    fn request() -> ChatRequest {
        ChatRequest {
            model: "gpt-4o-mini".to_string(),
            messages: vec![ChatMessage::user("Email 1:\nSubject: Order #4")],
            temperature: 0.4,
        }
    }

    #[tokio::test]
    async fn posts_chat_completion_request() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/chat/completions")
            .match_header("authorization", "Bearer sk-test")
            .match_header("content-type", "application/json")
            .match_body(Matcher::PartialJson(json!({
                "model": "gpt-4o-mini",
                "temperature": 0.4,
                "messages": [{"role": "user", "content": "Email 1:\nSubject: Order #4"}]
            })))
            .with_status(200)
            .with_body(r#"{"choices":[{"index":0,"message":{"role":"assistant","content":"Client name: Acme"}}]}"#)
            .create_async()
            .await;

        let body = adapter_for(&server).chat(&request()).await.unwrap();

        mock.assert_async().await;
        assert_eq!(body["choices"][0]["message"]["content"], "Client name: Acme");
    }

    #[tokio::test]
    async fn error_status_body_is_returned() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/chat/completions")
            .with_status(401)
            .with_body(r#"{"error":{"message":"Incorrect API key provided"}}"#)
            .create_async()
            .await;

        let body = adapter_for(&server).chat(&request()).await.unwrap();
        assert!(body["choices"].is_null());
    }

    #[tokio::test]
    async fn non_json_body_is_api_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/chat/completions")
            .with_status(502)
            .with_body("Bad Gateway")
            .create_async()
            .await;

        let err = adapter_for(&server).chat(&request()).await.unwrap_err();
        assert!(matches!(err, WatchError::Api(_)));
    }
}
