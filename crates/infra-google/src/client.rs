use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use tracing::debug;
use vendorwatch_domain::{AuthToken, MailApi, MailMessage, MessageFormat, MessageRef};
use vendorwatch_error::WatchError;

pub const DEFAULT_GMAIL_BASE: &str = "https://gmail.googleapis.com/gmail/v1/users/me";

pub struct GmailConfig {
    pub base_url: String,
}

impl Default for GmailConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_GMAIL_BASE.to_string(),
        }
    }
}

pub struct GmailClient {
    config: GmailConfig,
    client: Client,
}

#[derive(Deserialize)]
struct ListResponse {
    #[serde(default)]
    messages: Vec<MessageRef>,
}

#[derive(Deserialize)]
struct ThreadResponse {
    #[serde(default)]
    messages: Vec<MailMessage>,
}

impl GmailClient {
    pub fn new(config: GmailConfig) -> Self {
        let client = Client::new();
        Self { config, client }
    }

    async fn api_get<T: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        params: &[(&str, &str)],
        token: &AuthToken,
    ) -> Result<T, WatchError> {
        let url = format!("{}/{path}", self.config.base_url.trim_end_matches('/'));
        debug!(url, "gmail GET");
        let resp = self
            .client
            .get(&url)
            .bearer_auth(token.secret())
            .query(params)
            .send()
            .await
            .map_err(|e| WatchError::network(format!("gmail request failed: {e}")))?;
        parse_gmail_response(resp).await
    }
}

async fn parse_gmail_response<T: for<'de> Deserialize<'de>>(
    resp: Response,
) -> Result<T, WatchError> {
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        let detail = serde_json::from_str::<serde_json::Value>(&body)
            .ok()
            .and_then(|v| v["error"]["message"].as_str().map(str::to_string))
            .unwrap_or(body);
        return Err(match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                WatchError::auth(format!("gmail rejected token ({status}): {detail}"))
            }
            StatusCode::NOT_FOUND => WatchError::not_found(format!("gmail: {detail}")),
            _ => WatchError::api(format!("gmail returned {status}: {detail}")),
        });
    }
    resp.json::<T>()
        .await
        .map_err(|e| WatchError::malformed(format!("gmail response: {e}")))
}

#[async_trait]
impl MailApi for GmailClient {
    async fn list_messages(
        &self,
        query: &str,
        max_results: usize,
        token: &AuthToken,
    ) -> Result<Vec<MessageRef>, WatchError> {
        let max = max_results.to_string();
        let resp: ListResponse = self
            .api_get("messages", &[("q", query), ("maxResults", &max)], token)
            .await?;
        Ok(resp.messages)
    }

    async fn get_message(
        &self,
        id: &str,
        format: MessageFormat,
        token: &AuthToken,
    ) -> Result<MailMessage, WatchError> {
        self.api_get(
            &format!("messages/{id}"),
            &[("format", format.as_str())],
            token,
        )
        .await
    }

    async fn get_thread(
        &self,
        thread_id: &str,
        token: &AuthToken,
    ) -> Result<Vec<MailMessage>, WatchError> {
        let resp: ThreadResponse = self
            .api_get(
                &format!("threads/{thread_id}"),
                &[("format", MessageFormat::Full.as_str())],
                token,
            )
            .await?;
        Ok(resp.messages)
    }
}
