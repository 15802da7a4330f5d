use async_trait::async_trait;
use serde_json::Value;
use vendorwatch_error::WatchError;

use crate::entities::{AuthToken, ChatRequest, MailMessage, MessageFormat, MessageRef};

#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// May prompt the user when no cached grant exists.
    async fn get_token(&self) -> Result<AuthToken, WatchError>;
}

#[async_trait]
pub trait MailApi: Send + Sync {
    /// Most recent messages matching a provider search query, newest first.
    async fn list_messages(
        &self,
        query: &str,
        max_results: usize,
        token: &AuthToken,
    ) -> Result<Vec<MessageRef>, WatchError>;

    async fn get_message(
        &self,
        id: &str,
        format: MessageFormat,
        token: &AuthToken,
    ) -> Result<MailMessage, WatchError>;

    async fn get_thread(
        &self,
        thread_id: &str,
        token: &AuthToken,
    ) -> Result<Vec<MailMessage>, WatchError>;
}

#[async_trait]
pub trait LlmPort: Send + Sync {
    /// Sends one chat-completion request and returns the raw JSON body,
    /// whatever the HTTP status.
    async fn chat(&self, request: &ChatRequest) -> Result<Value, WatchError>;
}

#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, WatchError>;

    async fn set(&self, key: &str, value: &str) -> Result<(), WatchError>;
}

#[async_trait]
pub trait PagePort: Send + Sync {
    /// Subject of the thread shown on the active page, `None` when the page
    /// has no thread heading.
    async fn active_subject(&self) -> Result<Option<String>, WatchError>;
}
