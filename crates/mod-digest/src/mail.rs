use std::sync::Arc;

use futures::future::try_join_all;
use tracing::{debug, info, warn};
use vendorwatch_domain::{AuthToken, MailApi, MailMessage, MessageFormat, VendorAddress};
use vendorwatch_error::WatchError;

pub const SENDER_FETCH_LIMIT: usize = 5;

pub struct MailClient {
    api: Arc<dyn MailApi>,
}

impl MailClient {
    pub fn new(api: Arc<dyn MailApi>) -> Self {
        Self { api }
    }

    /// Up to five most recent messages from `address`, fetched in full.
    /// Any provider failure is logged and yields an empty list.
    pub async fn fetch_by_sender(
        &self,
        address: &VendorAddress,
        token: &AuthToken,
    ) -> Vec<MailMessage> {
        match self.try_fetch_by_sender(address, token).await {
            Ok(messages) => {
                info!(%address, count = messages.len(), "fetched vendor messages");
                messages
            }
            Err(e) => {
                warn!(%address, error = %e, "vendor message fetch failed");
                Vec::new()
            }
        }
    }

    async fn try_fetch_by_sender(
        &self,
        address: &VendorAddress,
        token: &AuthToken,
    ) -> Result<Vec<MailMessage>, WatchError> {
        let query = format!("from:{address}");
        let refs = self
            .api
            .list_messages(&query, SENDER_FETCH_LIMIT, token)
            .await?;
        debug!(query, count = refs.len(), "listed messages");

        try_join_all(
            refs.iter()
                .map(|r| self.api.get_message(&r.id, MessageFormat::Full, token)),
        )
        .await
    }

    /// Whole thread of the most recent message whose subject matches.
    pub async fn fetch_by_subject(
        &self,
        subject: &str,
        token: &AuthToken,
    ) -> Result<Vec<MailMessage>, WatchError> {
        let cleaned = subject.replace('"', "");
        let cleaned = cleaned.trim();
        if cleaned.is_empty() {
            return Err(WatchError::invalid_input("subject cannot be empty"));
        }

        let query = format!("subject:\"{cleaned}\"");
        let first = self
            .api
            .list_messages(&query, 1, token)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| WatchError::not_found("no message for subject"))?;

        let meta = self
            .api
            .get_message(&first.id, MessageFormat::Metadata, token)
            .await?;
        let thread_id = meta
            .thread_id
            .filter(|t| !t.is_empty())
            .ok_or_else(|| WatchError::not_found("thread unresolved"))?;

        let messages = self.api.get_thread(&thread_id, token).await?;
        info!(thread_id, count = messages.len(), "fetched thread");
        Ok(messages)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
pub(crate) mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use vendorwatch_domain::{MessagePart, MessageRef};

    use crate::extract::tests::{leaf, message};

    #[derive(Default)]
    pub(crate) struct FakeMail {
        pub refs: Vec<MessageRef>,
        pub messages: HashMap<String, MailMessage>,
        pub threads: HashMap<String, Vec<MailMessage>>,
        pub fail_ids: Vec<String>,
        pub fail_list: bool,
        pub calls: Mutex<Vec<String>>,
    }

    impl FakeMail {
        pub(crate) fn with_messages(messages: Vec<MailMessage>) -> Self {
            Self {
                refs: messages
                    .iter()
                    .map(|m| MessageRef {
                        id: m.id.clone(),
                        thread_id: m.thread_id.clone(),
                    })
                    .collect(),
                messages: messages.into_iter().map(|m| (m.id.clone(), m)).collect(),
                ..Default::default()
            }
        }

        pub(crate) fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl MailApi for FakeMail {
        async fn list_messages(
            &self,
            query: &str,
            max_results: usize,
            _token: &AuthToken,
        ) -> Result<Vec<MessageRef>, WatchError> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("list {query} {max_results}"));
            if self.fail_list {
                return Err(WatchError::network("connection refused"));
            }
            Ok(self.refs.iter().take(max_results).cloned().collect())
        }

        async fn get_message(
            &self,
            id: &str,
            format: MessageFormat,
            _token: &AuthToken,
        ) -> Result<MailMessage, WatchError> {
            self.calls.lock().unwrap().push(format!("get {id} {format}"));
            if self.fail_ids.iter().any(|f| f == id) {
                return Err(WatchError::network("connection reset"));
            }
            self.messages
                .get(id)
                .cloned()
                .ok_or_else(|| WatchError::not_found(id.to_string()))
        }

        async fn get_thread(
            &self,
            thread_id: &str,
            _token: &AuthToken,
        ) -> Result<Vec<MailMessage>, WatchError> {
            self.calls.lock().unwrap().push(format!("thread {thread_id}"));
            self.threads
                .get(thread_id)
                .cloned()
                .ok_or_else(|| WatchError::not_found(thread_id.to_string()))
        }
    }

    pub(crate) fn order_thread() -> Vec<MailMessage> {
        let first = message(
            "m1",
            Some("Order #4"),
            MessagePart {
                mime_type: "multipart/alternative".to_string(),
                parts: vec![
                    leaf("text/plain", "Order due Friday"),
                    leaf("text/html", "<p>Order due Friday</p>"),
                ],
                ..Default::default()
            },
        );
        let second = message("m2", Some("Re: Order #4"), leaf("text/plain", "Thanks!"));
        vec![first, second]
    }

    fn token() -> AuthToken {
        AuthToken::new("token")
    }

    fn vendor() -> VendorAddress {
        VendorAddress::parse("vendor@example.com").unwrap()
    }

    #[tokio::test]
    async fn sender_lookup_fetches_each_message_in_full() {
        let api = Arc::new(FakeMail::with_messages(order_thread()));
        let client = MailClient::new(api.clone());

        let messages = client.fetch_by_sender(&vendor(), &token()).await;

        assert_eq!(messages.len(), 2);
        let calls = api.calls();
        assert_eq!(calls[0], "list from:vendor@example.com 5");
        assert!(calls.contains(&"get m1 full".to_string()));
        assert!(calls.contains(&"get m2 full".to_string()));
    }

    #[tokio::test]
    async fn sender_lookup_without_matches_is_empty() {
        let client = MailClient::new(Arc::new(FakeMail::default()));
        assert!(client.fetch_by_sender(&vendor(), &token()).await.is_empty());
    }

    #[tokio::test]
    async fn sender_lookup_swallows_provider_failures() {
        let api = FakeMail {
            fail_list: true,
            ..Default::default()
        };
        let client = MailClient::new(Arc::new(api));
        assert!(client.fetch_by_sender(&vendor(), &token()).await.is_empty());

        let mut api = FakeMail::with_messages(order_thread());
        api.fail_ids.push("m2".to_string());
        let client = MailClient::new(Arc::new(api));
        assert!(client.fetch_by_sender(&vendor(), &token()).await.is_empty());
    }

    #[tokio::test]
    async fn subject_lookup_resolves_thread() {
        let thread = order_thread();
        let mut api = FakeMail::with_messages(vec![thread[1].clone()]);
        api.messages.get_mut("m2").unwrap().thread_id = Some("t-order".to_string());
        api.threads.insert("t-order".to_string(), thread.clone());
        let api = Arc::new(api);
        let client = MailClient::new(api.clone());

        let messages = client
            .fetch_by_subject("Re: \"Order\" #4", &token())
            .await
            .unwrap();

        assert_eq!(messages, thread);
        assert_eq!(
            api.calls(),
            vec![
                "list subject:\"Re: Order #4\" 1".to_string(),
                "get m2 metadata".to_string(),
                "thread t-order".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn subject_lookup_without_match_is_not_found() {
        let client = MailClient::new(Arc::new(FakeMail::default()));
        let err = client
            .fetch_by_subject("Order #4", &token())
            .await
            .unwrap_err();
        assert!(matches!(err, WatchError::NotFound(ref m) if m == "no message for subject"));
    }

    #[tokio::test]
    async fn subject_lookup_without_thread_id_is_unresolved() {
        let mut api = FakeMail::with_messages(order_thread());
        api.messages.get_mut("m1").unwrap().thread_id = None;
        let client = MailClient::new(Arc::new(api));

        let err = client
            .fetch_by_subject("Order #4", &token())
            .await
            .unwrap_err();
        assert!(matches!(err, WatchError::NotFound(ref m) if m == "thread unresolved"));
    }

    #[tokio::test]
    async fn blank_subject_is_rejected() {
        let client = MailClient::new(Arc::new(FakeMail::default()));
        let err = client.fetch_by_subject(" \"\" ", &token()).await.unwrap_err();
        assert!(matches!(err, WatchError::InvalidInput(_)));
    }
}
