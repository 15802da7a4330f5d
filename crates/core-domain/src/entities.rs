use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use vendorwatch_error::WatchError;

pub const VENDOR_EMAIL_KEY: &str = "vendorEmail";
pub const LAST_SUMMARY_KEY: &str = "lastSummary";
pub const LAST_SUMMARY_AT_KEY: &str = "lastSummaryAt";

pub const NO_SUBJECT: &str = "No subject";

/// Email address of the vendor being tracked. Always trimmed, non-empty and
/// containing an `@`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct VendorAddress(String);

impl VendorAddress {
    pub fn parse(raw: &str) -> Result<Self, WatchError> {
        let email = raw.trim();
        if email.is_empty() {
            return Err(WatchError::invalid_input("vendor email cannot be empty"));
        }
        if !email.contains('@') {
            return Err(WatchError::invalid_input(format!(
                "vendor email must contain '@': {email}"
            )));
        }
        Ok(Self(email.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for VendorAddress {
    type Err = WatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for VendorAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Bearer token for the mail API. Never persisted.
#[derive(Clone, PartialEq, Eq)]
pub struct AuthToken(String);

impl AuthToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn secret(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AuthToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AuthToken(***)")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageFormat {
    Full,
    Metadata,
}

impl MessageFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Metadata => "metadata",
        }
    }
}

impl fmt::Display for MessageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Entry of a message listing: ids only.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageRef {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct MessageHeader {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageBody {
    #[serde(default)]
    pub size: u64,
    /// base64url encoded content
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachment_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagePart {
    #[serde(default)]
    pub mime_type: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub headers: Vec<MessageHeader>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<MessageBody>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parts: Vec<MessagePart>,
}

impl MessagePart {
    pub fn is_multipart(&self) -> bool {
        !self.parts.is_empty()
    }

    /// Exact, case-sensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|h| h.name == name)
            .map(|h| h.value.as_str())
    }

    pub fn data(&self) -> Option<&str> {
        self.body
            .as_ref()
            .and_then(|b| b.data.as_deref())
            .filter(|d| !d.is_empty())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MailMessage {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snippet: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<MessagePart>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ThreadSummaryEntry {
    pub subject: String,
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
}

/// What a UI reads on load.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StoredState {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vendor_email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_summary_at: Option<i64>,
}

impl fmt::Display for ThreadSummaryEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let preview: String = self.body.chars().take(80).collect();
        let suffix = if self.body.chars().count() > 80 {
            "..."
        } else {
            ""
        };
        write!(f, "{}: {preview}{suffix}", self.subject)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn vendor_address_is_trimmed_and_validated() {
        let addr = VendorAddress::parse("  vendor@example.com ").unwrap();
        assert_eq!(addr.as_str(), "vendor@example.com");

        assert!(matches!(
            VendorAddress::parse("   "),
            Err(WatchError::InvalidInput(_))
        ));
        assert!(matches!(
            "vendor.example.com".parse::<VendorAddress>(),
            Err(WatchError::InvalidInput(_))
        ));
    }

    #[test]
    fn auth_token_debug_is_redacted() {
        let token = AuthToken::new("ya29.secret");
        assert_eq!(format!("{token:?}"), "AuthToken(***)");
        assert_eq!(token.secret(), "ya29.secret");
    }

    #[test]
    fn message_deserializes_from_gmail_json() {
        let msg: MailMessage = serde_json::from_value(serde_json::json!({
            "id": "m1",
            "threadId": "t1",
            "payload": {
                "mimeType": "multipart/alternative",
                "headers": [{"name": "Subject", "value": "Order #4"}],
                "parts": [
                    {"mimeType": "text/plain", "body": {"size": 5, "data": "aGVsbG8"}}
                ]
            }
        }))
        .unwrap();

        assert_eq!(msg.thread_id.as_deref(), Some("t1"));
        let payload = msg.payload.unwrap();
        assert!(payload.is_multipart());
        assert_eq!(payload.header("Subject"), Some("Order #4"));
        assert_eq!(payload.header("subject"), None);
        assert_eq!(payload.parts[0].data(), Some("aGVsbG8"));
    }
}
