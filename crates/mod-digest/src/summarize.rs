use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info, warn};
use vendorwatch_domain::{ChatMessage, ChatRequest, LlmPort, ThreadSummaryEntry};
use vendorwatch_error::WatchError;

pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
pub const SUMMARY_TEMPERATURE: f32 = 0.4;

/// The provider answered but without usable content.
pub const NO_SUMMARY: &str = "No summary returned.";
/// The request itself failed.
pub const SUMMARY_FAILED: &str = "Failed to generate summary.";

const INSTRUCTIONS: &str = "You are reading an email thread between a business and one of its \
vendors. Extract the following details and answer in exactly this format:

Client name: ...
Date: ...
Time: ...
Location: ...
Items (with prices): ...
Special notes: ...

Write \"Not found\" for any detail that does not appear in the emails.";

pub fn build_prompt(entries: &[ThreadSummaryEntry]) -> String {
    let emails = entries
        .iter()
        .enumerate()
        .map(|(i, e)| format!("Email {}:\nSubject: {}\nBody: {}", i + 1, e.subject, e.body))
        .collect::<Vec<_>>()
        .join("\n\n");
    format!("{INSTRUCTIONS}\n\nEmail thread:\n\n{emails}")
}

pub struct Summarizer {
    llm: Arc<dyn LlmPort>,
    model: String,
}

impl Summarizer {
    pub fn new(llm: Arc<dyn LlmPort>, model: impl Into<String>) -> Self {
        Self {
            llm,
            model: model.into(),
        }
    }

    pub fn request_for(&self, entries: &[ThreadSummaryEntry]) -> ChatRequest {
        ChatRequest {
            model: self.model.clone(),
            messages: vec![ChatMessage::user(build_prompt(entries))],
            temperature: SUMMARY_TEMPERATURE,
        }
    }

    /// One completion round trip. `Ok(None)` means the provider answered
    /// without usable content.
    pub async fn generate(
        &self,
        entries: &[ThreadSummaryEntry],
    ) -> Result<Option<String>, WatchError> {
        let request = self.request_for(entries);
        debug!(model = %self.model, emails = entries.len(), "requesting summary");
        let resp = self.llm.chat(&request).await?;
        Ok(first_choice_content(&resp).map(str::to_string))
    }

    /// Always returns display text: the generated summary, [`NO_SUMMARY`] or
    /// [`SUMMARY_FAILED`].
    pub async fn summarize(&self, entries: &[ThreadSummaryEntry]) -> String {
        self.try_summarize(entries)
            .await
            .unwrap_or_else(str::to_string)
    }

    /// Like [`Summarizer::summarize`], but a failed request comes back as
    /// `Err(SUMMARY_FAILED)` so callers can tell it from a kept answer.
    pub async fn try_summarize(
        &self,
        entries: &[ThreadSummaryEntry],
    ) -> Result<String, &'static str> {
        match self.generate(entries).await {
            Ok(Some(text)) => {
                info!(chars = text.len(), "summary generated");
                Ok(text)
            }
            Ok(None) => {
                warn!("completion response had no content");
                Ok(NO_SUMMARY.to_string())
            }
            Err(e) => {
                warn!(error = %e, "completion request failed");
                Err(SUMMARY_FAILED)
            }
        }
    }
}

fn first_choice_content(resp: &Value) -> Option<&str> {
    resp["choices"][0]["message"]["content"]
        .as_str()
        .filter(|s| !s.trim().is_empty())
}
