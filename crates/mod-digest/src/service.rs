use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tracing::{debug, info, warn};
use vendorwatch_domain::{
    KeyValueStore, PagePort, StoredState, ThreadSummaryEntry, TokenProvider, VendorAddress,
    LAST_SUMMARY_AT_KEY, LAST_SUMMARY_KEY, VENDOR_EMAIL_KEY,
};
use vendorwatch_error::WatchError;

use crate::extract::extract;
use crate::mail::MailClient;
use crate::summarize::{Summarizer, SUMMARY_FAILED};

pub const NO_ACTIVE_TAB: &str = "No active tab.";
pub const NO_PAGE_SUBJECT: &str = "No subject found on this page.";
pub const AUTH_FAILED: &str = "Authorization failed.";
pub const THREAD_NOT_FOUND: &str = "No matching email thread found.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Idle,
    AwaitingToken,
    AwaitingMail,
    Extracting,
    AwaitingSummary,
    Done,
    Failed,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::AwaitingToken => write!(f, "awaiting_token"),
            Self::AwaitingMail => write!(f, "awaiting_mail"),
            Self::Extracting => write!(f, "extracting"),
            Self::AwaitingSummary => write!(f, "awaiting_summary"),
            Self::Done => write!(f, "done"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Text handed back to the UI, plus where the pipeline stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DigestOutcome {
    pub summary: String,
    pub stage: Stage,
    pub entries: Vec<ThreadSummaryEntry>,
}

impl DigestOutcome {
    pub fn is_done(&self) -> bool {
        self.stage == Stage::Done
    }
}

struct Pipeline {
    id: u64,
    trigger: &'static str,
    stage: Stage,
}

impl Pipeline {
    fn advance(&mut self, next: Stage) {
        debug!(request = self.id, trigger = self.trigger, from = %self.stage, to = %next, "pipeline");
        self.stage = next;
    }

    fn fail(mut self, err: &WatchError) -> DigestOutcome {
        warn!(request = self.id, trigger = self.trigger, stage = %self.stage, error = %err, "pipeline failed");
        self.stage = Stage::Failed;
        DigestOutcome {
            summary: failure_text(err).to_string(),
            stage: self.stage,
            entries: Vec::new(),
        }
    }

    fn abandon(mut self, text: &str) -> DigestOutcome {
        warn!(request = self.id, trigger = self.trigger, stage = %self.stage, text, "pipeline abandoned");
        self.stage = Stage::Failed;
        DigestOutcome {
            summary: text.to_string(),
            stage: self.stage,
            entries: Vec::new(),
        }
    }
}

pub fn failure_text(err: &WatchError) -> &'static str {
    match err {
        WatchError::PageUnavailable(_) => NO_ACTIVE_TAB,
        WatchError::Auth(_) => AUTH_FAILED,
        WatchError::NotFound(_) => THREAD_NOT_FOUND,
        _ => SUMMARY_FAILED,
    }
}

pub struct DigestService {
    tokens: Arc<dyn TokenProvider>,
    mail: MailClient,
    summarizer: Summarizer,
    store: Arc<dyn KeyValueStore>,
    page: Option<Arc<dyn PagePort>>,
    next_request: AtomicU64,
}

impl DigestService {
    pub fn new(
        tokens: Arc<dyn TokenProvider>,
        mail: MailClient,
        summarizer: Summarizer,
        store: Arc<dyn KeyValueStore>,
    ) -> Self {
        Self {
            tokens,
            mail,
            summarizer,
            store,
            page: None,
            next_request: AtomicU64::new(1),
        }
    }

    pub fn with_page(mut self, page: Arc<dyn PagePort>) -> Self {
        self.page = Some(page);
        self
    }

    pub fn has_page(&self) -> bool {
        self.page.is_some()
    }

    fn start(&self, trigger: &'static str) -> Pipeline {
        let id = self.next_request.fetch_add(1, Ordering::Relaxed);
        info!(request = id, trigger, "pipeline started");
        Pipeline {
            id,
            trigger,
            stage: Stage::Idle,
        }
    }

    /// Persists a new vendor address, then summarizes the vendor's latest
    /// messages. Bad input is the only error returned.
    pub async fn save_vendor_email(&self, raw: &str) -> Result<DigestOutcome, WatchError> {
        let address = VendorAddress::parse(raw)?;
        self.store.set(VENDOR_EMAIL_KEY, address.as_str()).await?;
        info!(%address, "vendor email saved");
        Ok(self.summarize_vendor(&address).await)
    }

    pub async fn summarize_vendor(&self, address: &VendorAddress) -> DigestOutcome {
        let mut run = self.start("vendor_saved");

        run.advance(Stage::AwaitingToken);
        let token = match self.tokens.get_token().await {
            Ok(t) => t,
            Err(e) => return run.fail(&e),
        };

        run.advance(Stage::AwaitingMail);
        let messages = self.mail.fetch_by_sender(address, &token).await;

        run.advance(Stage::Extracting);
        let entries: Vec<ThreadSummaryEntry> = messages.iter().map(extract).collect();

        self.finish(run, &entries).await
    }

    /// Asks the active page which thread it shows and summarizes that thread.
    pub async fn summarize_active_page(&self) -> DigestOutcome {
        let run = self.start("summarize_page");
        let Some(page) = self.page.as_ref() else {
            return run.abandon(NO_ACTIVE_TAB);
        };

        match page.active_subject().await {
            Ok(Some(subject)) => self.run_subject(run, &subject).await,
            Ok(None) => run.abandon(NO_PAGE_SUBJECT),
            Err(e) => run.fail(&e),
        }
    }

    pub async fn summarize_subject(&self, subject: &str) -> DigestOutcome {
        let run = self.start("summarize_subject");
        self.run_subject(run, subject).await
    }

    async fn run_subject(&self, mut run: Pipeline, subject: &str) -> DigestOutcome {
        debug!(request = run.id, subject, "summarizing thread");

        run.advance(Stage::AwaitingToken);
        let token = match self.tokens.get_token().await {
            Ok(t) => t,
            Err(e) => return run.fail(&e),
        };

        run.advance(Stage::AwaitingMail);
        let messages = match self.mail.fetch_by_subject(subject, &token).await {
            Ok(m) => m,
            Err(e) => return run.fail(&e),
        };

        run.advance(Stage::Extracting);
        let entries: Vec<ThreadSummaryEntry> = messages.iter().map(extract).collect();

        self.finish(run, &entries).await
    }

    async fn finish(&self, mut run: Pipeline, entries: &[ThreadSummaryEntry]) -> DigestOutcome {
        run.advance(Stage::AwaitingSummary);
        let summary = match self.summarizer.try_summarize(entries).await {
            Ok(text) => text,
            Err(text) => return run.abandon(text),
        };

        self.remember_summary(&summary).await;
        run.advance(Stage::Done);
        info!(request = run.id, trigger = run.trigger, emails = entries.len(), "pipeline done");
        DigestOutcome {
            summary,
            stage: run.stage,
            entries: entries.to_vec(),
        }
    }

    async fn remember_summary(&self, summary: &str) {
        let now = chrono::Utc::now().timestamp().to_string();
        let result = match self.store.set(LAST_SUMMARY_KEY, summary).await {
            Ok(()) => self.store.set(LAST_SUMMARY_AT_KEY, &now).await,
            Err(e) => Err(e),
        };
        if let Err(e) = result {
            warn!(error = %e, "failed to store last summary");
        }
    }

    pub async fn load_state(&self) -> Result<StoredState, WatchError> {
        load_state(self.store.as_ref()).await
    }
}

/// Reads what a UI shows on load.
pub async fn load_state(store: &dyn KeyValueStore) -> Result<StoredState, WatchError> {
    let vendor_email = store.get(VENDOR_EMAIL_KEY).await?;
    let last_summary = store.get(LAST_SUMMARY_KEY).await?;
    let last_summary_at = store
        .get(LAST_SUMMARY_AT_KEY)
        .await?
        .and_then(|s| s.parse::<i64>().ok());
    Ok(StoredState {
        vendor_email,
        last_summary,
        last_summary_at,
    })
}
