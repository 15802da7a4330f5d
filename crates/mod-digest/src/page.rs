//! Request/response channel to the page-content collaborator.
//!
//! Every subject request carries a correlation id. The page side answers
//! with a [`PageReply`] holding the same id, and the reply is routed to the
//! one waiter that asked for it.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock};

use async_trait::async_trait;
use regex::Regex;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};
use vendorwatch_domain::PagePort;
use vendorwatch_error::WatchError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub id: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageReply {
    pub id: u64,
    pub subject: Option<String>,
}

type PendingMap = HashMap<u64, oneshot::Sender<Option<String>>>;
type Pending = Mutex<PendingMap>;

pub struct PageBridge {
    requests: mpsc::Sender<PageRequest>,
    pending: Arc<Pending>,
    next_id: AtomicU64,
}

#[derive(Clone)]
pub struct PageResponder {
    pending: Arc<Pending>,
}

/// Creates both ends of the channel. The receiver goes to whatever task
/// renders the page; it answers through the responder.
pub fn page_channel(buffer: usize) -> (PageBridge, PageResponder, mpsc::Receiver<PageRequest>) {
    let (tx, rx) = mpsc::channel(buffer.max(1));
    let pending: Arc<Pending> = Arc::new(Mutex::new(HashMap::new()));
    let bridge = PageBridge {
        requests: tx,
        pending: pending.clone(),
        next_id: AtomicU64::new(1),
    };
    (bridge, PageResponder { pending }, rx)
}

impl PageBridge {
    pub async fn request_subject(&self) -> Result<Option<String>, WatchError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        lock(&self.pending)?.insert(id, tx);
        let _guard = PendingGuard {
            pending: &self.pending,
            id,
        };

        debug!(id, "asking page for subject");
        self.requests
            .send(PageRequest { id })
            .await
            .map_err(|_| WatchError::page_unavailable("no active tab"))?;

        rx.await
            .map_err(|_| WatchError::page_unavailable("page closed before replying"))
    }
}

#[async_trait]
impl PagePort for PageBridge {
    async fn active_subject(&self) -> Result<Option<String>, WatchError> {
        self.request_subject().await
    }
}

impl PageResponder {
    /// Delivers a reply. Returns `false` when nobody is waiting on its id.
    pub fn reply(&self, reply: PageReply) -> bool {
        let waiter = match self.pending.lock() {
            Ok(mut pending) => pending.remove(&reply.id),
            Err(_) => None,
        };
        match waiter {
            Some(tx) => tx.send(reply.subject).is_ok(),
            None => {
                warn!(id = reply.id, "page reply without a waiting request");
                false
            }
        }
    }
}

struct PendingGuard<'a> {
    pending: &'a Pending,
    id: u64,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        if let Ok(mut pending) = self.pending.lock() {
            pending.remove(&self.id);
        }
    }
}

fn lock(pending: &Pending) -> Result<MutexGuard<'_, PendingMap>, WatchError> {
    pending
        .lock()
        .map_err(|_| WatchError::internal("page request table poisoned"))
}

/// Subject of the mail thread shown in an HTML page: the first
/// `<h2 class="hP">`, else the first `<h2 tabindex="-1">`. Only the first
/// heading of each kind is looked at; a blank one counts as missing.
pub fn extract_subject(html: &str) -> Option<String> {
    heading_patterns().iter().find_map(|re| {
        re.captures(html)
            .and_then(|c| c.get(1))
            .map(|m| heading_text(m.as_str()))
            .filter(|s| !s.is_empty())
    })
}

fn heading_patterns() -> &'static [Regex] {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            r#"(?is)<h2\b[^>]*\bclass\s*=\s*["'](?:[^"']*\s)?hP(?:\s[^"']*)?["'][^>]*>(.*?)</h2\s*>"#,
            r#"(?is)<h2\b[^>]*\btabindex\s*=\s*["']-1["'][^>]*>(.*?)</h2\s*>"#,
        ]
        .iter()
        .filter_map(|p| Regex::new(p).ok())
        .collect()
    })
}

fn heading_text(inner: &str) -> String {
    static TAGS: OnceLock<Option<Regex>> = OnceLock::new();
    let stripped = match TAGS.get_or_init(|| Regex::new(r"(?s)<[^>]*>").ok()) {
        Some(re) => re.replace_all(inner, "").into_owned(),
        None => inner.to_string(),
    };
    let decoded = stripped
        .replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&");
    decoded.split_whitespace().collect::<Vec<_>>().join(" ")
}
