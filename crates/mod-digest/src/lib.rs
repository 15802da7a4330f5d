pub mod extract;
pub mod format;
pub mod mail;
pub mod page;
pub mod service;
pub mod summarize;

pub use extract::{decode_base64url, extract};
pub use format::{format_entries, format_state, Format};
pub use mail::MailClient;
pub use page::{extract_subject, page_channel, PageBridge, PageReply, PageRequest, PageResponder};
pub use service::{load_state, DigestOutcome, DigestService, Stage};
pub use summarize::Summarizer;
