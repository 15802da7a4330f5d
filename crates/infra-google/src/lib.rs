mod client;
mod token;

pub use client::{GmailClient, GmailConfig, DEFAULT_GMAIL_BASE};
pub use token::{GoogleTokenProvider, TokenSource, GOOGLE_TOKEN_URL};
