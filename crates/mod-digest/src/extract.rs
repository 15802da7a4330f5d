//! Turns provider messages into `(subject, body)` pairs.

use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::Engine;
use vendorwatch_domain::{MailMessage, MessagePart, ThreadSummaryEntry, NO_SUBJECT};

const LENIENT_STANDARD: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new()
        .with_decode_padding_mode(DecodePaddingMode::Indifferent)
        .with_decode_allow_trailing_bits(true),
);

pub fn extract(message: &MailMessage) -> ThreadSummaryEntry {
    let payload = message.payload.as_ref();

    let subject = payload
        .and_then(|p| p.header("Subject"))
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(NO_SUBJECT)
        .to_string();

    let body = payload
        .and_then(select_body)
        .and_then(decode_base64url)
        .unwrap_or_default();

    ThreadSummaryEntry { subject, body }
}

/// Decodes base64url text by mapping it onto the standard alphabet first.
/// Padding is optional. Returns `None` for data that is not base64.
pub fn decode_base64url(data: &str) -> Option<String> {
    let standard: String = data
        .chars()
        .filter(|c| !c.is_ascii_whitespace())
        .map(|c| match c {
            '-' => '+',
            '_' => '/',
            other => other,
        })
        .collect();
    let bytes = LENIENT_STANDARD.decode(standard).ok()?;
    Some(String::from_utf8_lossy(&bytes).into_owned())
}

fn select_body(payload: &MessagePart) -> Option<&str> {
    if payload.is_multipart() {
        find_part(payload, "text/plain")
            .or_else(|| find_part(payload, "text/html"))
            .and_then(MessagePart::data)
    } else {
        payload.data()
    }
}

// Depth-first, document order.
fn find_part<'a>(part: &'a MessagePart, mime_type: &str) -> Option<&'a MessagePart> {
    part.parts.iter().find_map(|p| {
        if p.mime_type.eq_ignore_ascii_case(mime_type) && p.data().is_some() {
            Some(p)
        } else {
            find_part(p, mime_type)
        }
    })
}
